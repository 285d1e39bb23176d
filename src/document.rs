//! XML document and element contract
//!
//! The transform pipeline reads and writes [`XmlElement`] trees; the
//! format backends in [`formats::xml`](crate::formats::xml) parse raw text
//! into them and write them back out. Per node the pipeline needs the
//! namespace-qualified name, the attribute list, the ordered children, the
//! text content and the raw inner markup.

use crate::namespaces::QName;

/// One attribute of an element
#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    /// Namespace-qualified attribute name
    pub name: QName,
    /// Prefix to render the name with, if any
    pub prefix: Option<String>,
    /// Attribute value
    pub value: String,
}

/// One child node of an element
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    /// Child element
    Element(XmlElement),
    /// Text leaf
    Text(String),
    /// CDATA leaf
    CData(String),
    /// Raw markup emitted verbatim
    Raw(String),
}

/// One parsed or built XML element
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    /// Namespace-qualified element name
    pub name: QName,
    /// Prefix to render the name with, if any
    pub prefix: Option<String>,
    /// Attributes in document order
    pub attributes: Vec<XmlAttribute>,
    /// Child nodes in document order
    pub children: Vec<XmlNode>,
    /// Raw inner markup captured at parse time, for catch-all raw rules
    pub raw_inner: Option<String>,
}

impl XmlElement {
    /// Create an element without a namespace
    pub fn new(local_name: impl Into<String>) -> Self {
        Self {
            name: QName::local(local_name),
            ..Default::default()
        }
    }

    /// Create an element with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            name: QName::namespaced(namespace, local_name),
            ..Default::default()
        }
    }

    /// Set the rendering prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.attributes.push(XmlAttribute {
            name,
            prefix: None,
            value: value.into(),
        });
        self
    }

    /// Add an attribute rendered with a prefix
    pub fn with_prefixed_attribute(
        mut self,
        name: QName,
        prefix: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(XmlAttribute {
            name,
            prefix: Some(prefix.into()),
            value: value.into(),
        });
        self
    }

    /// Add a child element
    pub fn with_element(mut self, element: XmlElement) -> Self {
        self.children.push(XmlNode::Element(element));
        self
    }

    /// Add a text leaf
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    /// Add a CDATA leaf
    pub fn with_cdata(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::CData(text.into()));
        self
    }

    /// Add raw markup emitted verbatim
    pub fn with_raw(mut self, markup: impl Into<String>) -> Self {
        self.children.push(XmlNode::Raw(markup.into()));
        self
    }

    /// Concatenated direct text and CDATA content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(t) | XmlNode::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Iterate the direct child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// Check whether the element has any child elements
    pub fn has_child_elements(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Look up an attribute value by qualified name
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == *name)
            .map(|attr| attr.value.as_str())
    }

    /// The tag as it is rendered, including the prefix
    pub fn qualified_tag(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, self.name.local_name),
            None => self.name.local_name.clone(),
        }
    }
}

/// Output options for the XML writer
#[derive(Debug, Clone)]
pub struct XmlWriteOptions {
    /// Pretty-print with indentation
    pub pretty: bool,
    /// Indentation width when pretty-printing
    pub indent: usize,
    /// Emit an XML declaration
    pub declaration: bool,
    /// Encoding named in the declaration
    pub encoding: Option<String>,
}

impl Default for XmlWriteOptions {
    fn default() -> Self {
        Self {
            pretty: false,
            indent: 2,
            declaration: false,
            encoding: None,
        }
    }
}

impl XmlWriteOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretty-print with indentation
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Set the indentation width
    pub fn with_indent(mut self, indent: usize) -> Self {
        self.indent = indent;
        self
    }

    /// Emit an XML declaration
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Name an encoding in the declaration
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }
}
