//! XML backend adapter
//!
//! Parses raw XML into [`XmlElement`] trees with `roxmltree` and writes
//! them back out with `quick-xml`. The transform pipeline never touches
//! raw text; arrival order, namespaces and raw inner markup are captured
//! here.

use crate::document::{XmlAttribute, XmlElement, XmlNode, XmlWriteOptions};
use crate::error::Result;
use crate::instance::{Instance, ModelDescriptor};
use crate::namespaces::QName;
use crate::transform::{xml as xml_transform, SerializeOptions};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::sync::Arc;

/// Parse raw XML into an element tree
pub fn parse_document(input: &str) -> Result<XmlElement> {
    let document = roxmltree::Document::parse(input)?;
    Ok(convert_node(document.root_element(), input))
}

fn convert_node(node: roxmltree::Node<'_, '_>, input: &str) -> XmlElement {
    let name = QName::new(
        node.tag_name().namespace().map(str::to_string),
        node.tag_name().name(),
    );

    let mut element = XmlElement {
        name,
        prefix: None,
        attributes: Vec::new(),
        children: Vec::new(),
        raw_inner: raw_inner_markup(node, input),
    };

    for attribute in node.attributes() {
        element.attributes.push(XmlAttribute {
            name: QName::new(attribute.namespace().map(str::to_string), attribute.name()),
            prefix: None,
            value: attribute.value().to_string(),
        });
    }

    for child in node.children() {
        if child.is_element() {
            element
                .children
                .push(XmlNode::Element(convert_node(child, input)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                if !text.trim().is_empty() {
                    element.children.push(XmlNode::Text(text.to_string()));
                }
            }
        }
    }

    element
}

/// Slice the inner markup of an element out of the input text, for
/// catch-all raw rules
fn raw_inner_markup(node: roxmltree::Node<'_, '_>, input: &str) -> Option<String> {
    let range = node.range();
    let outer = input.get(range)?;
    let open_end = outer.find('>')?;
    if outer[..open_end].ends_with('/') {
        // Self-closing element, no inner markup
        return Some(String::new());
    }
    let close_start = outer.rfind("</")?;
    if close_start <= open_end {
        return Some(String::new());
    }
    Some(outer[open_end + 1..close_start].to_string())
}

/// Write an element tree as raw XML
pub fn write_document(root: &XmlElement, options: &XmlWriteOptions) -> Result<String> {
    let mut writer = if options.pretty {
        Writer::new_with_indent(Vec::new(), b' ', options.indent)
    } else {
        Writer::new(Vec::new())
    };

    if options.declaration {
        writer.write_event(Event::Decl(BytesDecl::new(
            "1.0",
            options.encoding.as_deref(),
            None,
        )))?;
    }

    write_element(&mut writer, root)?;

    let bytes = writer.into_inner();
    String::from_utf8(bytes).map_err(|e| crate::error::Error::Xml(e.to_string()))
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<()> {
    let tag = element.qualified_tag();
    let mut start = BytesStart::new(tag.as_str());

    for attribute in &element.attributes {
        let name = match &attribute.prefix {
            Some(prefix) => format!("{}:{}", prefix, attribute.name.local_name),
            None => attribute.name.local_name.clone(),
        };
        start.push_attribute((name.as_str(), attribute.value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(nested) => write_element(writer, nested)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(text) => {
                writer.write_event(Event::CData(BytesCData::new(text.as_str())))?
            }
            XmlNode::Raw(markup) => {
                writer.write_event(Event::Text(BytesText::from_escaped(markup.as_str())))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(tag.as_str())))?;
    Ok(())
}

/// Parse raw XML and deserialize an instance
pub fn from_xml(descriptor: &Arc<ModelDescriptor>, input: &str) -> Result<Instance> {
    of_xml(descriptor, &parse_document(input)?)
}

/// Deserialize an instance from an already-parsed element tree
pub fn of_xml(descriptor: &Arc<ModelDescriptor>, element: &XmlElement) -> Result<Instance> {
    xml_transform::instance_from_element(descriptor, element)
}

/// Serialize an instance into an element tree
pub fn as_xml(instance: &Instance, options: &SerializeOptions) -> Result<XmlElement> {
    xml_transform::instance_to_element(instance, options)
}

/// Serialize an instance into raw XML
pub fn to_xml(instance: &Instance, options: &SerializeOptions) -> Result<String> {
    let element = as_xml(instance, options)?;
    let mut write_options = XmlWriteOptions::new()
        .with_pretty(options.pretty)
        .with_declaration(options.declaration);
    if let Some(ref encoding) = options.encoding {
        write_options = write_options.with_encoding(encoding.clone());
    }
    write_document(&element, &write_options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_document() {
        let element = parse_document("<root><a>1</a><b>2</b></root>").unwrap();
        assert_eq!(element.name.local_name, "root");
        assert_eq!(element.child_elements().count(), 2);
        assert_eq!(element.child_elements().next().unwrap().text(), "1");
    }

    #[test]
    fn test_parse_captures_namespaces() {
        let element = parse_document(
            r#"<root xmlns="http://example.com/d" xmlns:o="http://example.com/o">
                 <a o:id="7">x</a>
               </root>"#,
        )
        .unwrap();
        assert_eq!(element.name.namespace.as_deref(), Some("http://example.com/d"));

        let a = element.child_elements().next().unwrap();
        assert_eq!(a.name.namespace.as_deref(), Some("http://example.com/d"));
        assert_eq!(
            a.attribute(&QName::namespaced("http://example.com/o", "id")),
            Some("7")
        );
    }

    #[test]
    fn test_parse_captures_raw_inner_markup() {
        let element = parse_document("<root><p>a <b>bold</b></p></root>").unwrap();
        let p = element.child_elements().next().unwrap();
        assert_eq!(p.raw_inner.as_deref(), Some("a <b>bold</b>"));
    }

    #[test]
    fn test_write_escapes_text() {
        let element = XmlElement::new("root").with_text("a < b & c");
        let out = write_document(&element, &XmlWriteOptions::new()).unwrap();
        assert_eq!(out, "<root>a &lt; b &amp; c</root>");
    }

    #[test]
    fn test_write_empty_element_self_closes() {
        let element = XmlElement::new("root");
        let out = write_document(&element, &XmlWriteOptions::new()).unwrap();
        assert_eq!(out, "<root/>");
    }

    #[test]
    fn test_write_with_declaration() {
        let element = XmlElement::new("root").with_text("x");
        let options = XmlWriteOptions::new()
            .with_declaration(true)
            .with_encoding("UTF-8");
        let out = write_document(&element, &options).unwrap();
        assert!(out.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }

    #[test]
    fn test_write_cdata() {
        let element = XmlElement::new("root").with_cdata("a < b");
        let out = write_document(&element, &XmlWriteOptions::new()).unwrap();
        assert_eq!(out, "<root><![CDATA[a < b]]></root>");
    }

    #[test]
    fn test_write_raw_markup_verbatim() {
        let element = XmlElement::new("root").with_raw("a <b>bold</b>");
        let out = write_document(&element, &XmlWriteOptions::new()).unwrap();
        assert_eq!(out, "<root>a <b>bold</b></root>");
    }

    #[test]
    fn test_round_trip_document() {
        let input = "<root kind=\"x\"><a>1</a><a>2</a><b>3</b></root>";
        let element = parse_document(input).unwrap();
        let out = write_document(&element, &XmlWriteOptions::new()).unwrap();
        assert_eq!(out, input);
    }
}
