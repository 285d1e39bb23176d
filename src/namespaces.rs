//! XML namespace handling
//!
//! This module provides qualified names (QNames), the namespace reference
//! declared on XML mapping rules, and the namespace set collected while
//! serializing a model graph.

use indexmap::IndexMap;
use std::fmt;

/// XML Schema instance namespace, used for `xsi:nil`
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML Namespace URI
pub type NamespaceUri = String;

/// Namespace prefix
pub type Prefix = String;

/// Qualified name (QName) - combination of namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI (None for no namespace)
    pub namespace: Option<NamespaceUri>,
    /// Local name
    pub local_name: String,
}

impl QName {
    /// Create a new QName
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(|s| s.into()),
            local_name: local_name.into(),
        }
    }

    /// Create a QName without a namespace
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Create a QName with a namespace
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Get the fully qualified name in `{namespace}local` form
    pub fn qualified(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{}}}{}", ns, self.local_name),
            None => self.local_name.clone(),
        }
    }
}

impl Default for QName {
    fn default() -> Self {
        QName::local("")
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.qualified())
    }
}

/// Namespace declared on an XML mapping rule.
///
/// `Unset` resolves to the kind default at mapping build: attributes get no
/// namespace, elements inherit the enclosing mapping's default namespace.
/// `Inherit` always takes the nearest ancestor mapping's namespace,
/// including for attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceRef {
    /// No namespace declared; resolve to the kind default
    #[default]
    Unset,
    /// Explicitly no namespace
    None,
    /// Explicit namespace URI
    Uri(NamespaceUri),
    /// Inherit the nearest ancestor mapping's namespace at build time
    Inherit,
}

impl NamespaceRef {
    /// Create an explicit namespace reference
    pub fn uri(uri: impl Into<String>) -> Self {
        NamespaceRef::Uri(uri.into())
    }
}

/// Set of namespace declarations needed to reproduce a document.
///
/// Collected by walking the attribute graph once per serialization;
/// deduplicates by prefix, keeps insertion order for deterministic output.
#[derive(Debug, Clone, Default)]
pub struct NamespaceSet {
    /// Default namespace (rendered as a bare `xmlns`)
    default: Option<NamespaceUri>,
    /// Prefixed namespaces in declaration order
    prefixed: IndexMap<Prefix, NamespaceUri>,
}

impl NamespaceSet {
    /// Create an empty namespace set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a namespace; a `None` prefix declares the default namespace.
    /// The first declaration of a prefix wins.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) {
        match prefix {
            Some(prefix) => {
                self.prefixed
                    .entry(prefix.to_string())
                    .or_insert_with(|| uri.to_string());
            }
            None => {
                if self.default.is_none() {
                    self.default = Some(uri.to_string());
                }
            }
        }
    }

    /// Merge another set into this one
    pub fn merge(&mut self, other: &NamespaceSet) {
        if let Some(ref uri) = other.default {
            self.declare(None, uri);
        }
        for (prefix, uri) in &other.prefixed {
            self.declare(Some(prefix), uri);
        }
    }

    /// Check whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.prefixed.is_empty()
    }

    /// Render the set as `xmlns` attribute pairs in declaration order
    pub fn to_xmlns_attributes(&self) -> Vec<(String, String)> {
        let mut attrs = Vec::new();
        if let Some(ref uri) = self.default {
            attrs.push(("xmlns".to_string(), uri.clone()));
        }
        for (prefix, uri) in &self.prefixed {
            attrs.push((format!("xmlns:{}", prefix), uri.clone()));
        }
        attrs
    }
}
