//! XML mapping rules and container
//!
//! [`XmlMappingRule`] declares how one attribute maps to an XML element,
//! attribute, text content or the raw inner markup, including its
//! namespace. [`XmlMapping`] holds the ordered rule set of one model class
//! together with the root element, default namespace and the declared
//! content-model constraints.

use crate::content_model::{Choice, Group, Sequence};
use crate::error::{DefinitionError, Error, Result};
use crate::instance::{Instance, ValueState};
use crate::mapping::rule::{CustomFns, MappingRule, RenderMode, TransformFn};
use crate::namespaces::{NamespaceRef, QName};
use crate::values::Value;
use std::sync::Arc;

/// What part of an XML element a rule maps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlRuleKind {
    /// A child element
    Element,
    /// An XML attribute
    Attribute,
    /// The text content of the element
    Content,
    /// The raw inner markup of the element (catch-all)
    Raw,
}

/// One XML mapping rule
#[derive(Debug, Clone)]
pub struct XmlMappingRule {
    base: MappingRule,
    kind: XmlRuleKind,
    namespace: NamespaceRef,
    prefix: Option<String>,
    cdata: bool,
    mixed: bool,
    effective_namespace: Option<String>,
}

impl XmlMappingRule {
    /// Map a child element
    pub fn element(name: impl Into<String>) -> Self {
        Self::with_kind(MappingRule::new(name), XmlRuleKind::Element)
    }

    /// Map an XML attribute
    pub fn attribute(name: impl Into<String>) -> Self {
        Self::with_kind(MappingRule::new(name), XmlRuleKind::Attribute)
    }

    /// Map the text content of the element
    pub fn content() -> Self {
        Self::with_kind(MappingRule::new(""), XmlRuleKind::Content)
    }

    /// Map the raw inner markup of the element (catch-all)
    pub fn raw() -> Self {
        Self::with_kind(MappingRule::new(""), XmlRuleKind::Raw)
    }

    fn with_kind(base: MappingRule, kind: XmlRuleKind) -> Self {
        Self {
            base,
            kind,
            namespace: NamespaceRef::default(),
            prefix: None,
            cdata: false,
            mixed: false,
            effective_namespace: None,
        }
    }

    /// Bind the rule to a model attribute
    pub fn to(mut self, attribute: impl Into<String>) -> Self {
        self.base = self.base.to(attribute);
        self
    }

    /// Accept an alternative serialized name on read
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.base = self.base.with_alias(alias);
        self
    }

    /// Read and write through a nested object
    pub fn with_delegate(mut self, delegate: impl Into<String>) -> Self {
        self.base = self.base.with_delegate(delegate);
        self
    }

    /// Set the render policy for nil values
    pub fn with_render_nil(mut self, mode: RenderMode) -> Result<Self> {
        self.base = self.base.with_render_nil(mode)?;
        Ok(self)
    }

    /// Set the render policy for empty collections
    pub fn with_render_empty(mut self, mode: RenderMode) -> Result<Self> {
        self.base = self.base.with_render_empty(mode)?;
        Ok(self)
    }

    /// Re-emit values assigned from the attribute default
    pub fn with_render_default(mut self) -> Self {
        self.base = self.base.with_render_default();
        self
    }

    /// Replace the attribute binding with custom read/write functions
    pub fn with_custom(
        mut self,
        import: impl Fn(&mut Instance, &Value) -> Result<()> + Send + Sync + 'static,
        export: impl Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.base = self.base.with_custom(import, export);
        self
    }

    /// Apply a transform to values on deserialize
    pub fn with_import_transform(
        mut self,
        transform: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.base = self.base.with_import_transform(transform);
        self
    }

    /// Apply a transform to values on serialize
    pub fn with_export_transform(
        mut self,
        transform: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.base = self.base.with_export_transform(transform);
        self
    }

    /// Set an explicit namespace with an optional prefix
    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespace = NamespaceRef::uri(uri);
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// Declare the rule explicitly namespace-less
    pub fn with_no_namespace(mut self) -> Self {
        self.namespace = NamespaceRef::None;
        self
    }

    /// Inherit the nearest ancestor mapping's namespace at build time
    pub fn with_inherited_namespace(mut self) -> Self {
        self.namespace = NamespaceRef::Inherit;
        self
    }

    /// Emit the value as CDATA
    pub fn with_cdata(mut self) -> Self {
        self.cdata = true;
        self
    }

    /// Mark a content rule as mixed: text segments interleave with child
    /// elements
    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    /// Get the format-independent rule core
    pub fn base(&self) -> &MappingRule {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut MappingRule {
        &mut self.base
    }

    /// Get the rule kind
    pub fn kind(&self) -> XmlRuleKind {
        self.kind
    }

    /// Get the primary serialized name
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Get the target attribute, if bound to one
    pub fn target_attribute(&self) -> Option<&str> {
        self.base.attribute()
    }

    /// Get the delegate attribute, if any
    pub fn delegate(&self) -> Option<&str> {
        self.base.delegate()
    }

    /// Get the custom read/write functions, if any
    pub fn custom(&self) -> Option<&CustomFns> {
        self.base.custom()
    }

    /// Get the import transform, if any
    pub fn import_transform(&self) -> Option<&TransformFn> {
        self.base.import_transform()
    }

    /// Get the export transform, if any
    pub fn export_transform(&self) -> Option<&TransformFn> {
        self.base.export_transform()
    }

    /// Get the declared namespace reference
    pub fn namespace_ref(&self) -> &NamespaceRef {
        &self.namespace
    }

    /// Get the declared prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Check whether the value is emitted as CDATA
    pub fn is_cdata(&self) -> bool {
        self.cdata
    }

    /// Check whether the content rule is mixed
    pub fn is_mixed(&self) -> bool {
        self.mixed
    }

    /// Get the namespace resolved at mapping build
    pub fn effective_namespace(&self) -> Option<&str> {
        self.effective_namespace.as_deref()
    }

    /// Get the namespace-qualified name used for matching
    pub fn qname(&self) -> QName {
        QName::new(self.effective_namespace.clone(), self.base.name())
    }

    /// Check whether an element or attribute QName matches this rule,
    /// by primary name or alias under the resolved namespace
    pub fn matches(&self, qname: &QName) -> bool {
        if qname.namespace.as_deref() != self.effective_namespace() {
            return false;
        }
        self.base.names().any(|name| name == qname.local_name)
    }

    /// Decide whether a value is emitted, delegating to the core rule
    pub fn render(&self, value: &Value, state: ValueState) -> bool {
        self.base.render(value, state)
    }

    /// Coerce a nil or empty value into its declared render shape
    pub fn rendered_value(&self, value: Value) -> Value {
        self.base.rendered_value(value)
    }
}

/// Ordered XML mapping of one model class
#[derive(Debug, Clone)]
pub struct XmlMapping {
    root: Option<String>,
    namespace: Option<String>,
    prefix: Option<String>,
    ordered: bool,
    mixed: bool,
    rules: Vec<Arc<XmlMappingRule>>,
    sequences: Vec<Sequence>,
    choices: Vec<Choice>,
    groups: Vec<Group>,
}

impl XmlMapping {
    /// Create a mapping with a document root element
    pub fn with_root(root: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            namespace: None,
            prefix: None,
            ordered: false,
            mixed: false,
            rules: Vec::new(),
            sequences: Vec::new(),
            choices: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Create a mapping without a document root; usable only as a nested
    /// model or through an importing model
    pub fn no_root() -> Self {
        Self {
            root: None,
            namespace: None,
            prefix: None,
            ordered: false,
            mixed: false,
            rules: Vec::new(),
            sequences: Vec::new(),
            choices: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Declare the default namespace of the mapping
    pub fn with_namespace(mut self, uri: impl Into<String>, prefix: Option<&str>) -> Self {
        self.namespace = Some(uri.into());
        self.prefix = prefix.map(str::to_string);
        self
    }

    /// Make the captured element order authoritative on write
    pub fn ordered(mut self) -> Self {
        self.ordered = true;
        self
    }

    /// Declare the root content as mixed
    pub fn mixed(mut self) -> Self {
        self.mixed = true;
        self
    }

    /// Add a mapping rule
    pub fn map(mut self, rule: XmlMappingRule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Declare an element-order constraint
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    /// Declare an alternation constraint
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Declare a constraint group
    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }

    /// Merge another mapping's rules and constraints into this one
    pub fn import_from(mut self, other: &XmlMapping) -> Self {
        self.rules.extend(other.rules.iter().cloned());
        self.sequences.extend(other.sequences.iter().cloned());
        self.choices.extend(other.choices.iter().cloned());
        self.groups.extend(other.groups.iter().cloned());
        self
    }

    /// Validate the declaration and resolve every rule namespace
    pub fn build(mut self) -> Result<Self> {
        if self.ordered && self.mixed {
            return Err(Error::Definition(DefinitionError::new(
                "an XML mapping cannot be both ordered and mixed",
            )));
        }

        let mut catch_all = 0;
        let mut has_raw = false;
        let mut has_elements = false;

        for rule in &self.rules {
            rule.base().ensure_target()?;

            match rule.kind() {
                XmlRuleKind::Content | XmlRuleKind::Raw => catch_all += 1,
                XmlRuleKind::Element => has_elements = true,
                XmlRuleKind::Attribute => {}
            }
            if rule.kind() == XmlRuleKind::Raw {
                has_raw = true;
            }

            if matches!(rule.kind(), XmlRuleKind::Element | XmlRuleKind::Content)
                && rule.base().render_nil() == RenderMode::AsEmpty
            {
                return Err(Error::Definition(
                    DefinitionError::new(
                        "XML cannot render element-level nil as an empty collection",
                    )
                    .with_rule(rule.name().to_string()),
                ));
            }

            if rule.is_mixed() && rule.kind() != XmlRuleKind::Content {
                return Err(Error::Definition(
                    DefinitionError::new("only content rules can be mixed")
                        .with_rule(rule.name().to_string()),
                ));
            }

            if rule.is_cdata() && rule.kind() == XmlRuleKind::Attribute {
                return Err(Error::Definition(
                    DefinitionError::new("XML attributes cannot carry CDATA")
                        .with_rule(rule.name().to_string()),
                ));
            }
        }

        if catch_all > 1 {
            return Err(Error::Definition(DefinitionError::new(
                "at most one content or raw rule is allowed per mapping",
            )));
        }
        if has_raw && has_elements {
            return Err(Error::Definition(DefinitionError::new(
                "a raw catch-all rule excludes per-element rules",
            )));
        }

        let default_namespace = self.namespace.clone();
        for rule in &mut self.rules {
            let rule = Arc::make_mut(rule);
            rule.effective_namespace = match (&rule.namespace, rule.kind) {
                (NamespaceRef::Uri(uri), _) => Some(uri.clone()),
                (NamespaceRef::None, _) => None,
                (NamespaceRef::Inherit, _) => default_namespace.clone(),
                (NamespaceRef::Unset, XmlRuleKind::Attribute) => None,
                (NamespaceRef::Unset, _) => default_namespace.clone(),
            };
        }

        Ok(self)
    }

    /// Propagate attribute-level nil render policies into rules that
    /// declare none of their own
    pub(crate) fn apply_attribute_render_defaults(
        &mut self,
        attributes: &indexmap::IndexMap<String, Arc<crate::attribute::Attribute>>,
    ) -> Result<()> {
        for rule in &mut self.rules {
            let Some(target) = rule.target_attribute() else { continue };
            if rule.delegate().is_some() {
                continue;
            }
            let Some(attribute) = attributes.get(target) else { continue };
            let mode = attribute.render_nil();
            if mode == RenderMode::Omit {
                continue;
            }
            if matches!(rule.kind(), XmlRuleKind::Element | XmlRuleKind::Content)
                && mode == RenderMode::AsEmpty
            {
                return Err(Error::Definition(
                    DefinitionError::new(
                        "XML cannot render element-level nil as an empty collection",
                    )
                    .with_rule(rule.name().to_string()),
                ));
            }
            Arc::make_mut(rule).base_mut().inherit_render_nil(mode);
        }
        Ok(())
    }

    /// Get the root element name, if the mapping declares one
    pub fn root_name(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Get the default namespace, if declared
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Get the default namespace prefix, if declared
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Check whether element order is authoritative on write
    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Check whether the root content is mixed
    pub fn is_mixed(&self) -> bool {
        self.mixed
    }

    /// Get the ordered rules
    pub fn rules(&self) -> &[Arc<XmlMappingRule>] {
        &self.rules
    }

    /// Get the content rule, if any
    pub fn content_rule(&self) -> Option<&Arc<XmlMappingRule>> {
        self.rules
            .iter()
            .find(|rule| rule.kind() == XmlRuleKind::Content)
    }

    /// Get the raw catch-all rule, if any
    pub fn raw_rule(&self) -> Option<&Arc<XmlMappingRule>> {
        self.rules.iter().find(|rule| rule.kind() == XmlRuleKind::Raw)
    }

    /// Get the declared element-order constraints
    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    /// Get the declared alternation constraints
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Get the declared constraint groups
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_requires_target() {
        let result = XmlMapping::with_root("r")
            .map(XmlMappingRule::element("street"))
            .build();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_element_namespace_defaults_to_mapping_namespace() {
        let mapping = XmlMapping::with_root("address")
            .with_namespace("http://example.com/addr", Some("addr"))
            .map(XmlMappingRule::element("street").to("street"))
            .map(XmlMappingRule::attribute("kind").to("kind"))
            .build()
            .unwrap();

        let street = &mapping.rules()[0];
        assert_eq!(street.effective_namespace(), Some("http://example.com/addr"));

        // Attributes default to no namespace.
        let kind = &mapping.rules()[1];
        assert_eq!(kind.effective_namespace(), None);
    }

    #[test]
    fn test_inherit_gives_attributes_the_mapping_namespace() {
        let mapping = XmlMapping::with_root("address")
            .with_namespace("http://example.com/addr", Some("addr"))
            .map(
                XmlMappingRule::attribute("kind")
                    .to("kind")
                    .with_inherited_namespace(),
            )
            .build()
            .unwrap();

        assert_eq!(
            mapping.rules()[0].effective_namespace(),
            Some("http://example.com/addr")
        );
    }

    #[test]
    fn test_explicit_namespace_wins() {
        let mapping = XmlMapping::with_root("address")
            .with_namespace("http://example.com/addr", Some("addr"))
            .map(
                XmlMappingRule::element("street")
                    .to("street")
                    .with_namespace("http://example.com/street", Some("st")),
            )
            .build()
            .unwrap();

        assert_eq!(
            mapping.rules()[0].effective_namespace(),
            Some("http://example.com/street")
        );
    }

    #[test]
    fn test_at_most_one_catch_all() {
        let result = XmlMapping::with_root("r")
            .map(XmlMappingRule::content().to("text"))
            .map(XmlMappingRule::raw().to("markup"))
            .build();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_raw_excludes_element_rules() {
        let result = XmlMapping::with_root("r")
            .map(XmlMappingRule::raw().to("markup"))
            .map(XmlMappingRule::element("street").to("street"))
            .build();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_element_nil_as_empty_rejected() {
        let result = XmlMapping::with_root("r")
            .map(
                XmlMappingRule::element("street")
                    .to("street")
                    .with_render_nil(RenderMode::AsEmpty)
                    .unwrap(),
            )
            .build();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_ordered_and_mixed_are_mutually_exclusive() {
        let result = XmlMapping::with_root("r").ordered().mixed().build();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_rule_matching_honors_namespace_and_aliases() {
        let mapping = XmlMapping::with_root("address")
            .with_namespace("http://example.com/addr", None)
            .map(
                XmlMappingRule::element("street")
                    .to("street")
                    .with_alias("road"),
            )
            .build()
            .unwrap();

        let rule = &mapping.rules()[0];
        assert!(rule.matches(&QName::namespaced("http://example.com/addr", "street")));
        assert!(rule.matches(&QName::namespaced("http://example.com/addr", "road")));
        assert!(!rule.matches(&QName::local("street")));
    }
}
