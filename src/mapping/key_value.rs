//! Key-value mapping rules and container
//!
//! [`KeyValueMappingRule`] declares how one attribute maps to one key of a
//! key-value document (JSON, YAML, TOML). A rule may map the entire
//! document to a single attribute (root mapping) or flatten a collection of
//! nested models into a dictionary keyed by one child attribute's value
//! (child mappings). [`KeyValueMapping`] holds the ordered rule set of one
//! model class.

use crate::content_model::Choice;
use crate::error::{DefinitionError, Error, Result};
use crate::instance::{Instance, ValueState};
use crate::mapping::rule::{CustomFns, MappingRule, RenderMode, TransformFn};
use crate::values::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Where one child attribute of a flattened nested model comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildPath {
    /// The dictionary key itself
    Key,
    /// A path into the dictionary value
    Path(Vec<String>),
}

/// Flattening table for a collection of nested models keyed by one child
/// attribute's value
#[derive(Debug, Clone, Default)]
pub struct ChildMappings {
    entries: IndexMap<String, ChildPath>,
}

impl ChildMappings {
    /// Create an empty child-mapping table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a child attribute to the dictionary key
    pub fn map_key(mut self, attribute: impl Into<String>) -> Self {
        self.entries.insert(attribute.into(), ChildPath::Key);
        self
    }

    /// Map a child attribute to a path into the dictionary value
    pub fn map_path<I, S>(mut self, attribute: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            attribute.into(),
            ChildPath::Path(path.into_iter().map(Into::into).collect()),
        );
        self
    }

    /// Get the child attribute mapped to the dictionary key, if any
    pub fn key_attribute(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, path)| **path == ChildPath::Key)
            .map(|(attr, _)| attr.as_str())
    }

    /// Get the mapping entries
    pub fn entries(&self) -> &IndexMap<String, ChildPath> {
        &self.entries
    }
}

/// One key-value mapping rule
#[derive(Debug, Clone)]
pub struct KeyValueMappingRule {
    base: MappingRule,
    child_mappings: Option<ChildMappings>,
    root_mapping: bool,
}

impl KeyValueMappingRule {
    /// Map a key of the serialized document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: MappingRule::new(name),
            child_mappings: None,
            root_mapping: false,
        }
    }

    /// Map the entire serialized document to one attribute
    pub fn root() -> Self {
        Self {
            base: MappingRule::new(""),
            child_mappings: None,
            root_mapping: true,
        }
    }

    /// Bind the rule to a model attribute
    pub fn to(mut self, attribute: impl Into<String>) -> Self {
        self.base = self.base.to(attribute);
        self
    }

    /// Accept an alternative key on read
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

    /// Flatten the nested model collection into a dictionary
    pub fn with_child_mappings(mut self, child_mappings: ChildMappings) -> Self {
        self.child_mappings = Some(child_mappings);
        self
    }

    /// Get the format-independent rule core
    pub fn base(&self) -> &MappingRule {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut MappingRule {
        &mut self.base
    }

    /// Get the primary key
    pub fn name(&self) -> &str {
        self.base.name()
    }

    /// Get the target attribute, if bound to one
    pub fn attribute(&self) -> Option<&str> {
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

    /// Get the child-mapping table, if any
    pub fn child_mappings(&self) -> Option<&ChildMappings> {
        self.child_mappings.as_ref()
    }

    /// Check whether this rule maps the entire document
    pub fn is_root_mapping(&self) -> bool {
        self.root_mapping
    }

    /// Check whether a document key matches this rule, by primary name or
    /// alias
    pub fn matches(&self, key: &str) -> bool {
        self.base.names().any(|name| name == key)
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

/// Ordered key-value mapping of one model class
#[derive(Debug, Clone, Default)]
pub struct KeyValueMapping {
    rules: Vec<Arc<KeyValueMappingRule>>,
    choices: Vec<Choice>,
    derived: bool,
}

impl KeyValueMapping {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a default mapping: each attribute under its own name
    pub fn derived_from<'a>(attributes: impl Iterator<Item = &'a str>) -> Self {
        let mut mapping = Self {
            derived: true,
            ..Self::default()
        };
        for name in attributes {
            mapping
                .rules
                .push(Arc::new(KeyValueMappingRule::new(name).to(name)));
        }
        mapping
    }

    /// Add a mapping rule
    pub fn map(mut self, rule: KeyValueMappingRule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    /// Declare an alternation constraint
    pub fn with_choice(mut self, choice: Choice) -> Self {
        self.choices.push(choice);
        self
    }

    /// Merge another mapping's rules and constraints into this one
    pub fn import_from(mut self, other: &KeyValueMapping) -> Self {
        self.rules.extend(other.rules.iter().cloned());
        self.choices.extend(other.choices.iter().cloned());
        self
    }

    /// Validate the declaration
    pub fn build(self) -> Result<Self> {
        let root_rules = self
            .rules
            .iter()
            .filter(|rule| rule.is_root_mapping())
            .count();
        if root_rules > 1 {
            return Err(Error::Definition(DefinitionError::new(
                "at most one root mapping rule is allowed per mapping",
            )));
        }
        if root_rules == 1 && self.rules.len() > 1 {
            return Err(Error::Definition(DefinitionError::new(
                "a root mapping rule excludes all sibling rules",
            )));
        }

        for rule in &self.rules {
            rule.base().ensure_target()?;
        }

        Ok(self)
    }

    /// Propagate attribute-level nil render policies into rules that
    /// declare none of their own
    pub(crate) fn apply_attribute_render_defaults(
        &mut self,
        attributes: &IndexMap<String, Arc<crate::attribute::Attribute>>,
    ) {
        for rule in &mut self.rules {
            let Some(target) = rule.attribute() else { continue };
            if rule.delegate().is_some() {
                continue;
            }
            let Some(attribute) = attributes.get(target) else { continue };
            let mode = attribute.render_nil();
            if mode != RenderMode::Omit {
                Arc::make_mut(rule).base_mut().inherit_render_nil(mode);
            }
        }
    }

    /// Check whether this mapping was derived from the attribute table
    pub fn is_derived(&self) -> bool {
        self.derived
    }

    /// Get the ordered rules
    pub fn rules(&self) -> &[Arc<KeyValueMappingRule>] {
        &self.rules
    }

    /// Get the root mapping rule, if any
    pub fn root_rule(&self) -> Option<&Arc<KeyValueMappingRule>> {
        self.rules.iter().find(|rule| rule.is_root_mapping())
    }

    /// Get the declared alternation constraints
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    /// Get the name of the first rule rendering blanks, if any; TOML
    /// mappings reject these at definition time
    pub fn rule_rendering_blank(&self) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| {
                rule.base().render_nil() == RenderMode::AsBlank
                    || rule.base().render_empty() == RenderMode::AsBlank
            })
            .map(|rule| rule.name().to_string())
    }
}
