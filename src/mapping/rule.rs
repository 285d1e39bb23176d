//! Format-independent mapping rule core
//!
//! A [`MappingRule`] binds one serialized name to one model attribute, or
//! to a pair of custom read/write functions. It carries the render policy
//! for nil and empty values, directional value transforms and an optional
//! delegate attribute.

use crate::error::{DefinitionError, Error, Result};
use crate::instance::{Instance, ValueState};
use crate::values::Value;
use std::fmt;
use std::sync::Arc;

/// How a nil or empty value is emitted during serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Omit the field entirely (default)
    #[default]
    Omit,
    /// Emit an explicit null
    AsNull,
    /// Emit an empty string / empty element
    AsBlank,
    /// Emit an empty collection
    AsEmpty,
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Omit => write!(f, "omit"),
            Self::AsNull => write!(f, "as_null"),
            Self::AsBlank => write!(f, "as_blank"),
            Self::AsEmpty => write!(f, "as_empty"),
        }
    }
}

/// Custom export function reading a value out of an instance
pub type ExportFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;

/// Custom import function writing a raw value into an instance
pub type ImportFn = Arc<dyn Fn(&mut Instance, &Value) -> Result<()> + Send + Sync>;

/// Directional value transform applied between the attribute and the
/// serialized representation
pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Custom read/write function pair replacing the attribute binding
#[derive(Clone)]
pub struct CustomFns {
    /// Applied on deserialize
    pub import: ImportFn,
    /// Applied on serialize
    pub export: ExportFn,
}

/// Declarative binding between one model attribute and one serialized name
#[derive(Clone)]
pub struct MappingRule {
    name: String,
    aliases: Vec<String>,
    attribute: Option<String>,
    delegate: Option<String>,
    render_nil: RenderMode,
    render_empty: RenderMode,
    render_default: bool,
    custom: Option<CustomFns>,
    import_transform: Option<TransformFn>,
    export_transform: Option<TransformFn>,
}

impl fmt::Debug for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRule")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("attribute", &self.attribute)
            .field("delegate", &self.delegate)
            .field("render_nil", &self.render_nil)
            .field("render_empty", &self.render_empty)
            .field("render_default", &self.render_default)
            .field("has_custom", &self.custom.is_some())
            .finish()
    }
}

impl MappingRule {
    /// Create a rule for the given serialized name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            attribute: None,
            delegate: None,
            render_nil: RenderMode::default(),
            render_empty: RenderMode::default(),
            render_default: false,
            custom: None,
            import_transform: None,
            export_transform: None,
        }
    }

    /// Bind the rule to a model attribute
    pub fn to(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Accept an alternative serialized name on read
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Read and write through a nested object instead of the attribute
    /// directly
    pub fn with_delegate(mut self, delegate: impl Into<String>) -> Self {
        self.delegate = Some(delegate.into());
        self
    }

    /// Set the render policy for nil values.
    ///
    /// The nil and empty policies may not both be set to the same mode.
    pub fn with_render_nil(mut self, mode: RenderMode) -> Result<Self> {
        if mode != RenderMode::Omit && mode == self.render_empty {
            return Err(conflicting_render_policy(&self.name, mode));
        }
        self.render_nil = mode;
        Ok(self)
    }

    /// Set the render policy for empty collections.
    ///
    /// The nil and empty policies may not both be set to the same mode.
    pub fn with_render_empty(mut self, mode: RenderMode) -> Result<Self> {
        if mode != RenderMode::Omit && mode == self.render_nil {
            return Err(conflicting_render_policy(&self.name, mode));
        }
        self.render_empty = mode;
        Ok(self)
    }

    /// Re-emit values that were assigned from the attribute default
    pub fn with_render_default(mut self) -> Self {
        self.render_default = true;
        self
    }

    /// Replace the attribute binding with custom read/write functions
    pub fn with_custom(
        mut self,
        import: impl Fn(&mut Instance, &Value) -> Result<()> + Send + Sync + 'static,
        export: impl Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.custom = Some(CustomFns {
            import: Arc::new(import),
            export: Arc::new(export),
        });
        self
    }

    /// Apply a transform to values on deserialize
    pub fn with_import_transform(
        mut self,
        transform: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.import_transform = Some(Arc::new(transform));
        self
    }

    /// Apply a transform to values on serialize
    pub fn with_export_transform(
        mut self,
        transform: impl Fn(Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.export_transform = Some(Arc::new(transform));
        self
    }

    /// Get the primary serialized name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the alternative read names
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Iterate the primary name followed by the aliases
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(|s| s.as_str()))
    }

    /// Get the target attribute, if bound to one
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// Get the delegate attribute, if any
    pub fn delegate(&self) -> Option<&str> {
        self.delegate.as_deref()
    }

    /// Get the custom read/write functions, if any
    pub fn custom(&self) -> Option<&CustomFns> {
        self.custom.as_ref()
    }

    /// Get the nil render policy
    pub fn render_nil(&self) -> RenderMode {
        self.render_nil
    }

    /// Get the empty-collection render policy
    pub fn render_empty(&self) -> RenderMode {
        self.render_empty
    }

    /// Check whether defaulted values are re-emitted
    pub fn renders_default(&self) -> bool {
        self.render_default
    }

    /// Get the import transform, if any
    pub fn import_transform(&self) -> Option<&TransformFn> {
        self.import_transform.as_ref()
    }

    /// Get the export transform, if any
    pub fn export_transform(&self) -> Option<&TransformFn> {
        self.export_transform.as_ref()
    }

    /// Inherit an attribute-level nil render policy; the rule's own policy
    /// wins, and a mode colliding with the empty policy is left alone
    pub(crate) fn inherit_render_nil(&mut self, mode: RenderMode) {
        if self.render_nil == RenderMode::Omit && mode != self.render_empty {
            self.render_nil = mode;
        }
    }

    /// Check the rule declares a target: an attribute binding or custom
    /// read/write functions
    pub fn ensure_target(&self) -> Result<()> {
        if self.attribute.is_none() && self.custom.is_none() {
            return Err(Error::Definition(
                DefinitionError::new(
                    "rule declares neither a target attribute nor custom methods",
                )
                .with_rule(self.name.clone()),
            ));
        }
        Ok(())
    }

    /// Decide whether the attribute's current value is emitted: true when
    /// the render policy forces emission, or when the value is non-nil and
    /// not an empty collection. Defaulted values are emitted only by
    /// `render_default` rules.
    pub fn render(&self, value: &Value, state: ValueState) -> bool {
        if state == ValueState::Defaulted && !self.render_default {
            return false;
        }
        match value {
            Value::Null => self.render_nil != RenderMode::Omit,
            Value::Seq(items) if items.is_empty() => self.render_empty != RenderMode::Omit,
            _ => true,
        }
    }

    /// Coerce a nil or empty value into its declared render shape
    pub fn rendered_value(&self, value: Value) -> Value {
        let mode = match &value {
            Value::Null => self.render_nil,
            Value::Seq(items) if items.is_empty() => self.render_empty,
            _ => return value,
        };
        match mode {
            RenderMode::Omit | RenderMode::AsNull => Value::Null,
            RenderMode::AsBlank => Value::Str(String::new()),
            RenderMode::AsEmpty => Value::Seq(Vec::new()),
        }
    }
}

fn conflicting_render_policy(rule: &str, mode: RenderMode) -> Error {
    Error::Definition(
        DefinitionError::new(format!(
            "render_nil and render_empty may not both be '{}'",
            mode
        ))
        .with_rule(rule.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_required() {
        let rule = MappingRule::new("street");
        assert!(rule.ensure_target().is_err());
        assert!(rule.to("street").ensure_target().is_ok());

        let custom = MappingRule::new("street")
            .with_custom(|_, _| Ok(()), |_| Ok(Value::Null));
        assert!(custom.ensure_target().is_ok());
    }

    #[test]
    fn test_conflicting_render_policies_rejected() {
        let result = MappingRule::new("x")
            .with_render_nil(RenderMode::AsBlank)
            .unwrap()
            .with_render_empty(RenderMode::AsBlank);
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_distinct_render_policies_accepted() {
        let rule = MappingRule::new("x")
            .with_render_nil(RenderMode::AsNull)
            .unwrap()
            .with_render_empty(RenderMode::AsEmpty)
            .unwrap();
        assert_eq!(rule.render_nil(), RenderMode::AsNull);
        assert_eq!(rule.render_empty(), RenderMode::AsEmpty);
    }

    #[test]
    fn test_render_predicate() {
        let omit = MappingRule::new("x").to("x");
        assert!(!omit.render(&Value::Null, ValueState::Explicit));
        assert!(!omit.render(&Value::Seq(Vec::new()), ValueState::Explicit));
        assert!(omit.render(&Value::Int(0), ValueState::Explicit));

        let as_null = MappingRule::new("x")
            .to("x")
            .with_render_nil(RenderMode::AsNull)
            .unwrap();
        assert!(as_null.render(&Value::Null, ValueState::Explicit));
    }

    #[test]
    fn test_defaulted_values_need_render_default() {
        let rule = MappingRule::new("x").to("x");
        assert!(!rule.render(&Value::Int(1), ValueState::Defaulted));

        let rendering = MappingRule::new("x").to("x").with_render_default();
        assert!(rendering.render(&Value::Int(1), ValueState::Defaulted));
    }

    #[test]
    fn test_rendered_value_coercion() {
        let blank = MappingRule::new("x")
            .to("x")
            .with_render_nil(RenderMode::AsBlank)
            .unwrap();
        assert_eq!(blank.rendered_value(Value::Null), Value::Str(String::new()));

        let empty = MappingRule::new("x")
            .to("x")
            .with_render_empty(RenderMode::AsEmpty)
            .unwrap();
        assert_eq!(
            empty.rendered_value(Value::Seq(Vec::new())),
            Value::Seq(Vec::new())
        );

        let plain = MappingRule::new("x").to("x");
        assert_eq!(plain.rendered_value(Value::Int(3)), Value::Int(3));
    }

    #[test]
    fn test_names_iterates_aliases() {
        let rule = MappingRule::new("href").to("link").with_alias("url");
        let names: Vec<&str> = rule.names().collect();
        assert_eq!(names, vec!["href", "url"]);
    }
}
