//! Attribute descriptors
//!
//! An [`Attribute`] describes one named, typed field of a model class:
//! collection-ness, lazy default, enumeration and pattern restrictions.
//! Attributes are built with chained setters and frozen into `Arc`s when the
//! owning model definition completes; nothing mutates them afterwards.

use crate::error::{DefinitionError, Error, Result};
use crate::instance::Instance;
use crate::mapping::RenderMode;
use crate::types::Type;
use crate::values::Value;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Zero-argument default value generator, evaluated lazily per use
pub type DefaultFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Computation backing a derived attribute
pub type DerivedFn = Arc<dyn Fn(&Instance) -> Result<Value> + Send + Sync>;

/// One named, typed model field
#[derive(Clone)]
pub struct Attribute {
    name: String,
    ty: Type,
    collection: bool,
    default: Option<DefaultFn>,
    render_nil: RenderMode,
    choices: Vec<Value>,
    pattern: Option<Regex>,
    derived: Option<DerivedFn>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("collection", &self.collection)
            .field("render_nil", &self.render_nil)
            .field("has_default", &self.default.is_some())
            .field("choices", &self.choices)
            .field("derived", &self.derived.is_some())
            .finish()
    }
}

impl Attribute {
    /// Create a new attribute with the given name and declared type
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            collection: false,
            default: None,
            render_nil: RenderMode::default(),
            choices: Vec::new(),
            pattern: None,
            derived: None,
        }
    }

    /// Declare the attribute as a collection (zero or many values)
    pub fn with_collection(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Set a lazy default value generator
    pub fn with_default(mut self, default: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(Arc::new(default));
        self
    }

    /// Set a static default value
    pub fn with_static_default(mut self, default: Value) -> Self {
        self.default = Some(Arc::new(move || default.clone()));
        self
    }

    /// Set the render policy applying to this attribute's nil values.
    ///
    /// Mapping rules without an explicit policy of their own inherit this
    /// one when the model definition freezes.
    pub fn with_render_nil(mut self, mode: RenderMode) -> Self {
        self.render_nil = mode;
        self
    }

    /// Restrict the attribute to an enumerated set of values
    pub fn with_choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = choices;
        self
    }

    /// Restrict string values to a pattern
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|e| {
            Error::Definition(
                DefinitionError::new(format!("invalid pattern '{}': {}", pattern, e))
                    .with_rule(self.name.clone()),
            )
        })?;
        self.pattern = Some(compiled);
        Ok(self)
    }

    /// Declare the attribute as derived: its value is computed from the
    /// instance and it cannot be assigned
    pub fn with_derived(
        mut self,
        derived: impl Fn(&Instance) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.derived = Some(Arc::new(derived));
        self
    }

    /// Get the attribute name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the declared type
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Check whether the attribute is a collection
    pub fn is_collection(&self) -> bool {
        self.collection
    }

    /// Get the declared nil render policy
    pub fn render_nil(&self) -> RenderMode {
        self.render_nil
    }

    /// Check whether the attribute is derived
    pub fn is_derived(&self) -> bool {
        self.derived.is_some()
    }

    /// Check whether the attribute declares a default
    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.collection
    }

    /// Evaluate the derived computation, if any
    pub fn derive(&self, instance: &Instance) -> Option<Result<Value>> {
        self.derived.as_ref().map(|f| f(instance))
    }

    /// Evaluate the declared default, if any
    pub fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(|f| f())
    }

    /// The default that applies when the attribute is absent from input:
    /// the declared default, or an empty sequence for collections
    pub fn effective_default(&self) -> Option<Value> {
        match self.default_value() {
            Some(value) if self.collection => Some(Value::Seq(value.into_seq())),
            Some(value) => Some(value),
            None if self.collection => Some(Value::Seq(Vec::new())),
            None => None,
        }
    }

    /// Cast a raw value into the declared type, applying collection
    /// handling and the enumeration/pattern restrictions
    pub fn cast_value(&self, raw: Value) -> Result<Value> {
        if self.collection {
            let items = raw.into_seq();
            let mut cast = Vec::with_capacity(items.len());
            for item in items {
                let value = self.ty.cast(item)?;
                self.check_restrictions(&value)?;
                cast.push(value);
            }
            Ok(Value::Seq(cast))
        } else {
            let value = self.ty.cast(raw)?;
            self.check_restrictions(&value)?;
            Ok(value)
        }
    }

    /// Enforce enumeration and pattern restrictions on a single cast value
    fn check_restrictions(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }

        if !self.choices.is_empty() && !self.choices.contains(value) {
            return Err(Error::Cast(format!(
                "'{}' is not one of the allowed values for attribute '{}'",
                value, self.name
            )));
        }

        if let Some(ref pattern) = self.pattern {
            if let Value::Str(text) = value {
                if !pattern.is_match(text) {
                    return Err(Error::Cast(format!(
                        "'{}' does not match pattern '{}' for attribute '{}'",
                        text,
                        pattern.as_str(),
                        self.name
                    )));
                }
            }
        }

        Ok(())
    }
}
