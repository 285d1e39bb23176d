//! Bidirectional transform pipeline
//!
//! The pipeline has the same shape for every format: iterate the mapping
//! rules in declaration order, read or write attribute values through them
//! (honoring delegation, custom functions, value transforms and render
//! policies), recurse into nested models and apply defaults on the way in.
//!
//! - [`xml`] transforms between instances and [`XmlElement`](crate::document::XmlElement) trees
//! - [`key_value`] transforms between instances and [`Value`](crate::values::Value) maps

pub mod key_value;
pub mod xml;

use crate::error::{Error, Result};
use crate::instance::{Instance, ValueState};
use crate::values::Value;

/// Options controlling one serialize call
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Serialize only these attributes (top level only)
    pub only: Option<Vec<String>>,
    /// Skip these attributes (top level only)
    pub except: Vec<String>,
    /// Pretty-print the output
    pub pretty: bool,
    /// Emit an XML declaration
    pub declaration: bool,
    /// Encoding named in the XML declaration
    pub encoding: Option<String>,
}

impl SerializeOptions {
    /// Create default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize only the given attributes
    pub fn with_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Skip the given attributes
    pub fn with_except<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = names.into_iter().map(Into::into).collect();
        self
    }

    /// Pretty-print the output
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Emit an XML declaration
    pub fn with_declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }

    /// Name an encoding in the XML declaration
    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = Some(encoding.into());
        self
    }

    /// Check whether an attribute passes the only/except filters
    pub fn includes(&self, attribute: &str) -> bool {
        if let Some(ref only) = self.only {
            if !only.iter().any(|name| name == attribute) {
                return false;
            }
        }
        !self.except.iter().any(|name| name == attribute)
    }

    /// The options passed to nested-model recursion: the attribute filters
    /// apply to the top level only
    pub fn for_nested(&self) -> Self {
        Self {
            only: None,
            except: Vec::new(),
            ..self.clone()
        }
    }
}

/// Read an attribute through a rule, following the delegate when one is
/// declared. Returns the value and the assignment state gating
/// `render_default`; values that would come from the attribute default
/// report `Defaulted`.
pub(crate) fn read_through(
    instance: &Instance,
    attribute: &str,
    delegate: Option<&str>,
) -> Result<(Value, ValueState)> {
    let (value, state, has_default) = match delegate {
        Some(delegate_name) => match instance.get(delegate_name)? {
            Value::Model(inner) => {
                let has_default = inner
                    .descriptor()
                    .require_attribute(attribute)?
                    .has_default();
                (inner.get(attribute)?, inner.state(attribute), has_default)
            }
            _ => (Value::Null, ValueState::Unset, false),
        },
        None => {
            let has_default = instance.descriptor().require_attribute(attribute)?.has_default();
            (instance.get(attribute)?, instance.state(attribute), has_default)
        }
    };

    // An unset attribute whose value came from its default renders under
    // the same policy as one explicitly marked Defaulted.
    let state = if state == ValueState::Unset && has_default && !value.is_null() {
        ValueState::Defaulted
    } else {
        state
    };

    Ok((value, state))
}

/// Write an attribute through a rule, following the delegate when one is
/// declared and auto-instantiating the delegate target on first write
pub(crate) fn write_through(
    instance: &mut Instance,
    attribute: &str,
    delegate: Option<&str>,
    value: Value,
) -> Result<()> {
    match delegate {
        Some(delegate_name) => {
            let mut inner = match instance.get(delegate_name)? {
                Value::Model(inner) => inner,
                Value::Null => {
                    let delegate_attr = instance.descriptor().require_attribute(delegate_name)?;
                    let descriptor = delegate_attr.ty().model_descriptor().ok_or_else(|| {
                        Error::Decode(format!(
                            "delegate attribute '{}' is not a nested model",
                            delegate_name
                        ))
                    })?;
                    Instance::new(std::sync::Arc::clone(descriptor))
                }
                other => {
                    return Err(Error::Decode(format!(
                        "delegate attribute '{}' holds a non-model value '{}'",
                        delegate_name, other
                    )))
                }
            };
            inner.set(attribute, value)?;
            instance.set(delegate_name, Value::Model(inner))
        }
        None => instance.set(attribute, value),
    }
}
