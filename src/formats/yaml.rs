//! YAML backend adapter
//!
//! Bridges between the intermediate [`Value`] representation and
//! `serde_yaml::Value`. The conventions mirror the JSON bridge; non-string
//! mapping keys are folded to their lexical form.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::instance::{Instance, ModelDescriptor};
use crate::transform::{key_value, SerializeOptions};
use crate::values::Value;
use indexmap::IndexMap;
use serde_yaml::Value as YamlValue;
use std::sync::Arc;

/// Convert an intermediate value into a YAML value
pub fn value_to_yaml(value: &Value) -> Result<YamlValue> {
    match value {
        Value::Null => Ok(YamlValue::Null),
        Value::Bool(b) => Ok(YamlValue::Bool(*b)),
        Value::Int(i) => Ok(YamlValue::Number((*i).into())),
        Value::Float(f) => Ok(YamlValue::Number((*f).into())),
        Value::Decimal(d) => Ok(YamlValue::String(d.to_string())),
        Value::Str(s) => Ok(YamlValue::String(s.clone())),
        Value::Bytes(_) | Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
            Ok(YamlValue::String(value.lexical()))
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_to_yaml(item)?);
            }
            Ok(YamlValue::Sequence(out))
        }
        Value::Map(map) => {
            let mut out = serde_yaml::Mapping::with_capacity(map.len());
            for (key, item) in map {
                out.insert(YamlValue::String(key.clone()), value_to_yaml(item)?);
            }
            Ok(YamlValue::Mapping(out))
        }
        Value::Model(instance) => Err(Error::Encode(format!(
            "instance of '{}' reached the YAML bridge unserialized",
            instance.model_name()
        ))),
        Value::Ref(reference) => value_to_yaml(&reference.key),
    }
}

/// Convert a YAML value into an intermediate value
pub fn yaml_to_value(yaml: &YamlValue) -> Value {
    match yaml {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(*b),
        YamlValue::Number(number) => match number.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        YamlValue::String(s) => Value::Str(s.clone()),
        YamlValue::Sequence(items) => Value::Seq(items.iter().map(yaml_to_value).collect()),
        YamlValue::Mapping(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, item) in map {
                let key = match key {
                    YamlValue::String(s) => s.clone(),
                    other => yaml_to_value(other).lexical(),
                };
                out.insert(key, yaml_to_value(item));
            }
            Value::Map(out)
        }
        YamlValue::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

/// Parse raw YAML and deserialize an instance
pub fn from_yaml(descriptor: &Arc<ModelDescriptor>, input: &str) -> Result<Instance> {
    let yaml: YamlValue = serde_yaml::from_str(input)?;
    of_yaml(descriptor, &yaml)
}

/// Deserialize an instance from an already-parsed YAML value
pub fn of_yaml(descriptor: &Arc<ModelDescriptor>, data: &YamlValue) -> Result<Instance> {
    key_value::instance_from_value(descriptor, &yaml_to_value(data), Format::Yaml)
}

/// Serialize an instance into a YAML value
pub fn as_yaml(instance: &Instance, options: &SerializeOptions) -> Result<YamlValue> {
    let value = key_value::instance_to_value(instance, Format::Yaml, options)?;
    value_to_yaml(&value)
}

/// Serialize an instance into raw YAML
pub fn to_yaml(instance: &Instance, options: &SerializeOptions) -> Result<String> {
    let yaml = as_yaml(instance, options)?;
    Ok(serde_yaml::to_string(&yaml)?)
}
