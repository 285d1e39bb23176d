//! JSON backend adapter
//!
//! Bridges between the intermediate [`Value`] representation and
//! `serde_json::Value`. Decimals travel as strings to stay lossless; JSON
//! numbers are f64-bounded.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::instance::{Instance, ModelDescriptor};
use crate::transform::{key_value, SerializeOptions};
use crate::values::Value;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Convert an intermediate value into a JSON value
pub fn value_to_json(value: &Value) -> Result<JsonValue> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Bool(b) => Ok(JsonValue::Bool(*b)),
        Value::Int(i) => Ok(JsonValue::Number((*i).into())),
        Value::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(number) => Ok(JsonValue::Number(number)),
            // JSON has no NaN or infinity; fall back to the lexical form
            None => Ok(JsonValue::String(value.lexical())),
        },
        Value::Decimal(d) => Ok(JsonValue::String(d.to_string())),
        Value::Str(s) => Ok(JsonValue::String(s.clone())),
        Value::Bytes(_) | Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
            Ok(JsonValue::String(value.lexical()))
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value_to_json(item)?);
            }
            Ok(JsonValue::Array(out))
        }
        Value::Map(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), value_to_json(item)?);
            }
            Ok(JsonValue::Object(out))
        }
        Value::Model(instance) => Err(Error::Encode(format!(
            "instance of '{}' reached the JSON bridge unserialized",
            instance.model_name()
        ))),
        Value::Ref(reference) => value_to_json(&reference.key),
    }
}

/// Convert a JSON value into an intermediate value
pub fn json_to_value(json: &JsonValue) -> Value {
    match json {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Number(number) => match number.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => Value::Str(s.clone()),
        JsonValue::Array(items) => Value::Seq(items.iter().map(json_to_value).collect()),
        JsonValue::Object(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), json_to_value(item));
            }
            Value::Map(out)
        }
    }
}

/// Parse raw JSON and deserialize an instance
pub fn from_json(descriptor: &Arc<ModelDescriptor>, input: &str) -> Result<Instance> {
    let json: JsonValue = serde_json::from_str(input)?;
    of_json(descriptor, &json)
}

/// Deserialize an instance from an already-parsed JSON value
pub fn of_json(descriptor: &Arc<ModelDescriptor>, data: &JsonValue) -> Result<Instance> {
    key_value::instance_from_value(descriptor, &json_to_value(data), Format::Json)
}

/// Serialize an instance into a JSON value
pub fn as_json(instance: &Instance, options: &SerializeOptions) -> Result<JsonValue> {
    let value = key_value::instance_to_value(instance, Format::Json, options)?;
    value_to_json(&value)
}

/// Serialize an instance into raw JSON
pub fn to_json(instance: &Instance, options: &SerializeOptions) -> Result<String> {
    let json = as_json(instance, options)?;
    if options.pretty {
        Ok(serde_json::to_string_pretty(&json)?)
    } else {
        Ok(serde_json::to_string(&json)?)
    }
}
