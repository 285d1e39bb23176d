//! TOML backend adapter
//!
//! Bridges between the intermediate [`Value`] representation and
//! `toml::Value`. TOML has no null: nil values are omitted on write, and
//! mappings rendering blanks are rejected when declared for TOML.

use crate::error::{Error, Result};
use crate::formats::Format;
use crate::instance::{Instance, ModelDescriptor};
use crate::transform::{key_value, SerializeOptions};
use crate::values::Value;
use indexmap::IndexMap;
use toml::Value as TomlValue;
use std::sync::Arc;

/// Convert an intermediate value into a TOML value.
///
/// Nil values have no TOML representation and convert to `None`; containers
/// drop them.
pub fn value_to_toml(value: &Value) -> Result<Option<TomlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(TomlValue::Boolean(*b))),
        Value::Int(i) => Ok(Some(TomlValue::Integer(*i))),
        Value::Float(f) => Ok(Some(TomlValue::Float(*f))),
        Value::Decimal(d) => Ok(Some(TomlValue::String(d.to_string()))),
        Value::Str(s) => Ok(Some(TomlValue::String(s.clone()))),
        Value::Bytes(_) => Ok(Some(TomlValue::String(value.lexical()))),
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
            let lexical = value.lexical();
            match lexical.parse::<toml::value::Datetime>() {
                Ok(datetime) => Ok(Some(TomlValue::Datetime(datetime))),
                Err(_) => Ok(Some(TomlValue::String(lexical))),
            }
        }
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Some(converted) = value_to_toml(item)? {
                    out.push(converted);
                }
            }
            Ok(Some(TomlValue::Array(out)))
        }
        Value::Map(map) => {
            let mut out = toml::map::Map::with_capacity(map.len());
            for (key, item) in map {
                if let Some(converted) = value_to_toml(item)? {
                    out.insert(key.clone(), converted);
                }
            }
            Ok(Some(TomlValue::Table(out)))
        }
        Value::Model(instance) => Err(Error::Encode(format!(
            "instance of '{}' reached the TOML bridge unserialized",
            instance.model_name()
        ))),
        Value::Ref(reference) => value_to_toml(&reference.key),
    }
}

/// Convert a TOML value into an intermediate value
pub fn toml_to_value(toml: &TomlValue) -> Value {
    match toml {
        TomlValue::Boolean(b) => Value::Bool(*b),
        TomlValue::Integer(i) => Value::Int(*i),
        TomlValue::Float(f) => Value::Float(*f),
        TomlValue::String(s) => Value::Str(s.clone()),
        // Date-typed attributes cast the lexical form back
        TomlValue::Datetime(datetime) => Value::Str(datetime.to_string()),
        TomlValue::Array(items) => Value::Seq(items.iter().map(toml_to_value).collect()),
        TomlValue::Table(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, item) in map {
                out.insert(key.clone(), toml_to_value(item));
            }
            Value::Map(out)
        }
    }
}

/// Parse raw TOML and deserialize an instance
pub fn from_toml(descriptor: &Arc<ModelDescriptor>, input: &str) -> Result<Instance> {
    let toml: TomlValue = toml::from_str(input)?;
    of_toml(descriptor, &toml)
}

/// Deserialize an instance from an already-parsed TOML value
pub fn of_toml(descriptor: &Arc<ModelDescriptor>, data: &TomlValue) -> Result<Instance> {
    key_value::instance_from_value(descriptor, &toml_to_value(data), Format::Toml)
}

/// Serialize an instance into a TOML value
pub fn as_toml(instance: &Instance, options: &SerializeOptions) -> Result<TomlValue> {
    let value = key_value::instance_to_value(instance, Format::Toml, options)?;
    Ok(value_to_toml(&value)?.unwrap_or_else(|| TomlValue::Table(toml::map::Map::new())))
}

/// Serialize an instance into raw TOML
pub fn to_toml(instance: &Instance, options: &SerializeOptions) -> Result<String> {
    let toml = as_toml(instance, options)?;
    if options.pretty {
        Ok(toml::to_string_pretty(&toml)?)
    } else {
        Ok(toml::to_string(&toml)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(toml_to_value(&TomlValue::Integer(42)), Value::Int(42));
        assert_eq!(
            value_to_toml(&Value::Str("x".to_string())).unwrap(),
            Some(TomlValue::String("x".to_string()))
        );
    }

    #[test]
    fn test_null_is_omitted() {
        assert_eq!(value_to_toml(&Value::Null).unwrap(), None);

        let mut map = IndexMap::new();
        map.insert("keep".to_string(), Value::Int(1));
        map.insert("drop".to_string(), Value::Null);
        let converted = value_to_toml(&Value::Map(map)).unwrap().unwrap();
        let table = converted.as_table().unwrap();
        assert!(table.contains_key("keep"));
        assert!(!table.contains_key("drop"));
    }

    #[test]
    fn test_date_becomes_toml_datetime() {
        let date = Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        let converted = value_to_toml(&date).unwrap().unwrap();
        assert!(matches!(converted, TomlValue::Datetime(_)));
        // And reads back as the lexical form the date cast accepts.
        assert_eq!(
            toml_to_value(&converted),
            Value::Str("2024-03-15".to_string())
        );
    }
}
