//! Declared attribute types and the cast/serialize contract
//!
//! This module implements the type system: every attribute declares a
//! [`Type`], `cast` converts an untyped parsed value into the declared type
//! and `serialize` is its inverse. Casts tolerate the common textual
//! encodings found in serialized documents and fail with a descriptive
//! error otherwise.

use crate::error::{Error, Result};
use crate::instance::ModelDescriptor;
use crate::values::{Reference, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

lazy_static::lazy_static! {
    /// Accepted boolean tokens, lowercased
    static ref BOOLEAN_TOKENS: HashMap<&'static str, bool> = {
        let mut m = HashMap::new();
        m.insert("true", true);
        m.insert("t", true);
        m.insert("yes", true);
        m.insert("y", true);
        m.insert("1", true);
        m.insert("false", false);
        m.insert("f", false);
        m.insert("no", false);
        m.insert("n", false);
        m.insert("0", false);
        m
    };
}

/// Declared type of a model attribute
#[derive(Clone)]
pub enum Type {
    /// Untyped passthrough; used by root-mapping and raw catch-all targets
    Any,
    /// String type
    Str,
    /// Integer type
    Integer,
    /// Floating point type
    Float,
    /// Decimal type
    Decimal,
    /// Boolean type
    Boolean,
    /// Date type (ISO 8601 calendar date)
    Date,
    /// Time type (ISO 8601 time of day)
    Time,
    /// Date and time type (RFC 3339)
    DateTime,
    /// Binary type with base64 lexical form
    Binary,
    /// Binary type with hexadecimal lexical form
    Hex,
    /// Nested model type
    Model(Arc<ModelDescriptor>),
    /// Union of member types, tried in declared order
    Union(Vec<Type>),
    /// Reference to an instance of another model, identified by a key attribute
    Reference {
        /// Name of the referenced model
        model: String,
        /// Key attribute of the referenced model
        key_attribute: String,
        /// Type of the key value
        key_type: Box<Type>,
    },
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl Type {
    /// Create a reference type with a string key
    pub fn reference(model: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Type::Reference {
            model: model.into(),
            key_attribute: key_attribute.into(),
            key_type: Box::new(Type::Str),
        }
    }

    /// Create a reference type with an explicit key type
    pub fn reference_keyed(
        model: impl Into<String>,
        key_attribute: impl Into<String>,
        key_type: Type,
    ) -> Self {
        Type::Reference {
            model: model.into(),
            key_attribute: key_attribute.into(),
            key_type: Box::new(key_type),
        }
    }

    /// Human-readable label used in error messages
    pub fn label(&self) -> String {
        match self {
            Type::Any => "any".to_string(),
            Type::Str => "string".to_string(),
            Type::Integer => "integer".to_string(),
            Type::Float => "float".to_string(),
            Type::Decimal => "decimal".to_string(),
            Type::Boolean => "boolean".to_string(),
            Type::Date => "date".to_string(),
            Type::Time => "time".to_string(),
            Type::DateTime => "dateTime".to_string(),
            Type::Binary => "binary".to_string(),
            Type::Hex => "hex".to_string(),
            Type::Model(descriptor) => descriptor.name().to_string(),
            Type::Union(members) => {
                let labels: Vec<String> = members.iter().map(|m| m.label()).collect();
                format!("union({})", labels.join("|"))
            }
            Type::Reference { model, .. } => format!("reference({})", model),
        }
    }

    /// Check whether this type is a nested model type
    pub fn is_model(&self) -> bool {
        matches!(self, Type::Model(_))
    }

    /// Get the nested model descriptor, if this is a model type
    pub fn model_descriptor(&self) -> Option<&Arc<ModelDescriptor>> {
        match self {
            Type::Model(descriptor) => Some(descriptor),
            _ => None,
        }
    }

    /// Cast an untyped parsed value into this type.
    ///
    /// A map consisting of the single key `"text"` is unwrapped to its
    /// scalar value before casting; mixed XML text nodes are folded into
    /// otherwise-structured values this way.
    pub fn cast(&self, raw: Value) -> Result<Value> {
        let raw = unwrap_text_map(raw);

        if raw.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Type::Any => Ok(raw),
            Type::Str => cast_string(raw),
            Type::Integer => cast_integer(raw),
            Type::Float => cast_float(raw),
            Type::Decimal => cast_decimal(raw),
            Type::Boolean => cast_boolean(raw),
            Type::Date => cast_date(raw),
            Type::Time => cast_time(raw),
            Type::DateTime => cast_datetime(raw),
            Type::Binary => cast_binary(raw),
            Type::Hex => cast_hex(raw),
            Type::Model(descriptor) => match raw {
                Value::Model(instance) => {
                    if instance.model_name() == descriptor.name()
                        || descriptor.is_variant(instance.model_name())
                    {
                        Ok(Value::Model(instance))
                    } else {
                        Err(Error::Cast(format!(
                            "expected an instance of '{}', got '{}'",
                            descriptor.name(),
                            instance.model_name()
                        )))
                    }
                }
                other => Err(Error::Cast(format!(
                    "cannot cast {} to model '{}' outside the transform pipeline",
                    kind_of(&other),
                    descriptor.name()
                ))),
            },
            Type::Union(members) => {
                for member in members {
                    if let Ok(value) = member.cast(raw.clone()) {
                        return Ok(value);
                    }
                }
                Err(Error::Cast(format!(
                    "'{}' does not match any member of {}",
                    raw,
                    self.label()
                )))
            }
            Type::Reference {
                model,
                key_attribute,
                key_type,
            } => {
                let key = match raw {
                    Value::Ref(reference) => return Ok(Value::Ref(reference)),
                    other => key_type.cast(other)?,
                };
                Ok(Value::Ref(Reference::new(
                    model.clone(),
                    key_attribute.clone(),
                    key,
                )))
            }
        }
    }

    /// Serialize a typed value back into its raw representation.
    ///
    /// Unresolved references serialize to their key, never to an error.
    pub fn serialize(&self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Type::Any => Ok(value.clone()),
            Type::Str => Ok(Value::Str(value.lexical())),
            Type::Integer | Type::Float | Type::Decimal | Type::Boolean => Ok(value.clone()),
            Type::Date | Type::Time | Type::DateTime => Ok(Value::Str(value.lexical())),
            Type::Binary => match value {
                Value::Bytes(bytes) => Ok(Value::Str(BASE64.encode(bytes))),
                other => Ok(Value::Str(other.lexical())),
            },
            Type::Hex => match value {
                Value::Bytes(bytes) => Ok(Value::Str(hex_encode(bytes))),
                other => Ok(Value::Str(other.lexical())),
            },
            Type::Model(_) => Ok(value.clone()),
            Type::Union(members) => {
                let natural = members.iter().find(|member| member.matches_variant(value));
                match natural {
                    Some(member) => member.serialize(value),
                    None => Ok(Value::Str(value.lexical())),
                }
            }
            Type::Reference { key_type, .. } => match value {
                Value::Ref(reference) => key_type.serialize(&reference.key),
                other => key_type.serialize(other),
            },
        }
    }

    /// Check whether a typed value is a natural inhabitant of this type,
    /// without any conversion. Union serialization dispatches on this.
    fn matches_variant(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Type::Any, _)
                | (Type::Str, Value::Str(_))
                | (Type::Integer, Value::Int(_))
                | (Type::Float, Value::Float(_))
                | (Type::Decimal, Value::Decimal(_))
                | (Type::Boolean, Value::Bool(_))
                | (Type::Date, Value::Date(_))
                | (Type::Time, Value::Time(_))
                | (Type::DateTime, Value::DateTime(_))
                | (Type::Binary, Value::Bytes(_))
                | (Type::Hex, Value::Bytes(_))
                | (Type::Model(_), Value::Model(_))
                | (Type::Reference { .. }, Value::Ref(_))
        )
    }
}

/// Normalize a `{"text" => v}` wrapper down to the scalar `v`.
///
/// Mixed XML text folded into an otherwise-structured value arrives as a
/// single-key map; this is an explicit, load-bearing special case.
fn unwrap_text_map(raw: Value) -> Value {
    match raw {
        Value::Map(mut map) if map.len() == 1 && map.contains_key("text") => {
            map.shift_remove("text").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int(_) => "integer",
        Value::Float(_) => "float",
        Value::Decimal(_) => "decimal",
        Value::Str(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::Date(_) => "date",
        Value::Time(_) => "time",
        Value::DateTime(_) => "dateTime",
        Value::Seq(_) => "sequence",
        Value::Map(_) => "map",
        Value::Model(_) => "model",
        Value::Ref(_) => "reference",
    }
}

fn cast_string(raw: Value) -> Result<Value> {
    match raw {
        Value::Str(s) => Ok(Value::Str(s)),
        Value::Seq(_) | Value::Map(_) | Value::Model(_) => Err(Error::Cast(format!(
            "cannot cast {} to string",
            kind_of(&raw)
        ))),
        other => Ok(Value::Str(other.lexical())),
    }
}

fn cast_integer(raw: Value) -> Result<Value> {
    match raw {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
        Value::Str(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid integer", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to integer",
            kind_of(&other)
        ))),
    }
}

fn cast_float(raw: Value) -> Result<Value> {
    match raw {
        Value::Float(f) => Ok(Value::Float(f)),
        Value::Int(i) => Ok(Value::Float(i as f64)),
        Value::Str(s) => float_from_text(s.trim()).map(Value::Float),
        other => Err(Error::Cast(format!(
            "cannot cast {} to float",
            kind_of(&other)
        ))),
    }
}

/// Parse a float accepting the `INF`/`-INF`/`NaN` lexical forms
fn float_from_text(text: &str) -> Result<f64> {
    match text {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        "NaN" => Ok(f64::NAN),
        _ => text
            .parse::<f64>()
            .map_err(|_| Error::Cast(format!("'{}' is not a valid float", text))),
    }
}

fn cast_decimal(raw: Value) -> Result<Value> {
    match raw {
        Value::Decimal(d) => Ok(Value::Decimal(d)),
        Value::Int(i) => Ok(Value::Decimal(Decimal::from(i))),
        Value::Float(f) => Decimal::from_str(&f.to_string())
            .map(Value::Decimal)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid decimal", f))),
        Value::Str(s) => Decimal::from_str(s.trim())
            .map(Value::Decimal)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid decimal", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to decimal",
            kind_of(&other)
        ))),
    }
}

fn cast_boolean(raw: Value) -> Result<Value> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::Str(s) => BOOLEAN_TOKENS
            .get(s.trim().to_ascii_lowercase().as_str())
            .copied()
            .map(Value::Bool)
            .ok_or_else(|| {
                Error::Cast(format!(
                    "'{}' is not a recognized boolean token (expected one of \
                     true/false/yes/no/y/n/t/f/1/0)",
                    s
                ))
            }),
        other => Err(Error::Cast(format!(
            "cannot cast {} to boolean",
            kind_of(&other)
        ))),
    }
}

fn cast_date(raw: Value) -> Result<Value> {
    match raw {
        Value::Date(d) => Ok(Value::Date(d)),
        Value::Str(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid date", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to date",
            kind_of(&other)
        ))),
    }
}

fn cast_time(raw: Value) -> Result<Value> {
    match raw {
        Value::Time(t) => Ok(Value::Time(t)),
        Value::Str(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid time", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to time",
            kind_of(&other)
        ))),
    }
}

fn cast_datetime(raw: Value) -> Result<Value> {
    match raw {
        Value::DateTime(dt) => Ok(Value::DateTime(dt)),
        Value::Str(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(Value::DateTime)
            .map_err(|_| Error::Cast(format!("'{}' is not a valid date-time", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to dateTime",
            kind_of(&other)
        ))),
    }
}

fn cast_binary(raw: Value) -> Result<Value> {
    match raw {
        Value::Bytes(b) => Ok(Value::Bytes(b)),
        Value::Str(s) => BASE64
            .decode(s.trim())
            .map(Value::Bytes)
            .map_err(|_| Error::Cast(format!("'{}' is not valid base64", s))),
        other => Err(Error::Cast(format!(
            "cannot cast {} to binary",
            kind_of(&other)
        ))),
    }
}

fn cast_hex(raw: Value) -> Result<Value> {
    match raw {
        Value::Bytes(b) => Ok(Value::Bytes(b)),
        Value::Str(s) => hex_decode(s.trim()).map(Value::Bytes),
        other => Err(Error::Cast(format!(
            "cannot cast {} to hex binary",
            kind_of(&other)
        ))),
    }
}

/// Encode bytes as uppercase hexadecimal
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{:02X}", byte));
    }
    out
}

/// Decode a hexadecimal string into bytes
pub fn hex_decode(text: &str) -> Result<Vec<u8>> {
    if text.len() % 2 != 0 {
        return Err(Error::Cast(format!(
            "'{}' has an odd number of hex digits",
            text
        )));
    }
    (0..text.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&text[i..i + 2], 16)
                .map_err(|_| Error::Cast(format!("'{}' is not valid hex", text)))
        })
        .collect()
}
