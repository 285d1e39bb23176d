//! Intermediate value representation
//!
//! Every format adapter converts parsed data into [`Value`] trees and the
//! transform pipeline converts model instances back into them. The variants
//! cover the scalar types of the type system plus ordered sequences, ordered
//! maps, nested model instances and lazy cross-document references.

use crate::instance::Instance;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use std::fmt;

/// An untyped or typed value travelling through the transform pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent or explicit null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Decimal value
    Decimal(Decimal),
    /// String value
    Str(String),
    /// Binary value (decoded bytes)
    Bytes(Vec<u8>),
    /// Date value
    Date(NaiveDate),
    /// Time value
    Time(NaiveTime),
    /// Date and time value with offset
    DateTime(DateTime<FixedOffset>),
    /// Ordered sequence of values
    Seq(Vec<Value>),
    /// Ordered map of string keys to values
    Map(IndexMap<String, Value>),
    /// Nested model instance
    Model(Instance),
    /// Lazy reference to an instance held in a [`Store`](crate::registry::Store)
    Ref(Reference),
}

impl Value {
    /// Check whether this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check whether this value is blank: null, an empty string or an
    /// empty sequence
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Str(s) => s.is_empty(),
            Value::Seq(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Check whether this value is present (not blank)
    pub fn is_present(&self) -> bool {
        !self.is_blank()
    }

    /// Get the value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the value as a float, if it is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the value as a boolean, if it is one
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the value as a sequence slice, if it is one
    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an ordered map, if it is one
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get the value as a nested model instance, if it is one
    pub fn as_model(&self) -> Option<&Instance> {
        match self {
            Value::Model(m) => Some(m),
            _ => None,
        }
    }

    /// Wrap the value in a single-element sequence unless it already is one
    pub fn into_seq(self) -> Vec<Value> {
        match self {
            Value::Seq(s) => s,
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }

    /// Canonical lexical form used for XML text and attribute content
    pub fn lexical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => {
                if v.is_nan() {
                    write!(f, "NaN")
                } else if *v == f64::INFINITY {
                    write!(f, "INF")
                } else if *v == f64::NEG_INFINITY {
                    write!(f, "-INF")
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", BASE64.encode(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Seq(items) => {
                let mut first = true;
                for item in items {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                    first = false;
                }
                Ok(())
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                let mut first = true;
                for (key, value) in map {
                    if !first {
                        write!(f, ",")?;
                    }
                    write!(f, "{}={}", key, value)?;
                    first = false;
                }
                write!(f, "}}")
            }
            Value::Model(instance) => write!(f, "{}", instance.model_name()),
            Value::Ref(reference) => write!(f, "{}", reference.key),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Seq(value)
    }
}

impl From<Instance> for Value {
    fn from(value: Instance) -> Self {
        Value::Model(value)
    }
}

/// A (model, key attribute, key value) triple resolving to a live instance
/// held in a [`Store`](crate::registry::Store)
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// Name of the referenced model
    pub model: String,
    /// Attribute of the referenced model acting as the key
    pub key_attribute: String,
    /// Key value identifying the referenced instance
    pub key: Box<Value>,
}

impl Reference {
    /// Create a new reference
    pub fn new(model: impl Into<String>, key_attribute: impl Into<String>, key: Value) -> Self {
        Self {
            model: model.into(),
            key_attribute: key_attribute.into(),
            key: Box::new(key),
        }
    }

    /// Resolve the reference against a store. A miss is `None`, not an error.
    pub fn resolve<'a>(&self, store: &'a crate::registry::Store) -> Option<&'a Instance> {
        store.resolve(&self.model, &self.key_attribute, &self.key)
    }
}
