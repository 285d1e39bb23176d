//! Format adapters and format-indexed dispatch
//!
//! One adapter per supported serialization format. Each exposes the same
//! four operations:
//! - `from_F` - parse raw text and deserialize an instance
//! - `of_F` - deserialize an instance from an already-parsed document
//! - `as_F` - serialize an instance into a parsed document
//! - `to_F` - serialize an instance into raw text
//!
//! The split lets a caller swap the raw-text parser without altering
//! mapping semantics. [`from_format`] and [`to_format`] dispatch on a
//! runtime [`Format`] value.

pub mod json;
pub mod toml;
pub mod xml;
pub mod yaml;

use crate::error::{Error, Result};
use crate::instance::{Instance, ModelDescriptor};
use crate::transform::SerializeOptions;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A supported serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// XML
    Xml,
    /// JSON
    Json,
    /// YAML
    Yaml,
    /// TOML
    Toml,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xml => write!(f, "xml"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
            Self::Toml => write!(f, "toml"),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            other => Err(Error::Lookup(format!("unknown format '{}'", other))),
        }
    }
}

/// Parse raw text in the given format and deserialize an instance
pub fn from_format(
    descriptor: &Arc<ModelDescriptor>,
    format: Format,
    input: &str,
) -> Result<Instance> {
    match format {
        Format::Xml => xml::from_xml(descriptor, input),
        Format::Json => json::from_json(descriptor, input),
        Format::Yaml => yaml::from_yaml(descriptor, input),
        Format::Toml => toml::from_toml(descriptor, input),
    }
}

/// Serialize an instance into raw text in the given format
pub fn to_format(
    instance: &Instance,
    format: Format,
    options: &SerializeOptions,
) -> Result<String> {
    match format {
        Format::Xml => xml::to_xml(instance, options),
        Format::Json => json::to_json(instance, options),
        Format::Yaml => yaml::to_yaml(instance, options),
        Format::Toml => toml::to_toml(instance, options),
    }
}
