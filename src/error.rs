//! Error types for modelmap
//!
//! This module defines all error types used throughout the library.
//! The taxonomy separates definition-time errors (invalid mapping or model
//! declarations), cast errors, post-construction validation errors and
//! lookup errors.

use std::fmt;
use thiserror::Error;

/// Result type alias using modelmap Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for modelmap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid model or mapping declaration
    #[error("definition error: {0}")]
    Definition(#[from] DefinitionError),

    /// Structural constraint violation found by `validate`
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Value does not conform to its declared type
    #[error("cast error: {0}")]
    Cast(String),

    /// Unknown model, format, attribute or discriminator value
    #[error("lookup error: {0}")]
    Lookup(String),

    /// Model to data conversion error
    #[error("encoding error: {0}")]
    Encode(String),

    /// Data to model conversion error
    #[error("decoding error: {0}")]
    Decode(String),

    /// XML reading/writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON reading/writing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML reading/writing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML reading error
    #[error("TOML error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML writing error
    #[error("TOML error: {0}")]
    TomlWrite(#[from] toml::ser::Error),
}

impl From<roxmltree::Error> for Error {
    fn from(err: roxmltree::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

/// Declaration-time error, fatal to the model or mapping being defined
#[derive(Debug, Clone)]
pub struct DefinitionError {
    /// Error message
    pub message: String,
    /// Model the definition belongs to
    pub model: Option<String>,
    /// Mapping rule the definition belongs to
    pub rule: Option<String>,
}

impl DefinitionError {
    /// Create a new definition error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            rule: None,
        }
    }

    /// Set the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the mapping rule name
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref model) = self.model {
            write!(f, "\n\nModel: {}", model)?;
        }

        if let Some(ref rule) = self.rule {
            write!(f, "\n\nRule: {}", rule)?;
        }

        Ok(())
    }
}

impl std::error::Error for DefinitionError {}

/// Content-model violation collected by `validate`
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Error message
    pub message: String,
    /// Reason for the failure
    pub reason: Option<String>,
    /// Attribute or element the violation refers to
    pub attribute: Option<String>,
    /// The expected element or count
    pub expected: Option<String>,
    /// The actual element or count found
    pub actual: Option<String>,
}

impl ValidationError {
    /// Create a new validation error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            reason: None,
            attribute: None,
            expected: None,
            actual: None,
        }
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set the attribute or element name
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Set the expected value
    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    /// Set the actual value
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref reason) = self.reason {
            write!(f, "\nReason: {}", reason)?;
        }

        if let Some(ref expected) = self.expected {
            write!(f, "\nExpected: {}", expected)?;
        }

        if let Some(ref actual) = self.actual {
            write!(f, "\nActual: {}", actual)?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}
