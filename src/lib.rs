//! # modelmap
//!
//! A schema-driven data-modeling and serialization engine: model classes
//! declare typed attributes and per-format mapping rules, and the engine
//! converts between model instances and XML, JSON, YAML and TOML
//! representations, enforcing element order, choice cardinality and
//! namespaces along the way.
//!
//! ## Features
//!
//! - Typed attribute tables with lazy defaults, enumeration and pattern
//!   restrictions
//! - Per-format mapping rules: elements, attributes, content, raw markup,
//!   key mappings, root mappings and child mappings
//! - Bidirectional transform pipeline with delegation, custom read/write
//!   functions, directional value transforms and render policies
//! - Content-model validation: choice bounds, element sequences, groups
//! - Namespace resolution with default-namespace inheritance
//! - Polymorphic dispatch through a registered discriminator map
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelmap::{Attribute, ModelBuilder, Type};
//! use modelmap::mapping::{XmlMapping, XmlMappingRule};
//!
//! let address = ModelBuilder::new("Address")
//!     .attribute(Attribute::new("street", Type::Str))
//!     .attribute(Attribute::new("city", Type::Str))
//!     .xml_mapping(
//!         XmlMapping::with_root("address")
//!             .map(XmlMappingRule::element("street").to("street"))
//!             .map(XmlMappingRule::element("city").to("city")),
//!     )
//!     .finish()?;
//!
//! let instance = modelmap::formats::xml::from_xml(&address, xml_text)?;
//! let json = modelmap::formats::json::to_json(&instance, &Default::default())?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Foundation
pub mod error;
pub mod values;

// Type system and attributes
pub mod attribute;
pub mod types;

// Model descriptors, instances and registries
pub mod instance;
pub mod registry;

// Mapping DSL and content models
pub mod content_model;
pub mod mapping;
pub mod namespaces;

// Transform pipeline and format backends
pub mod document;
pub mod formats;
pub mod transform;

// Re-exports for convenience
pub use attribute::Attribute;
pub use error::{Error, Result};
pub use formats::Format;
pub use instance::{Instance, ModelBuilder, ModelDescriptor, ValueState};
pub use registry::{Registry, Store};
pub use transform::SerializeOptions;
pub use types::Type;
pub use values::Value;

/// Version of the modelmap library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
