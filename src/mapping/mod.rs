//! Mapping-rule DSL
//!
//! This module implements the per-format mapping declarations of a model
//! class:
//! - [`MappingRule`] - the format-independent core of one rule
//! - [`XmlMappingRule`] / [`XmlMapping`] - element, attribute, content and
//!   raw mappings with namespaces and ordering constraints
//! - [`KeyValueMappingRule`] / [`KeyValueMapping`] - key mappings shared by
//!   JSON, YAML and TOML, with root-mapping and child-mapping support
//!
//! Containers are built with chained setters and validated by `build`;
//! every invalid declaration is a definition-time error.

mod key_value;
mod rule;
mod xml;

pub use key_value::{ChildMappings, ChildPath, KeyValueMapping, KeyValueMappingRule};
pub use rule::{
    CustomFns, ExportFn, ImportFn, MappingRule, RenderMode, TransformFn,
};
pub use xml::{XmlMapping, XmlMappingRule, XmlRuleKind};
