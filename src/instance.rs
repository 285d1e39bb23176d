//! Model descriptors and instances
//!
//! A [`ModelDescriptor`] is the frozen definition of one model class: its
//! attribute table, its per-format mappings and its polymorphic dispatch
//! map. Descriptors are constructed through [`ModelBuilder`] and frozen into
//! `Arc`s; all definition errors surface from [`ModelBuilder::finish`].
//!
//! An [`Instance`] is one populated model object: an ordered value table
//! consulted through generic get/set entry points, with an explicit
//! three-state flag per attribute distinguishing "never set" from "set to
//! its default" from "explicitly assigned".

use crate::attribute::Attribute;
use crate::error::{DefinitionError, Error, Result, ValidationError};
use crate::formats::Format;
use crate::mapping::{KeyValueMapping, XmlMapping};
use crate::registry::Store;
use crate::values::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Assignment state of one attribute on one instance.
///
/// `Defaulted` is distinct from `Explicit` even when the values compare
/// equal; `render_default` mappings re-emit only `Defaulted` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueState {
    /// Never assigned
    #[default]
    Unset,
    /// Assigned from the attribute default during deserialization
    Defaulted,
    /// Explicitly assigned
    Explicit,
}

/// One entry of the element arrival order captured during XML parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEntry {
    /// A child element with this local name
    Element(String),
    /// A text segment (mixed content)
    Text,
}

/// Polymorphic dispatch declaration: the discriminator attribute and the
/// registered map from discriminator value to concrete variant descriptor
#[derive(Clone)]
pub struct Polymorphism {
    attribute: String,
    variants: IndexMap<String, Arc<ModelDescriptor>>,
}

impl Polymorphism {
    /// Get the discriminator attribute name
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// Look up the variant descriptor for a discriminator value
    pub fn resolve(&self, value: &str) -> Result<&Arc<ModelDescriptor>> {
        self.variants.get(value).ok_or_else(|| {
            let known: Vec<&str> = self.variants.keys().map(|k| k.as_str()).collect();
            Error::Lookup(format!(
                "unknown discriminator value '{}' (known: {})",
                value,
                known.join(", ")
            ))
        })
    }

    /// Check whether a model name is one of the registered variants
    pub fn is_variant(&self, name: &str) -> bool {
        self.variants.values().any(|v| v.name() == name)
    }
}

impl fmt::Debug for Polymorphism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polymorphism")
            .field("attribute", &self.attribute)
            .field("variants", &self.variants.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Frozen definition of one model class
pub struct ModelDescriptor {
    name: String,
    attributes: IndexMap<String, Arc<Attribute>>,
    xml: Option<Arc<XmlMapping>>,
    key_value: Arc<KeyValueMapping>,
    format_overrides: Vec<(Format, Arc<KeyValueMapping>)>,
    polymorphism: Option<Polymorphism>,
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("has_xml_mapping", &self.xml.is_some())
            .finish()
    }
}

impl ModelDescriptor {
    /// Get the model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the ordered attribute table
    pub fn attributes(&self) -> &IndexMap<String, Arc<Attribute>> {
        &self.attributes
    }

    /// Look up an attribute by name
    pub fn attribute(&self, name: &str) -> Option<&Arc<Attribute>> {
        self.attributes.get(name)
    }

    /// Look up an attribute by name, failing on unknown names
    pub fn require_attribute(&self, name: &str) -> Result<&Arc<Attribute>> {
        self.attribute(name).ok_or_else(|| {
            Error::Lookup(format!(
                "model '{}' declares no attribute '{}'",
                self.name, name
            ))
        })
    }

    /// Get the XML mapping, if one was declared
    pub fn xml_mapping(&self) -> Option<&Arc<XmlMapping>> {
        self.xml.as_ref()
    }

    /// Get the XML mapping, failing when none was declared
    pub fn require_xml_mapping(&self) -> Result<&Arc<XmlMapping>> {
        self.xml.as_ref().ok_or_else(|| {
            Error::Lookup(format!("model '{}' declares no XML mapping", self.name))
        })
    }

    /// Get the key-value mapping serving the given format
    pub fn key_value_mapping_for(&self, format: Format) -> &Arc<KeyValueMapping> {
        self.format_overrides
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, m)| m)
            .unwrap_or(&self.key_value)
    }

    /// Iterate the shared key-value mapping followed by the per-format
    /// overrides
    pub fn key_value_mappings(&self) -> impl Iterator<Item = &Arc<KeyValueMapping>> {
        std::iter::once(&self.key_value).chain(self.format_overrides.iter().map(|(_, m)| m))
    }

    /// Get the polymorphic dispatch declaration, if any
    pub fn polymorphism(&self) -> Option<&Polymorphism> {
        self.polymorphism.as_ref()
    }

    /// Check whether a model name is a registered polymorphic variant
    pub fn is_variant(&self, name: &str) -> bool {
        self.polymorphism
            .as_ref()
            .map(|p| p.is_variant(name))
            .unwrap_or(false)
    }
}

/// Builder assembling a [`ModelDescriptor`]; definition errors surface
/// from [`ModelBuilder::finish`]
pub struct ModelBuilder {
    name: String,
    attributes: IndexMap<String, Arc<Attribute>>,
    xml: Option<XmlMapping>,
    key_value: Option<KeyValueMapping>,
    format_overrides: Vec<(Format, KeyValueMapping)>,
    polymorphism: Option<Polymorphism>,
    errors: Vec<DefinitionError>,
}

impl ModelBuilder {
    /// Start a new model definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            xml: None,
            key_value: None,
            format_overrides: Vec::new(),
            polymorphism: None,
            errors: Vec::new(),
        }
    }

    /// Declare an attribute
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        let name = attribute.name().to_string();
        if self.attributes.contains_key(&name) {
            self.errors.push(
                DefinitionError::new(format!("attribute '{}' is declared twice", name))
                    .with_model(self.name.clone()),
            );
        } else {
            self.attributes.insert(name, Arc::new(attribute));
        }
        self
    }

    /// Declare the XML mapping
    pub fn xml_mapping(mut self, mapping: XmlMapping) -> Self {
        self.xml = Some(mapping);
        self
    }

    /// Declare the key-value mapping shared by JSON, YAML and TOML
    pub fn key_value_mapping(mut self, mapping: KeyValueMapping) -> Self {
        self.key_value = Some(mapping);
        self
    }

    /// Declare a key-value mapping override for one format
    pub fn format_mapping(mut self, format: Format, mapping: KeyValueMapping) -> Self {
        if format == Format::Xml {
            self.errors.push(
                DefinitionError::new("XML mappings are declared with xml_mapping")
                    .with_model(self.name.clone()),
            );
            return self;
        }
        if format == Format::Toml {
            if let Some(rule) = mapping.rule_rendering_blank() {
                self.errors.push(
                    DefinitionError::new("TOML mappings cannot render nil values as blank")
                        .with_model(self.name.clone())
                        .with_rule(rule),
                );
                return self;
            }
        }
        self.format_overrides.push((format, mapping));
        self
    }

    /// Declare polymorphic dispatch: the discriminator attribute and the
    /// map from discriminator value to concrete variant descriptor
    pub fn polymorphic(
        mut self,
        attribute: impl Into<String>,
        variants: Vec<(&str, Arc<ModelDescriptor>)>,
    ) -> Self {
        let mut map = IndexMap::new();
        for (value, descriptor) in variants {
            map.insert(value.to_string(), descriptor);
        }
        self.polymorphism = Some(Polymorphism {
            attribute: attribute.into(),
            variants: map,
        });
        self
    }

    /// Import another model's attributes and mappings.
    ///
    /// Importing a model whose XML mapping declares a document root is a
    /// definition error.
    pub fn import_model(mut self, other: &ModelDescriptor) -> Self {
        for (name, attribute) in &other.attributes {
            self.attributes
                .entry(name.clone())
                .or_insert_with(|| Arc::clone(attribute));
        }

        if let Some(other_xml) = &other.xml {
            if other_xml.root_name().is_some() {
                self.errors.push(
                    DefinitionError::new(format!(
                        "cannot import model '{}': its XML mapping declares a document root",
                        other.name
                    ))
                    .with_model(self.name.clone()),
                );
                return self;
            }
            self.xml = Some(match self.xml.take() {
                Some(own) => own.import_from(other_xml),
                None => XmlMapping::no_root().import_from(other_xml),
            });
        }

        if !other.key_value.is_derived() {
            self.key_value = Some(match self.key_value.take() {
                Some(own) => own.import_from(&other.key_value),
                None => KeyValueMapping::new().import_from(&other.key_value),
            });
        }

        self
    }

    /// Validate the definition and freeze it into an `Arc`
    pub fn finish(mut self) -> Result<Arc<ModelDescriptor>> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(Error::Definition(error));
        }

        let xml = match self.xml.take() {
            Some(mapping) => {
                let mut built = mapping.build().map_err(|e| at_model(e, &self.name))?;
                built
                    .apply_attribute_render_defaults(&self.attributes)
                    .map_err(|e| at_model(e, &self.name))?;
                Some(Arc::new(built))
            }
            None => None,
        };
        let mut key_value = match self.key_value.take() {
            Some(mapping) => mapping.build().map_err(|e| at_model(e, &self.name))?,
            None => KeyValueMapping::derived_from(self.attributes.keys().map(|k| k.as_str()))
                .build()
                .map_err(|e| at_model(e, &self.name))?,
        };
        key_value.apply_attribute_render_defaults(&self.attributes);
        let mut format_overrides = Vec::with_capacity(self.format_overrides.len());
        for (format, mapping) in self.format_overrides {
            let mut built = mapping.build().map_err(|e| at_model(e, &self.name))?;
            built.apply_attribute_render_defaults(&self.attributes);
            format_overrides.push((format, Arc::new(built)));
        }

        let descriptor = ModelDescriptor {
            name: self.name,
            attributes: self.attributes,
            xml,
            key_value: Arc::new(key_value),
            format_overrides,
            polymorphism: self.polymorphism,
        };

        descriptor.check_rule_targets()?;

        if let Some(ref polymorphism) = descriptor.polymorphism {
            descriptor.require_attribute(&polymorphism.attribute)?;
        }

        tracing::debug!(model = %descriptor.name, "model definition frozen");
        Ok(Arc::new(descriptor))
    }
}

fn at_model(error: Error, model: &str) -> Error {
    match error {
        Error::Definition(def) if def.model.is_none() => {
            Error::Definition(def.with_model(model.to_string()))
        }
        other => other,
    }
}

impl ModelDescriptor {
    /// Check that every mapping rule target resolves to a declared
    /// attribute, following delegation through nested models
    fn check_rule_targets(&self) -> Result<()> {
        let mut targets: Vec<(Option<String>, Option<String>)> = Vec::new();
        if let Some(ref xml) = self.xml {
            for rule in xml.rules() {
                targets.push((
                    rule.target_attribute().map(str::to_string),
                    rule.delegate().map(str::to_string),
                ));
            }
        }
        for rule in self.key_value.rules() {
            targets.push((
                rule.attribute().map(str::to_string),
                rule.delegate().map(str::to_string),
            ));
        }
        for (_, mapping) in &self.format_overrides {
            for rule in mapping.rules() {
                targets.push((
                    rule.attribute().map(str::to_string),
                    rule.delegate().map(str::to_string),
                ));
            }
        }

        for (attribute, delegate) in targets {
            let Some(attribute) = attribute else { continue };
            match delegate {
                None => {
                    self.require_attribute(&attribute).map_err(|_| {
                        Error::Definition(
                            DefinitionError::new(format!(
                                "mapping targets undeclared attribute '{}'",
                                attribute
                            ))
                            .with_model(self.name.clone()),
                        )
                    })?;
                }
                Some(delegate) => {
                    let delegate_attr = self.require_attribute(&delegate).map_err(|_| {
                        Error::Definition(
                            DefinitionError::new(format!(
                                "mapping delegates through undeclared attribute '{}'",
                                delegate
                            ))
                            .with_model(self.name.clone()),
                        )
                    })?;
                    let Some(nested) = delegate_attr.ty().model_descriptor() else {
                        return Err(Error::Definition(
                            DefinitionError::new(format!(
                                "delegate attribute '{}' is not a nested model",
                                delegate
                            ))
                            .with_model(self.name.clone()),
                        ));
                    };
                    nested.require_attribute(&attribute).map_err(|_| {
                        Error::Definition(
                            DefinitionError::new(format!(
                                "delegate model '{}' declares no attribute '{}'",
                                nested.name(),
                                attribute
                            ))
                            .with_model(self.name.clone()),
                        )
                    })?;
                }
            }
        }

        Ok(())
    }
}

/// One populated model object
#[derive(Debug, Clone)]
pub struct Instance {
    descriptor: Arc<ModelDescriptor>,
    values: IndexMap<String, Value>,
    states: IndexMap<String, ValueState>,
    element_order: Vec<OrderEntry>,
}

impl Instance {
    /// Create an empty instance of the given model; every attribute
    /// starts in the `Unset` state
    pub fn new(descriptor: Arc<ModelDescriptor>) -> Self {
        Self {
            descriptor,
            values: IndexMap::new(),
            states: IndexMap::new(),
            element_order: Vec::new(),
        }
    }

    /// Get the model descriptor
    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    /// Get the model name
    pub fn model_name(&self) -> &str {
        self.descriptor.name()
    }

    /// Read an attribute value.
    ///
    /// Derived attributes are computed; unset attributes yield their
    /// effective default (an empty sequence for collections) or null.
    pub fn get(&self, name: &str) -> Result<Value> {
        let attribute = self.descriptor.require_attribute(name)?;

        if let Some(derived) = attribute.derive(self) {
            return derived;
        }

        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }

        Ok(attribute.effective_default().unwrap_or(Value::Null))
    }

    /// Assign an attribute value, casting it through the declared type
    /// and marking the attribute as explicitly set
    pub fn set(&mut self, name: &str, raw: Value) -> Result<()> {
        let attribute = Arc::clone(self.descriptor.require_attribute(name)?);
        if attribute.is_derived() {
            return Err(Error::Definition(
                DefinitionError::new(format!(
                    "attribute '{}' is derived and cannot be assigned",
                    name
                ))
                .with_model(self.model_name().to_string()),
            ));
        }

        let value = attribute.cast_value(raw)?;
        self.values.insert(name.to_string(), value);
        self.states.insert(name.to_string(), ValueState::Explicit);
        Ok(())
    }

    /// Apply the attribute default, marking the attribute as `Defaulted`.
    /// Returns false and leaves the attribute `Unset` when no default
    /// applies.
    pub fn set_default(&mut self, name: &str) -> Result<bool> {
        let attribute = self.descriptor.require_attribute(name)?;
        if attribute.is_derived() {
            return Ok(false);
        }
        match attribute.effective_default() {
            Some(value) => {
                self.values.insert(name.to_string(), value);
                self.states.insert(name.to_string(), ValueState::Defaulted);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Get the assignment state of an attribute
    pub fn state(&self, name: &str) -> ValueState {
        self.states.get(name).copied().unwrap_or_default()
    }

    /// Check whether an attribute was assigned (explicitly or by default)
    pub fn is_set(&self, name: &str) -> bool {
        self.state(name) != ValueState::Unset
    }

    /// Get the captured element arrival order
    pub fn element_order(&self) -> &[OrderEntry] {
        &self.element_order
    }

    /// Append one entry to the element arrival order
    pub fn push_order(&mut self, entry: OrderEntry) {
        self.element_order.push(entry);
    }

    /// Replace the element arrival order
    pub fn set_element_order(&mut self, order: Vec<OrderEntry>) {
        self.element_order = order;
    }

    /// Resolve a reference-typed attribute against a store. A miss is
    /// `None`, not an error.
    pub fn resolve_reference(&self, name: &str, store: &Store) -> Result<Option<Instance>> {
        match self.get(name)? {
            Value::Ref(reference) => {
                let resolved = reference.resolve(store).cloned();
                if resolved.is_none() {
                    tracing::debug!(
                        model = %reference.model,
                        key = %reference.key,
                        "reference did not resolve"
                    );
                }
                Ok(resolved)
            }
            _ => Ok(None),
        }
    }

    /// Run the content-model validators of every mapping the descriptor
    /// carries and collect the violations.
    ///
    /// Malformed instances are constructible; violations surface only here.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(xml) = self.descriptor.xml_mapping() {
            for sequence in xml.sequences() {
                if let Err(error) = sequence.validate(self.element_order()) {
                    errors.push(error);
                }
            }
            for choice in xml.choices() {
                if let Err(error) = choice.validate(self) {
                    errors.push(error);
                }
            }
            for group in xml.groups() {
                errors.extend(group.validate(self));
            }
        }

        for mapping in self.descriptor.key_value_mappings() {
            for choice in mapping.choices() {
                if let Err(error) = choice.validate(self) {
                    errors.push(error);
                }
            }
        }

        errors
    }

    /// Fail on the first content-model violation, if any
    pub fn ensure_valid(&self) -> Result<()> {
        match self.validate().into_iter().next() {
            Some(error) => Err(Error::Validation(error)),
            None => Ok(()),
        }
    }
}

impl PartialEq for Instance {
    /// Instances compare by model name and effective attribute values;
    /// assignment states and captured element order are not part of
    /// equality
    fn eq(&self, other: &Self) -> bool {
        if self.model_name() != other.model_name() {
            return false;
        }
        self.descriptor.attributes().keys().all(|name| {
            match (self.get(name), other.get(name)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;

    fn person() -> Arc<ModelDescriptor> {
        ModelBuilder::new("Person")
            .attribute(Attribute::new("name", Type::Str))
            .attribute(Attribute::new("age", Type::Integer))
            .attribute(Attribute::new("tags", Type::Str).with_collection())
            .attribute(
                Attribute::new("kind", Type::Str)
                    .with_static_default(Value::Str("basic".to_string())),
            )
            .finish()
            .unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let mut instance = Instance::new(person());
        instance.set("name", Value::Str("Ada".to_string())).unwrap();
        instance.set("age", Value::Str("36".to_string())).unwrap();

        assert_eq!(instance.get("name").unwrap(), Value::Str("Ada".to_string()));
        assert_eq!(instance.get("age").unwrap(), Value::Int(36));
        assert_eq!(instance.state("name"), ValueState::Explicit);
    }

    #[test]
    fn test_unknown_attribute_is_lookup_error() {
        let instance = Instance::new(person());
        assert!(matches!(instance.get("missing"), Err(Error::Lookup(_))));
    }

    #[test]
    fn test_collection_reads_back_empty_seq() {
        let instance = Instance::new(person());
        assert_eq!(instance.get("tags").unwrap(), Value::Seq(Vec::new()));
        assert_eq!(instance.state("tags"), ValueState::Unset);
    }

    #[test]
    fn test_three_state_flag() {
        let mut instance = Instance::new(person());
        assert_eq!(instance.state("kind"), ValueState::Unset);

        assert!(instance.set_default("kind").unwrap());
        assert_eq!(instance.state("kind"), ValueState::Defaulted);
        assert_eq!(instance.get("kind").unwrap(), Value::Str("basic".to_string()));

        instance.set("kind", Value::Str("basic".to_string())).unwrap();
        assert_eq!(instance.state("kind"), ValueState::Explicit);
    }

    #[test]
    fn test_defaulted_and_explicit_instances_compare_equal() {
        let mut defaulted = Instance::new(person());
        defaulted.set_default("kind").unwrap();

        let mut explicit = Instance::new(person());
        explicit.set("kind", Value::Str("basic".to_string())).unwrap();

        // Equality is over effective values; the state flag is metadata.
        assert_eq!(defaulted, explicit);
    }

    #[test]
    fn test_duplicate_attribute_is_definition_error() {
        let result = ModelBuilder::new("Broken")
            .attribute(Attribute::new("x", Type::Str))
            .attribute(Attribute::new("x", Type::Integer))
            .finish();
        assert!(matches!(result, Err(Error::Definition(_))));
    }

    #[test]
    fn test_derived_attribute_cannot_be_assigned() {
        let descriptor = ModelBuilder::new("Derived")
            .attribute(Attribute::new("first", Type::Str))
            .attribute(Attribute::new("full", Type::Str).with_derived(|instance| {
                Ok(Value::Str(format!("{}!", instance.get("first")?)))
            }))
            .finish()
            .unwrap();

        let mut instance = Instance::new(descriptor);
        instance.set("first", Value::Str("Ada".to_string())).unwrap();
        assert_eq!(instance.get("full").unwrap(), Value::Str("Ada!".to_string()));
        assert!(instance.set("full", Value::Str("x".to_string())).is_err());
    }

    #[test]
    fn test_polymorphism_resolution() {
        let circle = ModelBuilder::new("Circle")
            .attribute(Attribute::new("type", Type::Str))
            .attribute(Attribute::new("radius", Type::Float))
            .finish()
            .unwrap();
        let base = ModelBuilder::new("Shape")
            .attribute(Attribute::new("type", Type::Str))
            .polymorphic("type", vec![("circle", Arc::clone(&circle))])
            .finish()
            .unwrap();

        let polymorphism = base.polymorphism().unwrap();
        assert_eq!(polymorphism.resolve("circle").unwrap().name(), "Circle");
        assert!(matches!(
            polymorphism.resolve("hexagon"),
            Err(Error::Lookup(_))
        ));
        assert!(base.is_variant("Circle"));
    }
}
