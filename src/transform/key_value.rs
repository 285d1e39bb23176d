//! Key-value transform pipeline
//!
//! Transforms between model instances and [`Value`] maps, the intermediate
//! representation shared by the JSON, YAML and TOML backends. The format
//! parameter selects which declared key-value mapping applies, at every
//! level of the model graph.

use crate::attribute::Attribute;
use crate::error::{Error, Result};
use crate::formats::Format;
use crate::instance::{Instance, ModelDescriptor};
use crate::mapping::{ChildMappings, ChildPath, KeyValueMappingRule};
use crate::transform::{read_through, write_through, SerializeOptions};
use crate::values::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Serialize an instance into a `Value` tree
pub fn instance_to_value(
    instance: &Instance,
    format: Format,
    options: &SerializeOptions,
) -> Result<Value> {
    let mapping = Arc::clone(instance.descriptor().key_value_mapping_for(format));

    // A root-mapping rule serializes the entire document from one attribute.
    if let Some(rule) = mapping.root_rule() {
        if let Some(custom) = rule.custom() {
            return (custom.export)(instance);
        }
        let attribute = expect_attribute(rule)?;
        let attr = resolve_attribute(instance.descriptor(), attribute, rule.delegate())?;
        let (value, _) = read_through(instance, attribute, rule.delegate())?;
        let value = apply_export_transform(rule, value)?;
        return serialize_attr_value(&attr, value, format, options);
    }

    let mut map = IndexMap::new();
    for rule in mapping.rules() {
        if let Some(custom) = rule.custom() {
            let value = (custom.export)(instance)?;
            if !value.is_null() {
                map.insert(rule.name().to_string(), value);
            }
            continue;
        }

        let attribute = expect_attribute(rule)?;
        if !options.includes(attribute) {
            continue;
        }

        let attr = resolve_attribute(instance.descriptor(), attribute, rule.delegate())?;
        let (value, state) = read_through(instance, attribute, rule.delegate())?;
        let value = apply_export_transform(rule, value)?;

        if !rule.render(&value, state) {
            continue;
        }
        let value = rule.rendered_value(value);

        let serialized = match rule.child_mappings() {
            Some(child_mappings) => flatten_children(child_mappings, value, format, options)?,
            None => serialize_attr_value(&attr, value, format, options)?,
        };
        map.insert(rule.name().to_string(), serialized);
    }

    Ok(Value::Map(map))
}

/// Deserialize a `Value` tree into an instance of the given model,
/// redispatching to the polymorphic variant when the descriptor declares a
/// discriminator
pub fn instance_from_value(
    descriptor: &Arc<ModelDescriptor>,
    data: &Value,
    format: Format,
) -> Result<Instance> {
    let mapping = Arc::clone(descriptor.key_value_mapping_for(format));

    if let Some(polymorphism) = descriptor.polymorphism() {
        if let Some(raw) = discriminator_value(mapping.rules(), polymorphism.attribute(), data) {
            let variant = polymorphism.resolve(&raw)?;
            if variant.name() != descriptor.name() {
                tracing::debug!(
                    base = %descriptor.name(),
                    variant = %variant.name(),
                    "polymorphic redispatch"
                );
                return instance_from_value(&Arc::clone(variant), data, format);
            }
        }
    }

    let mut instance = Instance::new(Arc::clone(descriptor));

    if let Some(rule) = mapping.root_rule() {
        if let Some(custom) = rule.custom() {
            (custom.import)(&mut instance, data)?;
            return Ok(instance);
        }
        let attribute = expect_attribute(rule)?;
        let attr = resolve_attribute(descriptor, attribute, rule.delegate())?;
        let raw = apply_import_transform(rule, data.clone())?;
        let value = import_attr_value(&attr, rule.child_mappings(), raw, format)?;
        write_through(&mut instance, attribute, rule.delegate(), value)?;
        return Ok(instance);
    }

    let map = match data {
        Value::Map(map) => map,
        other => {
            return Err(Error::Decode(format!(
                "expected a map at the document root, got '{}'",
                other
            )))
        }
    };

    for rule in mapping.rules() {
        if let Some(custom) = rule.custom() {
            if let Some(raw) = locate(map, rule) {
                (custom.import)(&mut instance, raw)?;
            }
            continue;
        }

        let attribute = expect_attribute(rule)?;
        let attr = resolve_attribute(descriptor, attribute, rule.delegate())?;
        if attr.is_derived() {
            continue;
        }

        match locate(map, rule) {
            None => {
                // Fall back to the attribute default; the instance records
                // that the value was not explicitly provided.
                if rule.delegate().is_none() {
                    instance.set_default(attribute)?;
                }
            }
            Some(raw) => {
                let raw = apply_import_transform(rule, raw.clone())?;
                let value = import_attr_value(&attr, rule.child_mappings(), raw, format)?;
                write_through(&mut instance, attribute, rule.delegate(), value)?;
            }
        }
    }

    Ok(instance)
}

/// Locate the first key of a rule present in the map: the primary name,
/// then the aliases in declaration order
fn locate<'a>(map: &'a IndexMap<String, Value>, rule: &KeyValueMappingRule) -> Option<&'a Value> {
    rule.base().names().find_map(|name| map.get(name))
}

/// Read the raw discriminator value of a polymorphic base from the data
fn discriminator_value(
    rules: &[Arc<KeyValueMappingRule>],
    attribute: &str,
    data: &Value,
) -> Option<String> {
    let map = data.as_map()?;
    let rule = rules.iter().find(|rule| rule.attribute() == Some(attribute))?;
    locate(map, rule).map(|value| value.lexical())
}

fn expect_attribute(rule: &KeyValueMappingRule) -> Result<&str> {
    rule.attribute().ok_or_else(|| {
        Error::Encode(format!(
            "rule '{}' declares no target attribute",
            rule.name()
        ))
    })
}

/// Resolve the attribute a rule targets, following the delegate into the
/// nested model when one is declared
pub(crate) fn resolve_attribute(
    descriptor: &Arc<ModelDescriptor>,
    attribute: &str,
    delegate: Option<&str>,
) -> Result<Arc<Attribute>> {
    match delegate {
        None => Ok(Arc::clone(descriptor.require_attribute(attribute)?)),
        Some(delegate_name) => {
            let delegate_attr = descriptor.require_attribute(delegate_name)?;
            let nested = delegate_attr.ty().model_descriptor().ok_or_else(|| {
                Error::Lookup(format!(
                    "delegate attribute '{}' is not a nested model",
                    delegate_name
                ))
            })?;
            Ok(Arc::clone(nested.require_attribute(attribute)?))
        }
    }
}

fn apply_export_transform(rule: &KeyValueMappingRule, value: Value) -> Result<Value> {
    match rule.export_transform() {
        Some(transform) => transform(value),
        None => Ok(value),
    }
}

fn apply_import_transform(rule: &KeyValueMappingRule, value: Value) -> Result<Value> {
    match rule.import_transform() {
        Some(transform) => transform(value),
        None => Ok(value),
    }
}

/// Serialize one attribute value: collections map the serializer over each
/// element, nested models recurse through their own mapping
fn serialize_attr_value(
    attr: &Attribute,
    value: Value,
    format: Format,
    options: &SerializeOptions,
) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(serialize_single(attr, item, format, options)?);
            }
            Ok(Value::Seq(out))
        }
        single => serialize_single(attr, single, format, options),
    }
}

fn serialize_single(
    attr: &Attribute,
    value: Value,
    format: Format,
    options: &SerializeOptions,
) -> Result<Value> {
    match value {
        Value::Model(inner) => instance_to_value(&inner, format, &options.for_nested()),
        other => attr.ty().serialize(&other),
    }
}

/// Deserialize one attribute value: nested models recurse, collections
/// always produce a sequence even for a single element
fn import_attr_value(
    attr: &Attribute,
    child_mappings: Option<&ChildMappings>,
    raw: Value,
    format: Format,
) -> Result<Value> {
    if let Some(child_mappings) = child_mappings {
        return unflatten_children(attr, child_mappings, raw);
    }

    let Some(nested) = attr.ty().model_descriptor().cloned() else {
        return Ok(raw);
    };

    if attr.is_collection() {
        let mut out = Vec::new();
        for item in raw.into_seq() {
            out.push(Value::Model(instance_from_value(&nested, &item, format)?));
        }
        Ok(Value::Seq(out))
    } else {
        match raw {
            Value::Null => Ok(Value::Null),
            item => Ok(Value::Model(instance_from_value(&nested, &item, format)?)),
        }
    }
}

/// Flatten a collection of nested models into a dictionary keyed by one
/// child attribute's value
fn flatten_children(
    child_mappings: &ChildMappings,
    value: Value,
    format: Format,
    options: &SerializeOptions,
) -> Result<Value> {
    let mut out = IndexMap::new();
    for item in value.into_seq() {
        let Value::Model(child) = item else {
            return Err(Error::Encode(
                "child mappings require a collection of nested models".to_string(),
            ));
        };

        let mut key = None;
        let mut entry = IndexMap::new();
        for (child_attr, path) in child_mappings.entries() {
            let child_value = child.get(child_attr)?;
            match path {
                ChildPath::Key => key = Some(child_value.lexical()),
                ChildPath::Path(path) => {
                    if child_value.is_present() {
                        let attr = child.descriptor().require_attribute(child_attr)?;
                        let serialized = serialize_attr_value(
                            attr,
                            child_value,
                            format,
                            &options.for_nested(),
                        )?;
                        set_path(&mut entry, path, serialized);
                    }
                }
            }
        }

        let key = key.ok_or_else(|| {
            Error::Encode("child mappings declare no key attribute".to_string())
        })?;
        out.insert(key, Value::Map(entry));
    }
    Ok(Value::Map(out))
}

/// Unflatten a dictionary back into a collection of nested models
fn unflatten_children(
    attr: &Attribute,
    child_mappings: &ChildMappings,
    raw: Value,
) -> Result<Value> {
    let Some(nested) = attr.ty().model_descriptor().cloned() else {
        return Err(Error::Decode(format!(
            "attribute '{}' declares child mappings but is not a nested model collection",
            attr.name()
        )));
    };
    let Value::Map(map) = raw else {
        return Err(Error::Decode(
            "child mappings expect a map of key to child values".to_string(),
        ));
    };

    let mut out = Vec::with_capacity(map.len());
    for (key, value) in map {
        let mut child = Instance::new(Arc::clone(&nested));
        for (child_attr, path) in child_mappings.entries() {
            match path {
                ChildPath::Key => {
                    child.set(child_attr, Value::Str(key.clone()))?;
                }
                ChildPath::Path(path) => match get_path(&value, path) {
                    Some(found) => child.set(child_attr, found.clone())?,
                    None => {
                        child.set_default(child_attr)?;
                    }
                },
            }
        }
        out.push(Value::Model(child));
    }
    Ok(Value::Seq(out))
}

/// Navigate a path of keys into a value tree
fn get_path<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.as_map()?.get(key)?;
    }
    Some(current)
}

/// Set a value at a path of keys, creating intermediate maps
fn set_path(map: &mut IndexMap<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [last] => {
            map.insert(last.clone(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry(head.clone())
                .or_insert_with(|| Value::Map(IndexMap::new()));
            if !matches!(entry, Value::Map(_)) {
                *entry = Value::Map(IndexMap::new());
            }
            if let Value::Map(inner) = entry {
                set_path(inner, rest, value);
            }
        }
    }
}
