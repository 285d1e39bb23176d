//! XML transform pipeline
//!
//! Transforms between model instances and [`XmlElement`] trees. Rules are
//! matched by namespace-qualified name; the namespace declarations needed
//! to reproduce a document, including those of nested models, are collected
//! by one walk over the attribute graph per serialization.

use crate::attribute::Attribute;
use crate::error::{Error, Result};
use crate::document::{XmlAttribute, XmlElement, XmlNode};
use crate::instance::{Instance, ModelDescriptor, OrderEntry};
use crate::mapping::{RenderMode, XmlMapping, XmlMappingRule, XmlRuleKind};
use crate::namespaces::{NamespaceSet, QName, XSI_NAMESPACE};
use crate::transform::key_value::resolve_attribute;
use crate::transform::{read_through, write_through, SerializeOptions};
use crate::values::Value;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Prefix chosen for each namespace URI during one serialization
type PrefixMap = HashMap<String, Option<String>>;

/// Serialize an instance into an element tree rooted at the mapping's
/// declared document root
pub fn instance_to_element(instance: &Instance, options: &SerializeOptions) -> Result<XmlElement> {
    let mapping = Arc::clone(instance.descriptor().require_xml_mapping()?);
    let root = mapping.root_name().ok_or_else(|| {
        Error::Encode(format!(
            "model '{}' declares no document root",
            instance.model_name()
        ))
    })?;

    let mut namespaces = NamespaceSet::new();
    let mut prefixes = PrefixMap::new();
    let mut visited = HashSet::new();
    collect_namespaces(instance.descriptor(), &mut namespaces, &mut prefixes, &mut visited);

    let mut nil_visited = HashSet::new();
    if renders_nil(instance.descriptor(), &mut nil_visited) {
        namespaces.declare(Some("xsi"), XSI_NAMESPACE);
        prefixes.insert(XSI_NAMESPACE.to_string(), Some("xsi".to_string()));
    }

    let name = QName::new(mapping.namespace().map(str::to_string), root);
    let prefix = mapping.prefix().map(str::to_string);
    let mut element = build_element(instance, &mapping, name, prefix, &prefixes, options)?;

    let mut attributes: Vec<XmlAttribute> = namespaces
        .to_xmlns_attributes()
        .into_iter()
        .map(|(name, value)| XmlAttribute {
            name: QName::local(name),
            prefix: None,
            value,
        })
        .collect();
    attributes.append(&mut element.attributes);
    element.attributes = attributes;

    Ok(element)
}

/// Deserialize an element tree into an instance of the given model,
/// checking the declared document root first
pub fn instance_from_element(
    descriptor: &Arc<ModelDescriptor>,
    element: &XmlElement,
) -> Result<Instance> {
    let mapping = descriptor.require_xml_mapping()?;
    if let Some(root) = mapping.root_name() {
        if element.name.local_name != root {
            return Err(Error::Decode(format!(
                "expected document root '{}', found '{}'",
                root, element.name.local_name
            )));
        }
        if let Some(namespace) = mapping.namespace() {
            if element.name.namespace.as_deref() != Some(namespace) {
                return Err(Error::Decode(format!(
                    "document root '{}' is not in namespace '{}'",
                    element.name.local_name, namespace
                )));
            }
        }
    }
    populate(descriptor, element)
}

/// Populate an instance from an element without checking the root name;
/// nested model recursion enters here
pub(crate) fn populate(
    descriptor: &Arc<ModelDescriptor>,
    element: &XmlElement,
) -> Result<Instance> {
    if let Some(polymorphism) = descriptor.polymorphism() {
        let mapping = descriptor.require_xml_mapping()?;
        if let Some(raw) = discriminator_from_element(mapping, polymorphism.attribute(), element) {
            let variant = polymorphism.resolve(&raw)?;
            if variant.name() != descriptor.name() {
                tracing::debug!(
                    base = %descriptor.name(),
                    variant = %variant.name(),
                    "polymorphic redispatch"
                );
                return populate(&Arc::clone(variant), element);
            }
        }
    }

    let mapping = Arc::clone(descriptor.require_xml_mapping()?);
    let mut instance = Instance::new(Arc::clone(descriptor));

    for child in &element.children {
        match child {
            XmlNode::Element(child_element) => {
                instance.push_order(OrderEntry::Element(child_element.name.local_name.clone()));
            }
            XmlNode::Text(text) | XmlNode::CData(text) => {
                if !text.trim().is_empty() {
                    instance.push_order(OrderEntry::Text);
                }
            }
            XmlNode::Raw(_) => {}
        }
    }

    for rule in mapping.rules() {
        match rule.kind() {
            XmlRuleKind::Attribute => read_attribute_rule(&mut instance, descriptor, rule, element)?,
            XmlRuleKind::Element => read_element_rule(&mut instance, descriptor, rule, element)?,
            XmlRuleKind::Content => read_content_rule(&mut instance, descriptor, rule, element, &mapping)?,
            XmlRuleKind::Raw => read_raw_rule(&mut instance, descriptor, rule, element)?,
        }
    }

    Ok(instance)
}

fn read_attribute_rule(
    instance: &mut Instance,
    descriptor: &Arc<ModelDescriptor>,
    rule: &XmlMappingRule,
    element: &XmlElement,
) -> Result<()> {
    let found = element
        .attributes
        .iter()
        .find(|attribute| rule.matches(&attribute.name));

    if let Some(custom) = rule.custom() {
        if let Some(attribute) = found {
            (custom.import)(instance, &Value::Str(attribute.value.clone()))?;
        }
        return Ok(());
    }

    let target = expect_attribute(rule)?;
    let attr = resolve_attribute(descriptor, target, rule.delegate())?;
    if attr.is_derived() {
        return Ok(());
    }

    match found {
        None => {
            if rule.delegate().is_none() {
                instance.set_default(target)?;
            }
        }
        Some(attribute) => {
            let raw = apply_import_transform(rule, Value::Str(attribute.value.clone()))?;
            write_through(instance, target, rule.delegate(), raw)?;
        }
    }
    Ok(())
}

fn read_element_rule(
    instance: &mut Instance,
    descriptor: &Arc<ModelDescriptor>,
    rule: &XmlMappingRule,
    element: &XmlElement,
) -> Result<()> {
    let matches: Vec<&XmlElement> = element
        .child_elements()
        .filter(|child| rule.matches(&child.name))
        .collect();

    if let Some(custom) = rule.custom() {
        if let Some(first) = matches.first() {
            let raw = element_to_raw_value(first);
            (custom.import)(instance, &raw)?;
        }
        return Ok(());
    }

    let target = expect_attribute(rule)?;
    let attr = resolve_attribute(descriptor, target, rule.delegate())?;
    if attr.is_derived() {
        return Ok(());
    }

    if matches.is_empty() {
        if rule.delegate().is_none() {
            instance.set_default(target)?;
        }
        return Ok(());
    }

    let value = if attr.is_collection() {
        // A collection always consumes a sequence, even for one match.
        let mut items = Vec::with_capacity(matches.len());
        for child in &matches {
            let raw = import_child(&attr, child)?;
            items.push(apply_import_transform(rule, raw)?);
        }
        Value::Seq(items)
    } else {
        let raw = import_child(&attr, matches[0])?;
        apply_import_transform(rule, raw)?
    };

    write_through(instance, target, rule.delegate(), value)
}

fn read_content_rule(
    instance: &mut Instance,
    descriptor: &Arc<ModelDescriptor>,
    rule: &XmlMappingRule,
    element: &XmlElement,
    mapping: &XmlMapping,
) -> Result<()> {
    let mixed = rule.is_mixed() || mapping.is_mixed();
    let raw = if mixed {
        let mut segments = Vec::new();
        for child in &element.children {
            match child {
                XmlNode::Text(text) | XmlNode::CData(text) => {
                    if !text.trim().is_empty() {
                        segments.push(Value::Str(text.clone()));
                    }
                }
                _ => {}
            }
        }
        Value::Seq(segments)
    } else {
        let text = element.text();
        if text.is_empty() {
            Value::Null
        } else {
            Value::Str(text)
        }
    };

    if let Some(custom) = rule.custom() {
        return (custom.import)(instance, &raw);
    }

    let target = expect_attribute(rule)?;
    let attr = resolve_attribute(descriptor, target, rule.delegate())?;
    if attr.is_derived() {
        return Ok(());
    }

    if raw.is_blank() && !attr.is_collection() {
        if rule.delegate().is_none() {
            instance.set_default(target)?;
        }
        return Ok(());
    }

    let raw = apply_import_transform(rule, raw)?;
    write_through(instance, target, rule.delegate(), raw)
}

fn read_raw_rule(
    instance: &mut Instance,
    descriptor: &Arc<ModelDescriptor>,
    rule: &XmlMappingRule,
    element: &XmlElement,
) -> Result<()> {
    let raw = match &element.raw_inner {
        Some(markup) => Value::Str(markup.clone()),
        None => Value::Null,
    };

    if let Some(custom) = rule.custom() {
        return (custom.import)(instance, &raw);
    }

    let target = expect_attribute(rule)?;
    let attr = resolve_attribute(descriptor, target, rule.delegate())?;
    if attr.is_derived() || raw.is_null() {
        return Ok(());
    }
    let raw = apply_import_transform(rule, raw)?;
    write_through(instance, target, rule.delegate(), raw)
}

/// Convert one matched child element into a raw value: a plain string for
/// simple elements, or a map folding attributes and text together for
/// elements carrying both (cast unwraps a lone `"text"` key)
fn element_to_raw_value(element: &XmlElement) -> Value {
    if element.attributes.is_empty() && !element.has_child_elements() {
        return Value::Str(element.text());
    }

    let mut map = IndexMap::new();
    for attribute in &element.attributes {
        map.insert(
            attribute.name.local_name.clone(),
            Value::Str(attribute.value.clone()),
        );
    }
    for child in element.child_elements() {
        map.insert(child.name.local_name.clone(), Value::Str(child.text()));
    }
    let text = element.text();
    if !text.is_empty() {
        map.insert("text".to_string(), Value::Str(text));
    }
    Value::Map(map)
}

/// Import one matched child element for an attribute: nil elements become
/// null, nested models recurse, untyped targets keep the full structure and
/// scalar targets fold a structured element's text through the `"text"`
/// wrapper the cast unwraps
fn import_child(attr: &Attribute, child: &XmlElement) -> Result<Value> {
    if child.attribute(&QName::namespaced(XSI_NAMESPACE, "nil")) == Some("true") {
        return Ok(Value::Null);
    }
    match attr.ty() {
        crate::types::Type::Model(nested) => Ok(Value::Model(populate(&Arc::clone(nested), child)?)),
        crate::types::Type::Any => Ok(element_to_raw_value(child)),
        _ => {
            if child.attributes.is_empty() && !child.has_child_elements() {
                Ok(Value::Str(child.text()))
            } else {
                let mut map = IndexMap::new();
                map.insert("text".to_string(), Value::Str(child.text()));
                Ok(Value::Map(map))
            }
        }
    }
}

/// Read the raw discriminator value of a polymorphic base from the element
fn discriminator_from_element(
    mapping: &XmlMapping,
    attribute: &str,
    element: &XmlElement,
) -> Option<String> {
    let rule = mapping
        .rules()
        .iter()
        .find(|rule| rule.target_attribute() == Some(attribute))?;
    match rule.kind() {
        XmlRuleKind::Attribute => element
            .attributes
            .iter()
            .find(|a| rule.matches(&a.name))
            .map(|a| a.value.clone()),
        XmlRuleKind::Element => element
            .child_elements()
            .find(|child| rule.matches(&child.name))
            .map(|child| child.text()),
        XmlRuleKind::Content | XmlRuleKind::Raw => Some(element.text()),
    }
}

fn expect_attribute(rule: &XmlMappingRule) -> Result<&str> {
    rule.target_attribute().ok_or_else(|| {
        Error::Encode(format!(
            "rule '{}' declares no target attribute",
            rule.name()
        ))
    })
}

fn apply_import_transform(rule: &XmlMappingRule, value: Value) -> Result<Value> {
    match rule.import_transform() {
        Some(transform) => transform(value),
        None => Ok(value),
    }
}

fn apply_export_transform(rule: &XmlMappingRule, value: Value) -> Result<Value> {
    match rule.export_transform() {
        Some(transform) => transform(value),
        None => Ok(value),
    }
}

/// Build one element from an instance and its mapping; the caller chooses
/// the element name (the declared root or the enclosing rule's name)
fn build_element(
    instance: &Instance,
    mapping: &XmlMapping,
    name: QName,
    prefix: Option<String>,
    prefixes: &PrefixMap,
    options: &SerializeOptions,
) -> Result<XmlElement> {
    let mut element = XmlElement {
        name,
        prefix,
        ..Default::default()
    };

    for rule in mapping.rules() {
        if rule.kind() != XmlRuleKind::Attribute {
            continue;
        }
        write_attribute_rule(instance, rule, prefixes, options, &mut element)?;
    }

    let use_captured_order = !instance.element_order().is_empty()
        && (mapping.is_ordered() || mapping.is_mixed());

    if use_captured_order {
        write_children_in_captured_order(instance, mapping, prefixes, options, &mut element)?;
    } else {
        write_children_in_declaration_order(instance, mapping, prefixes, options, &mut element)?;
    }

    Ok(element)
}

fn write_attribute_rule(
    instance: &Instance,
    rule: &XmlMappingRule,
    prefixes: &PrefixMap,
    options: &SerializeOptions,
    element: &mut XmlElement,
) -> Result<()> {
    let prefix = rule.prefix().map(str::to_string).or_else(|| {
        rule.effective_namespace()
            .and_then(|ns| prefixes.get(ns).cloned().flatten())
    });

    if let Some(custom) = rule.custom() {
        let value = (custom.export)(instance)?;
        if !value.is_null() {
            element.attributes.push(XmlAttribute {
                name: rule.qname(),
                prefix,
                value: value.lexical(),
            });
        }
        return Ok(());
    }

    let target = expect_attribute(rule)?;
    if !options.includes(target) {
        return Ok(());
    }
    let attr = resolve_attribute(instance.descriptor(), target, rule.delegate())?;
    let (value, state) = read_through(instance, target, rule.delegate())?;
    let value = apply_export_transform(rule, value)?;

    if !rule.render(&value, state) {
        return Ok(());
    }
    let value = rule.rendered_value(value);
    let text = if value.is_null() {
        String::new()
    } else {
        attr.ty().serialize(&value)?.lexical()
    };

    element.attributes.push(XmlAttribute {
        name: rule.qname(),
        prefix,
        value: text,
    });
    Ok(())
}

/// The render-approved items of one element rule, ready for emission
fn pending_items(
    instance: &Instance,
    rule: &XmlMappingRule,
    options: &SerializeOptions,
) -> Result<Option<VecDeque<Value>>> {
    if let Some(custom) = rule.custom() {
        let value = (custom.export)(instance)?;
        if value.is_null() {
            return Ok(Some(VecDeque::new()));
        }
        return Ok(Some(value.into_seq().into()));
    }

    let target = expect_attribute(rule)?;
    if !options.includes(target) {
        return Ok(None);
    }
    let (value, state) = read_through(instance, target, rule.delegate())?;
    let value = apply_export_transform(rule, value)?;

    if !rule.render(&value, state) {
        return Ok(None);
    }
    let value = rule.rendered_value(value);

    let items = match value {
        Value::Null => VecDeque::from(vec![Value::Null]),
        Value::Seq(items) => items.into(),
        single => VecDeque::from(vec![single]),
    };
    Ok(Some(items))
}

fn write_children_in_declaration_order(
    instance: &Instance,
    mapping: &XmlMapping,
    prefixes: &PrefixMap,
    options: &SerializeOptions,
    element: &mut XmlElement,
) -> Result<()> {
    for rule in mapping.rules() {
        match rule.kind() {
            XmlRuleKind::Element => {
                let Some(items) = pending_items(instance, rule, options)? else {
                    continue;
                };
                for item in items {
                    let child = emit_child(instance, rule, item, prefixes, options)?;
                    element.children.push(XmlNode::Element(child));
                }
            }
            XmlRuleKind::Content => {
                for node in content_nodes(instance, rule, options)? {
                    element.children.push(node);
                }
            }
            XmlRuleKind::Raw => {
                if let Some(markup) = raw_markup(instance, rule)? {
                    element.children.push(XmlNode::Raw(markup));
                }
            }
            XmlRuleKind::Attribute => {}
        }
    }
    Ok(())
}

fn write_children_in_captured_order(
    instance: &Instance,
    mapping: &XmlMapping,
    prefixes: &PrefixMap,
    options: &SerializeOptions,
    element: &mut XmlElement,
) -> Result<()> {
    let mut pending: Vec<(usize, VecDeque<Value>)> = Vec::new();
    for (index, rule) in mapping.rules().iter().enumerate() {
        if rule.kind() == XmlRuleKind::Element {
            if let Some(items) = pending_items(instance, rule, options)? {
                pending.push((index, items));
            }
        }
    }
    let mut texts: VecDeque<XmlNode> = match mapping.content_rule() {
        Some(rule) => content_nodes(instance, rule, options)?.into(),
        None => VecDeque::new(),
    };

    for entry in instance.element_order() {
        match entry {
            OrderEntry::Element(name) => {
                let Some((index, items)) = pending.iter_mut().find_map(|(index, items)| {
                    let rule = &mapping.rules()[*index];
                    (rule.base().names().any(|n| n == name.as_str()) && !items.is_empty())
                        .then_some((*index, items))
                }) else {
                    continue;
                };
                let rule = &mapping.rules()[index];
                let item = items.pop_front().expect("non-empty pending queue");
                let child = emit_child(instance, rule, item, prefixes, options)?;
                element.children.push(XmlNode::Element(child));
            }
            OrderEntry::Text => {
                if let Some(node) = texts.pop_front() {
                    element.children.push(node);
                }
            }
        }
    }

    // Values with no captured position are appended in declaration order.
    for (index, items) in pending {
        let rule = &mapping.rules()[index];
        for item in items {
            let child = emit_child(instance, rule, item, prefixes, options)?;
            element.children.push(XmlNode::Element(child));
        }
    }
    for node in texts {
        element.children.push(node);
    }

    Ok(())
}

/// Emit one child element for one value of an element rule
fn emit_child(
    instance: &Instance,
    rule: &XmlMappingRule,
    item: Value,
    prefixes: &PrefixMap,
    options: &SerializeOptions,
) -> Result<XmlElement> {
    let namespace = rule.effective_namespace().map(str::to_string);
    let prefix = rule
        .prefix()
        .map(str::to_string)
        .or_else(|| namespace.as_ref().and_then(|ns| prefixes.get(ns).cloned().flatten()));
    let name = QName::new(namespace, rule.name());

    match item {
        Value::Null => {
            let mut child = XmlElement {
                name,
                prefix,
                ..Default::default()
            };
            if rule.base().render_nil() == RenderMode::AsNull {
                child.attributes.push(XmlAttribute {
                    name: QName::namespaced(XSI_NAMESPACE, "nil"),
                    prefix: Some("xsi".to_string()),
                    value: "true".to_string(),
                });
            }
            Ok(child)
        }
        Value::Model(inner) => {
            let nested_mapping = Arc::clone(inner.descriptor().require_xml_mapping()?);
            build_element(
                &inner,
                &nested_mapping,
                name,
                prefix,
                prefixes,
                &options.for_nested(),
            )
        }
        other => {
            let text = match rule.target_attribute() {
                Some(target) => {
                    let attr = resolve_attribute(instance.descriptor(), target, rule.delegate())?;
                    attr.ty().serialize(&other)?.lexical()
                }
                None => other.lexical(),
            };
            let mut child = XmlElement {
                name,
                prefix,
                ..Default::default()
            };
            if !text.is_empty() {
                if rule.is_cdata() {
                    child.children.push(XmlNode::CData(text));
                } else {
                    child.children.push(XmlNode::Text(text));
                }
            }
            Ok(child)
        }
    }
}

/// The text or CDATA nodes of the content rule
fn content_nodes(
    instance: &Instance,
    rule: &XmlMappingRule,
    options: &SerializeOptions,
) -> Result<Vec<XmlNode>> {
    let value = if let Some(custom) = rule.custom() {
        (custom.export)(instance)?
    } else {
        let target = expect_attribute(rule)?;
        if !options.includes(target) {
            return Ok(Vec::new());
        }
        let (value, state) = read_through(instance, target, rule.delegate())?;
        let value = apply_export_transform(rule, value)?;
        if !rule.render(&value, state) {
            return Ok(Vec::new());
        }
        rule.rendered_value(value)
    };

    let make_node = |text: String| {
        if rule.is_cdata() {
            XmlNode::CData(text)
        } else {
            XmlNode::Text(text)
        }
    };

    match value {
        Value::Null => Ok(vec![make_node(String::new())]),
        Value::Seq(segments) => Ok(segments
            .into_iter()
            .map(|segment| make_node(segment.lexical()))
            .collect()),
        single => Ok(vec![make_node(single.lexical())]),
    }
}

/// The verbatim markup of the raw catch-all rule, if it renders
fn raw_markup(instance: &Instance, rule: &XmlMappingRule) -> Result<Option<String>> {
    let value = if let Some(custom) = rule.custom() {
        (custom.export)(instance)?
    } else {
        let target = expect_attribute(rule)?;
        let (value, state) = read_through(instance, target, rule.delegate())?;
        if !rule.render(&value, state) {
            return Ok(None);
        }
        value
    };
    match value {
        Value::Null => Ok(None),
        other => Ok(Some(other.lexical())),
    }
}

/// Collect the namespace declarations needed to reproduce a document by
/// walking the attribute graph once
fn collect_namespaces(
    descriptor: &Arc<ModelDescriptor>,
    namespaces: &mut NamespaceSet,
    prefixes: &mut PrefixMap,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(descriptor.name().to_string()) {
        return;
    }
    let Some(mapping) = descriptor.xml_mapping() else {
        return;
    };

    if let Some(namespace) = mapping.namespace() {
        declare(namespaces, prefixes, mapping.prefix(), namespace);
    }

    for rule in mapping.rules() {
        if let Some(namespace) = rule.effective_namespace() {
            declare(namespaces, prefixes, rule.prefix(), namespace);
        }

        let nested = rule
            .delegate()
            .or(rule.target_attribute())
            .and_then(|name| descriptor.attribute(name))
            .and_then(|attr| attr.ty().model_descriptor());
        if let Some(nested) = nested {
            collect_namespaces(&Arc::clone(nested), namespaces, prefixes, visited);
        }
    }
}

fn declare(
    namespaces: &mut NamespaceSet,
    prefixes: &mut PrefixMap,
    prefix: Option<&str>,
    namespace: &str,
) {
    namespaces.declare(prefix, namespace);
    prefixes
        .entry(namespace.to_string())
        .or_insert_with(|| prefix.map(str::to_string));
}

/// Check whether any rule in the attribute graph renders nil as `xsi:nil`
fn renders_nil(descriptor: &Arc<ModelDescriptor>, visited: &mut HashSet<String>) -> bool {
    if !visited.insert(descriptor.name().to_string()) {
        return false;
    }
    let Some(mapping) = descriptor.xml_mapping() else {
        return false;
    };

    for rule in mapping.rules() {
        if matches!(rule.kind(), XmlRuleKind::Element | XmlRuleKind::Content)
            && rule.base().render_nil() == RenderMode::AsNull
        {
            return true;
        }
        let nested = rule
            .delegate()
            .or(rule.target_attribute())
            .and_then(|name| descriptor.attribute(name))
            .and_then(|attr| attr.ty().model_descriptor());
        if let Some(nested) = nested {
            if renders_nil(&Arc::clone(nested), visited) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attribute;
    use crate::instance::ModelBuilder;
    use crate::types::Type;

    fn address() -> Arc<ModelDescriptor> {
        ModelBuilder::new("Address")
            .attribute(Attribute::new("street", Type::Str))
            .attribute(Attribute::new("city", Type::Str))
            .attribute(Attribute::new("kind", Type::Str))
            .xml_mapping(
                XmlMapping::with_root("address")
                    .map(crate::mapping::XmlMappingRule::attribute("kind").to("kind"))
                    .map(crate::mapping::XmlMappingRule::element("street").to("street"))
                    .map(crate::mapping::XmlMappingRule::element("city").to("city")),
            )
            .finish()
            .unwrap()
    }

    #[test]
    fn test_serialize_simple_model() {
        let mut instance = Instance::new(address());
        instance.set("kind", Value::Str("home".to_string())).unwrap();
        instance.set("street", Value::Str("Main St".to_string())).unwrap();
        instance.set("city", Value::Str("Springfield".to_string())).unwrap();

        let element = instance_to_element(&instance, &SerializeOptions::new()).unwrap();
        assert_eq!(element.name.local_name, "address");
        assert_eq!(element.attribute(&QName::local("kind")), Some("home"));

        let children: Vec<_> = element.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name.local_name, "street");
        assert_eq!(children[0].text(), "Main St");
    }

    #[test]
    fn test_round_trip_through_elements() {
        let descriptor = address();
        let mut instance = Instance::new(Arc::clone(&descriptor));
        instance.set("kind", Value::Str("home".to_string())).unwrap();
        instance.set("street", Value::Str("Main St".to_string())).unwrap();

        let element = instance_to_element(&instance, &SerializeOptions::new()).unwrap();
        let back = instance_from_element(&descriptor, &element).unwrap();
        assert_eq!(back, instance);
    }

    #[test]
    fn test_root_name_mismatch_is_decode_error() {
        let descriptor = address();
        let element = XmlElement::new("person");
        assert!(matches!(
            instance_from_element(&descriptor, &element),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_captured_order_drives_ordered_serialization() {
        let descriptor = ModelBuilder::new("Doc")
            .attribute(Attribute::new("a", Type::Str))
            .attribute(Attribute::new("b", Type::Str))
            .xml_mapping(
                XmlMapping::with_root("doc")
                    .ordered()
                    .map(crate::mapping::XmlMappingRule::element("a").to("a"))
                    .map(crate::mapping::XmlMappingRule::element("b").to("b")),
            )
            .finish()
            .unwrap();

        let mut instance = Instance::new(Arc::clone(&descriptor));
        instance.set("a", Value::Str("1".to_string())).unwrap();
        instance.set("b", Value::Str("2".to_string())).unwrap();
        instance.set_element_order(vec![
            OrderEntry::Element("b".to_string()),
            OrderEntry::Element("a".to_string()),
        ]);

        let element = instance_to_element(&instance, &SerializeOptions::new()).unwrap();
        let names: Vec<_> = element
            .child_elements()
            .map(|child| child.name.local_name.clone())
            .collect();
        assert_eq!(names, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_nil_element_round_trip() {
        let descriptor = ModelBuilder::new("Note")
            .attribute(Attribute::new("body", Type::Str))
            .xml_mapping(XmlMapping::with_root("note").map(
                crate::mapping::XmlMappingRule::element("body")
                    .to("body")
                    .with_render_nil(RenderMode::AsNull)
                    .unwrap(),
            ))
            .finish()
            .unwrap();

        let mut instance = Instance::new(Arc::clone(&descriptor));
        instance.set("body", Value::Null).unwrap();

        let element = instance_to_element(&instance, &SerializeOptions::new()).unwrap();
        let body = element.child_elements().next().unwrap();
        assert_eq!(
            body.attribute(&QName::namespaced(XSI_NAMESPACE, "nil")),
            Some("true")
        );

        let back = instance_from_element(&descriptor, &element).unwrap();
        assert_eq!(back.get("body").unwrap(), Value::Null);
        assert_eq!(back.state("body"), crate::instance::ValueState::Explicit);
    }

    #[test]
    fn test_collection_elements_round_trip() {
        let descriptor = ModelBuilder::new("List")
            .attribute(Attribute::new("items", Type::Str).with_collection())
            .xml_mapping(
                XmlMapping::with_root("list")
                    .map(crate::mapping::XmlMappingRule::element("item").to("items")),
            )
            .finish()
            .unwrap();

        let mut instance = Instance::new(Arc::clone(&descriptor));
        instance
            .set(
                "items",
                Value::Seq(vec![
                    Value::Str("one".to_string()),
                    Value::Str("two".to_string()),
                ]),
            )
            .unwrap();

        let element = instance_to_element(&instance, &SerializeOptions::new()).unwrap();
        assert_eq!(element.child_elements().count(), 2);

        let back = instance_from_element(&descriptor, &element).unwrap();
        assert_eq!(back, instance);

        // A single matched element still reads back as a sequence.
        let single = XmlElement::new("list")
            .with_element(XmlElement::new("item").with_text("only"));
        let from_single = instance_from_element(&descriptor, &single).unwrap();
        assert_eq!(
            from_single.get("items").unwrap(),
            Value::Seq(vec![Value::Str("only".to_string())])
        );
    }

    #[test]
    fn test_element_with_attributes_folds_text_for_scalar_target() {
        let descriptor = ModelBuilder::new("Doc")
            .attribute(Attribute::new("title", Type::Str))
            .xml_mapping(
                XmlMapping::with_root("doc")
                    .map(crate::mapping::XmlMappingRule::element("title").to("title")),
            )
            .finish()
            .unwrap();

        let element = XmlElement::new("doc").with_element(
            XmlElement::new("title")
                .with_attribute(QName::local("lang"), "en")
                .with_text("Hello"),
        );

        // The structured element folds down to its text content through
        // the lone "text" wrapper.
        let instance = instance_from_element(&descriptor, &element).unwrap();
        assert_eq!(
            instance.get("title").unwrap(),
            Value::Str("Hello".to_string())
        );
    }
}
