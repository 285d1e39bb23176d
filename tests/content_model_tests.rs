//! Content-model validation tests
//!
//! Choice bounds, sequence order and group structure, exercised through
//! full parse-then-validate flows.

use modelmap::content_model::{Choice, GroupBuilder, Sequence};
use modelmap::formats::{json, xml};
use modelmap::mapping::{KeyValueMapping, KeyValueMappingRule, XmlMapping, XmlMappingRule};
use modelmap::{Attribute, Error, ModelBuilder, ModelDescriptor, Type};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn contact_model() -> Arc<ModelDescriptor> {
    ModelBuilder::new("Contact")
        .attribute(Attribute::new("email", Type::Str))
        .attribute(Attribute::new("phone", Type::Str))
        .key_value_mapping(
            KeyValueMapping::new()
                .map(KeyValueMappingRule::new("email").to("email"))
                .map(KeyValueMappingRule::new("phone").to("phone"))
                .with_choice(
                    Choice::new(1, 1)
                        .unwrap()
                        .with_attribute("email")
                        .with_attribute("phone"),
                ),
        )
        .finish()
        .unwrap()
}

#[test]
fn choice_accepts_exactly_one_populated_member() {
    let descriptor = contact_model();

    let one = json::from_json(&descriptor, r#"{"email":"a@b.c"}"#).unwrap();
    assert!(one.validate().is_empty());
    assert!(one.ensure_valid().is_ok());
}

#[test]
fn choice_rejects_both_and_neither_populated() {
    let descriptor = contact_model();

    // Malformed instances are constructible; validate surfaces the
    // violations afterwards.
    let both = json::from_json(&descriptor, r#"{"email":"a@b.c","phone":"123"}"#).unwrap();
    let errors = both.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].expected.as_deref(), Some("at most 1"));
    assert_eq!(errors[0].actual.as_deref(), Some("2"));

    let neither = json::from_json(&descriptor, r#"{}"#).unwrap();
    let errors = neither.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].expected.as_deref(), Some("at least 1"));
    assert!(matches!(
        neither.ensure_valid(),
        Err(Error::Validation(_))
    ));
}

#[test]
fn sequence_validates_parsed_element_order() {
    let descriptor = ModelBuilder::new("Doc")
        .attribute(Attribute::new("x", Type::Str))
        .attribute(Attribute::new("y", Type::Str))
        .attribute(Attribute::new("z", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("doc")
                .map(XmlMappingRule::element("x").to("x"))
                .map(XmlMappingRule::element("y").to("y"))
                .map(XmlMappingRule::element("z").to("z"))
                .with_sequence(Sequence::new(["x", "y", "z"])),
        )
        .finish()
        .unwrap();

    let ordered =
        xml::from_xml(&descriptor, "<doc><x>1</x><y>2</y><z>3</z></doc>").unwrap();
    assert!(ordered.validate().is_empty());

    let swapped =
        xml::from_xml(&descriptor, "<doc><x>1</x><z>3</z><y>2</y></doc>").unwrap();
    let errors = swapped.validate();
    assert_eq!(errors.len(), 1);
    // The error names the expected element and the one found in its place.
    assert_eq!(errors[0].expected.as_deref(), Some("y"));
    assert_eq!(errors[0].actual.as_deref(), Some("z"));
}

#[test]
fn sequence_accepts_repeated_collection_elements() {
    let descriptor = ModelBuilder::new("List")
        .attribute(Attribute::new("heads", Type::Str).with_collection())
        .attribute(Attribute::new("tail", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("list")
                .map(XmlMappingRule::element("head").to("heads"))
                .map(XmlMappingRule::element("tail").to("tail"))
                .with_sequence(Sequence::new(["head", "tail"])),
        )
        .finish()
        .unwrap();

    let instance = xml::from_xml(
        &descriptor,
        "<list><head>a</head><head>b</head><tail>c</tail></list>",
    )
    .unwrap();
    assert!(instance.validate().is_empty());
}

#[test]
fn nested_choice_lower_bound_failure_counts_as_not_selected() {
    let descriptor = ModelBuilder::new("Reach")
        .attribute(Attribute::new("email", Type::Str))
        .attribute(Attribute::new("phone", Type::Str))
        .attribute(Attribute::new("fax", Type::Str))
        .key_value_mapping(
            KeyValueMapping::new()
                .map(KeyValueMappingRule::new("email").to("email"))
                .map(KeyValueMappingRule::new("phone").to("phone"))
                .map(KeyValueMappingRule::new("fax").to("fax"))
                .with_choice(
                    Choice::new(1, 1)
                        .unwrap()
                        .with_attribute("email")
                        .with_choice(
                            Choice::new(1, 2)
                                .unwrap()
                                .with_attribute("phone")
                                .with_attribute("fax"),
                        ),
                ),
        )
        .finish()
        .unwrap();

    let by_mail = json::from_json(&descriptor, r#"{"email":"a@b.c"}"#).unwrap();
    assert!(by_mail.validate().is_empty());

    let by_wire =
        json::from_json(&descriptor, r#"{"phone":"123","fax":"456"}"#).unwrap();
    assert!(by_wire.validate().is_empty());
}

#[test]
fn negative_choice_bounds_are_definition_errors() {
    assert!(matches!(Choice::new(-1, 1), Err(Error::Definition(_))));
    assert!(matches!(Choice::new(0, -1), Err(Error::Definition(_))));
}

#[test]
fn choices_on_format_overrides_are_validated() {
    let descriptor = ModelBuilder::new("Contact")
        .attribute(Attribute::new("email", Type::Str))
        .attribute(Attribute::new("phone", Type::Str))
        .format_mapping(
            modelmap::Format::Yaml,
            KeyValueMapping::new()
                .map(KeyValueMappingRule::new("email").to("email"))
                .map(KeyValueMappingRule::new("phone").to("phone"))
                .with_choice(
                    Choice::new(1, 1)
                        .unwrap()
                        .with_attribute("email")
                        .with_attribute("phone"),
                ),
        )
        .finish()
        .unwrap();

    let both = json::from_json(&descriptor, r#"{"email":"a@b.c","phone":"123"}"#).unwrap();
    assert_eq!(both.validate().len(), 1);
}

#[test]
fn group_structure_is_validated_at_build() {
    let valid = GroupBuilder::new()
        .with_choice(Choice::new(0, 1).unwrap().with_attribute("a"))
        .with_sequence(Sequence::new(["a", "b"]))
        .build();
    assert!(valid.is_ok());

    let two_choices = GroupBuilder::new()
        .with_choice(Choice::new(0, 1).unwrap().with_attribute("a"))
        .with_choice(Choice::new(0, 1).unwrap().with_attribute("b"))
        .build();
    assert!(matches!(two_choices, Err(Error::Definition(_))));

    let nested_group = GroupBuilder::new()
        .with_group(GroupBuilder::new())
        .build();
    assert!(matches!(nested_group, Err(Error::Definition(_))));

    let loose_attribute = GroupBuilder::new().with_attribute("a").build();
    assert!(matches!(loose_attribute, Err(Error::Definition(_))));
}

#[test]
fn group_constraints_validate_through_the_mapping() {
    let descriptor = ModelBuilder::new("Entry")
        .attribute(Attribute::new("a", Type::Str))
        .attribute(Attribute::new("b", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("entry")
                .map(XmlMappingRule::element("a").to("a"))
                .map(XmlMappingRule::element("b").to("b"))
                .with_group(
                    GroupBuilder::new()
                        .with_choice(
                            Choice::new(1, 1)
                                .unwrap()
                                .with_attribute("a")
                                .with_attribute("b"),
                        )
                        .build()
                        .unwrap(),
                ),
        )
        .finish()
        .unwrap();

    let one = xml::from_xml(&descriptor, "<entry><a>1</a></entry>").unwrap();
    assert!(one.validate().is_empty());

    let both = xml::from_xml(&descriptor, "<entry><a>1</a><b>2</b></entry>").unwrap();
    assert_eq!(both.validate().len(), 1);
}
