//! XML mapping tests
//!
//! Namespaces, ordering, mixed content, CDATA, raw catch-all rules,
//! nil rendering, polymorphic dispatch and mapping imports.

use modelmap::formats::{json, xml};
use modelmap::mapping::{
    KeyValueMapping, KeyValueMappingRule, RenderMode, XmlMapping, XmlMappingRule,
};
use modelmap::{
    Attribute, Error, Format, Instance, ModelBuilder, ModelDescriptor, SerializeOptions, Type,
    Value,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[test]
fn default_namespace_is_inherited_by_child_elements() {
    let descriptor = ModelBuilder::new("Address")
        .attribute(Attribute::new("street", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("address")
                .with_namespace("http://example.com/addr", None)
                .map(XmlMappingRule::element("street").to("street")),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("street", Value::Str("Main St".to_string())).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(
        out,
        "<address xmlns=\"http://example.com/addr\"><street>Main St</street></address>"
    );

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn prefixed_namespace_round_trips() {
    let descriptor = ModelBuilder::new("Address")
        .attribute(Attribute::new("street", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("address")
                .with_namespace("http://example.com/addr", Some("addr"))
                .map(XmlMappingRule::element("street").to("street")),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("street", Value::Str("Main St".to_string())).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(
        out,
        "<addr:address xmlns:addr=\"http://example.com/addr\">\
         <addr:street>Main St</addr:street></addr:address>"
    );

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn explicit_rule_namespace_wins_over_the_default() {
    let descriptor = ModelBuilder::new("Doc")
        .attribute(Attribute::new("code", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("doc")
                .with_namespace("http://example.com/d", None)
                .map(
                    XmlMappingRule::element("code")
                        .to("code")
                        .with_namespace("http://example.com/ext", Some("ext")),
                ),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("code", Value::Str("x1".to_string())).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert!(out.contains("xmlns=\"http://example.com/d\""));
    assert!(out.contains("xmlns:ext=\"http://example.com/ext\""));
    assert!(out.contains("<ext:code>x1</ext:code>"));

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn namespaced_attribute_round_trips_with_its_prefix() {
    let descriptor = ModelBuilder::new("Doc")
        .attribute(Attribute::new("id", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("doc").map(
                XmlMappingRule::attribute("id")
                    .to("id")
                    .with_namespace("http://example.com/meta", Some("m")),
            ),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("id", Value::Str("d1".to_string())).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(
        out,
        "<doc xmlns:m=\"http://example.com/meta\" m:id=\"d1\"/>"
    );

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn ordered_mapping_preserves_document_order() {
    let descriptor = ModelBuilder::new("Doc")
        .attribute(Attribute::new("a", Type::Str))
        .attribute(Attribute::new("b", Type::Str).with_collection())
        .xml_mapping(
            XmlMapping::with_root("doc")
                .ordered()
                .map(XmlMappingRule::element("a").to("a"))
                .map(XmlMappingRule::element("b").to("b")),
        )
        .finish()
        .unwrap();

    let input = "<doc><b>1</b><a>2</a><b>3</b></doc>";
    let instance = xml::from_xml(&descriptor, input).unwrap();
    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn mixed_content_interleaves_text_and_elements() {
    let descriptor = ModelBuilder::new("Para")
        .attribute(Attribute::new("text", Type::Str).with_collection())
        .attribute(Attribute::new("bold", Type::Str).with_collection())
        .xml_mapping(
            XmlMapping::with_root("p")
                .mixed()
                .map(XmlMappingRule::content().to("text").mixed())
                .map(XmlMappingRule::element("b").to("bold")),
        )
        .finish()
        .unwrap();

    let input = "<p>Hello <b>world</b>!</p>";
    let instance = xml::from_xml(&descriptor, input).unwrap();
    assert_eq!(
        instance.get("text").unwrap(),
        Value::Seq(vec![
            Value::Str("Hello ".to_string()),
            Value::Str("!".to_string()),
        ])
    );
    assert_eq!(
        instance.get("bold").unwrap(),
        Value::Seq(vec![Value::Str("world".to_string())])
    );

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn cdata_rule_emits_cdata_sections() {
    let descriptor = ModelBuilder::new("Script")
        .attribute(Attribute::new("source", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("script")
                .map(XmlMappingRule::content().to("source").with_cdata()),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("source", Value::Str("if (a < b) { go(); }".to_string())).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(out, "<script><![CDATA[if (a < b) { go(); }]]></script>");

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn raw_rule_captures_and_reemits_inner_markup() {
    let descriptor = ModelBuilder::new("Div")
        .attribute(Attribute::new("markup", Type::Str))
        .xml_mapping(XmlMapping::with_root("div").map(XmlMappingRule::raw().to("markup")))
        .finish()
        .unwrap();

    let input = "<div><p>a</p><p>b</p></div>";
    let instance = xml::from_xml(&descriptor, input).unwrap();
    assert_eq!(
        instance.get("markup").unwrap(),
        Value::Str("<p>a</p><p>b</p>".to_string())
    );

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(out, input);
}

#[test]
fn render_nil_policies_in_xml_and_json() {
    let descriptor = ModelBuilder::new("Note")
        .attribute(Attribute::new("body", Type::Str))
        .attribute(Attribute::new("title", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("note")
                .map(
                    XmlMappingRule::element("body")
                        .to("body")
                        .with_render_nil(RenderMode::AsBlank)
                        .unwrap(),
                )
                .map(XmlMappingRule::element("title").to("title")),
        )
        .key_value_mapping(
            KeyValueMapping::new()
                .map(
                    KeyValueMappingRule::new("body")
                        .to("body")
                        .with_render_nil(RenderMode::AsBlank)
                        .unwrap(),
                )
                .map(KeyValueMappingRule::new("title").to("title")),
        )
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("body", Value::Null).unwrap();
    instance.set("title", Value::Null).unwrap();

    // as_blank renders an explicit empty element/field; the default
    // policy omits the nil attribute entirely.
    let xml_out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(xml_out, "<note><body/></note>");

    let json_out = json::to_json(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(json_out, r#"{"body":""}"#);
}

#[test]
fn xsi_nil_round_trips_explicit_nulls() {
    let descriptor = ModelBuilder::new("Note")
        .attribute(Attribute::new("body", Type::Str))
        .xml_mapping(XmlMapping::with_root("note").map(
            XmlMappingRule::element("body")
                .to("body")
                .with_render_nil(RenderMode::AsNull)
                .unwrap(),
        ))
        .finish()
        .unwrap();

    let mut instance = Instance::new(Arc::clone(&descriptor));
    instance.set("body", Value::Null).unwrap();

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(
        out,
        "<note xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\
         <body xsi:nil=\"true\"/></note>"
    );

    let back = xml::from_xml(&descriptor, &out).unwrap();
    assert_eq!(back.get("body").unwrap(), Value::Null);
}

fn shape_models() -> (Arc<ModelDescriptor>, Arc<ModelDescriptor>, Arc<ModelDescriptor>) {
    let circle = ModelBuilder::new("Circle")
        .attribute(Attribute::new("type", Type::Str))
        .attribute(Attribute::new("radius", Type::Float))
        .xml_mapping(
            XmlMapping::with_root("shape")
                .map(XmlMappingRule::attribute("type").to("type"))
                .map(XmlMappingRule::element("radius").to("radius")),
        )
        .finish()
        .unwrap();
    let square = ModelBuilder::new("Square")
        .attribute(Attribute::new("type", Type::Str))
        .attribute(Attribute::new("side", Type::Float))
        .xml_mapping(
            XmlMapping::with_root("shape")
                .map(XmlMappingRule::attribute("type").to("type"))
                .map(XmlMappingRule::element("side").to("side")),
        )
        .finish()
        .unwrap();
    let base = ModelBuilder::new("Shape")
        .attribute(Attribute::new("type", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("shape")
                .map(XmlMappingRule::attribute("type").to("type")),
        )
        .polymorphic(
            "type",
            vec![("circle", Arc::clone(&circle)), ("square", Arc::clone(&square))],
        )
        .finish()
        .unwrap();
    (base, circle, square)
}

#[test]
fn polymorphic_dispatch_from_xml() {
    let (base, _, _) = shape_models();

    let instance =
        xml::from_xml(&base, "<shape type=\"circle\"><radius>2.5</radius></shape>").unwrap();
    assert_eq!(instance.model_name(), "Circle");
    assert_eq!(instance.get("radius").unwrap(), Value::Float(2.5));

    let instance =
        xml::from_xml(&base, "<shape type=\"square\"><side>4</side></shape>").unwrap();
    assert_eq!(instance.model_name(), "Square");
    assert_eq!(instance.get("side").unwrap(), Value::Float(4.0));
}

#[test]
fn polymorphic_dispatch_from_json() {
    let (base, circle, _) = shape_models();

    let instance = json::from_json(&base, r#"{"type":"circle","radius":2.5}"#).unwrap();
    assert_eq!(instance.model_name(), "Circle");

    // The variant's own mapping rules applied, not the base's.
    let mut expected = Instance::new(circle);
    expected.set("type", Value::Str("circle".to_string())).unwrap();
    expected.set("radius", Value::Float(2.5)).unwrap();
    assert_eq!(instance, expected);
}

#[test]
fn unknown_discriminator_value_fails_lookup() {
    let (base, _, _) = shape_models();
    let result = xml::from_xml(&base, "<shape type=\"hexagon\"/>");
    assert!(matches!(result, Err(Error::Lookup(_))));
}

#[test]
fn imported_mappings_merge_into_the_importer() {
    let address_part = ModelBuilder::new("AddressPart")
        .attribute(Attribute::new("street", Type::Str))
        .attribute(Attribute::new("city", Type::Str))
        .xml_mapping(
            XmlMapping::no_root()
                .map(XmlMappingRule::element("street").to("street"))
                .map(XmlMappingRule::element("city").to("city")),
        )
        .finish()
        .unwrap();

    let person = ModelBuilder::new("Person")
        .attribute(Attribute::new("name", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("person").map(XmlMappingRule::element("name").to("name")),
        )
        .import_model(&address_part)
        .finish()
        .unwrap();

    let instance = xml::from_xml(
        &person,
        "<person><name>Ada</name><street>Main St</street><city>Springfield</city></person>",
    )
    .unwrap();
    assert_eq!(instance.get("street").unwrap(), Value::Str("Main St".to_string()));

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    let back = xml::from_xml(&person, &out).unwrap();
    assert_eq!(back, instance);
}

#[test]
fn importing_a_rooted_model_is_a_definition_error() {
    let rooted = ModelBuilder::new("Rooted")
        .attribute(Attribute::new("x", Type::Str))
        .xml_mapping(
            XmlMapping::with_root("rooted").map(XmlMappingRule::element("x").to("x")),
        )
        .finish()
        .unwrap();

    let result = ModelBuilder::new("Importer")
        .attribute(Attribute::new("y", Type::Str))
        .import_model(&rooted)
        .finish();
    assert!(matches!(result, Err(Error::Definition(_))));
}

#[test]
fn toml_mappings_reject_blank_rendering() {
    let result = ModelBuilder::new("Config")
        .attribute(Attribute::new("path", Type::Str))
        .format_mapping(
            Format::Toml,
            KeyValueMapping::new().map(
                KeyValueMappingRule::new("path")
                    .to("path")
                    .with_render_nil(RenderMode::AsBlank)
                    .unwrap(),
            ),
        )
        .finish();
    assert!(matches!(result, Err(Error::Definition(_))));
}

#[test]
fn nested_models_use_the_enclosing_rule_name() {
    let address = ModelBuilder::new("Address")
        .attribute(Attribute::new("street", Type::Str))
        .xml_mapping(
            XmlMapping::no_root().map(XmlMappingRule::element("street").to("street")),
        )
        .finish()
        .unwrap();
    let person = ModelBuilder::new("Person")
        .attribute(Attribute::new("name", Type::Str))
        .attribute(Attribute::new("home", Type::Model(Arc::clone(&address))))
        .xml_mapping(
            XmlMapping::with_root("person")
                .map(XmlMappingRule::element("name").to("name"))
                .map(XmlMappingRule::element("home").to("home")),
        )
        .finish()
        .unwrap();

    let input = "<person><name>Ada</name><home><street>Main St</street></home></person>";
    let instance = xml::from_xml(&person, input).unwrap();
    let home = instance.get("home").unwrap();
    assert_eq!(
        home.as_model().unwrap().get("street").unwrap(),
        Value::Str("Main St".to_string())
    );

    let out = xml::to_xml(&instance, &SerializeOptions::new()).unwrap();
    assert_eq!(out, input);
}
