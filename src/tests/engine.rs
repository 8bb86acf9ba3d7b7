// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::{customer, customer_mapper};
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::Mapper;

#[test]
fn creates_a_new_target_from_matching_members() {
    let mapper = customer_mapper();
    let source = customer("Alice", 34);
    source
        .set_member(
            "Address",
            Value::object_from("Address", [("Line1", Value::from("1 High St"))]),
        )
        .unwrap();

    let dto = mapper
        .map_to_new(&source, &TypeRef::named("CustomerDto"))
        .unwrap();

    assert_eq!(dto.shape_name().unwrap().as_ref(), "CustomerDto");
    assert_eq!(dto.get_member("Name"), Value::from("Alice"));
    assert_eq!(dto.get_member("Age"), Value::from(34i64));
    assert_eq!(
        dto.get_member("Address").get_member("Line1"),
        Value::from("1 High St")
    );
}

#[test]
fn simple_members_convert_between_types() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("In").with_member("Count", TypeRef::Int))
        .unwrap();
    mapper
        .register_shape(Shape::record("Out").with_member("Count", TypeRef::String))
        .unwrap();

    let source = Value::object_from("In", [("Count", Value::from(42i64))]);
    let out = mapper.map_to_new(&source, &TypeRef::named("Out")).unwrap();
    assert_eq!(out.get_member("Count"), Value::from("42"));
}

#[test]
fn member_without_any_source_is_never_assigned() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Bare").with_member("Other", TypeRef::Int))
        .unwrap();
    mapper
        .register_shape(Shape::record("Dto").with_member("Name", TypeRef::String))
        .unwrap();

    let source = Value::object_from("Bare", [("Other", Value::from(1i64))]);
    let dto = mapper.map_to_new(&source, &TypeRef::named("Dto")).unwrap();
    assert!(dto.get_member("Name").is_null());

    // Under merge the existing value must survive untouched.
    let existing = Value::object_from("Dto", [("Name", Value::from("keep"))]);
    let merged = mapper.map_onto(&source, &existing).unwrap();
    assert_eq!(merged.get_member("Name"), Value::from("keep"));
}

#[test]
fn merge_preserves_existing_simple_values() {
    let mapper = customer_mapper();
    let source = customer("FromSource", 50);

    let populated = Value::object_from("CustomerDto", [("Name", Value::from("Existing"))]);
    let merged = mapper.map_onto(&source, &populated).unwrap();
    assert_eq!(merged.get_member("Name"), Value::from("Existing"));
    // The empty member is filled in.
    assert_eq!(merged.get_member("Age"), Value::from(50i64));

    // The merged instance is the caller's instance.
    assert_eq!(merged.identity(), populated.identity());
}

#[test]
fn overwrite_replaces_existing_values() {
    let mapper = customer_mapper();
    let source = customer("FromSource", 50);

    let populated = Value::object_from("CustomerDto", [("Name", Value::from("Existing"))]);
    let overwritten = mapper.map_over(&source, &populated).unwrap();
    assert_eq!(overwritten.get_member("Name"), Value::from("FromSource"));
    assert_eq!(overwritten.identity(), populated.identity());
}

#[test]
fn self_referential_source_maps_in_bounded_time() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(
            Shape::record("Person")
                .with_member("Name", TypeRef::String)
                .with_member("Friend", TypeRef::named("Person")),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("PersonDto")
                .with_member("Name", TypeRef::String)
                .with_member("Friend", TypeRef::named("PersonDto")),
        )
        .unwrap();

    let person = Value::new_object("Person");
    person.set_member("Name", Value::from("Ann")).unwrap();
    person.set_member("Friend", person.clone()).unwrap();

    let dto = mapper
        .map_to_new(&person, &TypeRef::named("PersonDto"))
        .unwrap();
    assert_eq!(dto.get_member("Name"), Value::from("Ann"));
    // The self-reference survives as a self-reference.
    assert_eq!(dto.get_member("Friend").identity(), dto.identity());
}

#[test]
fn shared_source_references_map_to_shared_targets() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Addr").with_member("Line1", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(Shape::record("AddrDto").with_member("Line1", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(
            Shape::record("Pair")
                .with_member("Home", TypeRef::named("Addr"))
                .with_member("Work", TypeRef::named("Addr")),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("PairDto")
                .with_member("Home", TypeRef::named("AddrDto"))
                .with_member("Work", TypeRef::named("AddrDto")),
        )
        .unwrap();

    let addr = Value::object_from("Addr", [("Line1", Value::from("shared"))]);
    let pair = Value::object_from("Pair", [("Home", addr.clone()), ("Work", addr)]);

    let dto = mapper.map_to_new(&pair, &TypeRef::named("PairDto")).unwrap();
    assert_eq!(
        dto.get_member("Home").identity(),
        dto.get_member("Work").identity()
    );
}

#[test]
fn merge_preserves_unmapped_existing_elements() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Item").with_member("Label", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(Shape::record("ItemDto").with_member("Label", TypeRef::String))
        .unwrap();

    let source = Value::from(vec![Value::object_from(
        "Item",
        [("Label", Value::from("updated"))],
    )]);
    let target = Value::from(vec![
        Value::object_from("ItemDto", [("Label", Value::Null)]),
        Value::object_from("ItemDto", [("Label", Value::from("tail"))]),
    ]);

    let merged = mapper.map_onto(&source, &target).unwrap();
    assert_eq!(merged.len().unwrap(), 2);
    assert_eq!(merged.index(0).get_member("Label"), Value::from("updated"));
    assert_eq!(merged.index(1).get_member("Label"), Value::from("tail"));
    assert_eq!(merged.identity(), target.identity());
}

#[test]
fn overwrite_truncates_excess_existing_elements() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Item").with_member("Label", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(Shape::record("ItemDto").with_member("Label", TypeRef::String))
        .unwrap();

    let source = Value::from(vec![Value::object_from(
        "Item",
        [("Label", Value::from("only"))],
    )]);
    let target = Value::from(vec![
        Value::object_from("ItemDto", [("Label", Value::from("a"))]),
        Value::object_from("ItemDto", [("Label", Value::from("b"))]),
    ]);

    let overwritten = mapper.map_over(&source, &target).unwrap();
    assert_eq!(overwritten.len().unwrap(), 1);
    assert_eq!(overwritten.index(0).get_member("Label"), Value::from("only"));
}

#[test]
fn null_source_yields_initial_value() {
    let mapper = customer_mapper();
    assert!(mapper
        .map_to_new(&Value::Null, &TypeRef::named("CustomerDto"))
        .unwrap()
        .is_null());

    let existing = Value::object_from("CustomerDto", [("Name", Value::from("still here"))]);
    let merged = mapper.map_onto(&Value::Null, &existing).unwrap();
    assert_eq!(merged.identity(), existing.identity());
}

#[test]
fn flattened_source_members_match_nested_names() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Inner").with_member("Line1", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(
            Shape::record("Nested").with_member("Address", TypeRef::named("Inner")),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("Flat").with_member("AddressLine1", TypeRef::String),
        )
        .unwrap();

    let source = Value::object_from(
        "Nested",
        [(
            "Address",
            Value::object_from("Inner", [("Line1", Value::from("flattened"))]),
        )],
    );
    let flat = mapper.map_to_new(&source, &TypeRef::named("Flat")).unwrap();
    assert_eq!(flat.get_member("AddressLine1"), Value::from("flattened"));
}
