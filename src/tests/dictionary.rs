// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::customer_mapper;
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::Mapper;

fn payload_mapper() -> Mapper {
    let mut mapper = customer_mapper();
    mapper.register_dictionary("Payload", TypeRef::Any).unwrap();
    mapper
        .register_shape(
            Shape::record("Order")
                .with_member("Id", TypeRef::Int)
                .with_member("Items", TypeRef::list(TypeRef::String)),
        )
        .unwrap();
    mapper
}

#[test]
fn dictionary_lookup_is_case_insensitive() {
    let mapper = payload_mapper();
    let payload = Value::object_from("Payload", [("name", Value::from("Carol"))]);

    let dto = mapper
        .map_to_new(&payload, &TypeRef::named("CustomerDto"))
        .unwrap();
    assert_eq!(dto.get_member("Name"), Value::from("Carol"));
}

#[test]
fn dictionary_values_convert_to_member_types() {
    let mapper = payload_mapper();
    let payload = Value::object_from("Payload", [("age", Value::from("41"))]);

    let dto = mapper
        .map_to_new(&payload, &TypeRef::named("CustomerDto"))
        .unwrap();
    assert_eq!(dto.get_member("Age"), Value::from(41i64));
}

#[test]
fn indexed_probing_collects_elements_in_order() {
    let mapper = payload_mapper();
    let payload = Value::object_from(
        "Payload",
        [
            ("Items[0]", Value::from("first")),
            ("Items[1]", Value::from("second")),
            ("Id", Value::from(7i64)),
        ],
    );

    let order = mapper.map_to_new(&payload, &TypeRef::named("Order")).unwrap();
    assert_eq!(
        order.get_member("Items"),
        Value::from(vec![Value::from("first"), Value::from("second")])
    );
    assert_eq!(order.get_member("Id"), Value::from(7i64));
}

#[test]
fn indexed_probing_stops_at_first_gap() {
    let mapper = payload_mapper();
    let payload = Value::object_from(
        "Payload",
        [
            ("Items[0]", Value::from("only")),
            // Items[1] missing: Items[2] must not be collected.
            ("Items[2]", Value::from("orphan")),
        ],
    );

    let order = mapper.map_to_new(&payload, &TypeRef::named("Order")).unwrap();
    assert_eq!(order.get_member("Items"), Value::from(vec![Value::from("only")]));
}

#[test]
fn missing_key_falls_back_to_member_default() {
    let mapper = payload_mapper();
    let payload = Value::object_from("Payload", [("name", Value::from("Dora"))]);

    let dto = mapper
        .map_to_new(&payload, &TypeRef::named("CustomerDto"))
        .unwrap();
    assert_eq!(dto.get_member("Age"), Value::from(0i64));
}

#[test]
fn composite_keys_populate_nested_members() {
    let mapper = payload_mapper();
    let payload = Value::object_from("Payload", [("Address.Line1", Value::from("1 High St"))]);

    let dto = mapper
        .map_to_new(&payload, &TypeRef::named("CustomerDto"))
        .unwrap();
    let address = dto.get_member("Address");
    assert_eq!(address.get_member("Line1"), Value::from("1 High St"));
}

#[test]
fn json_payload_maps_end_to_end() {
    let mapper = payload_mapper();
    let payload = Value::from_json_str(r#"{ "name": "Eve", "age": 29 }"#)
        .unwrap()
        .tagged("Payload");

    let dto = mapper
        .map_to_new(&payload, &TypeRef::named("CustomerDto"))
        .unwrap();
    assert_eq!(dto.get_member("Name"), Value::from("Eve"));
    assert_eq!(dto.get_member("Age"), Value::from(29i64));
}
