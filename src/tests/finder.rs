// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::{customer_mapper, member_data, read, source};
use crate::config::RuleSetKind;
use crate::ir::Expr;
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::Mapper;

#[test]
fn member_with_no_source_yields_empty_set() {
    let mut mapper = Mapper::new();
    mapper.register_shape(Shape::record("Empty")).unwrap();
    mapper
        .register_shape(Shape::record("Dto").with_member("Name", TypeRef::String))
        .unwrap();

    let data = member_data(&mapper, RuleSetKind::CreateNew, "Empty", "Dto", "Name");
    let set = mapper.context().finder.find_for(&data);
    assert!(set.none);
    assert!(!set.has_value);
}

#[test]
fn matching_member_found_by_name_and_type() {
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    assert!(set.has_value);
    let expected = read(source(), "Name", TypeRef::String);
    assert!(set.value_expr().unwrap().equivalent(&expected));
}

#[test]
fn unconditional_configured_source_wins_absolutely() {
    let mut mapper = customer_mapper();
    mapper
        .configure_data_source(
            "Customer",
            "CustomerDto",
            &["Name"],
            Expr::constant(Value::from("forced")),
            None,
        )
        .unwrap();

    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    // The matching source member is never even considered.
    assert_eq!(set.sources().len(), 1);
    assert!(set.value_expr().unwrap().equivalent(&Expr::constant(Value::from("forced"))));
}

#[test]
fn conditional_configured_source_gets_a_backup() {
    let mut mapper = customer_mapper();
    mapper
        .configure_data_source(
            "Customer",
            "CustomerDto",
            &["Name"],
            Expr::constant(Value::from("conditional")),
            Some(Expr::not_null(read(source(), "Age", TypeRef::Int))),
        )
        .unwrap();

    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    // Configured first, then the matching source member as backup.
    assert_eq!(set.sources().len(), 2);
    let matched = read(source(), "Name", TypeRef::String);
    assert!(set.sources()[1].value.equivalent(&matched));
}

#[test]
fn configured_duplicate_of_match_replaced_by_fallback() {
    let mut mapper = customer_mapper();
    // Configure, conditionally, exactly what matching would produce.
    mapper
        .configure_data_source(
            "Customer",
            "CustomerDto",
            &["Name"],
            read(source(), "Name", TypeRef::String),
            Some(Expr::not_null(read(source(), "Age", TypeRef::Int))),
        )
        .unwrap();

    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    assert_eq!(set.sources().len(), 2);
    assert!(set.sources()[1]
        .value
        .equivalent(&Expr::Default(TypeRef::String).rf()));
}

#[test]
fn map_time_source_preempts_matching() {
    let mut mapper = customer_mapper();
    mapper.register_dictionary("Payload", TypeRef::Any).unwrap();

    let data = member_data(&mapper, RuleSetKind::CreateNew, "Payload", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    // The dictionary resolver supplies the sole source; its scratch
    // binding identifies it.
    assert_eq!(set.sources().len(), 1);
    assert!(!set.variables.is_empty());
}

#[test]
fn merge_prepends_preserve_existing_initial_source() {
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::Merge, "Customer", "CustomerDto", "Name");
    let set = mapper.context().finder.find_for(&data);

    assert!(set.sources().len() >= 2);
    let initial = &set.sources()[0];
    assert!(initial.is_conditional());
    assert!(initial.value.equivalent(&data.target_member_access()));
}

#[test]
fn complex_member_gets_recursive_mapping_source() {
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Address");
    let set = mapper.context().finder.find_for(&data);

    assert_eq!(set.sources().len(), 1);
    assert!(matches!(
        set.sources()[0].value.as_ref(),
        crate::ir::Expr::MapObject { .. }
    ));
}
