// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::{customer, customer_mapper, read, source};
use crate::builder::default_construction;
use crate::config::{rule_set_for, CallbackPosition, RuleSetKind};
use crate::error::PlanCompileError;
use crate::ir::Expr;
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::Mapper;

use std::cell::RefCell;
use std::rc::Rc;

fn widget_mapper() -> Mapper {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(
            Shape::record("Source")
                .with_member("A", TypeRef::Int)
                .with_member("B", TypeRef::Int)
                .with_member("C", TypeRef::Int),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("Widget")
                .with_member("A", TypeRef::Int)
                .with_member("B", TypeRef::Int)
                .with_member("C", TypeRef::Int)
                .with_constructor(&["A", "B"])
                .with_constructor(&["A", "B", "C"]),
        )
        .unwrap();
    mapper
}

#[test]
fn greediest_usable_constructor_is_selected() {
    let mapper = widget_mapper();
    let ctx = mapper.context();

    let construction = default_construction(
        ctx,
        rule_set_for(RuleSetKind::CreateNew),
        &TypeRef::named("Source"),
        &TypeRef::named("Widget"),
    )
    .unwrap();

    let Expr::Construct { params, .. } = construction.as_ref() else {
        panic!("expected a constructor call");
    };
    assert_eq!(params.len(), 3);
}

#[test]
fn constructor_unusable_without_parameter_sources() {
    let mut mapper = Mapper::new();
    mapper.register_shape(Shape::record("Empty")).unwrap();
    mapper
        .register_shape(
            Shape::record("Strict")
                .with_member("Code", TypeRef::Int)
                .with_constructor(&["Code"]),
        )
        .unwrap();

    let err = mapper
        .map_to_new(&Value::new_object("Empty"), &TypeRef::named("Strict"))
        .unwrap_err();
    let compile_err = err.downcast_ref::<PlanCompileError>().unwrap();
    assert!(matches!(
        compile_err,
        PlanCompileError::NotConstructable { .. }
    ));
}

#[test]
fn redundant_factory_is_rejected_at_registration() {
    let mapper = widget_mapper();
    let default = default_construction(
        mapper.context(),
        rule_set_for(RuleSetKind::CreateNew),
        &TypeRef::named("Source"),
        &TypeRef::named("Widget"),
    )
    .unwrap();

    let mut mapper = mapper;
    let err = mapper
        .configure_factory("Source", "Widget", default, None)
        .unwrap_err();
    assert!(matches!(err, PlanCompileError::RedundantFactory { .. }));
}

#[test]
fn conditional_factory_cascades_to_constructor() {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(Shape::record("Input").with_member("Kind", TypeRef::String))
        .unwrap();
    mapper
        .register_shape(Shape::record("Output").with_member("Tag", TypeRef::String))
        .unwrap();

    // A factory that only applies when the source carries a kind.
    mapper
        .configure_factory(
            "Input",
            "Output",
            Expr::Construct {
                shape: "Output".into(),
                params: vec!["Tag".into()],
                args: vec![Expr::constant(Value::from("made"))],
            }
            .rf(),
            Some(Expr::not_null(read(source(), "Kind", TypeRef::String))),
        )
        .unwrap();

    let tagged = Value::object_from("Input", [("Kind", Value::from("x"))]);
    let out = mapper.map_to_new(&tagged, &TypeRef::named("Output")).unwrap();
    assert_eq!(out.get_member("Tag"), Value::from("made"));

    let untagged = Value::object_from("Input", [("Kind", Value::Null)]);
    let out = mapper.map_to_new(&untagged, &TypeRef::named("Output")).unwrap();
    assert_eq!(out.get_member("Tag"), Value::Null);
}

#[test]
fn callbacks_wrap_member_population_in_order() {
    let mut mapper = customer_mapper();
    let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(vec![]));

    let before_log = log.clone();
    mapper
        .add_callback(CallbackPosition::Before, "CustomerDto", "Name", move |_, target| {
            assert!(target.get_member("Name").is_null());
            before_log.borrow_mut().push("before");
        })
        .unwrap();
    let after_log = log.clone();
    mapper
        .add_callback(CallbackPosition::After, "CustomerDto", "Name", move |_, target| {
            assert_eq!(target.get_member("Name"), Value::from("Alice"));
            after_log.borrow_mut().push("after");
        })
        .unwrap();

    mapper
        .map_to_new(&customer("Alice", 34), &TypeRef::named("CustomerDto"))
        .unwrap();
    assert_eq!(*log.borrow(), vec!["before", "after"]);
}

#[test]
fn unknown_callback_member_is_a_configuration_error() {
    let mut mapper = customer_mapper();
    let err = mapper
        .add_callback(CallbackPosition::Before, "CustomerDto", "Missing", |_, _| {})
        .unwrap_err();
    assert!(matches!(err, PlanCompileError::UnknownMember { .. }));
}
