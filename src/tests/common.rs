// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Shared fixtures for the mapping tests.

use crate::config::{rule_set_for, RuleSetKind};
use crate::ir::{Expr, ExprRef, RootAccess};
use crate::member::MemberMapperData;
use crate::shape::{Shape, TypeRef};
use crate::value::Value;
use crate::Mapper;

use std::rc::Rc;

pub fn source() -> ExprRef {
    Expr::Root(RootAccess::Source).rf()
}

pub fn read(object: ExprRef, member: &str, ty: TypeRef) -> ExprRef {
    Expr::member_read(object, &Rc::from(member), ty)
}

/// A mapper with the Customer/CustomerDto pair and their nested address
/// shapes registered.
pub fn customer_mapper() -> Mapper {
    let mut mapper = Mapper::new();
    mapper
        .register_shape(
            Shape::record("Address").with_member("Line1", TypeRef::String),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("AddressDto").with_member("Line1", TypeRef::String),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("Customer")
                .with_member("Name", TypeRef::String)
                .with_member("Age", TypeRef::Int)
                .with_member("Address", TypeRef::named("Address")),
        )
        .unwrap();
    mapper
        .register_shape(
            Shape::record("CustomerDto")
                .with_member("Name", TypeRef::String)
                .with_member("Age", TypeRef::Int)
                .with_member("Address", TypeRef::named("AddressDto")),
        )
        .unwrap();
    mapper
}

pub fn customer(name: &str, age: i64) -> Value {
    Value::object_from(
        "Customer",
        [("Name", Value::from(name)), ("Age", Value::from(age))],
    )
}

/// Compile-time member context for one target member, the way the plan
/// builder creates them.
pub fn member_data<'a>(
    mapper: &'a Mapper,
    kind: RuleSetKind,
    source_shape: &str,
    target_shape: &str,
    member: &str,
) -> MemberMapperData<'a> {
    let ctx = mapper.context();
    let source_ty = ctx.shapes.get(source_shape).unwrap().type_ref();
    let target = ctx.shapes.get(target_shape).unwrap();
    let member = target.member(member).unwrap().clone();
    MemberMapperData::for_member(
        ctx,
        rule_set_for(kind),
        source_ty,
        target.type_ref(),
        vec![],
        &member,
        Expr::Local("instance".into()).rf(),
    )
}
