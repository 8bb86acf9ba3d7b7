// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::datasource::{fallback_source_for, DataSource};
use crate::ir::{Expr, ExprRef, Function, Stmt};
use crate::member::MemberMapperData;
use crate::naming::to_camel;
use crate::number::Number;
use crate::shape::{Classification, TypeRef};
use crate::value::Value;

use std::rc::Rc;

/// The map-time data source for string-keyed, untyped source containers.
///
/// Untyped keyed payloads commonly flatten nested and collection data using
/// composite and bracket-indexed keys; this source lets such payloads
/// populate strongly-typed graphs without a schema.
#[derive(Debug, Clone, Default)]
pub struct DictionaryDataSourceFactory;

impl DictionaryDataSourceFactory {
    pub fn is_for(&self, data: &MemberMapperData) -> bool {
        let TypeRef::Dictionary(value_ty) = data.source_ty.non_nullable() else {
            return false;
        };

        if data.target_is(Classification::Enumerable) {
            let element = data
                .target_member
                .element_type()
                .cloned()
                .unwrap_or(TypeRef::Any);
            return matches!(value_ty.as_ref(), TypeRef::Any)
                || value_ty.is_enumerable()
                || *value_ty.as_ref() == element
                || data.ctx.converters.can_convert(value_ty, &element);
        }

        data.ctx
            .converters
            .can_convert(value_ty, data.target_member.ty())
    }

    pub fn create(&self, data: &MemberMapperData) -> DataSource {
        let value_ty = match data.source_ty.non_nullable() {
            TypeRef::Dictionary(v) => v.as_ref().clone(),
            _ => TypeRef::Any,
        };

        let var: Rc<str> = to_camel(&data.target_member.name()).into();
        let names = potential_names(data);

        let try_get = Expr::DictTryGet {
            dict: data.source_object.clone(),
            keys: names
                .iter()
                .map(|n| Expr::constant(Value::String(n.clone())))
                .collect(),
            var: var.clone(),
        }
        .rf();

        let hit = hit_value(&var, &value_ty, data);
        let miss = miss_value(&var, &names, &value_ty, data);
        let value = Expr::conditional(try_get, hit, miss);

        DataSource::new(None, value, None)
            .with_variables(vec![(var, Expr::constant(Value::Undefined))])
    }
}

/// Candidate key names for the member path: single-level members expand via
/// the alternate-name generator; multi-level paths expand per segment and
/// join into composite keys.
fn potential_names(data: &MemberMapperData) -> Vec<Rc<str>> {
    let segments = data.key_segments();
    let alternates: Vec<Vec<Rc<str>>> = segments
        .iter()
        .map(|s| data.ctx.naming.alternate_names_for(s))
        .collect();

    if alternates.len() == 1 {
        alternates.into_iter().next().unwrap_or_default()
    } else {
        data.ctx.naming.joined_names_for(&alternates)
    }
}

/// What a successful probe produces: simple targets convert the retrieved
/// value; enumerable targets reconcile it as a sequence.
fn hit_value(var: &Rc<str>, value_ty: &TypeRef, data: &MemberMapperData) -> ExprRef {
    let retrieved = Expr::Local(var.clone()).rf();
    if data.target_is(Classification::Simple) {
        return data
            .ctx
            .converters
            .conversion(retrieved, value_ty, data.target_member.ty());
    }
    Expr::MapElements {
        source: retrieved,
        source_ty: value_ty.clone(),
        target_ty: data.target_member.ty().clone(),
        existing: Some(data.target_member_access()),
    }
    .rf()
}

/// What a failed probe produces: the rule set's fallback for simple
/// targets; for enumerable targets, indexed probing first, falling through
/// to the fallback only when zero elements were collected.
fn miss_value(
    var: &Rc<str>,
    names: &[Rc<str>],
    value_ty: &TypeRef,
    data: &MemberMapperData,
) -> ExprRef {
    let fallback = fallback_source_for(data).value;
    if data.target_is(Classification::Simple) {
        return fallback;
    }
    let collected = indexed_probe(var, names, value_ty, data);
    Expr::coalesce(collected, fallback)
}

/// Probe `name[0]`, `name[1]`, … until a miss, collecting every hit into a
/// scratch list; evaluates to the mapped list, or null when nothing was
/// collected.
fn indexed_probe(
    var: &Rc<str>,
    names: &[Rc<str>],
    value_ty: &TypeRef,
    data: &MemberMapperData,
) -> ExprRef {
    let list: Rc<str> = "sourceList".into();
    let counter: Rc<str> = "i".into();

    let indexed_keys: Vec<ExprRef> = names
        .iter()
        .map(|name| {
            Expr::Call {
                func: Function::Concat,
                args: vec![
                    Expr::constant(Value::String(format!("{name}[").into())),
                    Expr::Call {
                        func: Function::Convert(TypeRef::String),
                        args: vec![Expr::Local(counter.clone()).rf()],
                    }
                    .rf(),
                    Expr::constant(Value::String("]".into())),
                ],
            }
            .rf()
        })
        .collect();

    let try_get = Expr::DictTryGet {
        dict: data.source_object.clone(),
        keys: indexed_keys,
        var: var.clone(),
    }
    .rf();

    let body = vec![
        Stmt::If {
            test: Expr::Not(try_get).rf(),
            then: vec![Stmt::Break],
            otherwise: vec![],
        },
        Stmt::ListPush {
            local: list.clone(),
            value: Expr::Local(var.clone()).rf(),
        },
        Stmt::Increment {
            local: counter.clone(),
        },
    ];

    let mapped = Expr::MapElements {
        source: Expr::Local(list.clone()).rf(),
        source_ty: TypeRef::list(value_ty.clone()),
        target_ty: data.target_member.ty().clone(),
        existing: Some(data.target_member_access()),
    }
    .rf();

    Expr::Block(crate::ir::Block {
        vars: vec![
            (
                list.clone(),
                Expr::Call {
                    func: Function::NewList,
                    args: vec![],
                }
                .rf(),
            ),
            (counter, Expr::constant(Value::Number(Number::Int(0)))),
        ],
        stmts: vec![Stmt::Loop { body }],
        result: Expr::conditional(
            Expr::Call {
                func: Function::ListNotEmpty,
                args: vec![Expr::Local(list).rf()],
            }
            .rf(),
            mapped,
            Expr::null(),
        ),
    })
    .rf()
}
