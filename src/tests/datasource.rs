// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::{customer_mapper, member_data, read, source};
use crate::config::RuleSetKind;
use crate::datasource::{fallback_source_for, DataSource, DataSourceSet};
use crate::ir::{Expr, Stmt};
use crate::shape::TypeRef;
use crate::value::Value;

fn constant_source(v: &str) -> DataSource {
    DataSource::new(None, Expr::constant(Value::from(v)), None)
}

fn conditional_source(v: &str, condition: crate::ir::ExprRef) -> DataSource {
    let mut source = constant_source(v);
    source.condition = Some(condition);
    source
}

#[test]
fn unconditional_first_source_wins() {
    // Position 0 is unconditional: sources 1..N are unreachable.
    let set = DataSourceSet::new(vec![
        constant_source("first"),
        constant_source("second"),
        constant_source("third"),
    ]);

    let value = set.value_expr().unwrap();
    assert!(value.equivalent(&Expr::constant(Value::from("first"))));
}

#[test]
fn conditional_sources_chain_to_the_fallback() {
    let cond = Expr::not_null(read(source(), "Name", TypeRef::String));
    let set = DataSourceSet::new(vec![
        conditional_source("matched", cond.clone()),
        constant_source("fallback"),
    ]);

    let expected = Expr::conditional(
        cond,
        Expr::constant(Value::from("matched")),
        Expr::constant(Value::from("fallback")),
    );
    assert!(set.value_expr().unwrap().equivalent(&expected));
}

#[test]
fn population_assigns_fallback_when_condition_fails() {
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");

    let cond = Expr::not_null(read(source(), "Name", TypeRef::String));
    let set = DataSourceSet::new(vec![
        conditional_source("matched", cond),
        fallback_source_for(&data),
    ]);

    // if (cond) assign(matched) else assign(default)
    let population = set.population(&data).unwrap();
    assert_eq!(population.len(), 1);
    let Stmt::If {
        then, otherwise, ..
    } = &population[0]
    else {
        panic!("expected a conditional population");
    };
    assert!(matches!(&then[0], Stmt::SetMember { value, .. }
        if value.equivalent(&Expr::constant(Value::from("matched")))));
    assert!(matches!(&otherwise[0], Stmt::SetMember { value, .. }
        if value.equivalent(&Expr::Default(TypeRef::String).rf())));
}

#[test]
fn keep_current_value_fallback_skips_assignment() {
    // Merge's fallback is "read the member's current value": no fallback
    // assignment is emitted at all.
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::Merge, "Customer", "CustomerDto", "Name");

    let cond = Expr::not_null(read(source(), "Name", TypeRef::String));
    let set = DataSourceSet::new(vec![
        conditional_source("matched", cond),
        fallback_source_for(&data),
    ]);

    let population = set.population(&data).unwrap();
    assert_eq!(population.len(), 1);
    let Stmt::If { otherwise, .. } = &population[0] else {
        panic!("expected a conditional population");
    };
    assert!(otherwise.is_empty());
}

#[test]
fn coalesce_fallback_unwraps_to_right_hand_side() {
    let coalesced = DataSource::new(
        None,
        Expr::coalesce(
            read(source(), "Name", TypeRef::String),
            Expr::constant(Value::from("backup")),
        ),
        None,
    );
    let mapper = customer_mapper();
    let data = member_data(&mapper, RuleSetKind::CreateNew, "Customer", "CustomerDto", "Name");

    let population = DataSourceSet::new(vec![coalesced]).population(&data).unwrap();
    assert!(matches!(&population[0], Stmt::SetMember { value, .. }
        if value.equivalent(&Expr::constant(Value::from("backup")))));
}

#[test]
fn later_type_test_overrides_earlier() {
    let test_a = Expr::TypeIs {
        expr: source(),
        shape: "A".into(),
    }
    .rf();
    let test_b = Expr::TypeIs {
        expr: source(),
        shape: "B".into(),
    }
    .rf();

    let set = DataSourceSet::new(vec![
        constant_source("one").with_type_test(test_a),
        constant_source("two").with_type_test(test_b.clone()),
    ]);
    assert_eq!(set.source_member_type_test, Some(test_b));
}

#[test]
fn variables_union_preserves_order() {
    let set = DataSourceSet::new(vec![
        constant_source("one")
            .with_variables(vec![("a".into(), Expr::null())]),
        constant_source("two")
            .with_variables(vec![("b".into(), Expr::null()), ("c".into(), Expr::null())]),
    ]);
    let names: Vec<&str> = set.variables.iter().map(|(n, _)| n.as_ref()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn empty_set_has_no_value() {
    let set = DataSourceSet::new(vec![]);
    assert!(set.none);
    assert!(!set.has_value);
    assert!(set.value_expr().is_none());
}
