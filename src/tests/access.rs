// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use super::common::{read, source};
use crate::access::find_nested_accesses;
use crate::ir::{Expr, Function, RootAccess};
use crate::shape::TypeRef;

fn rendered(accesses: &[crate::ir::ExprRef]) -> Vec<String> {
    accesses.iter().map(|a| a.to_string()).collect()
}

#[test]
fn guards_cover_path_prefixes_shortest_first() {
    // a and a.b guard the read of a.b.c; the int leaf needs no guard.
    let a = read(source(), "a", TypeRef::named("A"));
    let b = read(a, "b", TypeRef::named("B"));
    let c = read(b, "c", TypeRef::Int);
    let expr = Expr::Call {
        func: Function::Convert(TypeRef::String),
        args: vec![c],
    }
    .rf();

    let guards = find_nested_accesses(&expr, false);
    assert_eq!(rendered(&guards), vec!["Source.a", "Source.a.b"]);
}

#[test]
fn repeated_sub_paths_recorded_once() {
    let left = read(read(source(), "a", TypeRef::named("A")), "b", TypeRef::named("B"));
    let right = read(read(source(), "a", TypeRef::named("A")), "b", TypeRef::named("B"));
    let expr = Expr::coalesce(left, right);

    let guards = find_nested_accesses(&expr, false);
    assert_eq!(rendered(&guards), vec!["Source.a", "Source.a.b"]);
}

#[test]
fn prior_null_check_marks_subject_guarded() {
    let a = read(source(), "a", TypeRef::named("A"));
    let expr = Expr::conditional(
        Expr::not_null(a.clone()),
        read(a, "b", TypeRef::named("B")),
        Expr::null(),
    );

    let guards = find_nested_accesses(&expr, false);
    assert_eq!(rendered(&guards), vec!["Source.a.b"]);
}

#[test]
fn string_expressions_guarded_only_when_read_from() {
    // A bare string read is not guarded.
    let bare = read(source(), "s", TypeRef::String);
    assert!(find_nested_accesses(&bare, false).is_empty());

    // The same read as the subject of a conversion is.
    let converted = Expr::Call {
        func: Function::Convert(TypeRef::Int),
        args: vec![read(source(), "s", TypeRef::String)],
    }
    .rf();
    let guards = find_nested_accesses(&converted, false);
    assert_eq!(rendered(&guards), vec!["Source.s"]);
}

#[test]
fn context_roots_are_whitelisted() {
    assert!(find_nested_accesses(&source(), false).is_empty());
    assert!(find_nested_accesses(&Expr::Root(RootAccess::ElementIndex).rf(), false).is_empty());

    // The target reference is guarded only on request.
    let target = Expr::Root(RootAccess::Target).rf();
    assert!(find_nested_accesses(&target, false).is_empty());
    let guards = find_nested_accesses(&Expr::Root(RootAccess::Target).rf(), true);
    assert_eq!(rendered(&guards), vec!["Target"]);
}

#[test]
fn locals_are_not_guarded() {
    let local_chain = read(Expr::Local("scratch".into()).rf(), "a", TypeRef::named("A"));
    assert!(find_nested_accesses(&local_chain, false).is_empty());
}
