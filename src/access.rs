// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ir::{Expr, ExprRef, RootAccess, Stmt};
use crate::shape::TypeRef;

use std::collections::BTreeSet;

/// Find the nested accesses of a generated expression that need null guards.
///
/// A pure function: expression in, ordered guard list out. Guards come back
/// with shorter (outer-prefix) paths first, the order in which a
/// left-to-right short-circuiting conjunction must test them.
///
/// Rules:
/// - member chains rooted in a context accessor are guard-eligible; the
///   accessors themselves are not, except the target reference when
///   `target_can_be_null` is requested;
/// - a sub-expression already tested by a `NotNull` inside the expression is
///   not guarded again;
/// - string-typed sub-expressions are guarded only when something was read
///   off them;
/// - each distinct path is recorded at most once.
pub fn find_nested_accesses(expr: &ExprRef, target_can_be_null: bool) -> Vec<ExprRef> {
    let mut finder = Finder {
        target_can_be_null,
        string_subjects: BTreeSet::new(),
        null_checked: BTreeSet::new(),
        seen: BTreeSet::new(),
        accesses: vec![],
    };
    finder.visit(expr);
    // Discovery order is longest-path-first; emit shortest-first.
    finder.accesses.reverse();
    finder.accesses
}

struct Finder {
    target_can_be_null: bool,
    string_subjects: BTreeSet<String>,
    null_checked: BTreeSet<String>,
    seen: BTreeSet<String>,
    accesses: Vec<ExprRef>,
}

impl Finder {
    fn visit(&mut self, expr: &ExprRef) {
        match expr.as_ref() {
            Expr::NotNull(inner) => {
                self.null_checked.insert(inner.to_string());
                self.visit(inner);
            }
            Expr::MemberRead { object, .. } => {
                if is_rooted_in_context(expr) {
                    self.record_string_subject(object);
                    self.add_if_appropriate(expr);
                }
                self.visit(object);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.record_string_subject(arg);
                }
                for arg in args {
                    self.visit(arg);
                }
            }
            Expr::Root(RootAccess::Target) => {
                if self.target_can_be_null {
                    self.add_if_appropriate(expr);
                }
            }
            Expr::Root(_) | Expr::Local(_) | Expr::Constant(_) | Expr::Default(_) => {}
            Expr::TypeIs { expr: inner, .. } | Expr::Not(inner) => self.visit(inner),
            Expr::And(l, r) => {
                self.visit(l);
                self.visit(r);
            }
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                self.visit(test);
                self.visit(then);
                self.visit(otherwise);
            }
            Expr::Coalesce { left, right } => {
                self.visit(left);
                self.visit(right);
            }
            Expr::Block(block) => {
                for (_, init) in &block.vars {
                    self.visit(init);
                }
                for stmt in &block.stmts {
                    self.visit_stmt(stmt);
                }
                self.visit(&block.result);
            }
            Expr::DictTryGet { dict, keys, .. } => {
                self.visit(dict);
                for key in keys {
                    self.visit(key);
                }
            }
            Expr::Construct { args, .. } => {
                for arg in args {
                    self.visit(arg);
                }
            }
            Expr::MapObject {
                source, existing, ..
            } => {
                self.visit(source);
                if let Some(existing) = existing {
                    self.visit(existing);
                }
            }
            Expr::MapElements {
                source, existing, ..
            } => {
                self.visit(source);
                if let Some(existing) = existing {
                    self.visit(existing);
                }
            }
            Expr::RegistryFetch { source, .. } => self.visit(source),
        }
    }

    fn visit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Assign { value, .. } | Stmt::Return(value) | Stmt::ListPush { value, .. } => {
                self.visit(value)
            }
            Stmt::SetMember { object, value, .. } => {
                self.visit(object);
                self.visit(value);
            }
            Stmt::If {
                test,
                then,
                otherwise,
            } => {
                self.visit(test);
                for s in then {
                    self.visit_stmt(s);
                }
                for s in otherwise {
                    self.visit_stmt(s);
                }
            }
            Stmt::Loop { body } => {
                for s in body {
                    self.visit_stmt(s);
                }
            }
            Stmt::RegistryRecord { source, target, .. } => {
                self.visit(source);
                self.visit(target);
            }
            Stmt::Invoke { source, target, .. } => {
                self.visit(source);
                self.visit(target);
            }
            Stmt::Break | Stmt::Increment { .. } => {}
        }
    }

    /// A string expression something is being read off becomes guardable.
    fn record_string_subject(&mut self, expr: &ExprRef) {
        if matches!(expr.declared_type(), Some(TypeRef::String)) && is_rooted_in_context(expr) {
            self.string_subjects.insert(expr.to_string());
        }
    }

    fn add_if_appropriate(&mut self, expr: &ExprRef) {
        let rendered = expr.to_string();
        if self.null_checked.contains(&rendered) || self.seen.contains(&rendered) {
            return;
        }

        let (can_be_null, is_string) = match expr.as_ref() {
            Expr::MemberRead { ty, .. } => (ty.can_be_null(), *ty.non_nullable() == TypeRef::String),
            Expr::Root(RootAccess::Target) => (true, false),
            _ => return,
        };
        if !can_be_null {
            return;
        }
        if is_string && !self.string_subjects.contains(&rendered) {
            return;
        }
        if !is_rooted_in_context(expr) {
            return;
        }

        self.seen.insert(rendered);
        self.accesses.push(expr.clone());
    }
}

/// Whether a member chain bottoms out at a context accessor.
fn is_rooted_in_context(expr: &ExprRef) -> bool {
    match expr.as_ref() {
        Expr::Root(_) => true,
        Expr::MemberRead { object, .. } => is_rooted_in_context(object),
        _ => false,
    }
}
