// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::config::{CallbackPosition, MapperContext, RuleSet};
use crate::error::PlanCompileError;
use crate::ir::{Block, Expr, ExprRef, RootAccess, Stmt};
use crate::member::{whole_object_match, MemberMapperData, QualifiedMember};
use crate::naming::to_pascal;
use crate::plan::{plan_key, Construction, MappingPlan, PlanKind};
use crate::shape::{Constructor, Member, TypeRef};
use crate::value::Value;

use std::rc::Rc;

use anyhow::Result;
use log::debug;

/// Compile the mapping plan for one (source shape, target shape, rule set).
/// `prefix` is the target member path from the mapping root, carried for
/// plans nested under a dictionary source.
pub fn compile_plan(
    ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
) -> Result<Rc<MappingPlan>> {
    debug!(
        "compiling plan: {} -> {} ({})",
        source_ty, target_ty, rule_set.kind
    );
    if target_ty.is_enumerable() {
        compile_enumerable_plan(ctx, rule_set, source_ty, target_ty, prefix)
    } else {
        compile_complex_plan(ctx, rule_set, source_ty, target_ty, prefix)
    }
}

/// The complex-type plan: strategy short-circuits, existing-instance reuse,
/// object resolution, member population, return.
fn compile_complex_plan(
    ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
) -> Result<Rc<MappingPlan>> {
    let target_shape = ctx.shapes.resolve(target_ty)?;

    let whole = MemberMapperData {
        ctx,
        rule_set,
        source_ty: source_ty.clone(),
        target_root_ty: target_ty.clone(),
        name_prefix: prefix.to_vec(),
        source_member: QualifiedMember::root(source_ty.clone()),
        target_member: QualifiedMember::root(target_ty.clone()),
        source_object: Expr::Root(RootAccess::Source).rf(),
        target_object: Expr::Root(RootAccess::Target).rf(),
    };

    let mut vars: Vec<(Rc<str>, ExprRef)> = vec![];
    let mut stmts: Vec<Stmt> = vec![];

    // Strategy short-circuit: bind the best whole-object source match to a
    // local when it is not the source itself, then test the rule set's
    // short-circuit predicates against it.
    let match_expr = whole_object_match(&whole).map(|qm| {
        if qm.is_root() {
            whole.source_object.clone()
        } else {
            let local: Rc<str> = format!("matching{}", to_pascal(&qm.name())).into();
            vars.push((local.clone(), qm.access_expr(whole.source_object.clone())));
            Expr::Local(local).rf()
        }
    });

    if let Some(matched) = &match_expr {
        for condition in rule_set.short_circuit_conditions(matched) {
            stmts.push(Stmt::If {
                test: condition,
                then: vec![Stmt::Return(rule_set.initial_value_expr())],
                otherwise: vec![],
            });
        }

        // Existing-instance reuse: a source already mapped in this call
        // resolves to the instance it produced, possibly before that
        // instance is fully populated.
        let existing: Rc<str> = "existingTarget".into();
        vars.push((
            existing.clone(),
            Expr::RegistryFetch {
                source: matched.clone(),
                target_ty: target_ty.clone(),
            }
            .rf(),
        ));
        stmts.push(Stmt::If {
            test: Expr::not_null(Expr::Local(existing.clone()).rf()),
            then: vec![Stmt::Return(Expr::Local(existing).rf())],
            otherwise: vec![],
        });
    }

    // Object resolution: reuse a caller-supplied target, else construct;
    // register the instance before populating members so cyclic references
    // resolve to it.
    let construction = construction_strategy(ctx, rule_set, source_ty, target_ty, prefix)?;
    vars.extend(construction.variables.iter().cloned());

    let instance: Rc<str> = "instance".into();
    vars.push((instance.clone(), Expr::constant(Value::Undefined)));
    stmts.push(Stmt::Assign {
        local: instance.clone(),
        value: Expr::coalesce(
            Expr::Root(RootAccess::Target).rf(),
            construction.expr.clone(),
        ),
    });
    stmts.push(Stmt::RegistryRecord {
        source: Expr::Root(RootAccess::Source).rf(),
        target: Expr::Local(instance.clone()).rf(),
        target_ty: target_ty.clone(),
    });

    // Member population: members with no valid source are skipped, never
    // assigned.
    let mut type_tests = vec![];
    for member in target_shape.members() {
        let member_data = MemberMapperData::for_member(
            ctx,
            rule_set,
            source_ty.clone(),
            target_ty.clone(),
            prefix.to_vec(),
            member,
            Expr::Local(instance.clone()).rf(),
        );

        let set = ctx.finder.find_for(&member_data);
        if set.none || !set.has_value {
            continue;
        }
        if let Some(test) = &set.source_member_type_test {
            type_tests.push(test.clone());
        }
        vars.extend(set.variables.iter().cloned());

        let Some(population) = set.population(&member_data) else {
            continue;
        };
        stmts.extend(with_callbacks(ctx, target_ty, member, population, &instance));
    }

    stmts.push(Stmt::Return(Expr::Local(instance.clone()).rf()));

    Ok(Rc::new(MappingPlan {
        key: plan_key(
            source_ty.signature(),
            target_ty,
            prefix,
            rule_set.kind,
            PlanKind::Mapper,
        ),
        rule_set: rule_set.kind,
        body: Block {
            vars,
            stmts,
            result: Expr::Local(instance).rf(),
        },
        source_type_test: Expr::and_together(type_tests),
    }))
}

/// The enumerable-target plan: the same short-circuit contract, with
/// element reconciliation delegated to the adapter.
fn compile_enumerable_plan(
    _ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
) -> Result<Rc<MappingPlan>> {
    let source = Expr::Root(RootAccess::Source).rf();
    let stmts = vec![
        Stmt::If {
            test: Expr::is_null(source.clone()),
            then: vec![Stmt::Return(rule_set.initial_value_expr())],
            otherwise: vec![],
        },
        Stmt::Return(
            Expr::MapElements {
                source,
                source_ty: source_ty.clone(),
                target_ty: target_ty.clone(),
                existing: Some(Expr::Root(RootAccess::Target).rf()),
            }
            .rf(),
        ),
    ];

    Ok(Rc::new(MappingPlan {
        key: plan_key(
            source_ty.signature(),
            target_ty,
            prefix,
            rule_set.kind,
            PlanKind::Mapper,
        ),
        rule_set: rule_set.kind,
        body: Block {
            vars: vec![],
            stmts,
            result: Expr::null(),
        },
        source_type_test: None,
    }))
}

/// Wrap a member's population with its registered callbacks, only when at
/// least one is registered.
fn with_callbacks(
    ctx: &MapperContext,
    target_ty: &TypeRef,
    member: &Member,
    population: Vec<Stmt>,
    instance: &Rc<str>,
) -> Vec<Stmt> {
    let target_sig = target_ty.signature();
    let before = ctx
        .user_config
        .callbacks_for(CallbackPosition::Before, &target_sig, &member.name);
    let after = ctx
        .user_config
        .callbacks_for(CallbackPosition::After, &target_sig, &member.name);

    if before.is_empty() && after.is_empty() {
        return population;
    }

    let invoke = |callback| Stmt::Invoke {
        callback,
        source: Expr::Root(RootAccess::Source).rf(),
        target: Expr::Local(instance.clone()).rf(),
    };

    let mut wrapped: Vec<Stmt> = before.into_iter().map(invoke).collect();
    wrapped.extend(population);
    wrapped.extend(after.into_iter().map(invoke));
    wrapped
}

/// Resolve how a new target instance is produced, cached per shape pair and
/// rule set. Configured factories are walked in configuration order, each
/// inserted at the front of the candidate list; the scan stops at the first
/// unconditional factory, and the built-in constructor is then never
/// considered. Survivors compose into a conditional cascade with the
/// constructor as the ultimate fallback.
fn construction_strategy(
    ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
) -> Result<Rc<Construction>> {
    let key = plan_key(
        source_ty.signature(),
        target_ty,
        prefix,
        rule_set.kind,
        PlanKind::Construction,
    );

    ctx.cache.get_or_add_construction(key, ctx.revision(), || {
        let mut candidates: Vec<(ExprRef, Option<ExprRef>)> = vec![];
        let mut variables = vec![];
        let mut constructor_required = true;

        let source_sig = source_ty.signature();
        let target_sig = target_ty.signature();
        for factory in ctx
            .user_config
            .object_factories_for(&source_sig, &target_sig)
        {
            candidates.insert(0, (factory.factory.clone(), factory.condition.clone()));
            if factory.condition.is_none() {
                constructor_required = false;
                break;
            }
        }

        if constructor_required {
            if let Some((expr, ctor_vars)) =
                greediest_constructor(ctx, rule_set, source_ty, target_ty, prefix)
            {
                candidates.insert(0, (expr, None));
                variables = ctor_vars;
            }
        }

        let mut remaining = candidates.into_iter();
        let Some((seed, _)) = remaining.next() else {
            return Err(PlanCompileError::NotConstructable {
                src_ty: source_ty.signature(),
                target: target_ty.signature(),
                rule_set: rule_set.kind.name().to_string(),
            }
            .into());
        };
        let expr = remaining.fold(seed, |so_far, (candidate, condition)| match condition {
            Some(test) => Expr::conditional(test, candidate, so_far),
            None => candidate,
        });

        Ok(Rc::new(Construction { expr, variables }))
    })
}

/// The usable constructor with the most parameters; ties broken by
/// declaration order. A constructor is usable only when every parameter,
/// resolved as a pseudo target member, has a valued data source set.
fn greediest_constructor(
    ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
) -> Option<(ExprRef, Vec<(Rc<str>, ExprRef)>)> {
    let shape = ctx.shapes.resolve(target_ty).ok()?;

    // A record declaring no constructors has an implicit parameterless one.
    let declared = shape.constructors();
    let implicit = [Constructor { params: vec![] }];
    let constructors: &[Constructor] = if declared.is_empty() {
        &implicit
    } else {
        declared
    };

    let mut best: Option<(usize, ExprRef, Vec<(Rc<str>, ExprRef)>)> = None;
    for constructor in constructors {
        let mut args = vec![];
        let mut param_names = vec![];
        let mut ctor_vars = vec![];
        let mut usable = true;

        for param in &constructor.params {
            let pseudo = Member::new(&param.name, param.ty.clone());
            let param_data = MemberMapperData::for_member(
                ctx,
                rule_set,
                source_ty.clone(),
                target_ty.clone(),
                prefix.to_vec(),
                &pseudo,
                Expr::Root(RootAccess::Target).rf(),
            );
            let set = ctx.finder.find_for(&param_data);
            let Some(value) = set.value_expr().filter(|_| set.has_value) else {
                usable = false;
                break;
            };
            ctor_vars.extend(set.variables.iter().cloned());
            param_names.push(param.name.clone());
            args.push(value);
        }
        if !usable {
            continue;
        }

        let params = constructor.params.len();
        if best.as_ref().map(|(n, ..)| params > *n).unwrap_or(true) {
            let expr = Expr::Construct {
                shape: shape.name.clone(),
                params: param_names,
                args,
            }
            .rf();
            best = Some((params, expr, ctor_vars));
        }
    }

    best.map(|(_, expr, ctor_vars)| (expr, ctor_vars))
}

/// What the default construction strategy would produce for a shape pair,
/// ignoring configured factories. Used to reject factories that duplicate
/// it.
pub fn default_construction(
    ctx: &MapperContext,
    rule_set: &'static RuleSet,
    source_ty: &TypeRef,
    target_ty: &TypeRef,
) -> Option<ExprRef> {
    greediest_constructor(ctx, rule_set, source_ty, target_ty, &[]).map(|(expr, _)| expr)
}
