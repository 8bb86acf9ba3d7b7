// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builder::compile_plan;
use crate::config::{rule_set_for, MapperContext, RuleSet, RuleSetKind};
use crate::ir::{Block, Expr, ExprRef, Function, RootAccess, Stmt};
use crate::plan::{plan_key, MappingPlan, PlanKind};
use crate::shape::{Classification, TypeRef};
use crate::value::Value;

use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::{anyhow, bail, Result};

/// Executes compiled plans against live values.
///
/// One executor lives for one top-level mapping call; its identity registry
/// maps already-mapped source identities to the targets they produced, which
/// bounds cyclic graphs and keeps shared references shared.
pub struct Executor<'a> {
    ctx: &'a MapperContext,
    rule_set: &'static RuleSet,
    registry: BTreeMap<(usize, String), Value>,
}

enum Flow {
    Normal,
    Break,
    Return(Value),
}

struct Scope {
    source: Value,
    target: Value,
    index: Value,
    frames: Vec<BTreeMap<Rc<str>, Value>>,
}

impl Scope {
    fn new(source: Value, target: Value, index: Option<i64>) -> Scope {
        Scope {
            source,
            target,
            index: index.map(Value::from).unwrap_or(Value::Undefined),
            frames: vec![],
        }
    }

    fn push(&mut self) {
        self.frames.push(BTreeMap::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn define(&mut self, name: &Rc<str>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.clone(), value);
        }
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Ok(v.clone());
            }
        }
        Err(anyhow!("unbound local '{name}'"))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return Ok(());
            }
        }
        bail!("unbound local '{name}'")
    }
}

/// The runtime type of a live source value, narrowing its declared type
/// when the value carries a registered shape tag. Untagged objects are
/// string-keyed containers.
fn runtime_source_type(ctx: &MapperContext, source: &Value, declared: &TypeRef) -> TypeRef {
    match source {
        Value::Object(_) => match source.shape_name() {
            Some(tag) => match ctx.shapes.get(&tag) {
                Some(shape) => shape.type_ref(),
                None => declared.clone(),
            },
            None => TypeRef::dictionary(TypeRef::Any),
        },
        Value::Array(_) if !declared.is_enumerable() => TypeRef::list(TypeRef::Any),
        _ => declared.clone(),
    }
}

impl<'a> Executor<'a> {
    pub fn new(ctx: &'a MapperContext, kind: RuleSetKind) -> Executor<'a> {
        Executor {
            ctx,
            rule_set: rule_set_for(kind),
            registry: BTreeMap::new(),
        }
    }

    /// Map a source value into the target type, reusing `existing` when the
    /// intent supplies one.
    pub fn map(
        &mut self,
        source: &Value,
        existing: Option<&Value>,
        declared_source_ty: &TypeRef,
        target_ty: &TypeRef,
    ) -> Result<Value> {
        self.map_value(source, existing, declared_source_ty, target_ty, &[], None)
    }

    fn map_value(
        &mut self,
        source: &Value,
        existing: Option<&Value>,
        declared_source_ty: &TypeRef,
        target_ty: &TypeRef,
        prefix: &[Rc<str>],
        index: Option<i64>,
    ) -> Result<Value> {
        if source.is_nullish() {
            return Ok(self.no_source_result(existing));
        }
        // An untyped target cannot be planned for; the source passes
        // through as-is.
        if matches!(target_ty.non_nullable(), TypeRef::Any) {
            return Ok(source.clone());
        }
        let plan = self.plan_for(source, declared_source_ty, target_ty, prefix)?;
        self.run(&plan, source, existing, index)
    }

    /// The rule set's initial value: what "no source" means.
    fn no_source_result(&self, existing: Option<&Value>) -> Value {
        match self.rule_set.kind {
            RuleSetKind::CreateNew => Value::Null,
            RuleSetKind::Merge | RuleSetKind::Overwrite => {
                existing.cloned().unwrap_or(Value::Null)
            }
        }
    }

    /// Resolve the compiled plan for a source value through the cache,
    /// compiling on first use.
    fn plan_for(
        &mut self,
        source: &Value,
        declared_source_ty: &TypeRef,
        target_ty: &TypeRef,
        prefix: &[Rc<str>],
    ) -> Result<Rc<MappingPlan>> {
        let source_ty = runtime_source_type(self.ctx, source, declared_source_ty);
        let key = plan_key(
            source_ty.signature(),
            target_ty,
            prefix,
            self.rule_set.kind,
            PlanKind::Mapper,
        );
        let ctx = self.ctx;
        let rule_set = self.rule_set;
        ctx.cache.get_or_add_plan(key, ctx.revision(), || {
            compile_plan(ctx, rule_set, &source_ty, target_ty, prefix)
        })
    }

    fn run(
        &mut self,
        plan: &MappingPlan,
        source: &Value,
        existing: Option<&Value>,
        index: Option<i64>,
    ) -> Result<Value> {
        let mut scope = Scope::new(
            source.clone(),
            existing.cloned().unwrap_or(Value::Null),
            index,
        );
        scope.push();
        for (name, init) in &plan.body.vars {
            let v = self.eval(init, &mut scope)?;
            scope.define(name, v);
        }
        let result = match self.exec_stmts(&plan.body.stmts, &mut scope)? {
            Flow::Return(v) => v,
            Flow::Break => bail!("break escaped a plan body"),
            Flow::Normal => self.eval(&plan.body.result, &mut scope)?,
        };
        scope.pop();
        Ok(result)
    }

    fn eval(&mut self, expr: &ExprRef, scope: &mut Scope) -> Result<Value> {
        Ok(match expr.as_ref() {
            Expr::Constant(v) => v.clone(),
            Expr::Default(ty) => ty.default_value(),
            Expr::Root(RootAccess::Source) => scope.source.clone(),
            Expr::Root(RootAccess::Target) => scope.target.clone(),
            Expr::Root(RootAccess::ElementIndex) => scope.index.clone(),
            Expr::Local(name) => scope.lookup(name)?,
            Expr::MemberRead { object, member, .. } => {
                let obj = self.eval(object, scope)?;
                if obj.is_nullish() {
                    Value::Undefined
                } else {
                    obj.get_member(member)
                }
            }
            Expr::Call { func, args } => self.call(func, args, scope)?,
            Expr::NotNull(e) => Value::Bool(!self.eval(e, scope)?.is_nullish()),
            Expr::TypeIs { expr, shape } => {
                let v = self.eval(expr, scope)?;
                Value::Bool(
                    v.shape_name()
                        .map(|s| s.as_ref() == shape.as_ref())
                        .unwrap_or(false),
                )
            }
            Expr::And(l, r) => Value::Bool(self.truthy(l, scope)? && self.truthy(r, scope)?),
            Expr::Not(e) => Value::Bool(!self.truthy(e, scope)?),
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => {
                if self.truthy(test, scope)? {
                    self.eval(then, scope)?
                } else {
                    self.eval(otherwise, scope)?
                }
            }
            Expr::Coalesce { left, right } => {
                let l = self.eval(left, scope)?;
                if l.is_nullish() {
                    self.eval(right, scope)?
                } else {
                    l
                }
            }
            Expr::Block(block) => self.eval_block(block, scope)?,
            Expr::DictTryGet { dict, keys, var } => self.dict_try_get(dict, keys, var, scope)?,
            Expr::Construct {
                shape,
                params,
                args,
            } => self.construct(shape, params, args, scope)?,
            Expr::MapObject {
                source,
                source_ty,
                target_ty,
                existing,
                prefix,
            } => {
                let src = self.eval(source, scope)?;
                let existing_val = self.eval_existing(existing, scope)?;
                self.map_value(
                    &src,
                    existing_val.as_ref(),
                    source_ty,
                    target_ty,
                    prefix,
                    None,
                )?
            }
            Expr::MapElements {
                source,
                source_ty,
                target_ty,
                existing,
            } => {
                let src = self.eval(source, scope)?;
                let existing_val = self.eval_existing(existing, scope)?;
                self.reconcile(&src, existing_val, source_ty, target_ty)?
            }
            Expr::RegistryFetch { source, target_ty } => {
                let v = self.eval(source, scope)?;
                let hit = v
                    .identity()
                    .and_then(|id| self.registry.get(&(id, target_ty.signature())));
                match hit {
                    Some(target) => target.clone(),
                    None => Value::Undefined,
                }
            }
        })
    }

    fn eval_existing(
        &mut self,
        existing: &Option<ExprRef>,
        scope: &mut Scope,
    ) -> Result<Option<Value>> {
        match existing {
            Some(e) => {
                let v = self.eval(e, scope)?;
                Ok(if v.is_nullish() { None } else { Some(v) })
            }
            None => Ok(None),
        }
    }

    fn eval_block(&mut self, block: &Block, scope: &mut Scope) -> Result<Value> {
        scope.push();
        for (name, init) in &block.vars {
            let v = self.eval(init, scope)?;
            scope.define(name, v);
        }
        match self.exec_stmts(&block.stmts, scope)? {
            Flow::Normal => {}
            Flow::Break | Flow::Return(_) => bail!("control flow escaped an expression block"),
        }
        let result = self.eval(&block.result, scope)?;
        scope.pop();
        Ok(result)
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], scope: &mut Scope) -> Result<Flow> {
        for stmt in stmts {
            match stmt {
                Stmt::Assign { local, value } => {
                    let v = self.eval(value, scope)?;
                    scope.assign(local, v)?;
                }
                Stmt::SetMember {
                    object,
                    member,
                    value,
                } => {
                    let obj = self.eval(object, scope)?;
                    let v = self.eval(value, scope)?;
                    obj.set_member(member, v)?;
                }
                Stmt::If {
                    test,
                    then,
                    otherwise,
                } => {
                    let branch = if self.truthy(test, scope)? {
                        then
                    } else {
                        otherwise
                    };
                    match self.exec_stmts(branch, scope)? {
                        Flow::Normal => {}
                        flow => return Ok(flow),
                    }
                }
                Stmt::Loop { body } => loop {
                    match self.exec_stmts(body, scope)? {
                        Flow::Normal => {}
                        Flow::Break => break,
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                },
                Stmt::Break => return Ok(Flow::Break),
                Stmt::Return(e) => return Ok(Flow::Return(self.eval(e, scope)?)),
                Stmt::RegistryRecord {
                    source,
                    target,
                    target_ty,
                } => {
                    let src = self.eval(source, scope)?;
                    let tgt = self.eval(target, scope)?;
                    if let Some(id) = src.identity() {
                        self.registry.insert((id, target_ty.signature()), tgt);
                    }
                }
                Stmt::ListPush { local, value } => {
                    let v = self.eval(value, scope)?;
                    scope.lookup(local)?.push(v)?;
                }
                Stmt::Increment { local } => {
                    let current = scope.lookup(local)?.as_i64()?;
                    scope.assign(local, Value::from(current + 1))?;
                }
                Stmt::Invoke {
                    callback,
                    source,
                    target,
                } => {
                    let src = self.eval(source, scope)?;
                    let tgt = self.eval(target, scope)?;
                    (callback.0)(&src, &tgt);
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn truthy(&mut self, expr: &ExprRef, scope: &mut Scope) -> Result<bool> {
        match self.eval(expr, scope)? {
            Value::Bool(b) => Ok(b),
            Value::Undefined => Ok(false),
            other => bail!("expected a boolean condition, got {other}"),
        }
    }

    fn call(&mut self, func: &Function, args: &[ExprRef], scope: &mut Scope) -> Result<Value> {
        match func {
            Function::Convert(to) => {
                let [arg] = args else {
                    bail!("convert takes one argument");
                };
                let v = self.eval(arg, scope)?;
                Ok(self.ctx.converters.apply(&v, to))
            }
            Function::Concat => {
                let mut out = String::new();
                for arg in args {
                    let v = self.eval(arg, scope)?;
                    match v {
                        Value::String(s) => out.push_str(&s),
                        Value::Number(n) => out.push_str(&n.to_string()),
                        Value::Bool(b) => out.push_str(if b { "true" } else { "false" }),
                        Value::Null | Value::Undefined => {}
                        other => bail!("cannot concatenate {other}"),
                    }
                }
                Ok(Value::String(out.into()))
            }
            Function::ListNotEmpty => {
                let [arg] = args else {
                    bail!("notEmpty takes one argument");
                };
                let v = self.eval(arg, scope)?;
                Ok(Value::Bool(v.len().map(|n| n > 0).unwrap_or(false)))
            }
            Function::NewList => Ok(Value::new_array()),
        }
    }

    /// Intersect the container's keys with the candidate names
    /// case-insensitively, take the first match, retrieve it into `var`.
    fn dict_try_get(
        &mut self,
        dict: &ExprRef,
        keys: &[ExprRef],
        var: &Rc<str>,
        scope: &mut Scope,
    ) -> Result<Value> {
        let container = self.eval(dict, scope)?;
        let Ok(obj) = container.as_object() else {
            return Ok(Value::Bool(false));
        };
        let actual_keys = obj.keys();
        for key_expr in keys {
            let candidate = match self.eval(key_expr, scope)? {
                Value::String(s) => s,
                _ => continue,
            };
            if let Some(hit) = actual_keys
                .iter()
                .find(|k| k.eq_ignore_ascii_case(&candidate))
            {
                let value = obj.get(hit).unwrap_or(Value::Undefined);
                scope.assign(var, value)?;
                return Ok(Value::Bool(true));
            }
        }
        Ok(Value::Bool(false))
    }

    fn construct(
        &mut self,
        shape: &Rc<str>,
        params: &[Rc<str>],
        args: &[ExprRef],
        scope: &mut Scope,
    ) -> Result<Value> {
        let meta = self
            .ctx
            .shapes
            .get(shape)
            .ok_or_else(|| anyhow!("unknown shape '{shape}'"))?;

        let instance = Value::new_object(shape);
        for member in meta.members() {
            instance.set_member(&member.name, member.ty.default_value())?;
        }
        for (param, arg) in params.iter().zip(args.iter()) {
            let v = self.eval(arg, scope)?;
            let member_name = meta
                .member(param)
                .map(|m| m.name.clone())
                .unwrap_or_else(|| param.clone());
            instance.set_member(&member_name, v)?;
        }
        Ok(instance)
    }

    /// The enumerable reconciliation contract: populate the target
    /// collection from the source sequence, honoring the active intent.
    /// CreateNew builds a fresh collection; Merge maps onto same-index
    /// existing elements and preserves the tail; Overwrite reuses
    /// same-index elements as map-over targets and truncates the tail.
    fn reconcile(
        &mut self,
        source: &Value,
        existing: Option<Value>,
        source_ty: &TypeRef,
        target_ty: &TypeRef,
    ) -> Result<Value> {
        if source.is_nullish() {
            return Ok(self.no_source_result(existing.as_ref()));
        }
        let items = match source {
            Value::Array(_) => source.elements()?,
            other => bail!("enumerable source is not a sequence: {other}"),
        };

        let element_source_ty = source_ty.element_type().cloned().unwrap_or(TypeRef::Any);
        let element_ty = target_ty.element_type().cloned().unwrap_or(TypeRef::Any);

        let target = match (&existing, self.rule_set.kind) {
            (Some(v @ Value::Array(_)), RuleSetKind::Merge | RuleSetKind::Overwrite) => v.clone(),
            _ => Value::new_array(),
        };
        let existing_len = target.len()?;

        for (i, item) in items.iter().enumerate() {
            let slot = if i < existing_len {
                let current = target.index(i);
                if current.is_nullish() {
                    None
                } else {
                    Some(current)
                }
            } else {
                None
            };
            let mapped =
                self.map_element(item, slot.as_ref(), &element_source_ty, &element_ty, i)?;
            if i < existing_len {
                target.set_index(i, mapped)?;
            } else {
                target.push(mapped)?;
            }
        }

        if self.rule_set.kind == RuleSetKind::Overwrite && items.len() < existing_len {
            target.truncate(items.len())?;
        }

        Ok(target)
    }

    fn map_element(
        &mut self,
        item: &Value,
        existing: Option<&Value>,
        element_source_ty: &TypeRef,
        element_ty: &TypeRef,
        index: usize,
    ) -> Result<Value> {
        match element_ty.classification() {
            Classification::Simple => Ok(self.ctx.converters.apply(item, element_ty)),
            Classification::Complex => self.map_value(
                item,
                existing,
                element_source_ty,
                element_ty,
                &[],
                Some(index as i64),
            ),
            Classification::Enumerable => {
                self.reconcile(item, existing.cloned(), element_source_ty, element_ty)
            }
        }
    }
}
