// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::builder::default_construction;
use crate::config::{
    rule_set_for, CallbackPosition, ConfiguredCallback, ConfiguredDataSource,
    ConfiguredObjectFactory, MapperContext, RuleSetKind,
};
use crate::error::PlanCompileError;
use crate::interpreter::Executor;
use crate::ir::{Callback, ExprRef};
use crate::shape::{Shape, TypeRef};
use crate::value::Value;

use std::rc::Rc;

use anyhow::{bail, Result};
use log::debug;

/// The object-graph mapping engine.
///
/// Owns the registry-wide context: shape metadata, configuration, and the
/// compiled-plan cache. Mapping derives and caches a plan per (source shape,
/// target shape, intent) on first use, then executes it against the live
/// values.
pub struct Mapper {
    ctx: MapperContext,
}

impl Default for Mapper {
    fn default() -> Self {
        Self::new()
    }
}

impl Mapper {
    pub fn new() -> Mapper {
        Mapper {
            ctx: MapperContext::new(),
        }
    }

    pub fn context(&self) -> &MapperContext {
        &self.ctx
    }

    pub fn register_shape(&mut self, shape: Shape) -> Result<(), PlanCompileError> {
        self.ctx.shapes.register(shape)?;
        self.ctx.bump_revision();
        Ok(())
    }

    pub fn register_dictionary(
        &mut self,
        name: &str,
        value: TypeRef,
    ) -> Result<(), PlanCompileError> {
        self.register_shape(Shape::dictionary(name, value))
    }

    /// Map the source into a brand new target.
    pub fn map_to_new(&self, source: &Value, target_ty: &TypeRef) -> Result<Value> {
        self.map_with(RuleSetKind::CreateNew, source, None, target_ty)
    }

    /// Map the source onto an existing target, preserving values the target
    /// already has.
    pub fn map_onto(&self, source: &Value, target: &Value) -> Result<Value> {
        let target_ty = self.type_of(target)?;
        self.map_with(RuleSetKind::Merge, source, Some(target), &target_ty)
    }

    /// Map the source over an existing target, overwriting it.
    pub fn map_over(&self, source: &Value, target: &Value) -> Result<Value> {
        let target_ty = self.type_of(target)?;
        self.map_with(RuleSetKind::Overwrite, source, Some(target), &target_ty)
    }

    fn map_with(
        &self,
        kind: RuleSetKind,
        source: &Value,
        existing: Option<&Value>,
        target_ty: &TypeRef,
    ) -> Result<Value> {
        if source.is_nullish() {
            return Ok(match kind {
                RuleSetKind::CreateNew => Value::Null,
                _ => existing.cloned().unwrap_or(Value::Null),
            });
        }
        if !matches!(source, Value::Object(_) | Value::Array(_)) {
            bail!("mapping source must be an object, dictionary or sequence");
        }
        if let Some(target) = existing {
            if !matches!(target, Value::Object(_) | Value::Array(_)) {
                bail!("mapping target must be an object or sequence");
            }
        }
        let source_ty = self.type_of(source)?;
        debug!("mapping {source_ty} -> {target_ty} ({kind})");
        let mut executor = Executor::new(&self.ctx, kind);
        executor.map(source, existing, &source_ty, target_ty)
    }

    fn type_of(&self, value: &Value) -> Result<TypeRef> {
        match value {
            Value::Object(_) => match value.shape_name() {
                Some(tag) => match self.ctx.shapes.get(&tag) {
                    Some(shape) => Ok(shape.type_ref()),
                    None => bail!("'{tag}' is not a registered shape"),
                },
                None => Ok(TypeRef::dictionary(TypeRef::Any)),
            },
            // A sequence's element type comes from its first element.
            Value::Array(_) => Ok(TypeRef::list(
                self.type_of(&value.index(0)).unwrap_or(TypeRef::Any),
            )),
            Value::String(_) => Ok(TypeRef::String),
            Value::Bool(_) => Ok(TypeRef::Bool),
            Value::Number(n) if n.is_integer() => Ok(TypeRef::Int),
            Value::Number(_) => Ok(TypeRef::Float),
            other => bail!("cannot map from {other}"),
        }
    }

    /// Configure a data source for one exact member of a shape pair.
    /// Configured sources are consulted in configuration order; an
    /// unconditional one wins absolutely.
    pub fn configure_data_source(
        &mut self,
        source_shape: &str,
        target_shape: &str,
        member_path: &[&str],
        value: ExprRef,
        condition: Option<ExprRef>,
    ) -> Result<(), PlanCompileError> {
        let source_sig = self.shape_sig(source_shape)?;
        let target = self
            .ctx
            .shapes
            .get(target_shape)
            .ok_or_else(|| PlanCompileError::UnknownShape(target_shape.to_string()))?;
        let target_sig = target.type_ref().signature();

        // The path must resolve against the target metadata; constructor
        // parameters count as pseudo members.
        if let Some(first) = member_path.first() {
            let known_member = target.member(first).is_some();
            let known_param = target
                .constructors()
                .iter()
                .any(|c| c.params.iter().any(|p| p.name.eq_ignore_ascii_case(first)));
            if !known_member && !known_param {
                return Err(PlanCompileError::UnknownMember {
                    shape: target_shape.to_string(),
                    member: first.to_string(),
                });
            }
        }

        self.ctx.user_config.add_data_source(ConfiguredDataSource {
            source_sig,
            target_sig,
            member_path: member_path.iter().map(|s| (*s).into()).collect(),
            value,
            condition,
            source_type_test: None,
        });
        self.ctx.bump_revision();
        Ok(())
    }

    /// Configure an object factory for a shape pair. A factory structurally
    /// identical to what the default construction strategy already produces
    /// is rejected, keeping configuration intent unambiguous.
    pub fn configure_factory(
        &mut self,
        source_shape: &str,
        target_shape: &str,
        factory: ExprRef,
        condition: Option<ExprRef>,
    ) -> Result<(), PlanCompileError> {
        let source_sig = self.shape_sig(source_shape)?;
        let target = self
            .ctx
            .shapes
            .get(target_shape)
            .ok_or_else(|| PlanCompileError::UnknownShape(target_shape.to_string()))?;
        let target_ty = target.type_ref();

        let source_ty = self
            .ctx
            .shapes
            .get(source_shape)
            .map(|s| s.type_ref())
            .unwrap_or(TypeRef::Any);
        if let Some(default) = default_construction(
            &self.ctx,
            rule_set_for(RuleSetKind::CreateNew),
            &source_ty,
            &target_ty,
        ) {
            if default.equivalent(&factory) {
                return Err(PlanCompileError::RedundantFactory {
                    target: target_shape.to_string(),
                });
            }
        }

        self.ctx.user_config.add_factory(ConfiguredObjectFactory {
            source_sig,
            target_sig: target_ty.signature(),
            factory,
            condition,
        });
        self.ctx.bump_revision();
        Ok(())
    }

    /// Register a callback to run before or after one member's population.
    pub fn add_callback<F>(
        &mut self,
        position: CallbackPosition,
        target_shape: &str,
        member: &str,
        callback: F,
    ) -> Result<(), PlanCompileError>
    where
        F: Fn(&Value, &Value) + 'static,
    {
        let target = self
            .ctx
            .shapes
            .get(target_shape)
            .ok_or_else(|| PlanCompileError::UnknownShape(target_shape.to_string()))?;
        if target.member(member).is_none() {
            return Err(PlanCompileError::UnknownMember {
                shape: target_shape.to_string(),
                member: member.to_string(),
            });
        }

        self.ctx.user_config.add_callback(ConfiguredCallback {
            position,
            target_sig: target.type_ref().signature(),
            member: member.into(),
            callback: Callback(Rc::new(callback)),
        });
        self.ctx.bump_revision();
        Ok(())
    }

    fn shape_sig(&self, name: &str) -> Result<String, PlanCompileError> {
        self.ctx
            .shapes
            .get(name)
            .map(|s| s.type_ref().signature())
            .ok_or_else(|| PlanCompileError::UnknownShape(name.to_string()))
    }
}
