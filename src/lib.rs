// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod access;
mod builder;
mod config;
mod convert;
mod datasource;
mod dictionary;
mod engine;
mod error;
mod finder;
mod interpreter;
mod ir;
mod member;
mod naming;
mod number;
mod plan;
mod shape;
mod value;

pub use config::{CallbackPosition, RuleSetKind};
pub use engine::Mapper;
pub use error::PlanCompileError;
pub use ir::{Expr, ExprRef, Function, RootAccess};
pub use number::Number;
pub use shape::{Classification, Constructor, Member, Param, Shape, ShapeKind, TypeRef};
pub use value::{Object, Value};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::access::*;
    pub use crate::datasource::*;
    pub use crate::finder::*;
    pub use crate::ir::*;
    pub use crate::member::*;
    pub use crate::plan::*;
}

#[cfg(test)]
mod tests;
