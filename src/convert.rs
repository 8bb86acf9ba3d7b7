// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ir::{Expr, ExprRef, Function};
use crate::number::Number;
use crate::shape::TypeRef;
use crate::value::Value;

use core::str::FromStr;

use log::debug;

/// The value-converter catalog: decides at compile time whether one simple
/// type converts to another, and performs the conversion at execution time.
///
/// Conversion never raises a per-instance error; an unconvertible value
/// degrades to the target type's default, consistent with there being no
/// runtime error category in the mapping core.
#[derive(Debug, Clone, Default)]
pub struct ConverterCatalog;

impl ConverterCatalog {
    pub fn new() -> ConverterCatalog {
        ConverterCatalog
    }

    pub fn can_convert(&self, from: &TypeRef, to: &TypeRef) -> bool {
        let f = from.non_nullable();
        let t = to.non_nullable();
        if f == t || matches!(f, TypeRef::Any) {
            return true;
        }
        match t {
            TypeRef::Any => true,
            TypeRef::String => matches!(
                f,
                TypeRef::Bool | TypeRef::Int | TypeRef::Float | TypeRef::String
            ),
            TypeRef::Int | TypeRef::Float => {
                matches!(
                    f,
                    TypeRef::Bool | TypeRef::Int | TypeRef::Float | TypeRef::String
                )
            }
            TypeRef::Bool => matches!(f, TypeRef::Bool | TypeRef::String),
            _ => false,
        }
    }

    /// Wrap a value expression in a conversion call when the types differ.
    pub fn conversion(&self, value: ExprRef, from: &TypeRef, to: &TypeRef) -> ExprRef {
        if from.non_nullable() == to.non_nullable() {
            return value;
        }
        Expr::Call {
            func: Function::Convert(to.clone()),
            args: vec![value],
        }
        .rf()
    }

    /// Convert a live value to the given type.
    pub fn apply(&self, v: &Value, to: &TypeRef) -> Value {
        if v.is_nullish() {
            return to.default_value();
        }
        match to.non_nullable() {
            TypeRef::Any => v.clone(),
            TypeRef::String => match v {
                Value::String(_) => v.clone(),
                Value::Number(n) => Value::String(n.to_string().into()),
                Value::Bool(b) => Value::String(if *b { "true" } else { "false" }.into()),
                _ => self.fail(v, to),
            },
            TypeRef::Int => match v {
                Value::Number(n) => Value::Number(Number::Int(n.as_f64() as i64)),
                Value::Bool(b) => Value::from(i64::from(*b)),
                Value::String(s) => match Number::from_str(s) {
                    Ok(n) => Value::Number(Number::Int(n.as_f64() as i64)),
                    Err(_) => self.fail(v, to),
                },
                _ => self.fail(v, to),
            },
            TypeRef::Float => match v {
                Value::Number(n) => Value::from(n.as_f64()),
                Value::Bool(b) => Value::from(f64::from(u8::from(*b))),
                Value::String(s) => match Number::from_str(s) {
                    Ok(n) => Value::from(n.as_f64()),
                    Err(_) => self.fail(v, to),
                },
                _ => self.fail(v, to),
            },
            TypeRef::Bool => match v {
                Value::Bool(_) => v.clone(),
                Value::String(s) => match s.as_ref() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    _ => self.fail(v, to),
                },
                _ => self.fail(v, to),
            },
            // Containers pass through untouched when they already have the
            // right kind; recursion into them is the plan compiler's job.
            TypeRef::List(_) => match v {
                Value::Array(_) => v.clone(),
                _ => self.fail(v, to),
            },
            TypeRef::Named(_) | TypeRef::Dictionary(_) => match v {
                Value::Object(_) => v.clone(),
                _ => self.fail(v, to),
            },
            TypeRef::Nullable(_) => unreachable!("non_nullable strips Nullable"),
        }
    }

    fn fail(&self, v: &Value, to: &TypeRef) -> Value {
        debug!("cannot convert {v} to {to}; using default");
        to.default_value()
    }
}
