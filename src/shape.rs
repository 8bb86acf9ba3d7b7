// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::error::PlanCompileError;
use crate::value::Value;

use core::fmt;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A reference to a mappable type.
///
/// Shapes registered in the [`ShapeRegistry`] are named; everything else is
/// structural. `Dictionary` is a string-keyed untyped container whose value
/// type is the parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRef {
    Bool,
    Int,
    Float,
    String,
    Nullable(Box<TypeRef>),
    List(Box<TypeRef>),
    Named(Rc<str>),
    Dictionary(Box<TypeRef>),
    Any,
}

/// Member classification. The classification determines which source kinds
/// are eligible for a target member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Simple,
    Complex,
    Enumerable,
}

impl TypeRef {
    pub fn named(name: &str) -> TypeRef {
        TypeRef::Named(name.into())
    }

    pub fn list(element: TypeRef) -> TypeRef {
        TypeRef::List(Box::new(element))
    }

    pub fn nullable(inner: TypeRef) -> TypeRef {
        TypeRef::Nullable(Box::new(inner))
    }

    pub fn dictionary(value: TypeRef) -> TypeRef {
        TypeRef::Dictionary(Box::new(value))
    }

    /// Strip any `Nullable` wrapper.
    pub fn non_nullable(&self) -> &TypeRef {
        match self {
            TypeRef::Nullable(inner) => inner.non_nullable(),
            other => other,
        }
    }

    pub fn classification(&self) -> Classification {
        match self.non_nullable() {
            TypeRef::Bool | TypeRef::Int | TypeRef::Float | TypeRef::String => {
                Classification::Simple
            }
            TypeRef::List(_) => Classification::Enumerable,
            TypeRef::Named(_) | TypeRef::Dictionary(_) | TypeRef::Any => Classification::Complex,
            TypeRef::Nullable(_) => unreachable!("non_nullable strips Nullable"),
        }
    }

    pub fn is_simple(&self) -> bool {
        self.classification() == Classification::Simple
    }

    pub fn is_complex(&self) -> bool {
        self.classification() == Classification::Complex
    }

    pub fn is_enumerable(&self) -> bool {
        self.classification() == Classification::Enumerable
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self.non_nullable(), TypeRef::Dictionary(_))
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        match self.non_nullable() {
            TypeRef::List(e) => Some(e),
            _ => None,
        }
    }

    /// Whether a live value of this type can be null. Scalars other than
    /// strings cannot; everything reference-like can.
    pub fn can_be_null(&self) -> bool {
        !matches!(self, TypeRef::Bool | TypeRef::Int | TypeRef::Float)
    }

    /// The value a target member of this type holds when nothing assigns it.
    pub fn default_value(&self) -> Value {
        match self {
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Int => Value::from(0i64),
            TypeRef::Float => Value::from(0f64),
            _ => Value::Null,
        }
    }

    /// Stable rendering used in plan-cache keys and diagnostics.
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Bool => write!(f, "bool"),
            TypeRef::Int => write!(f, "int"),
            TypeRef::Float => write!(f, "float"),
            TypeRef::String => write!(f, "string"),
            TypeRef::Nullable(inner) => write!(f, "{inner}?"),
            TypeRef::List(e) => write!(f, "[{e}]"),
            TypeRef::Named(n) => write!(f, "{n}"),
            TypeRef::Dictionary(v) => write!(f, "{{string: {v}}}"),
            TypeRef::Any => write!(f, "any"),
        }
    }
}

/// One field of a record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: Rc<str>,
    pub ty: TypeRef,
}

impl Member {
    pub fn new(name: &str, ty: TypeRef) -> Member {
        Member {
            name: name.into(),
            ty,
        }
    }
}

/// One constructor parameter; populates the member with the same name.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Rc<str>,
    pub ty: TypeRef,
}

/// One way to instantiate a record shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Constructor {
    pub params: Vec<Param>,
}

#[derive(Debug, Clone)]
pub enum ShapeKind {
    Record {
        members: Vec<Member>,
        constructors: Vec<Constructor>,
    },
    Dictionary {
        value: TypeRef,
    },
}

/// Synthetic metadata for one mappable type: the compiler's substitute for
/// reflection. Registered ahead of time, queried during plan compilation.
#[derive(Debug, Clone)]
pub struct Shape {
    pub name: Rc<str>,
    pub kind: ShapeKind,
}

impl Shape {
    pub fn record(name: &str) -> Shape {
        Shape {
            name: name.into(),
            kind: ShapeKind::Record {
                members: vec![],
                constructors: vec![],
            },
        }
    }

    pub fn dictionary(name: &str, value: TypeRef) -> Shape {
        Shape {
            name: name.into(),
            kind: ShapeKind::Dictionary { value },
        }
    }

    pub fn with_member(mut self, name: &str, ty: TypeRef) -> Shape {
        if let ShapeKind::Record { members, .. } = &mut self.kind {
            members.push(Member::new(name, ty));
        }
        self
    }

    /// Add a constructor whose parameters populate the same-named members.
    /// Parameter types are resolved from the member declarations.
    pub fn with_constructor(mut self, param_names: &[&str]) -> Shape {
        if let ShapeKind::Record {
            members,
            constructors,
        } = &mut self.kind
        {
            let params = param_names
                .iter()
                .map(|name| {
                    let ty = members
                        .iter()
                        .find(|m| m.name.eq_ignore_ascii_case(name))
                        .map(|m| m.ty.clone())
                        .unwrap_or(TypeRef::Any);
                    Param {
                        name: (*name).into(),
                        ty,
                    }
                })
                .collect();
            constructors.push(Constructor { params });
        }
        self
    }

    pub fn members(&self) -> &[Member] {
        match &self.kind {
            ShapeKind::Record { members, .. } => members,
            ShapeKind::Dictionary { .. } => &[],
        }
    }

    pub fn constructors(&self) -> &[Constructor] {
        match &self.kind {
            ShapeKind::Record { constructors, .. } => constructors,
            ShapeKind::Dictionary { .. } => &[],
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members()
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn is_dictionary(&self) -> bool {
        matches!(self.kind, ShapeKind::Dictionary { .. })
    }

    pub fn dictionary_value_type(&self) -> Option<&TypeRef> {
        match &self.kind {
            ShapeKind::Dictionary { value } => Some(value),
            ShapeKind::Record { .. } => None,
        }
    }

    /// The type reference naming this shape.
    pub fn type_ref(&self) -> TypeRef {
        match &self.kind {
            ShapeKind::Record { .. } => TypeRef::Named(self.name.clone()),
            ShapeKind::Dictionary { value } => TypeRef::Dictionary(Box::new(value.clone())),
        }
    }
}

/// Name-keyed store of registered shapes: the member metadata provider.
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: BTreeMap<Rc<str>, Rc<Shape>>,
}

impl ShapeRegistry {
    pub fn new() -> ShapeRegistry {
        ShapeRegistry::default()
    }

    pub fn register(&mut self, shape: Shape) -> Result<(), PlanCompileError> {
        if shape.name.is_empty() || shape.name.trim().is_empty() {
            return Err(PlanCompileError::InvalidShapeName(shape.name.to_string()));
        }
        if self.shapes.contains_key(&shape.name) {
            return Err(PlanCompileError::AlreadyRegistered(shape.name.to_string()));
        }
        self.shapes.insert(shape.name.clone(), Rc::new(shape));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Rc<Shape>> {
        self.shapes.get(name).cloned()
    }

    /// Resolve a named or dictionary type reference to its shape, if any.
    pub fn resolve(&self, ty: &TypeRef) -> Result<Rc<Shape>, PlanCompileError> {
        match ty.non_nullable() {
            TypeRef::Named(name) => self
                .get(name)
                .ok_or_else(|| PlanCompileError::UnknownShape(name.to_string())),
            other => Err(PlanCompileError::UnknownShape(other.to_string())),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shapes.contains_key(name)
    }
}
