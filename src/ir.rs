// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::shape::TypeRef;
use crate::value::Value;

use core::{cmp, fmt, ops::Deref};
use std::rc::Rc;

/// Shared reference to an IR node.
pub struct NodeRef<T> {
    r: Rc<T>,
}

impl<T> Clone for NodeRef<T> {
    fn clone(&self) -> Self {
        Self { r: self.r.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T: fmt::Display> fmt::Display for NodeRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.r.as_ref().fmt(f)
    }
}

impl<T> cmp::PartialEq for NodeRef<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::as_ptr(&self.r).eq(&Rc::as_ptr(&other.r))
    }
}

impl<T> cmp::Eq for NodeRef<T> {}

impl<T> Deref for NodeRef<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.r
    }
}

impl<T> AsRef<T> for NodeRef<T> {
    fn as_ref(&self) -> &T {
        self.deref()
    }
}

impl<T> NodeRef<T> {
    pub fn new(t: T) -> Self {
        Self { r: Rc::new(t) }
    }
}

pub type ExprRef = NodeRef<Expr>;

/// The context accessors a generated expression may be rooted in. These are
/// the roots known non-null by construction (the target only when the caller
/// supplied one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootAccess {
    Source,
    Target,
    ElementIndex,
}

/// Builtin functions callable from generated expressions.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    /// Convert the single argument through the value-converter catalog.
    Convert(TypeRef),
    /// String concatenation of all arguments.
    Concat,
    /// Whether the single array argument has at least one element.
    ListNotEmpty,
    /// A fresh, empty array.
    NewList,
}

/// Expression IR produced by plan compilation and lowered by the
/// interpreter. An explicit tagged-variant representation keeps the compiler
/// independent of any single execution strategy.
#[derive(Debug, Clone)]
pub enum Expr {
    Constant(Value),
    /// The default value of a type.
    Default(TypeRef),
    /// A context accessor: the live source, the live target, or the current
    /// element index.
    Root(RootAccess),
    /// A scratch binding introduced by a scoped block.
    Local(Rc<str>),
    MemberRead {
        object: ExprRef,
        member: Rc<str>,
        ty: TypeRef,
    },
    Call {
        func: Function,
        args: Vec<ExprRef>,
    },
    /// Null guard: true when the operand is neither null nor undefined.
    NotNull(ExprRef),
    /// Runtime shape test, used when the live source's type may be narrower
    /// than its declared type.
    TypeIs {
        expr: ExprRef,
        shape: Rc<str>,
    },
    And(ExprRef, ExprRef),
    Not(ExprRef),
    Conditional {
        test: ExprRef,
        then: ExprRef,
        otherwise: ExprRef,
    },
    Coalesce {
        left: ExprRef,
        right: ExprRef,
    },
    /// Scoped block: named locals, statements, then a result expression.
    Block(Block),
    /// Probe a dictionary with candidate key expressions, case-insensitively.
    /// Binds the hit to `var` and evaluates to whether a key matched.
    DictTryGet {
        dict: ExprRef,
        keys: Vec<ExprRef>,
        var: Rc<str>,
    },
    /// Instantiate a shape, assigning each argument to its same-named
    /// parameter member.
    Construct {
        shape: Rc<str>,
        params: Vec<Rc<str>>,
        args: Vec<ExprRef>,
    },
    /// Recursively map the source value into the target type through the
    /// compiled-plan cache. `prefix` carries the target member path from the
    /// mapping root when the source is a dictionary, so nested plans can
    /// build composite key names.
    MapObject {
        source: ExprRef,
        source_ty: TypeRef,
        target_ty: TypeRef,
        existing: Option<ExprRef>,
        prefix: Vec<Rc<str>>,
    },
    /// Reconcile a source sequence into the target collection per the active
    /// rule set.
    MapElements {
        source: ExprRef,
        source_ty: TypeRef,
        target_ty: TypeRef,
        existing: Option<ExprRef>,
    },
    /// Probe the per-call identity registry for a target of the given type
    /// previously produced from the source.
    RegistryFetch {
        source: ExprRef,
        target_ty: TypeRef,
    },
}

/// A scoped block of statements with named locals and a result.
#[derive(Debug, Clone)]
pub struct Block {
    pub vars: Vec<(Rc<str>, ExprRef)>,
    pub stmts: Vec<Stmt>,
    pub result: ExprRef,
}

/// A user-registered member callback, invoked with the live source and the
/// resolved target instance.
#[derive(Clone)]
pub struct Callback(pub Rc<dyn Fn(&Value, &Value)>);

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback")
    }
}

/// Statement IR for plan bodies and population blocks.
#[derive(Debug, Clone)]
pub enum Stmt {
    Assign {
        local: Rc<str>,
        value: ExprRef,
    },
    SetMember {
        object: ExprRef,
        member: Rc<str>,
        value: ExprRef,
    },
    If {
        test: ExprRef,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    Loop {
        body: Vec<Stmt>,
    },
    Break,
    Return(ExprRef),
    /// Record (source identity -> produced target) in the per-call registry
    /// under the target's type.
    RegistryRecord {
        source: ExprRef,
        target: ExprRef,
        target_ty: TypeRef,
    },
    ListPush {
        local: Rc<str>,
        value: ExprRef,
    },
    Increment {
        local: Rc<str>,
    },
    Invoke {
        callback: Callback,
        source: ExprRef,
        target: ExprRef,
    },
}

impl Expr {
    pub fn rf(self) -> ExprRef {
        NodeRef::new(self)
    }

    pub fn constant(v: Value) -> ExprRef {
        Expr::Constant(v).rf()
    }

    pub fn null() -> ExprRef {
        Expr::Constant(Value::Null).rf()
    }

    pub fn member_read(object: ExprRef, member: &Rc<str>, ty: TypeRef) -> ExprRef {
        Expr::MemberRead {
            object,
            member: member.clone(),
            ty,
        }
        .rf()
    }

    pub fn not_null(e: ExprRef) -> ExprRef {
        Expr::NotNull(e).rf()
    }

    pub fn is_null(e: ExprRef) -> ExprRef {
        Expr::Not(Expr::NotNull(e).rf()).rf()
    }

    pub fn conditional(test: ExprRef, then: ExprRef, otherwise: ExprRef) -> ExprRef {
        Expr::Conditional {
            test,
            then,
            otherwise,
        }
        .rf()
    }

    pub fn coalesce(left: ExprRef, right: ExprRef) -> ExprRef {
        Expr::Coalesce { left, right }.rf()
    }

    /// Conjoin a list of boolean expressions left to right. `None` when the
    /// list is empty.
    pub fn and_together(mut exprs: Vec<ExprRef>) -> Option<ExprRef> {
        if exprs.is_empty() {
            return None;
        }
        let first = exprs.remove(0);
        Some(
            exprs
                .into_iter()
                .fold(first, |acc, e| Expr::And(acc, e).rf()),
        )
    }

    /// The declared type of this expression, where one is known.
    pub fn declared_type(&self) -> Option<&TypeRef> {
        match self {
            Expr::Default(ty) => Some(ty),
            Expr::MemberRead { ty, .. } => Some(ty),
            Expr::Call {
                func: Function::Convert(ty),
                ..
            } => Some(ty),
            _ => None,
        }
    }

    /// Structural equivalence, ignoring node identity. Backs
    /// configured-duplicate detection, fallback elision, and
    /// redundant-factory detection.
    pub fn equivalent(&self, other: &Expr) -> bool {
        use Expr::*;
        match (self, other) {
            (Constant(a), Constant(b)) => a == b,
            (Default(a), Default(b)) => a == b,
            (Root(a), Root(b)) => a == b,
            (Local(a), Local(b)) => a == b,
            (
                MemberRead {
                    object: ao,
                    member: am,
                    ..
                },
                MemberRead {
                    object: bo,
                    member: bm,
                    ..
                },
            ) => am == bm && ao.equivalent(bo),
            (Call { func: af, args: aa }, Call { func: bf, args: ba }) => {
                af == bf && exprs_equivalent(aa, ba)
            }
            (NotNull(a), NotNull(b)) => a.equivalent(b),
            (
                TypeIs {
                    expr: ae,
                    shape: ash,
                },
                TypeIs {
                    expr: be,
                    shape: bsh,
                },
            ) => ash == bsh && ae.equivalent(be),
            (And(al, ar), And(bl, br)) => al.equivalent(bl) && ar.equivalent(br),
            (Not(a), Not(b)) => a.equivalent(b),
            (
                Conditional {
                    test: at,
                    then: ath,
                    otherwise: ae,
                },
                Conditional {
                    test: bt,
                    then: bth,
                    otherwise: be,
                },
            ) => at.equivalent(bt) && ath.equivalent(bth) && ae.equivalent(be),
            (
                Coalesce {
                    left: al,
                    right: ar,
                },
                Coalesce {
                    left: bl,
                    right: br,
                },
            ) => al.equivalent(bl) && ar.equivalent(br),
            (
                Construct {
                    shape: ash,
                    params: ap,
                    args: aa,
                },
                Construct {
                    shape: bsh,
                    params: bp,
                    args: ba,
                },
            ) => ash == bsh && ap == bp && exprs_equivalent(aa, ba),
            (
                MapObject {
                    source: asrc,
                    target_ty: aty,
                    ..
                },
                MapObject {
                    source: bsrc,
                    target_ty: bty,
                    ..
                },
            ) => aty == bty && asrc.equivalent(bsrc),
            (
                MapElements {
                    source: asrc,
                    target_ty: aty,
                    ..
                },
                MapElements {
                    source: bsrc,
                    target_ty: bty,
                    ..
                },
            ) => aty == bty && asrc.equivalent(bsrc),
            (
                RegistryFetch {
                    source: a,
                    target_ty: aty,
                },
                RegistryFetch {
                    source: b,
                    target_ty: bty,
                },
            ) => aty == bty && a.equivalent(b),
            _ => false,
        }
    }
}

fn exprs_equivalent(a: &[ExprRef], b: &[ExprRef]) -> bool {
    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equivalent(y))
}

impl fmt::Display for RootAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RootAccess::Source => write!(f, "Source"),
            RootAccess::Target => write!(f, "Target"),
            RootAccess::ElementIndex => write!(f, "Index"),
        }
    }
}

// Rendering is for diagnostics and guard path keys only; semantic decisions
// go through `Expr::equivalent`.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(v) => write!(f, "{v}"),
            Expr::Default(ty) => write!(f, "default({ty})"),
            Expr::Root(r) => write!(f, "{r}"),
            Expr::Local(name) => write!(f, "{name}"),
            Expr::MemberRead { object, member, .. } => write!(f, "{object}.{member}"),
            Expr::Call { func, args } => {
                match func {
                    Function::Convert(ty) => write!(f, "convert<{ty}>(")?,
                    Function::Concat => write!(f, "concat(")?,
                    Function::ListNotEmpty => write!(f, "notEmpty(")?,
                    Function::NewList => write!(f, "newList(")?,
                }
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expr::NotNull(e) => write!(f, "({e} != null)"),
            Expr::TypeIs { expr, shape } => write!(f, "({expr} is {shape})"),
            Expr::And(l, r) => write!(f, "({l} && {r})"),
            Expr::Not(e) => write!(f, "!{e}"),
            Expr::Conditional {
                test,
                then,
                otherwise,
            } => write!(f, "({test} ? {then} : {otherwise})"),
            Expr::Coalesce { left, right } => write!(f, "({left} ?? {right})"),
            Expr::Block(_) => write!(f, "{{...}}"),
            Expr::DictTryGet { dict, var, .. } => write!(f, "tryGet({dict}, out {var})"),
            Expr::Construct { shape, args, .. } => {
                write!(f, "new {shape}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            Expr::MapObject {
                source, target_ty, ..
            } => write!(f, "map({source} -> {target_ty})"),
            Expr::MapElements {
                source, target_ty, ..
            } => write!(f, "mapElements({source} -> {target_ty})"),
            Expr::RegistryFetch { source, target_ty } => {
                write!(f, "registry<{target_ty}>[{source}]")
            }
        }
    }
}
