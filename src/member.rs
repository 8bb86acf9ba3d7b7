// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::config::{MapperContext, RuleSet};
use crate::ir::{Expr, ExprRef, RootAccess, Stmt};
use crate::shape::{Classification, Member, Shape, TypeRef};

use std::rc::Rc;

/// A path of member segments from a root object. An empty chain denotes the
/// root itself (a whole-object member).
#[derive(Debug, Clone, PartialEq)]
pub struct QualifiedMember {
    root_ty: TypeRef,
    chain: Vec<Member>,
}

impl QualifiedMember {
    pub fn root(ty: TypeRef) -> QualifiedMember {
        QualifiedMember {
            root_ty: ty,
            chain: vec![],
        }
    }

    pub fn append(&self, member: Member) -> QualifiedMember {
        let mut chain = self.chain.clone();
        chain.push(member);
        QualifiedMember {
            root_ty: self.root_ty.clone(),
            chain,
        }
    }

    pub fn is_root(&self) -> bool {
        self.chain.is_empty()
    }

    /// The leaf segment name; empty for the root.
    pub fn name(&self) -> Rc<str> {
        match self.chain.last() {
            Some(m) => m.name.clone(),
            None => "".into(),
        }
    }

    pub fn ty(&self) -> &TypeRef {
        match self.chain.last() {
            Some(m) => &m.ty,
            None => &self.root_ty,
        }
    }

    pub fn classification(&self) -> Classification {
        self.ty().classification()
    }

    pub fn element_type(&self) -> Option<&TypeRef> {
        self.ty().element_type()
    }

    pub fn segments(&self) -> &[Member] {
        &self.chain
    }

    pub fn signature(&self) -> String {
        let mut sig = self.root_ty.signature();
        for m in &self.chain {
            sig.push('.');
            sig.push_str(&m.name);
        }
        sig
    }

    /// Rebase this member against an ancestor, dropping the shared prefix.
    pub fn relative_to(&self, ancestor: &QualifiedMember) -> QualifiedMember {
        let shared = ancestor
            .chain
            .iter()
            .zip(self.chain.iter())
            .take_while(|(a, b)| a.name == b.name)
            .count();
        QualifiedMember {
            root_ty: ancestor.ty().clone(),
            chain: self.chain[shared..].to_vec(),
        }
    }

    /// Fold the chain into a member-read expression over the given root.
    pub fn access_expr(&self, root: ExprRef) -> ExprRef {
        let mut expr = root;
        for m in &self.chain {
            expr = Expr::member_read(expr, &m.name, m.ty.clone());
        }
        expr
    }
}

/// Per-member compile-time state: the mapping context one target member (or
/// constructor parameter) is resolved in.
pub struct MemberMapperData<'a> {
    pub ctx: &'a MapperContext,
    pub rule_set: &'a RuleSet,

    /// The plan's source root type.
    pub source_ty: TypeRef,
    /// The plan's target root type.
    pub target_root_ty: TypeRef,
    /// Target member path names from the mapping root; non-empty only for
    /// plans nested under a dictionary source.
    pub name_prefix: Vec<Rc<str>>,

    pub source_member: QualifiedMember,
    pub target_member: QualifiedMember,

    /// Accessor for the live source object.
    pub source_object: ExprRef,
    /// Accessor for the resolved target instance.
    pub target_object: ExprRef,
}

impl<'a> MemberMapperData<'a> {
    pub fn for_member(
        ctx: &'a MapperContext,
        rule_set: &'a RuleSet,
        source_ty: TypeRef,
        target_root_ty: TypeRef,
        name_prefix: Vec<Rc<str>>,
        member: &Member,
        target_object: ExprRef,
    ) -> MemberMapperData<'a> {
        MemberMapperData {
            ctx,
            rule_set,
            source_member: QualifiedMember::root(source_ty.clone()),
            target_member: QualifiedMember::root(target_root_ty.clone()).append(member.clone()),
            source_ty,
            target_root_ty,
            name_prefix,
            source_object: Expr::Root(RootAccess::Source).rf(),
            target_object,
        }
    }

    pub fn target_is(&self, c: Classification) -> bool {
        self.target_member.classification() == c
    }

    /// Read the target member's current value.
    pub fn target_member_access(&self) -> ExprRef {
        Expr::member_read(
            self.target_object.clone(),
            &self.target_member.name(),
            self.target_member.ty().clone(),
        )
    }

    /// Assign a value into the target member.
    pub fn target_member_population(&self, value: ExprRef) -> Stmt {
        Stmt::SetMember {
            object: self.target_object.clone(),
            member: self.target_member.name(),
            value,
        }
    }

    /// The source shape's metadata, when the source type names one.
    pub fn source_shape(&self) -> Option<Rc<Shape>> {
        match self.source_ty.non_nullable() {
            TypeRef::Named(name) => self.ctx.shapes.get(name),
            _ => None,
        }
    }

    /// The member path names from the mapping root, used for dictionary key
    /// candidates.
    pub fn key_segments(&self) -> Vec<Rc<str>> {
        let mut segments = self.name_prefix.clone();
        for m in self.target_member.segments() {
            segments.push(m.name.clone());
        }
        segments
    }
}

/// Whether a source of the given type can feed a target of the given type.
pub fn types_compatible(ctx: &MapperContext, source: &TypeRef, target: &TypeRef) -> bool {
    if matches!(source.non_nullable(), TypeRef::Any) {
        return true;
    }
    match target.classification() {
        Classification::Simple => {
            source.is_simple() && ctx.converters.can_convert(source, target)
        }
        Classification::Enumerable => source.is_enumerable(),
        Classification::Complex => source.is_complex(),
    }
}

/// Best-matching source member for a target member: highest score by name
/// closeness and type compatibility, declaration order breaking ties. One
/// level of flattened nesting is considered (`AddressLine1` matches
/// `Address.Line1`).
pub fn best_source_match(data: &MemberMapperData) -> Option<QualifiedMember> {
    let shape = data.source_shape()?;
    let target_name = data.target_member.name();
    let target_ty = data.target_member.ty();

    fn consider(score: u8, candidate: QualifiedMember, best: &mut Option<(u8, QualifiedMember)>) {
        if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
            *best = Some((score, candidate));
        }
    }

    let mut best: Option<(u8, QualifiedMember)> = None;
    for member in shape.members() {
        if data.ctx.naming.names_match(&member.name, &target_name) {
            if types_compatible(data.ctx, &member.ty, target_ty) {
                let qm = QualifiedMember::root(data.source_ty.clone()).append(member.clone());
                consider(4, qm, &mut best);
            }
            continue;
        }

        // Flattened nesting: the target name concatenates a complex member
        // name with one of its own member names.
        if let TypeRef::Named(nested_shape) = member.ty.non_nullable() {
            if let Some(nested) = data.ctx.shapes.get(nested_shape) {
                for inner in nested.members() {
                    let flattened = format!("{}{}", member.name, inner.name);
                    if flattened.eq_ignore_ascii_case(&target_name)
                        && types_compatible(data.ctx, &inner.ty, target_ty)
                    {
                        let qm = QualifiedMember::root(data.source_ty.clone())
                            .append(member.clone())
                            .append(inner.clone());
                        consider(2, qm, &mut best);
                    }
                }
            }
        }
    }

    best.map(|(_, qm)| qm)
}

/// Best whole-object match between the source and the target type itself:
/// the source object when compatible, otherwise the first type-compatible
/// source member.
pub fn whole_object_match(data: &MemberMapperData) -> Option<QualifiedMember> {
    if types_compatible(data.ctx, &data.source_ty, &data.target_root_ty) {
        return Some(QualifiedMember::root(data.source_ty.clone()));
    }
    let shape = data.source_shape()?;
    shape
        .members()
        .iter()
        .find(|m| types_compatible(data.ctx, &m.ty, &data.target_root_ty))
        .map(|m| QualifiedMember::root(data.source_ty.clone()).append(m.clone()))
}
