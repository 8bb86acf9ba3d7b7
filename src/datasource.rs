// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::access::find_nested_accesses;
use crate::config::RuleSetKind;
use crate::ir::{Expr, ExprRef, Stmt};
use crate::member::{MemberMapperData, QualifiedMember};
use crate::shape::{Classification, TypeRef};
use crate::value::Value;

use std::rc::Rc;

/// One candidate way to produce a value for a target member.
#[derive(Debug, Clone)]
pub struct DataSource {
    /// The source member feeding this candidate, where one exists.
    pub source_member: Option<QualifiedMember>,
    /// The value producer.
    pub value: ExprRef,
    /// Guard condition; `None` means the source applies unconditionally.
    pub condition: Option<ExprRef>,
    /// Scratch bindings the value expression needs, with initializers.
    pub variables: Vec<(Rc<str>, ExprRef)>,
    /// Runtime source-type test, for sources only applicable when the live
    /// source is narrower than its declared type.
    pub source_type_test: Option<ExprRef>,
    pub valid: bool,
}

impl DataSource {
    /// Build a valid data source, deriving its guard condition from the
    /// nested accesses of the value expression and conjoining any
    /// explicitly configured condition after the guards.
    pub fn new(
        source_member: Option<QualifiedMember>,
        value: ExprRef,
        configured_condition: Option<ExprRef>,
    ) -> DataSource {
        let mut conditions: Vec<ExprRef> = find_nested_accesses(&value, false)
            .into_iter()
            .map(Expr::not_null)
            .collect();
        if let Some(c) = configured_condition {
            conditions.push(c);
        }
        DataSource {
            source_member,
            value,
            condition: Expr::and_together(conditions),
            variables: vec![],
            source_type_test: None,
            valid: true,
        }
    }

    /// The no-source placeholder: never applicable.
    pub fn invalid() -> DataSource {
        DataSource {
            source_member: None,
            value: Expr::constant(Value::Undefined),
            condition: None,
            variables: vec![],
            source_type_test: None,
            valid: false,
        }
    }

    pub fn with_variables(mut self, variables: Vec<(Rc<str>, ExprRef)>) -> DataSource {
        self.variables = variables;
        self
    }

    pub fn with_type_test(mut self, test: ExprRef) -> DataSource {
        self.source_type_test = Some(test);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

/// The rule set's fallback source: what a member receives when no
/// higher-priority source applies.
pub fn fallback_source_for(data: &MemberMapperData) -> DataSource {
    match data.rule_set.kind {
        RuleSetKind::CreateNew | RuleSetKind::Overwrite => DataSource::new(
            None,
            Expr::Default(data.target_member.ty().clone()).rf(),
            None,
        ),
        // "Keep the current value": the population builder recognizes this
        // and skips assignment when nothing else applies.
        RuleSetKind::Merge => DataSource::new(None, data.target_member_access(), None),
    }
}

/// The rule set's initial source, prepended for simple members when any
/// other source applies. Only Merge has one: preserve a non-null existing
/// value.
pub fn initial_source_for(data: &MemberMapperData) -> Option<DataSource> {
    if data.rule_set.kind != RuleSetKind::Merge {
        return None;
    }
    if !data.target_is(Classification::Simple) || !data.target_member.ty().can_be_null() {
        return None;
    }
    let access = data.target_member_access();
    let mut source = DataSource::new(None, access.clone(), None);
    source.condition = Some(Expr::not_null(access));
    Some(source)
}

/// A source backed by a matched source member; simple targets convert
/// through the catalog.
pub fn source_member_data_source(
    matched: QualifiedMember,
    data: &MemberMapperData,
) -> DataSource {
    let relative = matched.relative_to(&data.source_member);
    let access = relative.access_expr(data.source_object.clone());
    let value = if data.target_is(Classification::Simple) {
        data.ctx
            .converters
            .conversion(access, relative.ty(), data.target_member.ty())
    } else {
        access
    };
    DataSource::new(Some(matched), value, None)
}

/// A recursive nested-object mapping source for a complex target member.
/// With no matched source member the whole source object feeds the child
/// mapping.
pub fn complex_mapping_source(
    best_match: Option<QualifiedMember>,
    data: &MemberMapperData,
) -> DataSource {
    let (source_expr, source_ty, source_member) = match best_match {
        Some(m) => {
            let relative = m.relative_to(&data.source_member);
            (
                relative.access_expr(data.source_object.clone()),
                relative.ty().clone(),
                Some(m),
            )
        }
        None => (
            data.source_object.clone(),
            data.source_ty.clone(),
            None,
        ),
    };

    // Dictionary-sourced child plans need the member path from the mapping
    // root to build composite key names.
    let prefix = if data.source_ty.is_dictionary() {
        data.key_segments()
    } else {
        vec![]
    };

    let value = Expr::MapObject {
        source: source_expr,
        source_ty,
        target_ty: data.target_member.ty().clone(),
        existing: Some(data.target_member_access()),
        prefix,
    }
    .rf();

    DataSource::new(source_member, value, None)
}

/// Wrap a found source with the enumerable reconciliation adapter when the
/// target member is a collection.
pub fn final_data_source(found: DataSource, data: &MemberMapperData) -> DataSource {
    if !data.target_is(Classification::Enumerable) {
        return found;
    }
    let source_ty = found
        .source_member
        .as_ref()
        .map(|m| m.ty().clone())
        .unwrap_or(TypeRef::Any);
    let value = Expr::MapElements {
        source: found.value.clone(),
        source_ty,
        target_ty: data.target_member.ty().clone(),
        existing: Some(data.target_member_access()),
    }
    .rf();
    DataSource {
        value,
        ..found
    }
}

/// The ordered candidate sources for one target member, composed into one
/// fallback chain and one population statement.
#[derive(Debug, Clone)]
pub struct DataSourceSet {
    sources: Vec<DataSource>,
    pub none: bool,
    pub has_value: bool,
    /// The last non-null test seen wins, later sources overriding earlier.
    pub source_member_type_test: Option<ExprRef>,
    /// Union of the sources' scratch bindings, in order.
    pub variables: Vec<(Rc<str>, ExprRef)>,
}

impl DataSourceSet {
    pub fn new(sources: Vec<DataSource>) -> DataSourceSet {
        let none = sources.is_empty();
        let mut has_value = false;
        let mut type_test = None;
        let mut variables = vec![];
        for source in &sources {
            has_value = has_value || source.valid;
            variables.extend(source.variables.iter().cloned());
            if let Some(test) = &source.source_type_test {
                type_test = Some(test.clone());
            }
        }
        DataSourceSet {
            sources,
            none,
            has_value,
            source_member_type_test: type_test,
            variables,
        }
    }

    pub fn sources(&self) -> &[DataSource] {
        &self.sources
    }

    /// Right-to-left fold producing "first valid source wins" semantics:
    /// each conditional source falls through to the remainder, an
    /// unconditional source discards everything after it.
    pub fn value_expr(&self) -> Option<ExprRef> {
        let mut rev = self.sources.iter().rev();
        let mut chained = rev.next()?.value.clone();
        for source in rev {
            chained = match &source.condition {
                Some(cond) => Expr::conditional(cond.clone(), source.value.clone(), chained),
                None => source.value.clone(),
            };
        }
        Some(chained)
    }

    /// Build the member's population statements, scanning sources from last
    /// to first. The final source's value is the candidate fallback unless
    /// it coalesces with the member's current value (unwrap to the
    /// right-hand side) or *is* the current-value read (no fallback at all:
    /// skip assignment when nothing else applies).
    pub fn population(&self, data: &MemberMapperData) -> Option<Vec<Stmt>> {
        let last = self.sources.last()?;
        let target_access = data.target_member_access();

        let fallback_value = match last.value.as_ref() {
            Expr::Coalesce { right, .. } => Some(right.clone()),
            v if v.equivalent(&target_access) => None,
            _ => Some(last.value.clone()),
        };

        let count = self.sources.len();
        let mut population: Option<Vec<Stmt>> = None;

        for (i, source) in self.sources.iter().enumerate().rev() {
            if i == count - 1 {
                let Some(fallback) = &fallback_value else {
                    continue;
                };
                let mut stmts = vec![data.target_member_population(fallback.clone())];
                if let Some(cond) = &source.condition {
                    stmts = vec![Stmt::If {
                        test: cond.clone(),
                        then: stmts,
                        otherwise: vec![],
                    }];
                }
                population = Some(stmts);
                continue;
            }

            let assign = vec![data.target_member_population(source.value.clone())];
            let built = population.take();
            population = Some(match (built, &source.condition) {
                (None, Some(cond)) => vec![Stmt::If {
                    test: cond.clone(),
                    then: assign,
                    otherwise: vec![],
                }],
                (Some(rest), Some(cond)) => vec![Stmt::If {
                    test: cond.clone(),
                    then: assign,
                    otherwise: rest,
                }],
                // Nothing below an unconditional source is reachable.
                (_, None) => assign,
            });
        }

        population
    }
}
