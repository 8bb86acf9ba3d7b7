// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::convert::ConverterCatalog;
use crate::datasource::DataSource;
use crate::finder::DataSourceFinder;
use crate::ir::{Callback, Expr, ExprRef, RootAccess};
use crate::member::MemberMapperData;
use crate::naming::NamingSettings;
use crate::plan::PlanCache;
use crate::shape::ShapeRegistry;

use core::fmt;
use std::rc::Rc;

use lazy_static::lazy_static;

/// A named mapping intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSetKind {
    CreateNew,
    Merge,
    Overwrite,
}

impl RuleSetKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleSetKind::CreateNew => "CreateNew",
            RuleSetKind::Merge => "Merge",
            RuleSetKind::Overwrite => "Overwrite",
        }
    }
}

impl fmt::Display for RuleSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A rule set: the intent's initial-value, fallback, and short-circuit
/// policies. The fallback and initial data sources live with the data-source
/// factories; the policies here are the ones the plan builder consults
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSet {
    pub kind: RuleSetKind,
}

impl RuleSet {
    /// What "no source" means: null for CreateNew, the existing target for
    /// the intents that were given one.
    pub fn initial_value_expr(&self) -> ExprRef {
        match self.kind {
            RuleSetKind::CreateNew => Expr::null(),
            RuleSetKind::Merge | RuleSetKind::Overwrite => {
                Expr::coalesce(Expr::Root(RootAccess::Target).rf(), Expr::null())
            }
        }
    }

    /// Conditions under which nested complex mapping exits early instead of
    /// constructing. Every built-in rule set short-circuits on a null
    /// source candidate.
    pub fn short_circuit_conditions(&self, candidate: &ExprRef) -> Vec<ExprRef> {
        vec![Expr::is_null(candidate.clone())]
    }
}

/// The built-in rule sets.
#[derive(Debug)]
pub struct RuleSetCollection {
    pub create_new: RuleSet,
    pub merge: RuleSet,
    pub overwrite: RuleSet,
}

lazy_static! {
    pub static ref RULE_SETS: RuleSetCollection = RuleSetCollection {
        create_new: RuleSet {
            kind: RuleSetKind::CreateNew
        },
        merge: RuleSet {
            kind: RuleSetKind::Merge
        },
        overwrite: RuleSet {
            kind: RuleSetKind::Overwrite
        },
    };
}

pub fn rule_set_for(kind: RuleSetKind) -> &'static RuleSet {
    match kind {
        RuleSetKind::CreateNew => &RULE_SETS.create_new,
        RuleSetKind::Merge => &RULE_SETS.merge,
        RuleSetKind::Overwrite => &RULE_SETS.overwrite,
    }
}

/// A user-configured data source for one exact member.
#[derive(Debug, Clone)]
pub struct ConfiguredDataSource {
    pub source_sig: String,
    pub target_sig: String,
    /// Member path names from the target root.
    pub member_path: Vec<Rc<str>>,
    pub value: ExprRef,
    pub condition: Option<ExprRef>,
    pub source_type_test: Option<ExprRef>,
}

impl ConfiguredDataSource {
    fn to_data_source(&self) -> DataSource {
        let mut source = DataSource::new(None, self.value.clone(), self.condition.clone());
        if let Some(test) = &self.source_type_test {
            source = source.with_type_test(test.clone());
        }
        source
    }
}

/// A user-configured object factory for a shape pair.
#[derive(Debug, Clone)]
pub struct ConfiguredObjectFactory {
    pub source_sig: String,
    pub target_sig: String,
    pub factory: ExprRef,
    pub condition: Option<ExprRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackPosition {
    Before,
    After,
}

/// A user-registered member callback.
#[derive(Clone)]
pub struct ConfiguredCallback {
    pub position: CallbackPosition,
    pub target_sig: String,
    pub member: Rc<str>,
    pub callback: Callback,
}

/// The configuration store: ordered configured sources, factories, and
/// callbacks, queried during plan compilation.
#[derive(Clone, Default)]
pub struct UserConfigurations {
    data_sources: Vec<ConfiguredDataSource>,
    factories: Vec<ConfiguredObjectFactory>,
    callbacks: Vec<ConfiguredCallback>,
}

impl UserConfigurations {
    pub fn add_data_source(&mut self, source: ConfiguredDataSource) {
        self.data_sources.push(source);
    }

    pub fn add_factory(&mut self, factory: ConfiguredObjectFactory) {
        self.factories.push(factory);
    }

    pub fn add_callback(&mut self, callback: ConfiguredCallback) {
        self.callbacks.push(callback);
    }

    /// Configured sources for this exact member, in configuration order.
    pub fn data_sources_for(&self, data: &MemberMapperData) -> Vec<DataSource> {
        let source_sig = data.source_ty.signature();
        let target_sig = data.target_root_ty.signature();
        let path = data.key_segments();
        self.data_sources
            .iter()
            .filter(|c| {
                c.source_sig == source_sig
                    && c.target_sig == target_sig
                    && paths_match(&c.member_path, &path)
            })
            .map(ConfiguredDataSource::to_data_source)
            .collect()
    }

    /// Raw configured value expressions for duplicate detection.
    pub fn configured_values_for(&self, data: &MemberMapperData) -> Vec<ExprRef> {
        let source_sig = data.source_ty.signature();
        let target_sig = data.target_root_ty.signature();
        let path = data.key_segments();
        self.data_sources
            .iter()
            .filter(|c| {
                c.source_sig == source_sig
                    && c.target_sig == target_sig
                    && paths_match(&c.member_path, &path)
            })
            .map(|c| c.value.clone())
            .collect()
    }

    /// Configured factories for a shape pair, in configuration order.
    pub fn object_factories_for(
        &self,
        source_sig: &str,
        target_sig: &str,
    ) -> Vec<&ConfiguredObjectFactory> {
        self.factories
            .iter()
            .filter(|f| f.source_sig == source_sig && f.target_sig == target_sig)
            .collect()
    }

    pub fn callbacks_for(
        &self,
        position: CallbackPosition,
        target_sig: &str,
        member: &str,
    ) -> Vec<Callback> {
        self.callbacks
            .iter()
            .filter(|c| {
                c.position == position
                    && c.target_sig == target_sig
                    && c.member.eq_ignore_ascii_case(member)
            })
            .map(|c| c.callback.clone())
            .collect()
    }
}

fn paths_match(a: &[Rc<str>], b: &[Rc<str>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.eq_ignore_ascii_case(y))
}

/// Registry-wide state shared by every compilation and execution: shape
/// metadata, naming, converters, user configuration, and the plan cache.
/// Owned by the mapper; never ambient.
pub struct MapperContext {
    pub shapes: ShapeRegistry,
    pub naming: NamingSettings,
    pub converters: ConverterCatalog,
    pub user_config: UserConfigurations,
    pub finder: DataSourceFinder,
    pub cache: PlanCache,
    revision: u64,
}

impl Default for MapperContext {
    fn default() -> Self {
        Self::new()
    }
}

impl MapperContext {
    pub fn new() -> MapperContext {
        MapperContext {
            shapes: ShapeRegistry::new(),
            naming: NamingSettings::new(),
            converters: ConverterCatalog::new(),
            user_config: UserConfigurations::default(),
            finder: DataSourceFinder::new(),
            cache: PlanCache::new(),
            revision: 0,
        }
    }

    /// The configuration revision. Compiled plans record the revision they
    /// were built at and are lazily recompiled after any mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }
}
