// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::config::RuleSetKind;
use crate::error::PlanCompileError;
use crate::ir::{Block, ExprRef};
use crate::shape::TypeRef;

use core::fmt;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use anyhow::Result;
use log::debug;

/// Cached artifact kind. Disjoint key namespaces keep construction-decision
/// caching from colliding with full-procedure caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlanKind {
    Mapper,
    Construction,
}

impl fmt::Display for PlanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanKind::Mapper => write!(f, "Mapper"),
            PlanKind::Construction => write!(f, "Ctor"),
        }
    }
}

/// Deterministic composite cache key: source and target shape signatures,
/// rule-set name, artifact kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlanKey {
    pub source_sig: String,
    pub target_sig: String,
    pub rule_set: &'static str,
    pub kind: PlanKind,
}

impl fmt::Display for PlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {} {}",
            self.source_sig, self.target_sig, self.rule_set, self.kind
        )
    }
}

/// Build the cache key for a shape pair. Plans nested under a dictionary
/// source carry their target member path in the target signature, since the
/// path changes the composite key names they probe.
pub fn plan_key(
    source_sig: String,
    target_ty: &TypeRef,
    prefix: &[Rc<str>],
    rule_set: RuleSetKind,
    kind: PlanKind,
) -> PlanKey {
    let target_sig = if prefix.is_empty() {
        target_ty.signature()
    } else {
        let path: Vec<&str> = prefix.iter().map(|s| s.as_ref()).collect();
        format!("{}@{}", target_ty.signature(), path.join("."))
    };
    PlanKey {
        source_sig,
        target_sig,
        rule_set: rule_set.name(),
        kind,
    }
}

/// A compiled mapping procedure: the persistent, reusable artifact for one
/// (source shape, target shape, rule set). Other plans are referenced only
/// indirectly, through the cache, so recursive shapes compile lazily.
#[derive(Debug)]
pub struct MappingPlan {
    pub key: PlanKey,
    pub rule_set: RuleSetKind,
    pub body: Block,
    /// Conjunction of the member sets' source-type tests, where any arose.
    pub source_type_test: Option<ExprRef>,
}

/// A cached construction decision: the conditional construction cascade and
/// the scratch bindings its argument expressions need.
#[derive(Debug)]
pub struct Construction {
    pub expr: ExprRef,
    pub variables: Vec<(Rc<str>, ExprRef)>,
}

#[derive(Clone)]
enum Artifact {
    Plan(Rc<MappingPlan>),
    Construction(Rc<Construction>),
}

enum Entry {
    /// A compilation for this key is running.
    InFlight,
    Ready {
        artifact: Artifact,
        revision: u64,
    },
}

/// Memoizes compiled artifacts per key, bound to the owning mapper context.
///
/// Get-or-add is single-flight: one compilation proceeds per absent key and
/// every caller observes the same artifact. A re-entrant request for a key
/// already in flight is a compile error, since it could only mean unbounded
/// plan recursion. Entries compiled under an older configuration revision
/// are recompiled lazily.
#[derive(Default)]
pub struct PlanCache {
    entries: RefCell<BTreeMap<PlanKey, Entry>>,
}

impl PlanCache {
    pub fn new() -> PlanCache {
        PlanCache::default()
    }

    pub fn get_or_add_plan<F>(&self, key: PlanKey, revision: u64, compile: F) -> Result<Rc<MappingPlan>>
    where
        F: FnOnce() -> Result<Rc<MappingPlan>>,
    {
        let artifact = self.get_or_add(key, revision, || compile().map(Artifact::Plan))?;
        match artifact {
            Artifact::Plan(plan) => Ok(plan),
            Artifact::Construction(_) => unreachable!("plan keys never hold constructions"),
        }
    }

    pub fn get_or_add_construction<F>(
        &self,
        key: PlanKey,
        revision: u64,
        compile: F,
    ) -> Result<Rc<Construction>>
    where
        F: FnOnce() -> Result<Rc<Construction>>,
    {
        let artifact = self.get_or_add(key, revision, || compile().map(Artifact::Construction))?;
        match artifact {
            Artifact::Construction(c) => Ok(c),
            Artifact::Plan(_) => unreachable!("construction keys never hold plans"),
        }
    }

    fn get_or_add<F>(&self, key: PlanKey, revision: u64, compile: F) -> Result<Artifact>
    where
        F: FnOnce() -> Result<Artifact>,
    {
        {
            let mut entries = self.entries.borrow_mut();
            match entries.get(&key) {
                Some(Entry::Ready {
                    artifact,
                    revision: compiled_at,
                }) if *compiled_at == revision => {
                    debug!("cache hit: {key}");
                    return Ok(artifact.clone());
                }
                Some(Entry::Ready { .. }) => {
                    debug!("cache entry stale, recompiling: {key}");
                }
                Some(Entry::InFlight) => {
                    return Err(PlanCompileError::RecursivePlanCompilation {
                        key: key.to_string(),
                    }
                    .into());
                }
                None => {}
            }
            entries.insert(key.clone(), Entry::InFlight);
        }

        // The borrow is released while compiling: nested requests for other
        // keys are expected and fine.
        let result = compile();

        let mut entries = self.entries.borrow_mut();
        match result {
            Ok(artifact) => {
                debug!("compiled: {key}");
                entries.insert(
                    key,
                    Entry::Ready {
                        artifact: artifact.clone(),
                        revision,
                    },
                );
                Ok(artifact)
            }
            Err(e) => {
                // Failures are not cached; the configuration must be
                // corrected before a retry can succeed.
                entries.remove(&key);
                Err(e)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}
