// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Complete, serializable runtime snapshot for pause and resume.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, RuntimeConfig};
use crate::ident::TermId;
use crate::scheduler::SchedulerKind;
use crate::store::{StoreError, TermRecord, TermStore};

/// Everything needed to rebuild an equivalent runtime via
/// [`Runtime::load_state`](crate::Runtime::load_state).
///
/// Sets serialize in ascending order. A missing `frontier` means "derive it
/// from the root"; an empty one means "nothing pending".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    /// Flat `id -> record` store contents.
    pub records: BTreeMap<TermId, TermRecord>,
    /// Loaded root.
    pub root: Option<TermId>,
    /// Pending ids in scheduler storage order.
    #[serde(default)]
    pub frontier: Option<Vec<TermId>>,
    /// Ids already dequeued.
    #[serde(default)]
    pub processed: BTreeSet<TermId>,
    /// `"fifo"`, `"lifo"` or `"random"`.
    pub scheduler: String,
    /// Seed for `random`.
    #[serde(default)]
    pub scheduler_seed: Option<u64>,
    /// Live generator state for `random`.
    #[serde(default)]
    pub scheduler_state: Option<[u64; 2]>,
    /// Child walking flag.
    #[serde(default)]
    pub walk_children: bool,
    /// Strict matching flag.
    #[serde(default)]
    pub strict_matching: bool,
    /// Child walk depth bound.
    #[serde(default)]
    pub walk_depth: Option<usize>,
    /// Per-rule fire limits.
    #[serde(default)]
    pub rule_budgets: BTreeMap<String, u64>,
    /// Rules that hit their limit.
    #[serde(default)]
    pub rule_budget_exhausted: BTreeSet<String>,
    /// Store size ceiling.
    #[serde(default)]
    pub max_terms: Option<usize>,
    /// Sticky ceiling flag.
    #[serde(default)]
    pub term_limit_exhausted: bool,
    /// Rule allow-list.
    #[serde(default)]
    pub include_rules: Option<BTreeSet<String>>,
    /// Rule deny-list.
    #[serde(default)]
    pub exclude_rules: BTreeSet<String>,
    /// Scale allow-list.
    #[serde(default)]
    pub include_scales: Option<BTreeSet<u32>>,
    /// Scale deny-list.
    #[serde(default)]
    pub exclude_scales: BTreeSet<u32>,
    /// Static conflict detection flag.
    #[serde(default)]
    pub detect_conflicts: bool,
    /// Fire counts per rule, so budgets carry across a resume.
    #[serde(default)]
    pub rule_counts: BTreeMap<String, u64>,
    /// Fire counts per scale.
    #[serde(default)]
    pub scale_counts: BTreeMap<u32, u64>,
}

impl RuntimeState {
    /// Runtime configuration encoded in this snapshot (not yet validated).
    pub fn config(&self) -> Result<RuntimeConfig, ConfigError> {
        let scheduler = SchedulerKind::from_name(&self.scheduler, self.scheduler_seed)
            .ok_or_else(|| ConfigError::UnknownScheduler(self.scheduler.clone()))?;
        Ok(RuntimeConfig {
            scheduler,
            walk_children: self.walk_children,
            walk_depth: self.walk_depth,
            strict_matching: self.strict_matching,
            detect_conflicts: self.detect_conflicts,
            rule_budgets: self.rule_budgets.clone(),
            max_terms: self.max_terms,
            include_rules: self.include_rules.clone(),
            exclude_rules: self.exclude_rules.clone(),
            include_scales: self.include_scales.clone(),
            exclude_scales: self.exclude_scales.clone(),
        })
    }

    /// Rebuilds the store from `records`.
    pub fn store(&self) -> Result<TermStore, StoreError> {
        TermStore::from_records(self.records.clone())
    }

    /// Compact JSON rendering.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a JSON snapshot.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
