// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Validated runtime configuration.
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::scheduler::SchedulerKind;

fn join_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(a, b)| format!("{a}/{b}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty<T: Ord>(set: BTreeSet<T>) -> Option<BTreeSet<T>> {
    (!set.is_empty()).then_some(set)
}

fn empty_as_none<'de, D, T>(de: D) -> Result<Option<BTreeSet<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Ord,
{
    Ok(Option::<BTreeSet<T>>::deserialize(de)?.and_then(non_empty))
}

/// Configuration and program-shape errors, raised before any step runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `max_terms` was set to zero.
    #[error("max_terms must be positive when provided")]
    InvalidMaxTerms,
    /// `walk_depth` was set to zero.
    #[error("walk_depth must be positive when provided")]
    InvalidWalkDepth,
    /// A rule name is both included and excluded.
    #[error("rules cannot be both included and excluded: {0:?}")]
    OverlappingRules(Vec<String>),
    /// A scale is both included and excluded.
    #[error("scales cannot be both included and excluded: {0:?}")]
    OverlappingScales(Vec<u32>),
    /// Two rules share a name.
    #[error("duplicate rule name: {0}")]
    DuplicateRuleName(String),
    /// Static conflicts found; pairs are `(earlier, later)` rule names.
    #[error("conflicting rule patterns detected: {}", join_pairs(.0))]
    ConflictingRules(Vec<(String, String)>),
    /// A rule filter names a rule that does not exist.
    #[error("unknown rule in filter: {0}")]
    UnknownRuleFilter(String),
    /// A state bundle names a scheduler this build does not know.
    #[error("unknown scheduler: {0}")]
    UnknownScheduler(String),
    /// A program's `max_steps` was zero.
    #[error("max_steps must be positive")]
    InvalidMaxSteps,
    /// The root violates the program's structural constraints.
    #[error("root violates constraints: {}", .0.join("; "))]
    ConstraintViolation(Vec<String>),
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reading or writing a config file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Every runtime knob in one value.
///
/// Construct with [`RuntimeConfig::default`] and the `with_*` builders, or load
/// from JSON. [`RuntimeConfig::validate`] runs at runtime construction and on
/// state restore.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Frontier policy.
    pub scheduler: SchedulerKind,
    /// Schedule children of loaded/produced terms as well.
    pub walk_children: bool,
    /// Depth bound for child walks; `None` is unbounded.
    pub walk_depth: Option<usize>,
    /// Fail on the first term matched by more than one rule.
    pub strict_matching: bool,
    /// Reject statically conflicting rule sets at construction.
    pub detect_conflicts: bool,
    /// Per-rule fire limits.
    pub rule_budgets: BTreeMap<String, u64>,
    /// Store size ceiling; exceeding it freezes growth.
    pub max_terms: Option<usize>,
    /// When set, only these rules are eligible. An empty set means no filter.
    #[serde(deserialize_with = "empty_as_none")]
    pub include_rules: Option<BTreeSet<String>>,
    /// Rules that are never eligible.
    pub exclude_rules: BTreeSet<String>,
    /// When set, only terms at these scales can match. An empty set means no
    /// filter.
    #[serde(deserialize_with = "empty_as_none")]
    pub include_scales: Option<BTreeSet<u32>>,
    /// Terms at these scales never match.
    pub exclude_scales: BTreeSet<u32>,
}

impl RuntimeConfig {
    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_terms == Some(0) {
            return Err(ConfigError::InvalidMaxTerms);
        }
        if self.walk_depth == Some(0) {
            return Err(ConfigError::InvalidWalkDepth);
        }
        if let Some(include) = &self.include_rules {
            let overlap: Vec<String> = include.intersection(&self.exclude_rules).cloned().collect();
            if !overlap.is_empty() {
                return Err(ConfigError::OverlappingRules(overlap));
            }
        }
        if let Some(include) = &self.include_scales {
            let overlap: Vec<u32> = include.intersection(&self.exclude_scales).copied().collect();
            if !overlap.is_empty() {
                return Err(ConfigError::OverlappingScales(overlap));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Pretty JSON rendering.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Writes the config as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Sets the frontier policy.
    pub fn with_scheduler(mut self, scheduler: SchedulerKind) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Enables child walking, optionally bounded.
    pub fn with_walk_children(mut self, depth: Option<usize>) -> Self {
        self.walk_children = true;
        self.walk_depth = depth;
        self
    }

    /// Toggles strict matching.
    pub fn with_strict_matching(mut self, strict: bool) -> Self {
        self.strict_matching = strict;
        self
    }

    /// Toggles static conflict detection.
    pub fn with_detect_conflicts(mut self, detect: bool) -> Self {
        self.detect_conflicts = detect;
        self
    }

    /// Caps how often `rule` may fire.
    pub fn with_rule_budget(mut self, rule: impl Into<String>, limit: u64) -> Self {
        self.rule_budgets.insert(rule.into(), limit);
        self
    }

    /// Sets the store size ceiling.
    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = Some(max_terms);
        self
    }

    /// Restricts eligible rules.
    pub fn with_include_rules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_rules = non_empty(names.into_iter().map(Into::into).collect());
        self
    }

    /// Excludes rules.
    pub fn with_exclude_rules<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_rules = names.into_iter().map(Into::into).collect();
        self
    }

    /// Restricts matchable scales.
    pub fn with_include_scales(mut self, scales: impl IntoIterator<Item = u32>) -> Self {
        self.include_scales = non_empty(scales.into_iter().collect());
        self
    }

    /// Excludes scales.
    pub fn with_exclude_scales(mut self, scales: impl IntoIterator<Item = u32>) -> Self {
        self.exclude_scales = scales.into_iter().collect();
        self
    }

    /// Collapses empty include sets to `None`.
    pub fn normalized(mut self) -> Self {
        self.include_rules = self.include_rules.and_then(non_empty);
        self.include_scales = self.include_scales.and_then(non_empty);
        self
    }

    /// Returns `true` if rule `name` passes the include/exclude filters.
    pub fn rule_enabled(&self, name: &str) -> bool {
        self.include_rules
            .as_ref()
            .is_none_or(|include| include.is_empty() || include.contains(name))
            && !self.exclude_rules.contains(name)
    }

    /// Returns `true` if terms at `scale` may match at all.
    pub fn scale_enabled(&self, scale: u32) -> bool {
        self.include_scales
            .as_ref()
            .is_none_or(|include| include.is_empty() || include.contains(&scale))
            && !self.exclude_scales.contains(&scale)
    }
}
