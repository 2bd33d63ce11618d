// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stepping runtime: scheduling, matching, budgets and snapshots.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::action::ActionError;
use crate::config::{ConfigError, RuntimeConfig};
use crate::ident::TermId;
use crate::rule::{conflicting_rules, validate_rules, Rule};
use crate::scheduler::{Frontier, Scheduler};
use crate::signature::{Signature, SignatureError};
use crate::state::RuntimeState;
use crate::store::{StoreError, TermStore};
use crate::term::Term;
use crate::trace::EventHook;

/// One applied rewrite. Append-only once emitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    /// Id of the rewritten term.
    pub before: TermId,
    /// Id of the produced term.
    pub after: TermId,
    /// Rule that fired.
    pub rule: String,
    /// Scale of the rewritten term.
    pub scale: u32,
    /// Full rewritten term.
    pub before_term: Term,
    /// Full produced term.
    pub after_term: Term,
}

/// Fatal runtime conditions; each one halts `run`/`run_until_idle`.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Store lookup or import failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A loaded or produced term violated the signature.
    #[error(transparent)]
    Signature(#[from] SignatureError),
    /// An action failed.
    #[error(transparent)]
    Action(#[from] ActionError),
    /// Strict matching found more than one candidate rule.
    #[error(
        "ambiguous match for term {} at scale {}: {}",
        .term.sym,
        .term.scale,
        .rules.join(", ")
    )]
    AmbiguousMatch {
        /// The doubly-matched term.
        term: Term,
        /// Every matching rule, in rule-list order.
        rules: Vec<String>,
    },
    /// The operation needs a loaded root.
    #[error("runtime has no loaded term")]
    NotLoaded,
}

/// Side-effect-free activity summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    /// Events emitted since load.
    pub events: usize,
    /// Fires per rule.
    pub rule_counts: BTreeMap<String, u64>,
    /// Fires per scale.
    pub scale_counts: BTreeMap<u32, u64>,
    /// Pending ids.
    pub frontier: Vec<TermId>,
    /// Store record count.
    pub store_size: usize,
    /// Nothing pending.
    pub idle: bool,
    /// Last run stopped on its step budget with work pending.
    pub budget_exhausted: bool,
    /// Rules that hit their fire budget.
    pub rule_budget_exhausted: Vec<String>,
    /// Store size ceiling tripped.
    pub term_limit_exhausted: bool,
}

/// Deterministic rewriting runtime.
///
/// Owns the [`TermStore`], the frontier and all per-run bookkeeping. Given
/// the same root, rules and [`RuntimeConfig`], two runtimes emit identical
/// event sequences and end with identical stores.
pub struct Runtime {
    rules: Vec<Rule>,
    config: RuntimeConfig,
    signature: Option<Signature>,
    store: TermStore,
    frontier: Frontier,
    root: Option<TermId>,
    processed: BTreeSet<TermId>,
    queued: FxHashSet<TermId>,
    rule_counts: BTreeMap<String, u64>,
    scale_counts: BTreeMap<u32, u64>,
    rule_budget_exhausted: BTreeSet<String>,
    budget_exhausted: bool,
    term_limit_exhausted: bool,
    events: Vec<Event>,
    hooks: Vec<Box<dyn EventHook>>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("rules", &self.rules.len())
            .field("config", &self.config)
            .field("root", &self.root)
            .field("store", &self.store.len())
            .field("pending", &self.frontier.len())
            .field("events", &self.events.len())
            .field("hooks", &self.hooks.len())
            .finish_non_exhaustive()
    }
}

fn check_rule_set(rules: &[Rule], config: &RuntimeConfig) -> Result<(), ConfigError> {
    config.validate()?;
    validate_rules(rules)?;
    if config.detect_conflicts {
        let conflicts: Vec<(String, String)> = conflicting_rules(rules)
            .into_iter()
            .map(|(a, b)| (a.name.clone(), b.name.clone()))
            .collect();
        if !conflicts.is_empty() {
            return Err(ConfigError::ConflictingRules(conflicts));
        }
    }
    Ok(())
}

impl Runtime {
    /// Builds a runtime after validating `config` and the rule set.
    ///
    /// # Errors
    /// Any [`RuntimeConfig::validate`] failure, duplicate rule names, and,
    /// with `detect_conflicts`, [`ConfigError::ConflictingRules`].
    pub fn new(rules: Vec<Rule>, config: RuntimeConfig) -> Result<Self, ConfigError> {
        let config = config.normalized();
        check_rule_set(&rules, &config)?;
        Ok(Self {
            frontier: Frontier::new(config.scheduler),
            rules,
            config,
            signature: None,
            store: TermStore::new(),
            root: None,
            processed: BTreeSet::new(),
            queued: FxHashSet::default(),
            rule_counts: BTreeMap::new(),
            scale_counts: BTreeMap::new(),
            rule_budget_exhausted: BTreeSet::new(),
            budget_exhausted: false,
            term_limit_exhausted: false,
            events: Vec::new(),
            hooks: Vec::new(),
        })
    }

    /// Attaches a signature checked on every loaded and produced term.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Replaces (or clears) the attached signature.
    pub fn set_signature(&mut self, signature: Option<Signature>) {
        self.signature = signature;
    }

    /// Registers an observer called after every emitted event.
    pub fn add_hook(&mut self, hook: impl EventHook + 'static) {
        self.hooks.push(Box::new(hook));
    }

    fn reset(&mut self) {
        self.events.clear();
        self.processed.clear();
        self.queued.clear();
        self.frontier = Frontier::new(self.config.scheduler);
        self.rule_counts.clear();
        self.scale_counts.clear();
        self.budget_exhausted = false;
        self.rule_budget_exhausted.clear();
        self.term_limit_exhausted = false;
        self.root = None;
    }

    /// Resets all run state, interns `root` into a fresh store and schedules it.
    #[instrument(skip_all, fields(sym = %root.sym, scale = root.scale))]
    pub fn load(&mut self, root: &Term) -> Result<TermId, RuntimeError> {
        self.store = TermStore::new();
        self.reset();
        if let Some(signature) = &self.signature {
            signature.validate_tree(root)?;
        }
        let id = self.store.add(root);
        self.root = Some(id);
        self.check_term_limit();
        self.schedule_tree(id, 0)?;
        info!(root = %id.short(), store = self.store.len(), pending = self.frontier.len(), "loaded");
        Ok(id)
    }

    /// Restores a snapshot produced by [`Runtime::state`].
    ///
    /// Replaces the store, configuration, budgets and scheduler (including
    /// generator state). Rules, hooks and the signature are kept. The bundle
    /// is fully checked first, so on error the runtime is left unchanged.
    #[instrument(skip_all, fields(scheduler = %state.scheduler))]
    pub fn load_state(&mut self, state: RuntimeState) -> Result<TermId, RuntimeError> {
        let config = state.config()?.normalized();
        check_rule_set(&self.rules, &config)?;
        let store = TermStore::from_records(state.records)?;
        let root = state.root.ok_or(RuntimeError::NotLoaded)?;
        if !store.contains(&root) {
            return Err(StoreError::NotFound(root).into());
        }
        if let Some(missing) = state
            .frontier
            .iter()
            .flatten()
            .find(|id| !store.contains(id))
        {
            return Err(StoreError::NotFound(*missing).into());
        }
        if let Some(signature) = &self.signature {
            signature.validate_tree(&store.materialize(&root)?)?;
        }

        self.config = config;
        self.store = store;
        self.reset();
        self.root = Some(root);
        self.processed = state.processed;
        self.rule_budget_exhausted = state.rule_budget_exhausted;
        self.rule_counts = state.rule_counts;
        self.scale_counts = state.scale_counts;
        self.term_limit_exhausted = state.term_limit_exhausted;

        match state.frontier {
            Some(frontier) => {
                for id in frontier {
                    self.schedule_term(id);
                }
            }
            None => self.schedule_tree(root, 0)?,
        }
        if let Some(rng) = state.scheduler_state {
            self.frontier.set_rng_state(rng);
        }
        self.check_term_limit();
        info!(root = %root.short(), store = self.store.len(), pending = self.frontier.len(), "state restored");
        Ok(root)
    }

    /// Schedules an id already present in the store, walking children per config.
    pub fn schedule(&mut self, id: TermId) -> Result<(), RuntimeError> {
        if !self.store.contains(&id) {
            return Err(StoreError::NotFound(id).into());
        }
        self.schedule_tree(id, 0)?;
        Ok(())
    }

    fn schedule_term(&mut self, id: TermId) {
        if self.processed.contains(&id) || !self.queued.insert(id) {
            return;
        }
        self.frontier.push(id);
    }

    fn schedule_tree(&mut self, id: TermId, depth: usize) -> Result<(), StoreError> {
        self.schedule_term(id);
        if !self.config.walk_children || self.config.walk_depth.is_some_and(|max| depth >= max) {
            return Ok(());
        }
        let children = self.store.children_of(&id)?.to_vec();
        for child in children {
            self.schedule_tree(child, depth + 1)?;
        }
        Ok(())
    }

    fn check_term_limit(&mut self) {
        let Some(max) = self.config.max_terms else {
            return;
        };
        if self.store.len() > max && !self.term_limit_exhausted {
            self.term_limit_exhausted = true;
            warn!(store = self.store.len(), max_terms = max, "term limit exhausted");
        }
    }

    /// Pops one id and applies at most one rewrite.
    ///
    /// Returns `Ok(None)` when the frontier is empty, nothing matches, or the
    /// chosen rule's budget is spent. Fatal conditions are returned as errors.
    pub fn step(&mut self) -> Result<Option<Event>, RuntimeError> {
        let Some(term_id) = self.frontier.pop() else {
            return Ok(None);
        };
        self.queued.remove(&term_id);
        let term = self.store.materialize(&term_id)?;
        self.processed.insert(term_id);

        let matches: Vec<usize> = if self.config.scale_enabled(term.scale) {
            self.rules
                .iter()
                .enumerate()
                .filter(|(_, rule)| self.config.rule_enabled(&rule.name) && rule.applies(&term))
                .map(|(idx, _)| idx)
                .collect()
        } else {
            Vec::new()
        };

        if self.config.strict_matching && matches.len() > 1 {
            let rules = matches
                .iter()
                .map(|idx| self.rules[*idx].name.clone())
                .collect();
            return Err(RuntimeError::AmbiguousMatch { term, rules });
        }

        let Some(&idx) = matches.first() else {
            debug!(term = %term_id.short(), sym = %term.sym, "no matching rule");
            return Ok(None);
        };
        let rule = &self.rules[idx];

        let fired = self.rule_counts.get(&rule.name).copied().unwrap_or(0);
        let over_budget = self
            .config
            .rule_budgets
            .get(&rule.name)
            .is_some_and(|limit| fired >= *limit);
        if over_budget || self.rule_budget_exhausted.contains(&rule.name) {
            debug!(rule = %rule.name, fired, "rule budget exhausted");
            self.rule_budget_exhausted.insert(rule.name.clone());
            return Ok(None);
        }

        let produced = rule.action.apply(&term, &self.store)?;
        if let Some(signature) = &self.signature {
            signature.validate_tree(&produced)?;
        }
        let rule_name = rule.name.clone();
        let new_id = self.store.add(&produced);
        self.check_term_limit();

        let scale = term.scale;
        let event = Event {
            before: term_id,
            after: new_id,
            rule: rule_name.clone(),
            scale,
            before_term: term,
            after_term: produced,
        };
        self.events.push(event.clone());
        *self.rule_counts.entry(rule_name).or_default() += 1;
        *self.scale_counts.entry(scale).or_default() += 1;
        for hook in &mut self.hooks {
            hook.on_event(&event);
        }

        if !self.term_limit_exhausted && new_id != term_id && !self.processed.contains(&new_id) {
            self.schedule_tree(new_id, 0)?;
        }
        debug!(
            rule = %event.rule,
            before = %term_id.short(),
            after = %new_id.short(),
            "rewrite applied"
        );
        Ok(Some(event))
    }

    /// Runs up to `max_steps` steps and returns the events they emitted.
    ///
    /// Stops early when a step finds nothing pending afterwards or the term
    /// limit has tripped. `budget_exhausted` is set iff the steps ran out
    /// with work still pending.
    #[instrument(skip(self))]
    pub fn run(&mut self, max_steps: usize) -> Result<Vec<Event>, RuntimeError> {
        let mut emitted = Vec::new();
        let mut steps = 0;
        while steps < max_steps {
            if self.term_limit_exhausted {
                break;
            }
            let outcome = self.step()?;
            steps += 1;
            match outcome {
                Some(event) => emitted.push(event),
                None if self.frontier.is_empty() => break,
                None => {}
            }
        }
        self.budget_exhausted = steps >= max_steps && !self.frontier.is_empty();
        info!(steps, events = emitted.len(), budget_exhausted = self.budget_exhausted, "run finished");
        Ok(emitted)
    }

    /// Steps until idle, the term limit trips, or `max_steps` is reached.
    #[instrument(skip(self))]
    pub fn run_until_idle(&mut self, max_steps: Option<usize>) -> Result<Vec<Event>, RuntimeError> {
        let mut emitted = Vec::new();
        let mut steps = 0usize;
        loop {
            if self.frontier.is_empty() || self.term_limit_exhausted {
                self.budget_exhausted = false;
                break;
            }
            if max_steps.is_some_and(|max| steps >= max) {
                self.budget_exhausted = true;
                break;
            }
            if let Some(event) = self.step()? {
                emitted.push(event);
            }
            steps += 1;
        }
        info!(steps, events = emitted.len(), budget_exhausted = self.budget_exhausted, "run finished");
        Ok(emitted)
    }

    /// Activity summary; does not mutate anything.
    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            events: self.events.len(),
            rule_counts: self.rule_counts.clone(),
            scale_counts: self.scale_counts.clone(),
            frontier: self.frontier.pending(),
            store_size: self.store.len(),
            idle: self.frontier.is_empty(),
            budget_exhausted: self.budget_exhausted,
            rule_budget_exhausted: self.rule_budget_exhausted.iter().cloned().collect(),
            term_limit_exhausted: self.term_limit_exhausted,
        }
    }

    /// Complete snapshot; feed to [`Runtime::load_state`] to resume.
    pub fn state(&self) -> RuntimeState {
        let kind = self.frontier.kind();
        RuntimeState {
            records: self.store.records().clone(),
            root: self.root,
            frontier: Some(self.frontier.pending()),
            processed: self.processed.clone(),
            scheduler: kind.name().to_owned(),
            scheduler_seed: kind.seed(),
            scheduler_state: self.frontier.rng_state(),
            walk_children: self.config.walk_children,
            strict_matching: self.config.strict_matching,
            walk_depth: self.config.walk_depth,
            rule_budgets: self.config.rule_budgets.clone(),
            rule_budget_exhausted: self.rule_budget_exhausted.clone(),
            max_terms: self.config.max_terms,
            term_limit_exhausted: self.term_limit_exhausted,
            include_rules: self.config.include_rules.clone(),
            exclude_rules: self.config.exclude_rules.clone(),
            include_scales: self.config.include_scales.clone(),
            exclude_scales: self.config.exclude_scales.clone(),
            detect_conflicts: self.config.detect_conflicts,
            rule_counts: self.rule_counts.clone(),
            scale_counts: self.scale_counts.clone(),
        }
    }

    /// Alias for [`Runtime::state`].
    pub fn snapshot(&self) -> RuntimeState {
        self.state()
    }

    /// Term store.
    pub fn store(&self) -> &TermStore {
        &self.store
    }

    /// Emitted events, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Loaded root, if any.
    pub fn root_id(&self) -> Option<TermId> {
        self.root
    }

    /// Pending ids in scheduler storage order.
    pub fn pending(&self) -> Vec<TermId> {
        self.frontier.pending()
    }

    /// Nothing pending.
    pub fn is_idle(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Rule set in priority order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Attached signature.
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Last run stopped on its step budget with work pending.
    pub fn budget_exhausted(&self) -> bool {
        self.budget_exhausted
    }

    /// Store size ceiling tripped.
    pub fn term_limit_exhausted(&self) -> bool {
        self.term_limit_exhausted
    }

    /// Rules that hit their fire budget.
    pub fn rule_budget_exhausted(&self) -> &BTreeSet<String> {
        &self.rule_budget_exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::rule::{Pattern, Predicate};
    use crate::scheduler::SchedulerKind;

    fn grow_rules() -> Vec<Rule> {
        vec![
            Rule::new(
                "expand",
                Pattern::any().with_predicate(Predicate::Leaf),
                Action::expand(2),
            ),
            Rule::new(
                "reduce",
                Pattern::any().with_predicate(Predicate::SymPrefix("F(".into())),
                Action::reduce(),
            ),
        ]
    }

    #[test]
    fn step_on_unloaded_runtime_is_a_noop() {
        let mut rt = Runtime::new(grow_rules(), RuntimeConfig::default()).expect("runtime");
        assert!(rt.step().expect("step").is_none());
        assert!(rt.is_idle());
        assert_eq!(rt.root_id(), None);
    }

    #[test]
    fn load_resets_previous_run() {
        let mut rt = Runtime::new(grow_rules(), RuntimeConfig::default()).expect("runtime");
        rt.load(&Term::leaf("A", 0)).expect("load");
        rt.run_until_idle(None).expect("run");
        assert!(!rt.events().is_empty());
        let id = rt.load(&Term::leaf("B", 0)).expect("reload");
        assert!(rt.events().is_empty());
        assert_eq!(rt.store().len(), 1);
        assert_eq!(rt.pending(), vec![id]);
    }

    #[test]
    fn rejects_duplicate_rule_names() {
        let rules = vec![
            Rule::new("x", Pattern::any(), Action::identity()),
            Rule::new("x", Pattern::any(), Action::lift()),
        ];
        assert!(matches!(
            Runtime::new(rules, RuntimeConfig::default()),
            Err(ConfigError::DuplicateRuleName(_))
        ));
    }

    #[test]
    fn identity_rewrite_is_not_rescheduled() {
        let rules = vec![Rule::new("mark", Pattern::any(), Action::identity())];
        let mut rt = Runtime::new(rules, RuntimeConfig::default()).expect("runtime");
        let id = rt.load(&Term::leaf("x", 0)).expect("load");
        let event = rt.step().expect("step").expect("event");
        assert_eq!(event.before, id);
        assert_eq!(event.after, id);
        assert!(rt.is_idle());
        assert!(rt.step().expect("step").is_none());
    }

    #[test]
    fn walk_depth_bounds_child_scheduling() {
        let root = Term::new(
            "r",
            0,
            vec![Term::new("m", 0, vec![Term::leaf("deep", 0)])],
        );
        let cfg = RuntimeConfig::default().with_walk_children(Some(1));
        let mut rt = Runtime::new(Vec::new(), cfg).expect("runtime");
        rt.load(&root).expect("load");
        assert_eq!(rt.pending().len(), 2);
    }

    #[test]
    fn scale_filters_suppress_all_candidates() {
        let rules = vec![Rule::new("mark", Pattern::any(), Action::lift())];
        let cfg = RuntimeConfig::default().with_exclude_scales([0]);
        let mut rt = Runtime::new(rules, cfg).expect("runtime");
        rt.load(&Term::leaf("x", 0)).expect("load");
        assert!(rt.run_until_idle(None).expect("run").is_empty());
        assert!(rt.is_idle());
    }

    #[test]
    fn run_sets_budget_flag_only_with_pending_work() {
        let rules = vec![Rule::new("lift", Pattern::any(), Action::lift())];
        let mut rt = Runtime::new(rules, RuntimeConfig::default()).expect("runtime");
        rt.load(&Term::leaf("x", 0)).expect("load");
        let events = rt.run(3).expect("run");
        assert_eq!(events.len(), 3);
        assert!(rt.budget_exhausted());
        assert!(rt.stats().budget_exhausted);
    }

    #[test]
    fn random_scheduler_state_is_captured() {
        let cfg = RuntimeConfig::default()
            .with_scheduler(SchedulerKind::Random { seed: 4 })
            .with_walk_children(None);
        let mut rt = Runtime::new(Vec::new(), cfg).expect("runtime");
        rt.load(&Term::new("r", 0, vec![Term::leaf("a", 0), Term::leaf("b", 0)]))
            .expect("load");
        let state = rt.state();
        assert_eq!(state.scheduler, "random");
        assert_eq!(state.scheduler_seed, Some(4));
        assert!(state.scheduler_state.is_some());
    }

    #[test]
    fn ambiguous_match_message_names_rules() {
        let err = RuntimeError::AmbiguousMatch {
            term: Term::leaf("A", 0),
            rules: vec!["r1".into(), "r2".into()],
        };
        assert_eq!(err.to_string(), "ambiguous match for term A at scale 0: r1, r2");
    }
}
