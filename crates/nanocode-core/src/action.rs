// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rewrite actions: built-in scale operators plus a name-keyed extension point.
//!
//! Every action is introspectable as `(name, params)` via [`Action::spec`], so
//! rule sets can be fingerprinted and rebuilt through an [`ActionRegistry`]
//! without carrying closures across a serialization boundary.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::TermStore;
use crate::term::Term;

/// Executable body of a custom action.
pub type ActionFn = Arc<dyn Fn(&Term, &TermStore) -> Result<Term, ActionError> + Send + Sync>;

/// Executable body of a custom summarizer.
pub type SummarizeFn = Arc<dyn Fn(&[Term]) -> String + Send + Sync>;

/// Constructor for a registered custom action, fed the [`ActionSpec`] params.
pub type ActionFactory =
    Arc<dyn Fn(&BTreeMap<String, String>) -> Result<Action, ActionError> + Send + Sync>;

/// Default fan-out for `expand` when the param is omitted.
pub const DEFAULT_FANOUT: usize = 3;

/// Errors produced while building or applying actions.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// `reduce` was asked to go below scale 0.
    #[error("cannot reduce {sym} below scale 0")]
    ScaleUnderflow {
        /// Symbol of the offending term.
        sym: String,
    },
    /// No built-in or registered action has this name.
    #[error("unknown action: {0}")]
    UnknownAction(String),
    /// A param failed to parse.
    #[error("invalid param {param}={value} for action {action}")]
    InvalidParam {
        /// Action being built.
        action: String,
        /// Param key.
        param: String,
        /// Raw value supplied.
        value: String,
    },
    /// No built-in or registered summarizer has this name.
    #[error("unknown summarizer: {0}")]
    UnknownSummarizer(String),
    /// A custom action reported a failure.
    #[error("action {action} failed: {reason}")]
    Custom {
        /// Action name.
        action: String,
        /// Failure description.
        reason: String,
    },
}

/// Produces the text threaded into a `summary:` child by `reduce`.
#[derive(Clone, Default)]
pub enum Summarizer {
    /// Sorted `sym@scale=count` histogram over every descendant of the children.
    #[default]
    Histogram,
    /// Pipe-joined symbols of the immediate children.
    ChildSymbols,
    /// User-registered summarizer.
    Custom {
        /// Registry key.
        name: String,
        /// Body.
        func: SummarizeFn,
    },
}

impl Summarizer {
    /// Registry name.
    pub fn name(&self) -> &str {
        match self {
            Self::Histogram => "histogram",
            Self::ChildSymbols => "child_symbols",
            Self::Custom { name, .. } => name,
        }
    }

    /// Built-in summarizer by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "histogram" => Some(Self::Histogram),
            "child_symbols" => Some(Self::ChildSymbols),
            _ => None,
        }
    }

    /// Runs the summarizer over `children`.
    pub fn summarize(&self, children: &[Term]) -> String {
        match self {
            Self::Histogram => histogram_summary(children),
            Self::ChildSymbols => children
                .iter()
                .map(|c| c.sym.as_str())
                .collect::<Vec<_>>()
                .join("|"),
            Self::Custom { func, .. } => func(children),
        }
    }
}

impl fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Summarizer({})", self.name())
    }
}

/// A custom, user-supplied action.
#[derive(Clone)]
pub struct CustomAction {
    name: String,
    params: BTreeMap<String, String>,
    func: ActionFn,
}

impl fmt::Debug for CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Named, parameterized rewrite `(Term, &TermStore) -> Term`.
#[derive(Clone, Debug)]
pub enum Action {
    /// Raise a subtree one scale level by emitting motif children.
    Expand {
        /// Exact number of motif children to produce.
        fanout: usize,
    },
    /// Collapse children into one `summary:` leaf one scale level down.
    Reduce {
        /// Summary text producer.
        summarizer: Summarizer,
    },
    /// Wrap the term as the sole child of `lift[<sym>]` one level up.
    Lift,
    /// Return the term unchanged.
    Identity,
    /// User-registered action.
    Custom(CustomAction),
}

/// Serializable description of an action: name plus string params.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActionSpec {
    /// Action name.
    pub name: String,
    /// Params, sorted by key.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ActionSpec {
    /// Spec with no params.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    /// Adds a param.
    pub fn with_param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(key.into(), value.to_string());
        self
    }
}

impl Action {
    /// `expand` with the given fan-out.
    pub fn expand(fanout: usize) -> Self {
        Self::Expand { fanout }
    }

    /// `reduce` with the default histogram summarizer.
    pub fn reduce() -> Self {
        Self::Reduce {
            summarizer: Summarizer::Histogram,
        }
    }

    /// `reduce` with a specific summarizer.
    pub fn reduce_with(summarizer: Summarizer) -> Self {
        Self::Reduce { summarizer }
    }

    /// `lift`.
    pub fn lift() -> Self {
        Self::Lift
    }

    /// `identity`.
    pub fn identity() -> Self {
        Self::Identity
    }

    /// Custom action from a closure.
    pub fn custom<F>(name: impl Into<String>, params: BTreeMap<String, String>, func: F) -> Self
    where
        F: Fn(&Term, &TermStore) -> Result<Term, ActionError> + Send + Sync + 'static,
    {
        Self::Custom(CustomAction {
            name: name.into(),
            params,
            func: Arc::new(func),
        })
    }

    /// Action name.
    pub fn name(&self) -> &str {
        match self {
            Self::Expand { .. } => "expand",
            Self::Reduce { .. } => "reduce",
            Self::Lift => "lift",
            Self::Identity => "identity",
            Self::Custom(c) => &c.name,
        }
    }

    /// Action params, sorted by key.
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        match self {
            Self::Expand { fanout } => {
                params.insert("fanout".to_owned(), fanout.to_string());
            }
            Self::Reduce { summarizer } => {
                params.insert("summarizer".to_owned(), summarizer.name().to_owned());
            }
            Self::Lift | Self::Identity => {}
            Self::Custom(c) => params.clone_from(&c.params),
        }
        params
    }

    /// Serializable description of this action.
    pub fn spec(&self) -> ActionSpec {
        ActionSpec {
            name: self.name().to_owned(),
            params: self.params(),
        }
    }

    /// Applies the action to `term`.
    pub fn apply(&self, term: &Term, store: &TermStore) -> Result<Term, ActionError> {
        match self {
            Self::Expand { fanout } => Ok(expand(term, *fanout)),
            Self::Reduce { summarizer } => reduce(term, summarizer),
            Self::Lift => Ok(lift(term)),
            Self::Identity => Ok(term.clone()),
            Self::Custom(c) => (c.func)(term, store),
        }
    }
}

/// Raises `term` one scale level by emitting motif children.
///
/// For window sizes `1..=min(fanout, leaves)`, every contiguous window of the
/// pre-order leaf sequence becomes `motif[a|b|...]` at `scale + 1`. Short
/// inputs are padded with `motif[<sym>#<i>]` children wrapping the first leaf
/// until exactly `fanout` motifs exist.
pub fn expand(term: &Term, fanout: usize) -> Term {
    let leaves = term.leaves();
    let scale = term.scale + 1;
    let mut motifs: Vec<Term> = Vec::new();

    for size in 1..=fanout.min(leaves.len()) {
        for window in leaves.windows(size) {
            let label = window
                .iter()
                .map(|leaf| leaf.sym.as_str())
                .collect::<Vec<_>>()
                .join("|");
            motifs.push(Term::new(
                format!("motif[{label}]"),
                scale,
                window.iter().map(|leaf| (*leaf).clone()).collect(),
            ));
        }
    }

    if let Some(first) = leaves.first() {
        while motifs.len() < fanout {
            motifs.push(Term::new(
                format!("motif[{}#{}]", term.sym, motifs.len()),
                scale,
                vec![(*first).clone()],
            ));
        }
    }

    Term::new(format!("F({})", term.sym), scale, motifs)
}

/// Strips one `F(...)` or `expand[...]` wrapper from a symbol.
pub fn base_symbol(sym: &str) -> &str {
    if let Some(inner) = sym.strip_prefix("F(").and_then(|s| s.strip_suffix(')')) {
        return inner;
    }
    if let Some(inner) = sym.strip_prefix("expand[").and_then(|s| s.strip_suffix(']')) {
        return inner;
    }
    sym
}

/// Collapses `term`'s children into one summary leaf at `scale - 1`.
///
/// A childless term is returned unchanged; callers that need a strict
/// precondition must check [`Term::is_leaf`] first.
pub fn reduce(term: &Term, summarizer: &Summarizer) -> Result<Term, ActionError> {
    if term.children.is_empty() {
        return Ok(term.clone());
    }
    let scale = term
        .scale
        .checked_sub(1)
        .ok_or_else(|| ActionError::ScaleUnderflow {
            sym: term.sym.clone(),
        })?;
    let summary = summarizer.summarize(&term.children);
    let child = Term::leaf(format!("summary:{summary}"), scale);
    Ok(Term::new(base_symbol(&term.sym), scale, vec![child]))
}

/// Wraps `term` unchanged under `lift[<sym>]` at `scale + 1`.
pub fn lift(term: &Term) -> Term {
    Term::new(format!("lift[{}]", term.sym), term.scale + 1, vec![term.clone()])
}

/// Default summarizer: `sym@scale=count` over every descendant, sorted by key.
pub fn histogram_summary(children: &[Term]) -> String {
    fn walk(term: &Term, counts: &mut BTreeMap<String, usize>) {
        *counts
            .entry(format!("{}@{}", term.sym, term.scale))
            .or_default() += 1;
        for child in &term.children {
            walk(child, counts);
        }
    }

    let mut counts = BTreeMap::new();
    for child in children {
        walk(child, &mut counts);
    }
    counts
        .iter()
        .map(|(key, count)| format!("{key}={count}"))
        .collect::<Vec<_>>()
        .join(";")
}

/// Rebuilds actions from [`ActionSpec`]s.
///
/// Built-ins (`expand`, `reduce`, `lift`, `identity`) are always available;
/// custom actions and summarizers are registered by name.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionFactory>,
    summarizers: BTreeMap<String, SummarizeFn>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("summarizers", &self.summarizers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    /// Registry holding only the built-ins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom action constructor under `name`.
    pub fn register_action<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&BTreeMap<String, String>) -> Result<Action, ActionError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(factory));
    }

    /// Registers a custom summarizer under `name`.
    pub fn register_summarizer<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Term]) -> String + Send + Sync + 'static,
    {
        self.summarizers.insert(name.into(), Arc::new(func));
    }

    /// Resolves a summarizer by name (built-ins first).
    pub fn summarizer(&self, name: &str) -> Result<Summarizer, ActionError> {
        if let Some(builtin) = Summarizer::builtin(name) {
            return Ok(builtin);
        }
        self.summarizers
            .get(name)
            .map(|func| Summarizer::Custom {
                name: name.to_owned(),
                func: Arc::clone(func),
            })
            .ok_or_else(|| ActionError::UnknownSummarizer(name.to_owned()))
    }

    /// Builds an action from its spec.
    pub fn build(&self, spec: &ActionSpec) -> Result<Action, ActionError> {
        match spec.name.as_str() {
            "expand" => {
                let fanout = match spec.params.get("fanout") {
                    Some(raw) => raw.parse().map_err(|_| ActionError::InvalidParam {
                        action: spec.name.clone(),
                        param: "fanout".to_owned(),
                        value: raw.clone(),
                    })?,
                    None => DEFAULT_FANOUT,
                };
                Ok(Action::expand(fanout))
            }
            "reduce" => {
                let summarizer = match spec.params.get("summarizer") {
                    Some(name) => self.summarizer(name)?,
                    None => Summarizer::Histogram,
                };
                Ok(Action::reduce_with(summarizer))
            }
            "lift" => Ok(Action::lift()),
            "identity" => Ok(Action::identity()),
            other => {
                let factory = self
                    .actions
                    .get(other)
                    .ok_or_else(|| ActionError::UnknownAction(other.to_owned()))?;
                factory(&spec.params)
            }
        }
    }
}
