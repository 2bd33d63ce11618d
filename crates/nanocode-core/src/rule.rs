// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rewrite rule definitions, matching policy and static conflict detection.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::config::ConfigError;
use crate::ident::{make_rule_id, Hash};
use crate::term::Term;

/// Executable body of a custom predicate.
pub type PredicateFn = Arc<dyn Fn(&Term) -> bool + Send + Sync>;

/// Extra guard a [`Pattern`] may carry beyond exact sym/scale checks.
#[derive(Clone)]
pub enum Predicate {
    /// Term has no children.
    Leaf,
    /// Term has at least one child.
    Branch,
    /// Symbol starts with the given prefix.
    SymPrefix(String),
    /// Symbol ends with the given suffix.
    SymSuffix(String),
    /// Named closure.
    Custom {
        /// Name used for fingerprinting and logs.
        name: String,
        /// Body.
        func: PredicateFn,
    },
}

impl Predicate {
    /// Custom predicate from a closure.
    pub fn custom<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Term) -> bool + Send + Sync + 'static,
    {
        Self::Custom {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Stable descriptive name.
    pub fn name(&self) -> String {
        match self {
            Self::Leaf => "leaf".to_owned(),
            Self::Branch => "branch".to_owned(),
            Self::SymPrefix(p) => format!("prefix:{p}"),
            Self::SymSuffix(s) => format!("suffix:{s}"),
            Self::Custom { name, .. } => name.clone(),
        }
    }

    /// Evaluates the predicate against `term`.
    pub fn test(&self, term: &Term) -> bool {
        match self {
            Self::Leaf => term.is_leaf(),
            Self::Branch => !term.is_leaf(),
            Self::SymPrefix(p) => term.sym.starts_with(p.as_str()),
            Self::SymSuffix(s) => term.sym.ends_with(s.as_str()),
            Self::Custom { func, .. } => func(term),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name())
    }
}

/// Conjunctive term filter: exact sym, exact scale and predicate, each optional.
#[derive(Clone, Debug, Default)]
pub struct Pattern {
    /// Required symbol, if any.
    pub sym: Option<String>,
    /// Required scale, if any.
    pub scale: Option<u32>,
    /// Extra guard, if any.
    pub predicate: Option<Predicate>,
}

impl Pattern {
    /// Matches every term.
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches exactly `sym` at `scale`.
    pub fn exact(sym: impl Into<String>, scale: u32) -> Self {
        Self::any().with_sym(sym).with_scale(scale)
    }

    /// Requires `sym`.
    #[must_use]
    pub fn with_sym(mut self, sym: impl Into<String>) -> Self {
        self.sym = Some(sym.into());
        self
    }

    /// Requires `scale`.
    #[must_use]
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Requires `predicate`.
    #[must_use]
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Returns `true` iff every configured check passes.
    pub fn matches(&self, term: &Term) -> bool {
        if self.sym.as_deref().is_some_and(|sym| sym != term.sym) {
            return false;
        }
        if self.scale.is_some_and(|scale| scale != term.scale) {
            return false;
        }
        self.predicate.as_ref().is_none_or(|p| p.test(term))
    }

    /// Exact `(sym, scale)` key when both are set and no predicate is present.
    pub fn exact_key(&self) -> Option<(&str, u32)> {
        match (&self.sym, self.scale, &self.predicate) {
            (Some(sym), Some(scale), None) => Some((sym.as_str(), scale)),
            _ => None,
        }
    }
}

/// Named rewrite: terms matching `pattern` are rewritten by `action`.
#[derive(Clone, Debug)]
pub struct Rule {
    /// Deterministic identifier derived from the name.
    pub id: Hash,
    /// Unique name within a rule set.
    pub name: String,
    /// Which terms the rule applies to.
    pub pattern: Pattern,
    /// Rewrite to apply.
    pub action: Action,
}

impl Rule {
    /// Builds a rule; the id is derived from `name`.
    pub fn new(name: impl Into<String>, pattern: Pattern, action: Action) -> Self {
        let name = name.into();
        Self {
            id: make_rule_id(&name),
            name,
            pattern,
            action,
        }
    }

    /// Returns `true` when the rule's pattern matches `term`.
    pub fn applies(&self, term: &Term) -> bool {
        self.pattern.matches(term)
    }
}

/// All rules whose pattern matches `term`, in rule-list order.
pub fn matching_rules<'r>(rules: &'r [Rule], term: &Term) -> Vec<&'r Rule> {
    rules.iter().filter(|rule| rule.applies(term)).collect()
}

/// First-registered-wins tie-break over [`matching_rules`].
pub fn first_match<'r>(rules: &'r [Rule], term: &Term) -> Option<&'r Rule> {
    rules.iter().find(|rule| rule.applies(term))
}

/// Pairs of rules that always collide: both exact on the same `(sym, scale)`
/// with no predicate. Pairs are `(earlier, later)` in list order.
///
/// Predicate-bearing and wildcard patterns are not analysed.
pub fn conflicting_rules(rules: &[Rule]) -> Vec<(&Rule, &Rule)> {
    let mut out = Vec::new();
    for (i, a) in rules.iter().enumerate() {
        let Some(key) = a.pattern.exact_key() else {
            continue;
        };
        for b in &rules[i + 1..] {
            if b.pattern.exact_key() == Some(key) {
                out.push((a, b));
            }
        }
    }
    out
}

/// Rejects rule sets with duplicate names.
pub fn validate_rules(rules: &[Rule]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for rule in rules {
        if !seen.insert(rule.name.as_str()) {
            return Err(ConfigError::DuplicateRuleName(rule.name.clone()));
        }
    }
    Ok(())
}
