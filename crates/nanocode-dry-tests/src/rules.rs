// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical rule sets and a small builder for ad hoc rules.

use nanocode_core::{Action, Pattern, Predicate, Rule};

/// `expand` with the given fan-out on every childless term.
pub fn leaf_expand_rule(fanout: usize) -> Rule {
    Rule::new(
        "expand",
        Pattern::any().with_predicate(Predicate::Leaf),
        Action::expand(fanout),
    )
}

/// `reduce` on every symbol starting with `F(`.
pub fn prefix_reduce_rule() -> Rule {
    Rule::new(
        "reduce",
        Pattern::any().with_predicate(Predicate::SymPrefix("F(".into())),
        Action::reduce(),
    )
}

/// The grow/shrink pair: [`leaf_expand_rule`] then [`prefix_reduce_rule`].
pub fn grow_shrink_rules(fanout: usize) -> Vec<Rule> {
    vec![leaf_expand_rule(fanout), prefix_reduce_rule()]
}

/// Universal identity rule named `mark`.
pub fn mark_rule() -> Rule {
    Rule::new("mark", Pattern::any(), Action::identity())
}

/// Universal `lift` rule with the given name.
pub fn lift_rule(name: &str) -> Rule {
    Rule::new(name, Pattern::any(), Action::lift())
}

/// Builder for rules whose pattern is assembled piecewise.
///
/// # Example
///
/// ```
/// use nanocode_dry_tests::RuleBuilder;
/// use nanocode_core::{Action, Term};
///
/// let rule = RuleBuilder::new("grow")
///     .sym("A")
///     .scale(0)
///     .build(Action::expand(2));
/// assert!(rule.applies(&Term::leaf("A", 0)));
/// ```
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    name: String,
    pattern: Pattern,
}

impl RuleBuilder {
    /// Starts a rule that matches everything.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            pattern: Pattern::any(),
        }
    }

    /// Requires an exact symbol.
    pub fn sym(mut self, sym: &str) -> Self {
        self.pattern = self.pattern.with_sym(sym);
        self
    }

    /// Requires an exact scale.
    pub fn scale(mut self, scale: u32) -> Self {
        self.pattern = self.pattern.with_scale(scale);
        self
    }

    /// Adds a predicate.
    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.pattern = self.pattern.with_predicate(predicate);
        self
    }

    /// Finishes the rule with `action`.
    pub fn build(self, action: Action) -> Rule {
        Rule::new(self.name, self.pattern, action)
    }
}
