// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Runtime builder utilities for tests.

use nanocode_core::{
    ConfigError, Rule, Runtime, RuntimeConfig, RuntimeError, SchedulerKind, Signature, Term,
    TermId,
};

/// Builder for runtimes with common test configurations.
///
/// # Example
///
/// ```
/// use nanocode_dry_tests::{mark_rule, RuntimeTestBuilder};
/// use nanocode_core::Term;
///
/// let (mut rt, root) = RuntimeTestBuilder::new()
///     .with_rule(mark_rule())
///     .lifo()
///     .load(&Term::leaf("A", 0))
///     .unwrap();
/// assert_eq!(rt.step().unwrap().unwrap().before, root);
/// ```
#[derive(Debug, Default, Clone)]
pub struct RuntimeTestBuilder {
    rules: Vec<Rule>,
    config: RuntimeConfig,
    signature: Option<Signature>,
}

impl RuntimeTestBuilder {
    /// Empty rule set, default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Appends several rules.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = Rule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Replaces the config wholesale.
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Edits the config in place.
    pub fn configure(mut self, f: impl FnOnce(RuntimeConfig) -> RuntimeConfig) -> Self {
        self.config = f(self.config);
        self
    }

    /// LIFO scheduling.
    pub fn lifo(self) -> Self {
        self.configure(|c| c.with_scheduler(SchedulerKind::Lifo))
    }

    /// Seeded random scheduling.
    pub fn random(self, seed: u64) -> Self {
        self.configure(|c| c.with_scheduler(SchedulerKind::Random { seed }))
    }

    /// Unbounded child walking.
    pub fn walk_children(self) -> Self {
        self.configure(|c| c.with_walk_children(None))
    }

    /// Attaches a signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Builds the runtime.
    pub fn build(self) -> Result<Runtime, ConfigError> {
        let mut rt = Runtime::new(self.rules, self.config)?;
        rt.set_signature(self.signature);
        Ok(rt)
    }

    /// Builds the runtime and loads `root`.
    pub fn load(self, root: &Term) -> Result<(Runtime, TermId), RuntimeError> {
        let mut rt = self.build()?;
        let id = rt.load(root)?;
        Ok((rt, id))
    }
}
