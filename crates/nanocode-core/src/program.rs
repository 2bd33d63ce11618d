// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Program bundle, validation and the one-shot interpreter.
use crate::config::{ConfigError, RuntimeConfig};
use crate::constraints::{validate_structure, StructuralConstraints};
use crate::ident::TermId;
use crate::rule::{validate_rules, Rule};
use crate::runtime::{Event, Runtime, RuntimeError, RuntimeStats};
use crate::signature::Signature;
use crate::state::RuntimeState;
use crate::store::{StoreError, TermStore};
use crate::term::Term;

/// Default step budget for a program.
pub const DEFAULT_MAX_STEPS: usize = 256;

/// Everything a front end hands to the core: root, rules and limits.
#[derive(Clone, Debug)]
pub struct Program {
    /// Program name.
    pub name: String,
    /// Initial term.
    pub root: Term,
    /// Rules in priority order.
    pub rules: Vec<Rule>,
    /// Step budget.
    pub max_steps: usize,
    /// Store size ceiling.
    pub max_terms: Option<usize>,
    /// Optional structural validator for every term.
    pub signature: Option<Signature>,
    /// Optional shape bounds for the root.
    pub constraints: Option<StructuralConstraints>,
}

impl Program {
    /// Program with default limits and no signature or constraints.
    pub fn new(name: impl Into<String>, root: Term, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            root,
            rules,
            max_steps: DEFAULT_MAX_STEPS,
            max_terms: None,
            signature: None,
            constraints: None,
        }
    }

    /// Copy of this program with a different root.
    pub fn with_root(&self, root: Term) -> Self {
        Self {
            root,
            ..self.clone()
        }
    }

    /// Sets the step budget.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Sets the store size ceiling.
    pub fn with_max_terms(mut self, max_terms: usize) -> Self {
        self.max_terms = Some(max_terms);
        self
    }

    /// Attaches a signature.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Attaches structural constraints.
    pub fn with_constraints(mut self, constraints: StructuralConstraints) -> Self {
        self.constraints = Some(constraints);
        self
    }
}

/// Sanity checks run before execution.
pub fn validate_program(program: &Program) -> Result<(), ConfigError> {
    if program.max_steps == 0 {
        return Err(ConfigError::InvalidMaxSteps);
    }
    if program.max_terms == Some(0) {
        return Err(ConfigError::InvalidMaxTerms);
    }
    validate_rules(&program.rules)?;
    if let Some(constraints) = &program.constraints {
        let violations = validate_structure(&program.root, constraints);
        if !violations.is_empty() {
            return Err(ConfigError::ConstraintViolation(violations));
        }
    }
    Ok(())
}

/// Per-run knobs layered over a [`Program`].
#[derive(Clone, Debug)]
pub struct RunOptions {
    /// Runtime configuration; `max_terms` here overrides the program's.
    pub config: RuntimeConfig,
    /// Drive with `run_until_idle` (default) instead of `run`.
    pub until_idle: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            config: RuntimeConfig::default(),
            until_idle: true,
        }
    }
}

impl RunOptions {
    /// Options wrapping `config`, running until idle.
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Switches to exactly `max_steps` calls of `run`.
    pub fn step_only(mut self) -> Self {
        self.until_idle = false;
        self
    }
}

/// Result of one interpreter run.
#[derive(Clone, Debug)]
pub struct Execution {
    /// Id of the loaded root.
    pub root_id: TermId,
    /// Events emitted by the run.
    pub events: Vec<Event>,
    /// Snapshot taken after the run.
    pub state: RuntimeState,
    /// Summary taken after the run.
    pub stats: RuntimeStats,
}

impl Execution {
    /// Id produced by the last event, or the root when nothing fired.
    pub fn final_term_id(&self) -> TermId {
        self.events.last().map_or(self.root_id, |event| event.after)
    }

    /// Store rebuilt from the captured snapshot.
    pub fn materialize_store(&self) -> Result<TermStore, StoreError> {
        self.state.store()
    }

    /// Materializes [`Execution::final_term_id`] from the snapshot.
    pub fn materialize_final(&self) -> Result<Term, StoreError> {
        self.materialize_store()?.materialize(&self.final_term_id())
    }
}

/// Validates, builds a runtime, loads and runs a [`Program`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Interpreter;

impl Interpreter {
    /// Creates an interpreter.
    pub fn new() -> Self {
        Self
    }

    /// Runs `program` under `options`.
    ///
    /// Rule filters must name existing rules ([`ConfigError::UnknownRuleFilter`]).
    pub fn run(&self, program: &Program, options: RunOptions) -> Result<Execution, RuntimeError> {
        validate_program(program)?;
        let mut config = options.config;
        config.validate()?;

        let filters = config
            .include_rules
            .iter()
            .flatten()
            .chain(config.exclude_rules.iter());
        for name in filters {
            if !program.rules.iter().any(|rule| &rule.name == name) {
                return Err(ConfigError::UnknownRuleFilter(name.clone()).into());
            }
        }

        if config.max_terms.is_none() {
            config.max_terms = program.max_terms;
        }

        let mut runtime = Runtime::new(program.rules.clone(), config)?;
        runtime.set_signature(program.signature.clone());
        let root_id = runtime.load(&program.root)?;
        let events = if options.until_idle {
            runtime.run_until_idle(Some(program.max_steps))?
        } else {
            runtime.run(program.max_steps)?
        };

        Ok(Execution {
            root_id,
            events,
            state: runtime.state(),
            stats: runtime.stats(),
        })
    }
}
