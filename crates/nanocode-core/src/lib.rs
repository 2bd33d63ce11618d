// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! nanocode-core: deterministic multi-scale term rewriting.
//!
//! Terms are immutable, scale-tagged trees interned into a content-addressed
//! [`TermStore`]. A [`Runtime`] pops term ids from a [`Frontier`] (FIFO, LIFO
//! or seeded random), matches them against an ordered rule list and records
//! every applied rewrite as an [`Event`]. Runs are reproducible bit for bit and
//! can be paused and resumed through [`RuntimeState`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::needless_pass_by_value
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod action;
mod config;
mod constraints;
mod fingerprint;
mod ident;
mod prng;
mod program;
mod rule;
mod runtime;
mod scheduler;
mod signature;
mod state;
mod store;
mod term;
mod trace;

/// Built-in actions, summarizers and the name-keyed registry.
pub use action::{
    base_symbol, expand, histogram_summary, lift, reduce, Action, ActionError, ActionFactory,
    ActionFn, ActionRegistry, ActionSpec, CustomAction, SummarizeFn, Summarizer, DEFAULT_FANOUT,
};
/// Validated runtime configuration.
pub use config::{ConfigError, RuntimeConfig};
/// Tree metrics and structural bounds.
pub use constraints::{
    measure_structure, validate_structure, StructuralConstraints, StructuralMetrics,
};
/// Deterministic fingerprints.
pub use fingerprint::{fingerprint_program, fingerprint_rule, fingerprint_term};
/// Identifiers and canonical hashing.
pub use ident::{make_rule_id, term_key_hash, Hash, ParseTermIdError, TermId};
/// Seedable generator behind the random scheduler.
pub use prng::Prng;
/// Program bundle and interpreter.
pub use program::{
    validate_program, Execution, Interpreter, Program, RunOptions, DEFAULT_MAX_STEPS,
};
/// Patterns, rules and matching policy.
pub use rule::{
    conflicting_rules, first_match, matching_rules, validate_rules, Pattern, Predicate,
    PredicateFn, Rule,
};
/// Runtime state machine.
pub use runtime::{Event, Runtime, RuntimeError, RuntimeStats};
/// Frontier policies.
pub use scheduler::{
    FifoScheduler, Frontier, LifoScheduler, RandomScheduler, Scheduler, SchedulerKind,
};
/// Per-symbol structural validation.
pub use signature::{Signature, SignatureError, TermSignature};
/// Pause/resume snapshot.
pub use state::RuntimeState;
/// Content-addressed store.
pub use store::{StoreError, TermRecord, TermStore};
/// Term trees.
pub use term::Term;
/// Event hooks and JSONL tracing.
pub use trace::{dump_events, read_trace, EventHook, EventRecord, JsonlTracer};
