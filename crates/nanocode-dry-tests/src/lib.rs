// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Nanocode crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`rules`] - Canonical rule sets (grow/shrink, mark, lift) and a rule builder
//! - [`runtime`] - Runtime builder with config shorthands
//! - [`sinks`] - Capturing event log and shared in-memory trace buffer
//! - [`terms`] - Term tree constructors

pub mod rules;
pub mod runtime;
pub mod sinks;
pub mod terms;

pub use rules::{
    grow_shrink_rules, leaf_expand_rule, lift_rule, mark_rule, prefix_reduce_rule, RuleBuilder,
};
pub use runtime::RuntimeTestBuilder;
pub use sinks::{EventLog, SharedBuffer};
pub use terms::{balanced_tree, leaf, node, spine};
