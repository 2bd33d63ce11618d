// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Frontier schedulers: FIFO, LIFO and seeded random.
//!
//! Ordering invariants:
//! - FIFO pops in push order; LIFO pops most-recent first.
//! - Random pops a uniformly chosen pending entry using [`Prng`]; the
//!   remaining entries keep their relative order.
//! - `pending()` always reports entries in storage order, which is also the
//!   order that reproduces the scheduler when pushed again on restore.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ident::TermId;
use crate::prng::Prng;

/// Shared contract for frontier ordering policies.
pub trait Scheduler {
    /// Adds `id` to the frontier.
    fn push(&mut self, id: TermId);
    /// Removes and returns the next id, or `None` when empty.
    fn pop(&mut self) -> Option<TermId>;
    /// Drops every pending id.
    fn clear(&mut self);
    /// Ordered snapshot of pending ids.
    fn pending(&self) -> Vec<TermId>;
    /// Number of pending ids.
    fn len(&self) -> usize;
    /// Policy implemented by this scheduler.
    fn kind(&self) -> SchedulerKind;
    /// Returns `true` when nothing is pending.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Strict insertion-order queue.
#[derive(Debug, Default, Clone)]
pub struct FifoScheduler {
    queue: VecDeque<TermId>,
}

impl Scheduler for FifoScheduler {
    fn push(&mut self, id: TermId) {
        self.queue.push_back(id);
    }

    fn pop(&mut self) -> Option<TermId> {
        self.queue.pop_front()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }

    fn pending(&self) -> Vec<TermId> {
        self.queue.iter().copied().collect()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Fifo
    }
}

/// Strict stack: most recently pushed pops first.
#[derive(Debug, Default, Clone)]
pub struct LifoScheduler {
    stack: Vec<TermId>,
}

impl Scheduler for LifoScheduler {
    fn push(&mut self, id: TermId) {
        self.stack.push(id);
    }

    fn pop(&mut self) -> Option<TermId> {
        self.stack.pop()
    }

    fn clear(&mut self) {
        self.stack.clear();
    }

    fn pending(&self) -> Vec<TermId> {
        self.stack.clone()
    }

    fn len(&self) -> usize {
        self.stack.len()
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Lifo
    }
}

/// Uniform random pops driven by a seeded [`Prng`].
///
/// `seed` is informational once running: future draws are governed by the
/// live generator state, which [`RandomScheduler::state`] exposes.
#[derive(Debug, Clone)]
pub struct RandomScheduler {
    seed: u64,
    rng: Prng,
    pending: Vec<TermId>,
}

impl RandomScheduler {
    /// Creates an empty scheduler seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Prng::from_seed_u64(seed),
            pending: Vec::new(),
        }
    }

    /// Seed the scheduler was created with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Live generator state.
    pub fn state(&self) -> [u64; 2] {
        self.rng.state()
    }

    /// Replaces the live generator state; the pending set is untouched.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.rng = Prng::from_state(state);
    }
}

impl Scheduler for RandomScheduler {
    fn push(&mut self, id: TermId) {
        self.pending.push(id);
    }

    fn pop(&mut self) -> Option<TermId> {
        if self.pending.is_empty() {
            return None;
        }
        let idx = self.rng.next_below(self.pending.len());
        Some(self.pending.remove(idx))
    }

    fn clear(&mut self) {
        self.pending.clear();
    }

    fn pending(&self) -> Vec<TermId> {
        self.pending.clone()
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn kind(&self) -> SchedulerKind {
        SchedulerKind::Random { seed: self.seed }
    }
}

/// Selects which frontier policy the runtime uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Insertion order.
    #[default]
    Fifo,
    /// Reverse insertion order.
    Lifo,
    /// Seeded uniform random order.
    Random {
        /// Seed for the generator.
        seed: u64,
    },
}

impl SchedulerKind {
    /// Stable lowercase name used in state bundles.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Lifo => "lifo",
            Self::Random { .. } => "random",
        }
    }

    /// Seed for seeded kinds.
    pub fn seed(&self) -> Option<u64> {
        match self {
            Self::Random { seed } => Some(*seed),
            Self::Fifo | Self::Lifo => None,
        }
    }

    /// Inverse of [`SchedulerKind::name`]; `random` defaults to seed `0`.
    pub fn from_name(name: &str, seed: Option<u64>) -> Option<Self> {
        match name {
            "fifo" => Some(Self::Fifo),
            "lifo" => Some(Self::Lifo),
            "random" => Some(Self::Random {
                seed: seed.unwrap_or(0),
            }),
            _ => None,
        }
    }
}

/// Runtime-owned scheduler: dispatches to the selected policy.
#[derive(Debug, Clone)]
pub enum Frontier {
    /// FIFO policy.
    Fifo(FifoScheduler),
    /// LIFO policy.
    Lifo(LifoScheduler),
    /// Seeded random policy.
    Random(RandomScheduler),
}

impl Default for Frontier {
    fn default() -> Self {
        Self::new(SchedulerKind::Fifo)
    }
}

impl Frontier {
    /// Builds an empty frontier for `kind`.
    pub fn new(kind: SchedulerKind) -> Self {
        match kind {
            SchedulerKind::Fifo => Self::Fifo(FifoScheduler::default()),
            SchedulerKind::Lifo => Self::Lifo(LifoScheduler::default()),
            SchedulerKind::Random { seed } => Self::Random(RandomScheduler::new(seed)),
        }
    }

    /// Seed for seeded policies.
    pub fn seed(&self) -> Option<u64> {
        self.kind().seed()
    }

    /// Generator state for seeded policies.
    pub fn rng_state(&self) -> Option<[u64; 2]> {
        match self {
            Self::Random(s) => Some(s.state()),
            Self::Fifo(_) | Self::Lifo(_) => None,
        }
    }

    /// Restores generator state; ignored by unseeded policies.
    pub fn set_rng_state(&mut self, state: [u64; 2]) {
        if let Self::Random(s) = self {
            s.set_state(state);
        }
    }

    fn inner(&self) -> &dyn Scheduler {
        match self {
            Self::Fifo(s) => s,
            Self::Lifo(s) => s,
            Self::Random(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Scheduler {
        match self {
            Self::Fifo(s) => s,
            Self::Lifo(s) => s,
            Self::Random(s) => s,
        }
    }
}

impl Scheduler for Frontier {
    fn push(&mut self, id: TermId) {
        self.inner_mut().push(id);
    }

    fn pop(&mut self) -> Option<TermId> {
        self.inner_mut().pop()
    }

    fn clear(&mut self) {
        self.inner_mut().clear();
    }

    fn pending(&self) -> Vec<TermId> {
        self.inner().pending()
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn kind(&self) -> SchedulerKind {
        self.inner().kind()
    }
}
