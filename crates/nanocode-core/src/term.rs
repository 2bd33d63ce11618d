// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Immutable scale-tagged term trees.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Immutable labeled tree node.
///
/// Equality and hashing are structural over `sym`, `scale` and the ordered
/// `children`. Terms are never edited in place; every rewrite builds a new
/// value and hands it to the [`TermStore`](crate::TermStore) for interning.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Term {
    /// Symbol label.
    pub sym: String,
    /// Discrete level in the multi-resolution hierarchy.
    #[serde(default)]
    pub scale: u32,
    /// Ordered children; order is significant for identity.
    #[serde(default)]
    pub children: Vec<Term>,
}

impl Term {
    /// Builds a term from its parts.
    pub fn new(sym: impl Into<String>, scale: u32, children: Vec<Term>) -> Self {
        Self {
            sym: sym.into(),
            scale,
            children,
        }
    }

    /// Builds a childless term.
    pub fn leaf(sym: impl Into<String>, scale: u32) -> Self {
        Self::new(sym, scale, Vec::new())
    }

    /// Returns `true` when the term has no children.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Leaves of the tree in pre-order, left to right.
    ///
    /// A childless term is its own single leaf.
    pub fn leaves(&self) -> Vec<&Term> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.children.is_empty() {
                out.push(node);
                continue;
            }
            stack.extend(node.children.iter().rev());
        }
        out
    }

    /// Total number of nodes in the tree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Term::node_count).sum::<usize>()
    }
}

/// S-expression rendering: `(sym :scale n child...)`, leaves at scale 0 as bare symbols.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() && self.scale == 0 {
            return f.write_str(&self.sym);
        }
        write!(f, "({}", self.sym)?;
        if self.scale != 0 {
            write!(f, " :scale {}", self.scale)?;
        }
        for child in &self.children {
            write!(f, " {child}")?;
        }
        f.write_str(")")
    }
}
