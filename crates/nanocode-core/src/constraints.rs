// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shape metrics and optional structural bounds for term trees.
use serde::{Deserialize, Serialize};

use crate::term::Term;

/// Aggregate measurements of a term tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralMetrics {
    /// Total node count.
    pub nodes: usize,
    /// Childless node count.
    pub leaves: usize,
    /// Depth of the deepest node; the root is depth 1.
    pub max_depth: usize,
    /// Largest child count of any node.
    pub max_fanout: usize,
    /// Smallest scale in the tree.
    pub min_scale: u32,
    /// Largest scale in the tree.
    pub max_scale: u32,
}

/// Optional bounds a well-formed tree must respect.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralConstraints {
    /// Upper bound on `nodes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<usize>,
    /// Upper bound on `max_depth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    /// Upper bound on `max_fanout`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fanout: Option<usize>,
    /// Lower bound on `min_scale`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_scale: Option<u32>,
    /// Upper bound on `max_scale`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
}

/// Measures size, depth, fan-out and scale range of `root`.
pub fn measure_structure(root: &Term) -> StructuralMetrics {
    let mut metrics = StructuralMetrics {
        nodes: 0,
        leaves: 0,
        max_depth: 0,
        max_fanout: 0,
        min_scale: root.scale,
        max_scale: root.scale,
    };
    let mut stack = vec![(root, 1usize)];
    while let Some((term, depth)) = stack.pop() {
        metrics.nodes += 1;
        if term.is_leaf() {
            metrics.leaves += 1;
        }
        metrics.max_depth = metrics.max_depth.max(depth);
        metrics.max_fanout = metrics.max_fanout.max(term.children.len());
        metrics.min_scale = metrics.min_scale.min(term.scale);
        metrics.max_scale = metrics.max_scale.max(term.scale);
        stack.extend(term.children.iter().rev().map(|c| (c, depth + 1)));
    }
    metrics
}

/// Human-readable violations of `constraints`; empty when `root` conforms.
pub fn validate_structure(root: &Term, constraints: &StructuralConstraints) -> Vec<String> {
    let m = measure_structure(root);
    let mut out = Vec::new();
    if let Some(max) = constraints.max_nodes.filter(|max| m.nodes > *max) {
        out.push(format!("nodes={} exceeds max_nodes={max}", m.nodes));
    }
    if let Some(max) = constraints.max_depth.filter(|max| m.max_depth > *max) {
        out.push(format!("max_depth={} exceeds max_depth={max}", m.max_depth));
    }
    if let Some(max) = constraints.max_fanout.filter(|max| m.max_fanout > *max) {
        out.push(format!("max_fanout={} exceeds max_fanout={max}", m.max_fanout));
    }
    if let Some(min) = constraints.min_scale.filter(|min| m.min_scale < *min) {
        out.push(format!("min_scale={} below min_scale={min}", m.min_scale));
    }
    if let Some(max) = constraints.max_scale.filter(|max| m.max_scale > *max) {
        out.push(format!("max_scale={} exceeds max_scale={max}", m.max_scale));
    }
    out
}
