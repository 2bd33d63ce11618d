// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Term tree constructors for tests.

use nanocode_core::Term;

/// Scale-0 leaf.
pub fn leaf(sym: &str) -> Term {
    Term::leaf(sym, 0)
}

/// Scale-0 node over `children`.
pub fn node(sym: &str, children: Vec<Term>) -> Term {
    Term::new(sym, 0, children)
}

/// Complete tree of the given depth and fan-out; leaves are `l<i>` in
/// left-to-right order, inner nodes `n<depth>`.
///
/// `depth == 0` yields a single leaf `l0`.
pub fn balanced_tree(depth: usize, fanout: usize) -> Term {
    fn build(depth: usize, fanout: usize, next_leaf: &mut usize) -> Term {
        if depth == 0 {
            let sym = format!("l{next_leaf}");
            *next_leaf += 1;
            return leaf(&sym);
        }
        let children = (0..fanout)
            .map(|_| build(depth - 1, fanout, next_leaf))
            .collect();
        node(&format!("n{depth}"), children)
    }
    let mut next_leaf = 0;
    build(depth, fanout, &mut next_leaf)
}

/// Linear chain `s<len-1>(...(s1(s0)))` of `len` nodes.
pub fn spine(len: usize) -> Term {
    let mut term = leaf("s0");
    for i in 1..len {
        term = node(&format!("s{i}"), vec![term]);
    }
    term
}
