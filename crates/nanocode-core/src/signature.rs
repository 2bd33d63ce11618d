// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Declarative per-symbol structural validation.
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::term::Term;

/// Violations reported by a [`Signature`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// No entry is declared for the symbol.
    #[error("no signature declared for symbol {0}")]
    Undeclared(String),
    /// Fewer children than `min_children`.
    #[error("term {sym} expected at least {min} children, found {found}")]
    TooFewChildren {
        /// Offending symbol.
        sym: String,
        /// Declared lower bound.
        min: usize,
        /// Actual child count.
        found: usize,
    },
    /// More children than `max_children`.
    #[error("term {sym} expected at most {max} children, found {found}")]
    TooManyChildren {
        /// Offending symbol.
        sym: String,
        /// Declared upper bound.
        max: usize,
        /// Actual child count.
        found: usize,
    },
    /// Scale outside the declared set.
    #[error("term {sym} scale {scale} not in allowed scales {allowed:?}")]
    ScaleNotAllowed {
        /// Offending symbol.
        sym: String,
        /// Actual scale.
        scale: u32,
        /// Declared scales, ascending.
        allowed: Vec<u32>,
    },
    /// The same symbol was declared twice.
    #[error("duplicate signature entry for {0}")]
    DuplicateEntry(String),
}

/// Constraints declared for one symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermSignature {
    /// Symbol this entry governs.
    pub sym: String,
    /// Minimum child count.
    pub min_children: usize,
    /// Maximum child count, if bounded.
    pub max_children: Option<usize>,
    /// Permitted scales, if restricted.
    pub allowed_scales: Option<BTreeSet<u32>>,
}

impl TermSignature {
    /// Unbounded entry for `sym`.
    pub fn new(sym: impl Into<String>) -> Self {
        Self {
            sym: sym.into(),
            min_children: 0,
            max_children: None,
            allowed_scales: None,
        }
    }

    /// Leaf-only entry for `sym`.
    pub fn leaf(sym: impl Into<String>) -> Self {
        Self::new(sym).with_children(0, Some(0))
    }

    /// Sets child-count bounds.
    #[must_use]
    pub fn with_children(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_children = min;
        self.max_children = max;
        self
    }

    /// Restricts permitted scales.
    #[must_use]
    pub fn with_scales(mut self, scales: impl IntoIterator<Item = u32>) -> Self {
        self.allowed_scales = Some(scales.into_iter().collect());
        self
    }

    /// Checks one node (children are not visited).
    pub fn validate(&self, term: &Term) -> Result<(), SignatureError> {
        let found = term.children.len();
        if found < self.min_children {
            return Err(SignatureError::TooFewChildren {
                sym: term.sym.clone(),
                min: self.min_children,
                found,
            });
        }
        if let Some(max) = self.max_children.filter(|max| found > *max) {
            return Err(SignatureError::TooManyChildren {
                sym: term.sym.clone(),
                max,
                found,
            });
        }
        if let Some(allowed) = self
            .allowed_scales
            .as_ref()
            .filter(|allowed| !allowed.contains(&term.scale))
        {
            return Err(SignatureError::ScaleNotAllowed {
                sym: term.sym.clone(),
                scale: term.scale,
                allowed: allowed.iter().copied().collect(),
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct EntryWire {
    #[serde(default)]
    min_children: usize,
    #[serde(default)]
    max_children: Option<usize>,
    #[serde(default)]
    scales: Option<Vec<u32>>,
}

#[derive(Serialize, Deserialize)]
struct SignatureWire {
    symbols: BTreeMap<String, EntryWire>,
}

/// Symbol-keyed structural validator.
///
/// JSON shape: `{"symbols": {sym: {min_children, max_children, scales}}}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SignatureWire", into = "SignatureWire")]
pub struct Signature {
    by_sym: BTreeMap<String, TermSignature>,
}

impl Signature {
    /// Builds a signature, rejecting duplicate symbols.
    pub fn new(entries: impl IntoIterator<Item = TermSignature>) -> Result<Self, SignatureError> {
        let mut by_sym = BTreeMap::new();
        for entry in entries {
            if by_sym.contains_key(&entry.sym) {
                return Err(SignatureError::DuplicateEntry(entry.sym));
            }
            by_sym.insert(entry.sym.clone(), entry);
        }
        Ok(Self { by_sym })
    }

    /// Entry for `sym`, if declared.
    pub fn get(&self, sym: &str) -> Option<&TermSignature> {
        self.by_sym.get(sym)
    }

    /// Entries in ascending symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &TermSignature> {
        self.by_sym.values()
    }

    /// Number of declared symbols.
    pub fn len(&self) -> usize {
        self.by_sym.len()
    }

    /// Returns `true` when nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.by_sym.is_empty()
    }

    /// Checks one node against its declared entry.
    pub fn validate_term(&self, term: &Term) -> Result<(), SignatureError> {
        self.get(&term.sym)
            .ok_or_else(|| SignatureError::Undeclared(term.sym.clone()))?
            .validate(term)
    }

    /// Checks every node of the tree in pre-order; stops at the first violation.
    pub fn validate_tree(&self, term: &Term) -> Result<(), SignatureError> {
        self.validate_term(term)?;
        term.children
            .iter()
            .try_for_each(|child| self.validate_tree(child))
    }
}

impl TryFrom<SignatureWire> for Signature {
    type Error = SignatureError;

    fn try_from(wire: SignatureWire) -> Result<Self, Self::Error> {
        Self::new(wire.symbols.into_iter().map(|(sym, entry)| TermSignature {
            sym,
            min_children: entry.min_children,
            max_children: entry.max_children,
            allowed_scales: entry.scales.map(|s| s.into_iter().collect()),
        }))
    }
}

impl From<Signature> for SignatureWire {
    fn from(sig: Signature) -> Self {
        Self {
            symbols: sig
                .by_sym
                .into_iter()
                .map(|(sym, entry)| {
                    (
                        sym,
                        EntryWire {
                            min_children: entry.min_children,
                            max_children: entry.max_children,
                            scales: entry.allowed_scales.map(|s| s.into_iter().collect()),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature::new([
            TermSignature::new("root").with_children(1, Some(2)),
            TermSignature::leaf("leaf").with_scales([0, 1]),
        ])
        .expect("signature")
    }

    #[test]
    fn accepts_conforming_tree() {
        let t = Term::new("root", 0, vec![Term::leaf("leaf", 0), Term::leaf("leaf", 1)]);
        assert_eq!(sig().validate_tree(&t), Ok(()));
    }

    #[test]
    fn reports_each_violation_kind() {
        let s = sig();
        assert_eq!(
            s.validate_term(&Term::leaf("ghost", 0)),
            Err(SignatureError::Undeclared("ghost".into()))
        );
        assert!(matches!(
            s.validate_term(&Term::leaf("root", 0)),
            Err(SignatureError::TooFewChildren { min: 1, found: 0, .. })
        ));
        let wide = Term::new("root", 0, vec![Term::leaf("leaf", 0); 3]);
        assert!(matches!(
            s.validate_term(&wide),
            Err(SignatureError::TooManyChildren { max: 2, found: 3, .. })
        ));
        assert_eq!(
            s.validate_term(&Term::leaf("leaf", 5)),
            Err(SignatureError::ScaleNotAllowed {
                sym: "leaf".into(),
                scale: 5,
                allowed: vec![0, 1],
            })
        );
    }

    #[test]
    fn validate_tree_recurses() {
        let t = Term::new("root", 0, vec![Term::leaf("leaf", 9)]);
        assert!(sig().validate_term(&t).is_ok());
        assert!(matches!(
            sig().validate_tree(&t),
            Err(SignatureError::ScaleNotAllowed { .. })
        ));
    }

    #[test]
    fn duplicates_are_rejected() {
        let res = Signature::new([TermSignature::new("a"), TermSignature::leaf("a")]);
        assert_eq!(res, Err(SignatureError::DuplicateEntry("a".into())));
    }

    #[test]
    fn json_shape_round_trips() {
        let text = serde_json::to_string(&sig()).expect("encode");
        assert_eq!(
            text,
            r#"{"symbols":{"leaf":{"min_children":0,"max_children":0,"scales":[0,1]},"root":{"min_children":1,"max_children":2,"scales":null}}}"#
        );
        let back: Signature = serde_json::from_str(&text).expect("decode");
        assert_eq!(back, sig());
        let sparse: Signature =
            serde_json::from_str(r#"{"symbols":{"x":{}}}"#).expect("sparse decode");
        assert_eq!(sparse.get("x"), Some(&TermSignature::new("x")));
    }
}
