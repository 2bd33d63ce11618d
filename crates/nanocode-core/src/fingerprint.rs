// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Deterministic BLAKE3 fingerprints for terms, rules and programs.
//!
//! All integers are little-endian `u64`; strings are length-prefixed; absent
//! optionals encode as a single `0` tag byte and present ones as `1` followed
//! by the value. Each entry point uses its own domain prefix.
use blake3::Hasher;

use crate::constraints::StructuralConstraints;
use crate::ident::Hash;
use crate::program::Program;
use crate::rule::{Predicate, Rule};
use crate::signature::Signature;
use crate::term::Term;

fn put_u64(h: &mut Hasher, v: u64) {
    h.update(&v.to_le_bytes());
}

fn put_len(h: &mut Hasher, n: usize) {
    put_u64(h, n as u64);
}

fn put_str(h: &mut Hasher, s: &str) {
    put_len(h, s.len());
    h.update(s.as_bytes());
}

fn put_opt_u64(h: &mut Hasher, v: Option<u64>) {
    match v {
        None => {
            h.update(&[0]);
        }
        Some(v) => {
            h.update(&[1]);
            put_u64(h, v);
        }
    }
}

fn put_opt_str(h: &mut Hasher, v: Option<&str>) {
    match v {
        None => {
            h.update(&[0]);
        }
        Some(s) => {
            h.update(&[1]);
            put_str(h, s);
        }
    }
}

fn hash_term_into(h: &mut Hasher, term: &Term) {
    put_str(h, &term.sym);
    put_u64(h, u64::from(term.scale));
    put_len(h, term.children.len());
    for child in &term.children {
        hash_term_into(h, child);
    }
}

/// Structural fingerprint of a term tree (prefix `b"fp:term:"`).
pub fn fingerprint_term(term: &Term) -> Hash {
    let mut h = Hasher::new();
    h.update(b"fp:term:");
    hash_term_into(&mut h, term);
    h.finalize().into()
}

fn hash_predicate_into(h: &mut Hasher, predicate: Option<&Predicate>) {
    let tag: u8 = match predicate {
        None => 0,
        Some(Predicate::Leaf) => 1,
        Some(Predicate::Branch) => 2,
        Some(Predicate::SymPrefix(_)) => 3,
        Some(Predicate::SymSuffix(_)) => 4,
        Some(Predicate::Custom { .. }) => 5,
    };
    h.update(&[tag]);
    if let Some(predicate) = predicate {
        put_str(h, &predicate.name());
    }
}

fn hash_rule_into(h: &mut Hasher, rule: &Rule) {
    put_str(h, &rule.name);
    put_opt_str(h, rule.pattern.sym.as_deref());
    put_opt_u64(h, rule.pattern.scale.map(u64::from));
    hash_predicate_into(h, rule.pattern.predicate.as_ref());
    let spec = rule.action.spec();
    put_str(h, &spec.name);
    put_len(h, spec.params.len());
    for (key, value) in &spec.params {
        put_str(h, key);
        put_str(h, value);
    }
}

/// Fingerprint of a rule's name, pattern shape and action spec (prefix `b"fp:rule:"`).
///
/// Custom predicates and actions contribute only their names and params.
pub fn fingerprint_rule(rule: &Rule) -> Hash {
    let mut h = Hasher::new();
    h.update(b"fp:rule:");
    hash_rule_into(&mut h, rule);
    h.finalize().into()
}

fn hash_constraints_into(h: &mut Hasher, c: Option<&StructuralConstraints>) {
    let Some(c) = c else {
        h.update(&[0]);
        return;
    };
    h.update(&[1]);
    put_opt_u64(h, c.max_nodes.map(|v| v as u64));
    put_opt_u64(h, c.max_depth.map(|v| v as u64));
    put_opt_u64(h, c.max_fanout.map(|v| v as u64));
    put_opt_u64(h, c.min_scale.map(u64::from));
    put_opt_u64(h, c.max_scale.map(u64::from));
}

fn hash_signature_into(h: &mut Hasher, sig: Option<&Signature>) {
    let Some(sig) = sig else {
        h.update(&[0]);
        return;
    };
    h.update(&[1]);
    put_len(h, sig.len());
    for entry in sig.iter() {
        put_str(h, &entry.sym);
        put_len(h, entry.min_children);
        put_opt_u64(h, entry.max_children.map(|v| v as u64));
        match &entry.allowed_scales {
            None => {
                h.update(&[0]);
            }
            Some(scales) => {
                h.update(&[1]);
                put_len(h, scales.len());
                for scale in scales {
                    put_u64(h, u64::from(*scale));
                }
            }
        }
    }
}

/// Fingerprint of a whole program (prefix `b"fp:program:"`): name, root,
/// step and term limits, constraints, signature, then rules in order.
pub fn fingerprint_program(program: &Program) -> Hash {
    let mut h = Hasher::new();
    h.update(b"fp:program:");
    put_str(&mut h, &program.name);
    hash_term_into(&mut h, &program.root);
    put_len(&mut h, program.max_steps);
    put_opt_u64(&mut h, program.max_terms.map(|v| v as u64));
    hash_constraints_into(&mut h, program.constraints.as_ref());
    hash_signature_into(&mut h, program.signature.as_ref());
    put_len(&mut h, program.rules.len());
    for rule in &program.rules {
        hash_rule_into(&mut h, rule);
    }
    h.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::rule::{Pattern, Predicate};
    use crate::signature::TermSignature;

    fn program() -> Program {
        Program::new(
            "demo",
            Term::leaf("A", 0),
            vec![Rule::new(
                "grow",
                Pattern::any().with_predicate(Predicate::Leaf),
                Action::expand(2),
            )],
        )
    }

    #[test]
    fn term_fingerprint_is_structural() {
        let a = Term::new("p", 0, vec![Term::leaf("x", 1)]);
        let b = Term::new("p", 0, vec![Term::leaf("x", 1)]);
        let c = Term::new("p", 0, vec![Term::leaf("x", 2)]);
        assert_eq!(fingerprint_term(&a), fingerprint_term(&b));
        assert_ne!(fingerprint_term(&a), fingerprint_term(&c));
    }

    #[test]
    fn rule_fingerprint_tracks_action_params_and_pattern() {
        let base = Rule::new("r", Pattern::exact("A", 0), Action::expand(2));
        let same = Rule::new("r", Pattern::exact("A", 0), Action::expand(2));
        let other_fanout = Rule::new("r", Pattern::exact("A", 0), Action::expand(3));
        let wildcard = Rule::new("r", Pattern::any().with_sym("A"), Action::expand(2));
        assert_eq!(fingerprint_rule(&base), fingerprint_rule(&same));
        assert_ne!(fingerprint_rule(&base), fingerprint_rule(&other_fanout));
        assert_ne!(fingerprint_rule(&base), fingerprint_rule(&wildcard));
    }

    #[test]
    fn rule_fingerprint_separates_predicate_kinds_with_equal_names() {
        let builtin = Rule::new(
            "r",
            Pattern::any().with_predicate(Predicate::SymPrefix("x".into())),
            Action::lift(),
        );
        let custom = Rule::new(
            "r",
            Pattern::any().with_predicate(Predicate::custom("prefix:x", |t: &Term| {
                t.sym.starts_with('x')
            })),
            Action::lift(),
        );
        assert_eq!(
            builtin.pattern.predicate.as_ref().map(Predicate::name),
            custom.pattern.predicate.as_ref().map(Predicate::name)
        );
        assert_ne!(fingerprint_rule(&builtin), fingerprint_rule(&custom));
    }

    #[test]
    fn program_fingerprint_covers_limits_and_signature() {
        let base = fingerprint_program(&program());
        assert_eq!(base, fingerprint_program(&program()));

        let mut steps = program();
        steps.max_steps = 10;
        assert_ne!(base, fingerprint_program(&steps));

        let mut terms = program();
        terms.max_terms = Some(5);
        assert_ne!(base, fingerprint_program(&terms));

        let mut signed = program();
        signed.signature = Some(Signature::new([TermSignature::leaf("A")]).expect("sig"));
        assert_ne!(base, fingerprint_program(&signed));

        let mut bounded = program();
        bounded.constraints = Some(StructuralConstraints {
            max_nodes: Some(3),
            ..StructuralConstraints::default()
        });
        assert_ne!(base, fingerprint_program(&bounded));
    }
}
