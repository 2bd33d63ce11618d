// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use nanocode_core::{
    dump_events, read_trace, term_key_hash, Action, ConfigError, JsonlTracer, Pattern, Predicate,
    Rule, Runtime, RuntimeError, RuntimeState, Signature, SignatureError, StoreError, Term, TermId,
    TermSignature,
};
use nanocode_dry_tests::{
    grow_shrink_rules, leaf, mark_rule, node, EventLog, RuleBuilder, RuntimeTestBuilder,
    SharedBuffer,
};

#[test]
fn grow_then_shrink_returns_to_the_base_scale() {
    let (mut rt, root) = RuntimeTestBuilder::new()
        .with_rules(grow_shrink_rules(2))
        .load(&Term::leaf("A", 0))
        .expect("load");

    let events = rt.run_until_idle(Some(3)).expect("run");
    assert_eq!(events.len(), 2);
    assert!(rt.is_idle());
    assert!(!rt.budget_exhausted());

    let grow = &events[0];
    assert_eq!(grow.rule, "expand");
    assert_eq!(grow.before, root);
    assert_eq!(grow.after_term.sym, "F(A)");
    assert_eq!(grow.after_term.scale, 1);
    let motifs: Vec<&str> = grow
        .after_term
        .children
        .iter()
        .map(|c| c.sym.as_str())
        .collect();
    assert_eq!(motifs, vec!["motif[A]", "motif[A#1]"]);

    let shrink = &events[1];
    assert_eq!(shrink.rule, "reduce");
    assert_eq!(shrink.before, grow.after);
    assert_eq!(shrink.after_term.sym, "A");
    assert_eq!(shrink.after_term.scale, 0);
    assert_eq!(
        shrink.after_term.children,
        vec![Term::leaf("summary:A@0=2;motif[A#1]@1=1;motif[A]@1=1", 0)]
    );
    // The result carries a summary child, so it is a new term, not the root.
    assert_ne!(shrink.after, root);

    // A, motif[A], motif[A#1], F(A), summary leaf, summarized A
    assert_eq!(rt.store().len(), 6);
    assert_eq!(rt.stats().rule_counts.get("expand"), Some(&1));
    assert_eq!(rt.stats().scale_counts.get(&1), Some(&1));
}

#[test]
fn lifo_child_walk_visits_right_to_left_then_root() {
    let root = node("root", vec![leaf("left"), leaf("right")]);
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .lifo()
        .walk_children()
        .load(&root)
        .expect("load");

    let events = rt.run_until_idle(None).expect("run");
    let order: Vec<&str> = events.iter().map(|e| e.before_term.sym.as_str()).collect();
    assert_eq!(order, vec!["right", "left", "root"]);
    assert!(events.iter().all(|e| e.before == e.after));
}

#[test]
fn fifo_child_walk_follows_preorder() {
    let root = node("root", vec![node("a", vec![leaf("c")]), leaf("b")]);
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .walk_children()
        .load(&root)
        .expect("load");
    let order: Vec<String> = rt
        .run_until_idle(None)
        .expect("run")
        .into_iter()
        .map(|e| e.before_term.sym)
        .collect();
    assert_eq!(order, vec!["root", "a", "c", "b"]);
}

fn overlapping_rules() -> Vec<Rule> {
    vec![
        Rule::new("first", Pattern::exact("A", 0), Action::lift()),
        Rule::new("second", Pattern::exact("A", 0), Action::identity()),
    ]
}

#[test]
fn first_registered_rule_wins_by_default() {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rules(overlapping_rules())
        .load(&Term::leaf("A", 0))
        .expect("load");
    let event = rt.step().expect("step").expect("event");
    assert_eq!(event.rule, "first");
}

#[test]
fn conflict_detection_rejects_overlapping_exact_rules() {
    let err = RuntimeTestBuilder::new()
        .with_rules(overlapping_rules())
        .configure(|c| c.with_detect_conflicts(true))
        .build()
        .expect_err("conflict");
    assert!(matches!(
        err,
        ConfigError::ConflictingRules(pairs)
            if pairs == vec![("first".to_owned(), "second".to_owned())]
    ));
}

#[test]
fn strict_matching_fails_on_ambiguity() {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rules(overlapping_rules())
        .configure(|c| c.with_strict_matching(true))
        .load(&Term::leaf("A", 0))
        .expect("load");
    let err = rt.step().expect_err("ambiguous");
    assert!(matches!(
        err,
        RuntimeError::AmbiguousMatch { ref rules, .. }
            if rules == &vec!["first".to_owned(), "second".to_owned()]
    ));
    assert!(rt.events().is_empty());
}

fn leaf_lift_rule() -> Rule {
    RuleBuilder::new("lift")
        .predicate(Predicate::Leaf)
        .build(Action::lift())
}

#[test]
fn rule_budget_survives_a_snapshot_round_trip() {
    let root = node("r", vec![leaf("a"), leaf("b"), leaf("c")]);
    let builder = RuntimeTestBuilder::new()
        .with_rule(leaf_lift_rule())
        .walk_children()
        .configure(|c| c.with_rule_budget("lift", 1));
    let (mut rt, _) = builder.clone().load(&root).expect("load");

    let events = rt.run(2).expect("run");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].before_term, leaf("a"));
    assert!(rt.budget_exhausted());

    let json = rt.state().to_json().expect("encode");
    let state = RuntimeState::from_json(&json).expect("decode");
    assert_eq!(state, rt.state());

    let mut resumed = builder.build().expect("build");
    resumed.load_state(state).expect("resume");
    let more = resumed.run_until_idle(None).expect("run");
    assert!(more.is_empty(), "budget must carry across resume");
    assert!(resumed.rule_budget_exhausted().contains("lift"));
    assert!(resumed.is_idle());
    assert_eq!(resumed.store().digest(), rt.store().digest());
}

#[test]
fn term_limit_stops_the_run() {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(RuleBuilder::new("lift").build(Action::lift()))
        .configure(|c| c.with_max_terms(1))
        .load(&Term::leaf("x", 0))
        .expect("load");
    let events = rt.run_until_idle(Some(10)).expect("run");
    assert_eq!(events.len(), 1);
    assert!(rt.term_limit_exhausted());
    assert!(rt.stats().term_limit_exhausted);
    assert!(!rt.budget_exhausted());
    assert!(rt.run(5).expect("run").is_empty());
}

#[test]
fn random_schedule_resumes_identically() {
    let root = nanocode_dry_tests::balanced_tree(2, 3);
    let builder = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .random(9)
        .walk_children();

    let (mut reference, _) = builder.clone().load(&root).expect("load");
    let all = reference.run_until_idle(None).expect("run");
    assert_eq!(all.len(), root.node_count());

    let (mut first, _) = builder.clone().load(&root).expect("load");
    let head = first.run(4).expect("run");
    assert_eq!(head, all[..4].to_vec());

    let json = first.state().to_json_pretty().expect("encode");
    let mut second = builder.build().expect("build");
    second
        .load_state(RuntimeState::from_json(&json).expect("decode"))
        .expect("resume");
    let tail = second.run_until_idle(None).expect("run");
    assert_eq!(tail, all[4..].to_vec());
}

#[test]
fn state_without_frontier_is_derived_from_the_root() {
    let (rt, root) = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .walk_children()
        .load(&node("r", vec![leaf("a")]))
        .expect("load");
    let mut state = rt.state();
    state.frontier = None;

    let mut resumed = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .build()
        .expect("build");
    assert_eq!(resumed.load_state(state).expect("resume"), root);
    assert_eq!(resumed.pending(), rt.pending());
}

fn signature() -> Signature {
    Signature::new([TermSignature::leaf("A").with_scales([0])]).expect("signature")
}

#[test]
fn signature_rejects_undeclared_roots() {
    let err = RuntimeTestBuilder::new()
        .with_signature(signature())
        .load(&Term::leaf("B", 0))
        .expect_err("undeclared");
    assert!(matches!(
        err,
        RuntimeError::Signature(SignatureError::Undeclared(sym)) if sym == "B"
    ));
}

#[test]
fn signature_rejects_produced_terms() {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(RuleBuilder::new("lift").build(Action::lift()))
        .with_signature(signature())
        .load(&Term::leaf("A", 0))
        .expect("load");
    let err = rt.step().expect_err("violation");
    assert!(matches!(
        err,
        RuntimeError::Signature(SignatureError::Undeclared(sym)) if sym == "lift[A]"
    ));
    assert!(rt.events().is_empty());
    assert_eq!(rt.store().len(), 1);
}

#[test]
fn hooks_observe_events_in_order() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let log = EventLog::new();
    let buffer = SharedBuffer::new();
    let mut rt = Runtime::new(grow_shrink_rules(2), Default::default()).expect("runtime");
    rt.add_hook(log.clone());
    rt.add_hook(JsonlTracer::new(buffer.clone()));
    rt.load(&Term::leaf("A", 0)).expect("load");
    rt.run_until_idle(None).expect("run");

    assert_eq!(log.rules(), vec!["expand", "reduce"]);
    assert_eq!(log.events(), rt.events().to_vec());
    assert_eq!(buffer.lines().len(), 2);
    let records = read_trace(buffer.contents().as_bytes()).expect("read trace");
    assert_eq!(records, dump_events(rt.events()));
}

fn ghost_id() -> TermId {
    term_key_hash("ghost", 0, &[], 0)
}

fn stepped_runtime() -> Runtime {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(mark_rule())
        .walk_children()
        .load(&node("r", vec![leaf("a")]))
        .expect("load");
    rt.step().expect("step").expect("event");
    rt
}

#[test]
fn restore_rejects_a_root_missing_from_the_store() {
    let mut rt = stepped_runtime();
    let mut state = rt.state();
    state.root = Some(ghost_id());
    let err = rt.load_state(state).expect_err("missing root");
    assert!(matches!(
        err,
        RuntimeError::Store(StoreError::NotFound(id)) if id == ghost_id()
    ));
}

#[test]
fn failed_restore_leaves_the_runtime_untouched() {
    let mut rt = stepped_runtime();
    let events = rt.events().to_vec();
    let root = rt.root_id();
    let digest = rt.store().digest();
    let pending = rt.pending();
    let stats = rt.stats();

    let mut state = RuntimeTestBuilder::new()
        .load(&leaf("other"))
        .expect("load")
        .0
        .state();
    state.frontier = Some(vec![ghost_id()]);
    let err = rt.load_state(state).expect_err("missing frontier id");
    assert!(matches!(
        err,
        RuntimeError::Store(StoreError::NotFound(id)) if id == ghost_id()
    ));

    assert_eq!(rt.events(), events.as_slice());
    assert_eq!(rt.root_id(), root);
    assert_eq!(rt.store().digest(), digest);
    assert_eq!(rt.pending(), pending);
    assert_eq!(rt.stats(), stats);

    let rest = rt.run_until_idle(None).expect("run");
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].before_term, leaf("a"));
}

#[test]
fn include_rules_restrict_which_rules_fire() {
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(RuleBuilder::new("lift").build(Action::lift()))
        .with_rule(mark_rule())
        .configure(|c| c.with_include_rules(["mark"]))
        .load(&Term::leaf("x", 0))
        .expect("load");
    let events = rt.run_until_idle(None).expect("run");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].rule, "mark");
}

#[test]
fn empty_include_rules_leave_every_rule_eligible() {
    let mut config = nanocode_core::RuntimeConfig::default();
    config.include_rules = Some(Default::default());
    let (mut rt, _) = RuntimeTestBuilder::new()
        .with_rule(RuleBuilder::new("lift").build(Action::lift()))
        .with_config(config)
        .load(&Term::leaf("x", 0))
        .expect("load");
    assert_eq!(rt.run(3).expect("run").len(), 3);
    assert_eq!(rt.state().include_rules, None);
}
