//! Scheduler rounds and fixpoint detection

use super::*;
use jsabsint::{Lattice, Program, Scheduler, StaticInfo, estree, extractor};

fn prepare(document: &Value) -> (Program, StaticInfo) {
    let ast = estree::lower_program(document).unwrap();
    let info = extractor::extract(&ast).unwrap();
    (ast, info)
}

fn counter() -> Vec<Value> {
    vec![
        var("count", num(0.0)),
        var("o", object(vec![])),
        set(
            member(ident("o"), "onevent"),
            function(
                None,
                &[],
                vec![set(ident("count"), binary("+", ident("count"), num(1.0)))],
            ),
        ),
    ]
}

#[test]
fn test_no_callbacks_is_one_round() {
    let (ast, info) = prepare(&program(vec![var("a", num(1.0))]));
    let config = AnalyzerConfig::default();
    let mut scheduler = Scheduler::start(&info, &config, &ast).unwrap();
    assert!(scheduler.state().registry.is_empty());
    assert!(!scheduler.run_round().unwrap());
    assert_eq!(scheduler.stats().rounds, 1);
    assert_eq!(scheduler.stats().callback_invocations, 0);
}

#[test]
fn test_round_reports_change_until_stable() {
    let (ast, info) = prepare(&program(counter()));
    let config = AnalyzerConfig::default();
    let mut scheduler = Scheduler::start(&info, &config, &ast).unwrap();
    assert_eq!(scheduler.state().registry.len(), 1);

    assert!(scheduler.run_round().unwrap());
    assert!(!scheduler.run_round().unwrap());
    assert_eq!(scheduler.stats().rounds, 2);
    assert_eq!(scheduler.stats().callback_invocations, 2);
}

#[test]
fn test_rounds_only_grow_the_state() {
    let (ast, info) = prepare(&fixture_document("callback"));
    let config = host_config();
    let mut scheduler = Scheduler::start(&info, &config, &ast).unwrap();

    let mut rounds = 0;
    loop {
        let before = scheduler.state().heap.snapshot();
        let changed = scheduler.run_round().unwrap();
        let after = scheduler.state().heap.snapshot();
        assert!(after.len() >= before.len());
        for (old, new) in before.iter().zip(&after) {
            assert!(old.leq(new), "{:?} lost information: {:?}", old, new);
        }
        rounds += 1;
        if !changed {
            break;
        }
        assert!(rounds < 100, "no fixpoint");
    }
}

/// At most two changes per location before the fixpoint. `rounds` also
/// counts the final round that confirmed nothing changed.
#[test]
fn test_round_count_is_bounded_by_locations() {
    let analysis = analyze_fixture("callback", host_config());
    let stats = analysis.stats();
    assert!(stats.rounds >= 2);
    let changing_rounds = stats.rounds - 1;
    assert!(changing_rounds <= stats.locations * 2);
}

#[test]
fn test_callbacks_registered_during_a_round_run_in_that_round() {
    let analysis = analyze(vec![
        var("late", num(0.0)),
        var("o", object(vec![])),
        set(
            member(ident("o"), "onevent"),
            function(
                None,
                &[],
                vec![set(
                    member(ident("o"), "onload"),
                    function(None, &[], vec![set(ident("late"), num(1.0))]),
                )],
            ),
        ),
    ]);
    assert_eq!(classification(&analysis, "global/late"), &Classification::Varies);
    assert_eq!(analysis.stats().callbacks, 2);
    assert_eq!(analysis.stats().rounds, 2);
}

#[test]
fn test_callback_without_effects_only_adds_its_activation() {
    let analysis = analyze(vec![
        var("o", object(vec![])),
        set(member(ident("o"), "onclick"), function(None, &[], vec![])),
    ]);
    // The first round creates the callback's own bindings; the second
    // changes nothing
    assert_eq!(analysis.stats().rounds, 2);
    assert_eq!(analysis.stats().callback_invocations, 2);
}

#[test]
fn test_round_limit_reports_divergence() {
    let config = AnalyzerConfig {
        max_rounds: 1,
        ..AnalyzerConfig::default()
    };
    let err = analyze_with(config, counter()).unwrap_err();
    assert_eq!(err.kind(), jsabsint::ErrorKind::AnalysisDivergedError);
    assert!(err.location().is_none());
}

fn fixture_document(name: &str) -> Value {
    serde_json::from_str(&fixture(name)).unwrap()
}
