//! Constant substitution and the analysis of the rewritten program

use super::*;
use jsabsint::reporter;

/// Node ids survive substitution, so the first run's static information
/// describes the rerun's heap. Reported through it, the rerun's fixpoint must
/// give exactly the first report, bindings the rerun no longer sees as
/// captured included.
fn assert_round_trip(analysis: &Analysis, rerun: &Analysis, config: &AnalyzerConfig) {
    let replayed = reporter::report(analysis.info(), rerun.state(), config);
    assert_eq!(&replayed, analysis.report());
}

#[test]
fn test_constant_reads_are_replaced() {
    let analysis = analyze(vec![
        var("a", num(1.0)),
        var("b", binary("+", ident("a"), num(1.0))),
        var("c", ident("random")),
        var("d", ident("c")),
    ]);
    let (rewritten, replaced) = analysis.substitute_constants();
    assert_eq!(replaced, 1);

    let rerun = Analyzer::new().analyze_program(rewritten).unwrap();
    assert_eq!(rerun.report(), analysis.report());
    assert_round_trip(&analysis, &rerun, &AnalyzerConfig::default());
    assert_eq!(rerun.substitute_constants().1, 0);
}

#[test]
fn test_varying_and_unevaluated_reads_are_kept() {
    let analysis = analyze(vec![
        function_decl("never", &[], vec![ret(ident("a"))]),
        var("a", num(1.0)),
        var("b", num(1.0)),
        set(ident("b"), num(2.0)),
        var("c", ident("b")),
    ]);
    assert_eq!(analysis.substitute_constants().1, 0);
}

#[test]
fn test_closure_program_has_nothing_to_replace() {
    let analysis = analyze_fixture("closure", AnalyzerConfig::default());
    assert_eq!(analysis.substitute_constants().1, 0);
}

#[test]
fn test_callback_constants_survive_substitution() {
    let analysis = analyze_fixture("callback", host_config());
    let (rewritten, replaced) = analysis.substitute_constants();
    assert_eq!(replaced, 2);

    let rerun = Analyzer::with_config(host_config())
        .analyze_program(rewritten)
        .unwrap();
    assert_round_trip(&analysis, &rerun, &host_config());
    // The callback no longer reads `x`, so nothing captures it
    assert!(rerun.report().get("global/outerFn1/x").is_none());
    assert_eq!(
        classification(&rerun, "global/outerFn1/someApiObject1.y"),
        &constant_number(42.0)
    );
}
