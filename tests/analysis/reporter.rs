//! Which locations are reported and how they are classified

use super::*;

#[test]
fn test_report_is_deterministic() {
    let first = analyze_fixture("callback", host_config());
    let second = analyze_fixture("callback", host_config());
    assert_eq!(first.report(), second.report());
    let order: Vec<&String> = first.report().iter().map(|(d, _)| d).collect();
    let again: Vec<&String> = second.report().iter().map(|(d, _)| d).collect();
    assert_eq!(order, again);
}

#[test]
fn test_captured_but_never_written_is_dead() {
    let analysis = analyze(vec![
        function_decl(
            "outer",
            &[],
            vec![
                var_uninit("v"),
                var("o", object(vec![])),
                set(
                    member(ident("o"), "handler"),
                    function(None, &[], vec![ret(ident("v"))]),
                ),
            ],
        ),
        expr(call(ident("outer"), vec![])),
    ]);
    assert_eq!(classification(&analysis, "global/outer/v"), &Classification::Dead);
}

#[test]
fn test_uncaptured_locals_are_not_reported() {
    let analysis = analyze(vec![
        function_decl("f", &[], vec![var("local", num(1.0))]),
        expr(call(ident("f"), vec![])),
    ]);
    assert!(analysis.report().get("global/f/local").is_none());
    assert!(analysis.report().get("global/f").is_some());
}

#[test]
fn test_this_and_externals_are_not_reported() {
    let analysis = analyze(vec![
        var("a", num(1.0)),
        expr(call(member(ident("console"), "log"), vec![ident("a")])),
    ]);
    assert!(analysis.report().get("global/console").is_none());
    assert!(analysis.report().iter().all(|(d, _)| !d.ends_with("/this")));
}

#[test]
fn test_object_constants_name_their_site() {
    let analysis = analyze(vec![var("o", object(vec![("k", string("v"))]))]);
    assert_eq!(
        classification(&analysis, "global/o"),
        &Classification::Constant(Constant::Object("global/o".to_string()))
    );
    assert_eq!(classification(&analysis, "global/o.k"), &constant_string("v"));
}

#[test]
fn test_activations_of_one_binding_are_joined() {
    let analysis = analyze(vec![
        function_decl("mk", &["v"], vec![ret(function(None, &[], vec![ret(ident("v"))]))]),
        var("f1", call(ident("mk"), vec![num(1.0)])),
        var("f2", call(ident("mk"), vec![num(2.0)])),
        function_decl("same", &["w"], vec![ret(function(None, &[], vec![ret(ident("w"))]))]),
        var("g1", call(ident("same"), vec![num(3.0)])),
        var("g2", call(ident("same"), vec![num(3.0)])),
    ]);
    assert_eq!(classification(&analysis, "global/mk/v"), &Classification::Varies);
    assert_eq!(classification(&analysis, "global/same/w"), &constant_number(3.0));
}

#[test]
fn test_globals_can_be_left_out() {
    let config = AnalyzerConfig {
        report_globals: false,
        ..AnalyzerConfig::default()
    };
    let analysis = analyze_with(
        config,
        vec![
            var("plain", num(1.0)),
            var("shared", num(1.0)),
            expr(call(
                ident("setTimeout"),
                vec![function(None, &[], vec![set(ident("shared"), num(2.0))])],
            )),
        ],
    )
    .unwrap();
    assert!(analysis.report().get("global/plain").is_none());
    assert_eq!(classification(&analysis, "global/shared"), &Classification::Varies);
}

#[test]
fn test_report_json() {
    let analysis = analyze(vec![
        var("a", num(1.0)),
        var("b", num(1.0)),
        set(ident("b"), num(2.0)),
        var_uninit("c"),
        var("d", undefined()),
    ]);
    assert_eq!(
        analysis.report().to_json(),
        json!({
            "global/a": {"constant": 1.0},
            "global/b": "varies",
            "global/c": "dead",
            "global/d": {"constant": "<undefined>"}
        })
    );
    let constants: Vec<&String> = analysis.report().constants().map(|(d, _)| d).collect();
    assert_eq!(constants, vec!["global/a", "global/d"]);
}
