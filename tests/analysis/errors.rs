//! The error taxonomy and the locations errors carry

use super::*;
use jsabsint::{ErrorKind, Span};

fn kind_of(body: Vec<Value>) -> ErrorKind {
    analyze_result(body).unwrap_err().kind()
}

#[test]
fn test_unbound_name_has_location() {
    let err = analyze_result(vec![var("a", at(ident("missing"), 3, 8))]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnboundNameError);
    assert_eq!(err.location(), Some(Span::new(3, 8)));
    assert_eq!(err.to_string(), "UnboundNameError: missing is not defined at 3:8");
}

#[test]
fn test_unbound_name_inside_uncalled_function_is_not_an_error() {
    let analysis = analyze(vec![function_decl("never", &[], vec![ret(ident("missing"))])]);
    assert!(analysis.report().get("global/never").is_some());
}

#[test]
fn test_lexical_redeclaration() {
    assert_eq!(
        kind_of(vec![let_("a", num(1.0)), let_("a", num(2.0))]),
        ErrorKind::RedeclarationError
    );
    assert_eq!(
        kind_of(vec![var("a", num(1.0)), const_("a", num(2.0))]),
        ErrorKind::RedeclarationError
    );
}

#[test]
fn test_var_redeclaration_is_allowed() {
    let analysis = analyze(vec![var("a", num(1.0)), var("a", num(1.0))]);
    assert_eq!(classification(&analysis, "global/a"), &constant_number(1.0));
}

#[test]
fn test_malformed_documents_are_invalid_programs() {
    assert_eq!(
        Analyzer::new().analyze_json("[1, 2]").unwrap_err().kind(),
        ErrorKind::InvalidProgramError
    );
    assert_eq!(
        kind_of(vec![json!({"type": "NoSuchStatement"})]),
        ErrorKind::InvalidProgramError
    );
    assert_eq!(
        kind_of(vec![ret(num(1.0))]),
        ErrorKind::InvalidProgramError
    );
}

#[test]
fn test_deeply_nested_documents_are_invalid_programs() {
    let mut expression = num(1.0);
    for _ in 0..1000 {
        expression = unary("-", expression);
    }
    let err = Analyzer::new()
        .analyze_value(&program(vec![var("deep", expression)]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidProgramError);
}

#[test]
fn test_unsupported_constructs() {
    assert_eq!(
        kind_of(vec![at(json!({"type": "TryStatement", "block": block(vec![])}), 1, 0)]),
        ErrorKind::UnsupportedConstructError
    );
    assert_eq!(
        kind_of(vec![var("n", json!({"type": "NewExpression", "callee": ident("Date"), "arguments": []}))]),
        ErrorKind::UnsupportedConstructError
    );
}

#[test]
fn test_computed_write_with_unknown_key() {
    let err = analyze_result(vec![
        var("o", object(vec![])),
        set(at(computed(ident("o"), ident("random")), 2, 4), num(1.0)),
    ])
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedConstructError);
    assert_eq!(err.location(), Some(Span::new(2, 4)));
}

#[test]
fn test_computed_read_with_unknown_key_joins_every_property() {
    let analysis = analyze(vec![
        var("o", object(vec![("a", num(1.0)), ("b", num(1.0))])),
        var("r", computed(ident("o"), ident("random"))),
    ]);
    // Either 1 or a missing property
    assert_eq!(classification(&analysis, "global/r"), &Classification::Varies);
}

#[test]
fn test_loop_iteration_limit() {
    let config = AnalyzerConfig {
        max_loop_iterations: 1,
        ..AnalyzerConfig::default()
    };
    let err = analyze_with(
        config,
        vec![
            var("i", num(0.0)),
            while_(ident("random"), vec![set(ident("i"), num(1.0))]),
        ],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AnalysisDivergedError);
}

#[test]
fn test_error_report_json() {
    let err = analyze_result(vec![var("a", at(ident("missing"), 1, 8))]).unwrap_err();
    assert_eq!(
        serde_json::to_value(err.to_report()).unwrap(),
        json!({
            "kind": "UnboundNameError",
            "message": "missing is not defined",
            "sourceLocation": {"line": 1, "column": 8}
        })
    );

    let err = AnalysisError::diverged("no fixpoint after 3 scheduler rounds");
    assert_eq!(
        serde_json::to_value(err.to_report()).unwrap(),
        json!({
            "kind": "AnalysisDivergedError",
            "message": "no fixpoint after 3 scheduler rounds"
        })
    );
}
