//! Tests for standalone expression evaluation.

use serde_json::{Value as Json, json};
use stubflow::{Engine, FlowError, UnresolvedKind};

fn eval(text: &str) -> Json {
    Engine::new().evaluate_str(text).unwrap().to_json().unwrap()
}

fn eval_error(text: &str) -> String {
    let err = Engine::new().evaluate_str(text).unwrap_err();
    let report = err.report().expect("expected unresolved nodes");
    assert_eq!(report.len(), 1);
    report.entries[0].message.clone()
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn precedence() {
    assert_eq!(eval("1 + 2 * 3"), json!(7));
    assert_eq!(eval("(1 + 2) * 3"), json!(9));
    assert_eq!(eval("7 / 2"), json!(3));
    assert_eq!(eval("7 % 3"), json!(1));
}

#[test]
fn mixed_numbers() {
    assert_eq!(eval("3 * 0.5"), json!(1.5));
    assert_eq!(eval("-2 + 5"), json!(3));
}

#[test]
fn address_arithmetic() {
    assert_eq!(eval(r#""10.0.0.254" + 3"#), json!("10.0.1.1"));
    assert_eq!(eval(r#""10.0.1.1" - "10.0.0.254""#), json!(3));
}

#[test]
fn division_by_zero_is_a_local_error() {
    let err = Engine::new().evaluate_str("1 / 0").unwrap_err();
    let FlowError::Unresolved(report) = err else {
        panic!("expected unresolved nodes");
    };
    assert_eq!(report.entries[0].kind, UnresolvedKind::LocalError);
    assert_eq!(report.entries[0].message, "division by zero");
    assert_eq!(report.entries[0].expression, "(( 1 / 0 ))");
    assert_eq!(report.entries[0].source, "<expression>");
}

#[test]
fn operand_mismatch() {
    assert_eq!(
        eval_error(r#"1 + "a""#),
        "operator '+' cannot be applied to int and string"
    );
}

// =============================================================================
// Concatenation
// =============================================================================

#[test]
fn juxtaposition_concatenates_text() {
    assert_eq!(eval(r#""prefix" 6*2+3 "suffix""#), json!("prefix15suffix"));
    assert_eq!(eval(r#""a" true"#), json!("atrue"));
}

#[test]
fn juxtaposition_appends_to_lists() {
    assert_eq!(eval("[1, 2] [3]"), json!([1, 2, 3]));
    assert_eq!(eval("[1] 2"), json!([1, 2]));
}

#[test]
fn juxtaposition_merges_maps() {
    assert_eq!(eval("{ a = 1, b = 2 } { b = 3 }"), json!({"a": 1, "b": 3}));
}

#[test]
fn list_and_nil_do_not_concatenate() {
    assert_eq!(eval_error("[1] nil"), "list and nil cannot be concatenated");
}

// =============================================================================
// Logic
// =============================================================================

#[test]
fn comparison_and_logic() {
    assert_eq!(eval("1 < 2 -and 2 < 3"), json!(true));
    assert_eq!(eval("!(1 == 1) -or false"), json!(false));
    assert_eq!(eval(r#"5 == "5""#), json!(true));
}

#[test]
fn conditional() {
    assert_eq!(eval(r#"2 > 1 ? "yes" : "no""#), json!("yes"));
    assert_eq!(eval(r#"nil ? "yes" : "no""#), json!("no"));
}

#[test]
fn fallback_skips_errors() {
    assert_eq!(eval("1 / 0 || 5"), json!(5));
    assert_eq!(eval("~~ || 6"), json!(6));
    assert_eq!(eval("4 || 6"), json!(4));
}

// =============================================================================
// Literals and access
// =============================================================================

#[test]
fn range_counts_both_ways() {
    assert_eq!(eval("[1..4]"), json!([1, 2, 3, 4]));
    assert_eq!(eval("[3..1]"), json!([3, 2, 1]));
}

#[test]
fn undefined_entries_are_dropped() {
    assert_eq!(eval("[1, ~~, 2]"), json!([1, 2]));
    assert_eq!(eval("{ a = ~~, b = 2 }"), json!({"b": 2}));
}

#[test]
fn nil_literals() {
    assert_eq!(eval("nil"), Json::Null);
    assert_eq!(eval("~"), Json::Null);
}

#[test]
fn catch_reports_failures() {
    assert_eq!(
        eval("catch(1 / 0)"),
        json!({"valid": false, "error": "division by zero", "value": null})
    );
    assert_eq!(
        eval("catch(2)"),
        json!({"valid": true, "error": "", "value": 2})
    );
}

#[test]
fn unknown_name_suggests_nothing_in_empty_document() {
    assert_eq!(eval_error("missing"), "'missing' not found");
}
