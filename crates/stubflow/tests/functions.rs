//! Tests for the standard functions and function registration.

use serde_json::{Value as Json, json};
use stubflow::{Binding, Engine, EvalError, Evaluation, Node, Resolved, Value};

fn eval(text: &str) -> Json {
    Engine::new().evaluate_str(text).unwrap().to_json().unwrap()
}

fn eval_error(text: &str) -> String {
    let err = Engine::new().evaluate_str(text).unwrap_err();
    err.report().expect("expected unresolved nodes").entries[0]
        .message
        .clone()
}

// =============================================================================
// Collections
// =============================================================================

#[test]
fn length_of_strings_lists_and_maps() {
    assert_eq!(eval(r#"length("héllo")"#), json!(5));
    assert_eq!(eval("length([1, 2, 3])"), json!(3));
    assert_eq!(eval("length({ a = 1 })"), json!(1));
}

#[test]
fn keys_and_values_are_sorted_by_key() {
    assert_eq!(eval("keys({ b = 2, a = 1 })"), json!(["a", "b"]));
    assert_eq!(eval("values({ b = 2, a = 1 })"), json!([1, 2]));
}

#[test]
fn contains_checks_membership() {
    assert_eq!(eval("contains([1, 2], 2)"), json!(true));
    assert_eq!(eval(r#"contains({ a = 1 }, "b")"#), json!(false));
    assert_eq!(eval(r#"contains("haystack", "st")"#), json!(true));
}

#[test]
fn uniq_keeps_first_occurrences() {
    assert_eq!(eval("uniq([1, 2, 1, 3, 2])"), json!([1, 2, 3]));
}

#[test]
fn min_and_max() {
    assert_eq!(eval("min([3, 1, 2])"), json!(1));
    assert_eq!(eval("max(3, 1.5, 2)"), json!(3));
    assert_eq!(eval_error("min([])"), "min needs at least one value");
}

// =============================================================================
// Strings
// =============================================================================

#[test]
fn join_flattens_lists() {
    assert_eq!(eval(r#"join(", ", ["a", "b"], "c")"#), json!("a, b, c"));
    assert_eq!(eval(r#"join("-", 1, 2)"#), json!("1-2"));
}

#[test]
fn split_and_trim() {
    assert_eq!(eval(r#"split(",", "a,b,c")"#), json!(["a", "b", "c"]));
    assert_eq!(eval(r#"split("", "ab")"#), json!(["a", "b"]));
    assert_eq!(eval(r#"trim("  x  ")"#), json!("x"));
    assert_eq!(eval(r#"trim("--x--", "-")"#), json!("x"));
}

#[test]
fn case_conversion() {
    assert_eq!(eval(r#"upper("web")"#), json!("WEB"));
    assert_eq!(eval(r#"lower("WEB")"#), json!("web"));
}

#[test]
fn format_verbs() {
    assert_eq!(
        eval(r#"format("%s:%d (100%%)", "host", 80)"#),
        json!("host:80 (100%)")
    );
    assert_eq!(eval_error(r#"format("%d", "x")"#), "int expected, found string");
    assert_eq!(eval_error(r#"format("%s")"#), "format: missing argument for %s");
}

#[test]
fn type_names() {
    assert_eq!(eval("type(1)"), json!("int"));
    assert_eq!(eval("type(1.5)"), json!("float"));
    assert_eq!(eval("type([])"), json!("list"));
    assert_eq!(eval("type(nil)"), json!("nil"));
}

#[test]
fn error_fails_with_its_arguments() {
    assert_eq!(eval_error(r#"error("bad", 42)"#), "bad 42");
}

// =============================================================================
// Higher order
// =============================================================================

#[test]
fn map_over_lists_and_maps() {
    assert_eq!(eval("map([1, 2, 3], |x|-> x * 2)"), json!([2, 4, 6]));
    assert_eq!(
        eval(r#"map({ a = 1, b = 2 }, |k, v|-> k "=" v)"#),
        json!(["a=1", "b=2"])
    );
}

#[test]
fn select_filters() {
    assert_eq!(eval("select([1, 2, 3, 4], |x|-> x % 2 == 0)"), json!([2, 4]));
    assert_eq!(
        eval("select({ a = 1, b = 2 }, |k, v|-> v > 1)"),
        json!({"b": 2})
    );
}

#[test]
fn sum_adds_and_folds() {
    assert_eq!(eval("sum([1, 2, 3])"), json!(6));
    assert_eq!(eval("sum([1, 2, 3], 10)"), json!(16));
    assert_eq!(
        eval(r#"sum(["a", "b"], "", |acc, x|-> acc x)"#),
        json!("ab")
    );
}

#[test]
fn arity_is_checked() {
    assert_eq!(eval_error("length()"), "missing argument 'length argument 1'");
    assert_eq!(eval_error("length(1, 2)"), "length takes 1 arguments, got 2");
}

#[test]
fn unknown_function_suggests_names() {
    assert_eq!(
        eval_error("lenght([1])"),
        "unknown function 'lenght'; did you mean: length?"
    );
}

// =============================================================================
// Registration
// =============================================================================

fn double(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    match args {
        [Value::Int(n)] => Ok(Resolved::new(n * 2)),
        _ => Err(EvalError::Message("double takes one int".to_string()).into()),
    }
}

#[test]
fn registered_functions_are_callable() {
    let mut engine = Engine::new();
    engine.functions_mut().register("double", double);
    let template = Node::from_json(json!({"a": 21, "b": "(( double(a) ))"}), "template").unwrap();
    let result = engine.flow(template).unwrap().to_json().unwrap();
    assert_eq!(result["b"], json!(42));
}

#[test]
fn document_names_shadow_functions() {
    let template = Node::from_json(
        json!({"upper": "(( &temporary |x|-> x \"!\" ))", "r": "(( upper(\"hi\") ))"}),
        "template",
    )
    .unwrap();
    let result = Engine::new().flow(template).unwrap().to_json().unwrap();
    assert_eq!(result, json!({"r": "hi!"}));
}
