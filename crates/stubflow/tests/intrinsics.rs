//! Tests for intrinsics, `auto` and call argument forms.

use serde_json::{Value as Json, json};
use stubflow::{Engine, Node};

fn flow(template: Json) -> Json {
    let template = Node::from_json(template, "template").unwrap();
    Engine::new().flow(template).unwrap().to_json().unwrap()
}

fn failure(template: Json, path: &str) -> String {
    let template = Node::from_json(template, "template").unwrap();
    let err = Engine::new().flow(template).unwrap_err();
    let report = err.report().expect("expected unresolved nodes");
    report
        .entries
        .iter()
        .find(|entry| entry.path == path)
        .unwrap_or_else(|| panic!("no entry for {path} in\n{report}"))
        .message
        .clone()
}

// =============================================================================
// defined, valid and require
// =============================================================================

#[test]
fn defined_and_valid() {
    let result = flow(json!({
        "a": 1,
        "n": null,
        "d": "(( defined(a) ))",
        "e": "(( defined(missing) ))",
        "v": "(( valid(n) ))",
        "w": "(( valid(a) ))"
    }));
    assert_eq!(result["d"], json!(true));
    assert_eq!(result["e"], json!(false));
    assert_eq!(result["v"], json!(false));
    assert_eq!(result["w"], json!(true));
}

#[test]
fn defined_waits_for_pending_values() {
    let result = flow(json!({"d": "(( defined(b) ))", "b": "(( c ))", "c": 1}));
    assert_eq!(result["d"], json!(true));
}

#[test]
fn require_rejects_nil() {
    assert_eq!(flow(json!({"a": 1, "r": "(( require(a) ))"}))["r"], json!(1));
    assert_eq!(
        failure(json!({"a": null, "r": "(( require(a) ))"}), "r"),
        "'a' is required"
    );
}

// =============================================================================
// catch
// =============================================================================

#[test]
fn catch_with_handler() {
    let engine = Engine::new();
    let eval = |text: &str| engine.evaluate_str(text).unwrap().to_json().unwrap();
    assert_eq!(eval("catch(1 / 0, |v, e|-> e)"), json!("division by zero"));
    assert_eq!(eval("catch(5, |v, e|-> v * 2)"), json!(10));
}

// =============================================================================
// merge(...)
// =============================================================================

#[test]
fn merge_function_cascades_a_template() {
    let result = flow(json!({
        "t": {
            "<<": "(( &template &temporary ))",
            "a": 1,
            "b": "(( a + 1 ))"
        },
        "over": {"a": 5},
        "r": "(( merge(t, over) ))"
    }));
    assert_eq!(result["r"], json!({"a": 5, "b": 6}));
}

#[test]
fn merge_function_needs_maps() {
    assert_eq!(
        failure(json!({"r": "(( merge(1) ))"}), "r"),
        "map or template expected, found int"
    );
}

// =============================================================================
// sync
// =============================================================================

#[test]
fn sync_returns_once_the_condition_holds() {
    let result = flow(json!({
        "a": 3,
        "plain": "(( sync(a, |v|-> v > 0) ))",
        "mapped": "(( sync(a, |v|-> true, |v|-> v * 10) ))"
    }));
    assert_eq!(result["plain"], json!(3));
    assert_eq!(result["mapped"], json!(30));
}

#[test]
fn sync_waits_for_pending_values_across_passes() {
    let result = flow(json!({
        "r": "(( sync(a, |v|-> v > 2) ))",
        "a": "(( b + 1 ))",
        "b": "(( c ))",
        "c": 2
    }));
    assert_eq!(result["r"], json!(3));
}

#[test]
fn sync_times_out() {
    assert_eq!(
        failure(json!({"a": 3, "r": "(( sync(a, |v|-> false, |v|-> v, 0) ))"}), "r"),
        "sync timed out after 1 attempts"
    );
}

// =============================================================================
// auto
// =============================================================================

#[test]
fn auto_sums_instances_per_pool() {
    let result = flow(json!({
        "jobs": [
            {"name": "web", "resource_pool": "small", "instances": 2},
            {"name": "db", "resource_pool": "large", "instances": 1},
            {"name": "api", "resource_pool": "small", "instances": "(( 1 + 2 ))"}
        ],
        "resource_pools": [
            {"name": "small", "size": "(( auto ))"},
            {"name": "large", "size": "(( auto ))"}
        ]
    }));
    assert_eq!(
        result["resource_pools"],
        json!([{"name": "small", "size": 5}, {"name": "large", "size": 1}])
    );
}

#[test]
fn auto_outside_resource_pools() {
    assert_eq!(
        failure(json!({"x": "(( auto ))"}), "x"),
        "auto is only supported for resource pool sizes"
    );
}

// =============================================================================
// Call arguments
// =============================================================================

#[test]
fn spread_and_indexed_arguments() {
    let result = flow(json!({
        "f": "(( &temporary |a, b|-> a - b ))",
        "args": [10, 3],
        "spread": "(( f(args...) ))",
        "indexed": "(( f(2=1, 1=5) ))",
        "joined": "(( join(\"-\", args...) ))"
    }));
    assert_eq!(result["spread"], json!(7));
    assert_eq!(result["indexed"], json!(4));
    assert_eq!(result["joined"], json!("10-3"));
}
