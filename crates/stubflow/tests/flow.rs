//! Tests for flowing single documents: references, passes and markers.

use serde_json::{Value as Json, json};
use stubflow::{Engine, FlowError, Node};

fn flow(template: Json) -> Json {
    let template = Node::from_json(template, "template").unwrap();
    Engine::new().flow(template).unwrap().to_json().unwrap()
}

// =============================================================================
// References
// =============================================================================

#[test]
fn plain_values_pass_through() {
    let template = json!({"a": 1, "b": [true, null, 2.5], "c": {"d": "text"}});
    assert_eq!(flow(template.clone()), template);
}

#[test]
fn relative_references_search_enclosing_maps() {
    let result = flow(json!({
        "a": 1,
        "b": "(( a ))",
        "c": {"d": "(( b + 1 ))", "e": "(( d * 10 ))"}
    }));
    assert_eq!(result, json!({"a": 1, "b": 1, "c": {"d": 2, "e": 20}}));
}

#[test]
fn forward_references_settle_over_passes() {
    let result = flow(json!({"x": "(( y ))", "y": "(( z ))", "z": 3}));
    assert_eq!(result, json!({"x": 3, "y": 3, "z": 3}));
}

#[test]
fn absolute_references_start_at_the_root() {
    let result = flow(json!({
        "name": "outer",
        "inner": {"name": "inner", "rel": "(( name ))", "abs": "(( .name ))"}
    }));
    assert_eq!(result["inner"], json!({"name": "inner", "rel": "inner", "abs": "outer"}));
}

#[test]
fn list_entries_by_name_and_index() {
    let result = flow(json!({
        "list": [{"name": "a", "v": 1}, {"name": "b", "v": 2}],
        "by_name": "(( list.b.v ))",
        "by_index": "(( list.0.v ))",
        "last": "(( list.[-1].name ))"
    }));
    assert_eq!(result["by_name"], json!(2));
    assert_eq!(result["by_index"], json!(1));
    assert_eq!(result["last"], json!("b"));
}

#[test]
fn entries_index_their_own_list() {
    let result = flow(json!({"c": [1, {"d": "(( c.[0] ))", "e": "(( c[0] + 1 ))"}]}));
    assert_eq!(result, json!({"c": [1, {"d": 1, "e": 2}]}));
}

#[test]
fn slices_are_inclusive() {
    let result = flow(json!({
        "list": [1, 2, 3, 4],
        "middle": "(( list.[1..2] ))",
        "tail": "(( list.[2..] ))"
    }));
    assert_eq!(result["middle"], json!([2, 3]));
    assert_eq!(result["tail"], json!([3, 4]));
}

#[test]
fn projection_collects_a_field() {
    let result = flow(json!({
        "hosts": [{"name": "a", "ip": "10.0.0.1"}, {"name": "b", "ip": "10.0.0.2"}],
        "ips": "(( hosts.[*].ip ))"
    }));
    assert_eq!(result["ips"], json!(["10.0.0.1", "10.0.0.2"]));
}

#[test]
fn tagged_subtree() {
    let result = flow(json!({
        "web": {"<<": "(( &tag:web ))", "port": 80},
        "deep": {"url": "(( \"http://host:\" web::port ))"}
    }));
    assert_eq!(result["deep"]["url"], json!("http://host:80"));
    assert_eq!(result["web"], json!({"port": 80}));
}

// =============================================================================
// Strings and escapes
// =============================================================================

#[test]
fn text_around_markers_is_kept_literally() {
    let result = flow(json!({"a": "not (( an )) expression", "b": "(( a ))"}));
    assert_eq!(result["b"], json!("not (( an )) expression"));
}

#[test]
fn escaped_expressions_are_unescaped_once() {
    let result = flow(json!({"a": "((! literal ))", "b": "(( a ))"}));
    assert_eq!(result, json!({"a": "(( literal ))", "b": "(( literal ))"}));
}

#[test]
fn parse_errors_are_reported_at_the_node() {
    let template = Node::from_json(json!({"a": "(( 1 + ))"}), "template").unwrap();
    let err = Engine::new().flow(template).unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.entries[0].path, "a");
    assert!(report.entries[0].message.starts_with("parse error:"));
}

// =============================================================================
// Undefined and markers
// =============================================================================

#[test]
fn undefined_removes_the_field() {
    let result = flow(json!({"a": "(( ~~ ))", "b": 2, "c": [1, "(( ~~ ))", 3]}));
    assert_eq!(result, json!({"b": 2, "c": [1, 3]}));
}

#[test]
fn temporary_fields_are_usable_but_dropped() {
    let result = flow(json!({
        "base": "(( &temporary 40 ))",
        "answer": "(( base + 2 ))"
    }));
    assert_eq!(result, json!({"answer": 42}));
}

#[test]
fn markers_apply_to_compound_expressions() {
    let result = flow(json!({
        "a": 1,
        "t": "(( &temporary a + 1 ))",
        "u": "(( t * 2 ))"
    }));
    assert_eq!(result, json!({"a": 1, "u": 4}));
}

#[test]
fn temporary_map_via_directive() {
    let result = flow(json!({
        "helpers": {"<<": "(( &temporary ))", "port": 8080},
        "port": "(( helpers.port ))"
    }));
    assert_eq!(result, json!({"port": 8080}));
}

#[test]
fn local_fields_are_dropped() {
    let result = flow(json!({
        "secret": "(( &local \"x\" ))",
        "derived": "(( secret \"y\" ))"
    }));
    assert_eq!(result, json!({"derived": "xy"}));
}

// =============================================================================
// Fixpoint
// =============================================================================

#[test]
fn flowing_twice_changes_nothing() {
    let engine = Engine::new();
    let template = Node::from_json(
        json!({"a": 1, "b": "(( a + 1 ))", "c": ["(( b ))", {"d": "(( c.[0] ))"}]}),
        "template",
    )
    .unwrap();
    let once = engine.flow(template).unwrap();
    let twice = engine.flow(once.clone()).unwrap();
    assert_eq!(once.to_json().unwrap(), twice.to_json().unwrap());
    assert_eq!(once.to_json().unwrap(), json!({"a": 1, "b": 2, "c": [2, {"d": 2}]}));
}

#[test]
fn pass_limit() {
    let template = Node::from_json(json!({"a": "(( b ))", "b": 1}), "template").unwrap();
    let engine = Engine::builder().max_passes(1).build();
    let err = engine.flow(template).unwrap_err();
    assert!(matches!(err, FlowError::PassLimit { passes: 1 }));
    assert_eq!(err.to_string(), "no fixpoint reached after 1 passes");
}

#[test]
fn document_parse_errors() {
    assert!(Node::from_json_str("{ not json", "broken").is_err());
}
