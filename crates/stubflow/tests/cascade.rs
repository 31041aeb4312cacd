//! Tests for stub cascades: overrides, merges, injection and state.

use serde_json::{Value as Json, json};
use stubflow::{Engine, FlowError, Node, UnresolvedKind};

fn node(value: Json, source: &str) -> Node {
    Node::from_json(value, source).unwrap()
}

fn stubs(values: Vec<Json>) -> Vec<Node> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, value)| node(value, &format!("stub{}", i + 1)))
        .collect()
}

fn cascade(template: Json, stub_values: Vec<Json>) -> Json {
    Engine::new()
        .cascade(node(template, "template"), stubs(stub_values))
        .unwrap()
        .document
        .to_json()
        .unwrap()
}

// =============================================================================
// Overrides
// =============================================================================

#[test]
fn stub_overrides_template_values() {
    let result = cascade(json!({"a": 1, "b": "(( a * 2 ))"}), vec![json!({"a": 5})]);
    assert_eq!(result, json!({"a": 5, "b": 10}));
}

#[test]
fn overridden_values_reach_expressions_in_the_first_pass() {
    let result = cascade(
        json!({
            "db": {"host": "localhost", "port": 5432},
            "url": "(( db.host \":\" db.port ))",
            "replicas": "(( 1 + 1 ))",
            "total": "(( replicas * 10 ))"
        }),
        vec![json!({"db": {"port": 6543}, "replicas": 4})],
    );
    assert_eq!(result["url"], json!("localhost:6543"));
    assert_eq!(result["replicas"], json!(4));
    assert_eq!(result["total"], json!(40));
}

#[test]
fn first_stub_wins() {
    let result = cascade(
        json!({"a": "template"}),
        vec![json!({"a": "first"}), json!({"a": "second"})],
    );
    assert_eq!(result, json!({"a": "first"}));
}

#[test]
fn stub_only_fields_are_not_added() {
    let result = cascade(json!({"a": 1}), vec![json!({"a": 2, "extra": 3})]);
    assert_eq!(result, json!({"a": 2}));
}

#[test]
fn nested_maps_override_field_by_field() {
    let result = cascade(
        json!({"db": {"host": "localhost", "port": 5432}}),
        vec![json!({"db": {"port": 6543}})],
    );
    assert_eq!(result, json!({"db": {"host": "localhost", "port": 6543}}));
}

#[test]
fn stubs_are_flowed_before_use() {
    let result = cascade(
        json!({"x": 0, "y": 0}),
        vec![json!({"x": "(( y + 1 ))", "y": 1}), json!({"y": 10})],
    );
    assert_eq!(result, json!({"x": 2, "y": 1}));
}

#[test]
fn preferred_values_resist_overrides() {
    let result = cascade(json!({"a": "(( prefer 1 ))"}), vec![json!({"a": 2})]);
    assert_eq!(result, json!({"a": 1}));
}

// =============================================================================
// Merge expressions
// =============================================================================

#[test]
fn merge_takes_the_stub_value() {
    let result = cascade(json!({"a": "(( merge ))"}), vec![json!({"a": 7})]);
    assert_eq!(result, json!({"a": 7}));
}

#[test]
fn merge_takes_the_first_stub_defining_the_path() {
    let result = cascade(
        json!({"foo": "(( merge ))", "bar": "(( merge ))"}),
        vec![json!({"foo": 1}), json!({"foo": 2, "bar": 3})],
    );
    assert_eq!(result, json!({"foo": 1, "bar": 3}));
}

#[test]
fn redirected_merge_takes_the_first_stub() {
    let result = cascade(
        json!({"foo": {"<<": "(( merge other ))", "a": 0}}),
        vec![
            json!({"other": {"a": 1}}),
            json!({"other": {"a": 2, "b": 3}, "foo": {"a": 4}}),
        ],
    );
    assert_eq!(result, json!({"foo": {"a": 1}}));
}

#[test]
fn missing_merge_is_undefined() {
    let result = cascade(json!({"a": "(( merge ))", "b": "(( merge || 3 ))"}), Vec::new());
    assert_eq!(result, json!({"b": 3}));
}

#[test]
fn required_merge_fails_without_stub() {
    let err = Engine::new()
        .cascade(node(json!({"a": "(( merge required ))"}), "template"), Vec::new())
        .unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.entries[0].kind, UnresolvedKind::LocalError);
    assert_eq!(report.entries[0].message, "'a' not found in any stub");
}

#[test]
fn map_directive_merges_stub_fields() {
    let result = cascade(
        json!({"config": {"<<": "(( merge ))", "a": 1}}),
        vec![json!({"config": {"a": 2, "b": 3}})],
    );
    assert_eq!(result, json!({"config": {"a": 2, "b": 3}}));
}

#[test]
fn map_directive_replace_takes_the_stub_map() {
    let result = cascade(
        json!({"config": {"<<": "(( merge replace ))", "a": 1, "c": 4}}),
        vec![json!({"config": {"a": 2, "b": 3}})],
    );
    assert_eq!(result, json!({"config": {"a": 2, "b": 3}}));
}

#[test]
fn list_directive_adds_unknown_entries() {
    let result = cascade(
        json!({"list": [{"<<": "(( merge ))"}, {"name": "x", "v": 1}]}),
        vec![json!({"list": [{"name": "x", "v": 2}, {"name": "y", "v": 3}]})],
    );
    assert_eq!(
        result,
        json!({"list": [{"name": "y", "v": 3}, {"name": "x", "v": 2}]})
    );
}

#[test]
fn list_directive_keeps_template_only_entries() {
    let result = cascade(
        json!({"list": [
            {"<<": "(( merge ))"},
            {"name": "x", "v": 1},
            {"name": "z", "v": 0}
        ]}),
        vec![json!({"list": [{"name": "x", "v": 2}, {"name": "y", "v": 3}]})],
    );
    assert_eq!(
        result,
        json!({"list": [
            {"name": "y", "v": 3},
            {"name": "x", "v": 2},
            {"name": "z", "v": 0}
        ]})
    );
}

#[test]
fn list_merge_on_key_matches_entries_by_that_key() {
    let result = cascade(
        json!({"list": [
            {"<<": "(( merge on id ))"},
            {"id": "x", "v": 1},
            {"id": "z", "v": 0}
        ]}),
        vec![json!({"list": [{"id": "x", "v": 2}, {"id": "y", "v": 3}]})],
    );
    assert_eq!(
        result,
        json!({"list": [
            {"id": "y", "v": 3},
            {"id": "x", "v": 2},
            {"id": "z", "v": 0}
        ]})
    );
}

#[test]
fn stub_function_reads_the_stub() {
    let result = cascade(
        json!({"port": 1, "original": "(( stub(port) ))"}),
        vec![json!({"port": 2})],
    );
    assert_eq!(result, json!({"port": 2, "original": 2}));
}

#[test]
fn numbered_documents() {
    let result = cascade(
        json!({"a": "(( doc.1::v ))", "b": "(( doc.2::v ))"}),
        vec![json!({"v": 9}), json!({"v": 10})],
    );
    assert_eq!(result, json!({"a": 9, "b": 10}));
}

// =============================================================================
// Injection
// =============================================================================

#[test]
fn default_fills_missing_fields_only() {
    let stub = json!({"port": "(( &default 8080 ))", "host": "(( &default \"any\" ))"});
    assert_eq!(
        cascade(json!({"host": "web"}), vec![stub.clone()]),
        json!({"host": "web", "port": 8080})
    );
    assert_eq!(
        cascade(json!({"host": "web", "port": 80}), vec![stub]),
        json!({"host": "web", "port": 80})
    );
}

#[test]
fn inject_adds_and_overrides() {
    let stub = json!({"x": "(( &inject 7 ))"});
    assert_eq!(cascade(json!({}), vec![stub.clone()]), json!({"x": 7}));
    assert_eq!(cascade(json!({"x": 1}), vec![stub]), json!({"x": 7}));
}

#[test]
fn injected_fields_are_evaluated_in_the_stub() {
    let result = cascade(
        json!({"base": 3}),
        vec![json!({"derived": "(( &inject base * 2 ))", "base": 1})],
    );
    assert_eq!(result, json!({"base": 1, "derived": 2}));
}

// =============================================================================
// Failures and partial mode
// =============================================================================

#[test]
fn unresolved_stub_fails_preparation() {
    let err = Engine::new()
        .prepare_stubs(stubs(vec![json!({"a": "(( nope ))"})]))
        .unwrap_err();
    let FlowError::Unresolved(report) = err else {
        panic!("expected unresolved nodes");
    };
    assert_eq!(report.entries[0].source, "stub1");
    assert_eq!(report.entries[0].path, "a");
}

#[test]
fn partial_mode_keeps_unresolved_stubs() {
    let engine = Engine::builder().partial(true).build();
    let stub = json!({"a": "(( missing ))"});
    assert!(engine.prepare_stubs(stubs(vec![stub.clone()])).is_ok());

    let outcome = engine
        .cascade(node(json!({"a": 1, "b": 2}), "template"), stubs(vec![stub]))
        .unwrap();
    assert_eq!(outcome.document.to_json().unwrap()["b"], json!(2));
    let report = outcome.unresolved.unwrap();
    assert_eq!(report.len(), 1, "{report}");
    assert_eq!(report.entries[0].source, "stub1");
    assert_eq!(report.entries[0].path, "a");
}

#[test]
fn partial_mode_keeps_unresolved_nodes() {
    let engine = Engine::builder().partial(true).build();
    let outcome = engine
        .cascade(
            node(json!({"a": "(( b ))", "b": "(( a ))", "c": 1}), "template"),
            Vec::new(),
        )
        .unwrap();
    assert_eq!(
        outcome.document.to_json().unwrap(),
        json!({"a": "(( b ))", "b": "(( a ))", "c": 1})
    );
    assert_eq!(outcome.unresolved.map(|report| report.len()), Some(2));
}

// =============================================================================
// State
// =============================================================================

#[test]
fn state_nodes_are_extracted() {
    let outcome = Engine::new()
        .cascade(
            node(json!({"counter": "(( &state 1 ))", "x": 2}), "template"),
            Vec::new(),
        )
        .unwrap();
    assert_eq!(outcome.document.to_json().unwrap(), json!({"counter": 1, "x": 2}));
    assert_eq!(
        outcome.state.map(|state| state.to_json().unwrap()),
        Some(json!({"counter": 1}))
    );
}

#[test]
fn previous_state_takes_precedence() {
    let outcome = Engine::new()
        .cascade_with_state(
            node(json!({"counter": "(( &state 1 ))", "x": 2}), "template"),
            Vec::new(),
            node(json!({"counter": 5}), "state"),
        )
        .unwrap();
    assert_eq!(outcome.document.to_json().unwrap(), json!({"counter": 5, "x": 2}));
    assert_eq!(
        outcome.state.map(|state| state.to_json().unwrap()),
        Some(json!({"counter": 5}))
    );
}

#[test]
fn state_inside_list_entries() {
    let template = json!({"jobs": [
        {"name": "web", "counter": "(( &state 1 ))"},
        {"name": "db", "counter": 0}
    ]});
    let first = Engine::new()
        .cascade(node(template.clone(), "template"), Vec::new())
        .unwrap();
    let state = first.state.unwrap();
    assert_eq!(
        state.to_json().unwrap(),
        json!({"jobs": [{"name": "web", "counter": 1}]})
    );

    let mut previous = state.to_json().unwrap();
    previous["jobs"][0]["counter"] = json!(7);
    let second = Engine::new()
        .cascade_with_state(node(template, "template"), Vec::new(), node(previous, "state"))
        .unwrap();
    assert_eq!(
        second.document.to_json().unwrap()["jobs"],
        json!([{"name": "web", "counter": 7}, {"name": "db", "counter": 0}])
    );
}

#[test]
fn no_state_without_state_nodes() {
    let outcome = Engine::new()
        .cascade(node(json!({"x": 2}), "template"), Vec::new())
        .unwrap();
    assert_eq!(outcome.state, None);
    assert_eq!(outcome.unresolved, None);
}
