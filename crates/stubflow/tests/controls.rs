//! Tests for `<<if`, `<<switch`, `<<type`, `<<for`, `<<merge` and custom controls.

use serde_json::{Value as Json, json};
use stubflow::{ControlContext, Engine, Node, Unresolved, UnresolvedEntry, Value};

fn flow(template: Json) -> Json {
    let template = Node::from_json(template, "template").unwrap();
    Engine::new().flow(template).unwrap().to_json().unwrap()
}

fn failure(template: Json) -> UnresolvedEntry {
    let template = Node::from_json(template, "template").unwrap();
    let err = Engine::new().flow(template).unwrap_err();
    let report = err.report().expect("expected unresolved nodes");
    assert_eq!(report.len(), 1, "{report}");
    report.entries[0].clone()
}

// =============================================================================
// if
// =============================================================================

#[test]
fn if_selects_a_branch() {
    let result = flow(json!({
        "x": 3,
        "size": {"<<if": "(( x > 2 ))", "<<then": "big", "<<else": "small"}
    }));
    assert_eq!(result["size"], json!("big"));
}

#[test]
fn if_branches_are_flowed() {
    let result = flow(json!({
        "x": 1,
        "r": {"<<if": "(( x > 2 ))", "<<then": "(( x ))", "<<else": {"value": "(( x * 100 ))"}}
    }));
    assert_eq!(result["r"], json!({"value": 100}));
}

#[test]
fn if_without_branch_removes_the_map() {
    let result = flow(json!({"a": 1, "r": {"<<if": false, "<<then": 1}}));
    assert_eq!(result, json!({"a": 1}));
}

// =============================================================================
// switch and type
// =============================================================================

#[test]
fn switch_by_key() {
    let template = |mode: &str| {
        json!({
            "mode": mode,
            "r": {"<<switch": "(( mode ))", "<<cases": {"a": 1, "b": 2}, "<<default": 0}
        })
    };
    assert_eq!(flow(template("b"))["r"], json!(2));
    assert_eq!(flow(template("z"))["r"], json!(0));
}

#[test]
fn switch_by_predicate() {
    let result = flow(json!({
        "n": 42,
        "r": {
            "<<switch": "(( n ))",
            "<<cases": [
                {"case": "(( |v|-> v < 10 ))", "value": "small"},
                {"case": "(( |v|-> v < 100 ))", "value": "medium"}
            ],
            "<<default": "large"
        }
    }));
    assert_eq!(result["r"], json!("medium"));
}

#[test]
fn switch_without_match() {
    let entry = failure(json!({
        "mode": "z",
        "r": {"<<switch": "(( mode ))", "<<cases": {"a": 1}}
    }));
    assert_eq!(entry.path, "r");
    assert_eq!(entry.message, "no case for 'z'");
    assert_eq!(entry.expression, "<<switch: (( mode ))");
}

#[test]
fn type_selects_by_runtime_type() {
    let result = flow(json!({
        "v": [1, 2],
        "r": {"<<type": "(( v ))", "<<cases": {"list": "L", "map": "M"}}
    }));
    assert_eq!(result["r"], json!("L"));
}

#[test]
fn type_cases_must_name_types() {
    let entry = failure(json!({"r": {"<<type": 1, "<<cases": {"number": "N", "int": "I"}}}));
    assert_eq!(entry.message, "'number' is not a type name");
}

// =============================================================================
// for
// =============================================================================

#[test]
fn for_iterates_the_cartesian_product() {
    let result = flow(json!({
        "list": {"<<for": {"x": [1, 2], "y": ["a", "b"]}, "<<do": "(( x y ))"}
    }));
    assert_eq!(result["list"], json!(["1a", "1b", "2a", "2b"]));
}

#[test]
fn for_with_mapkey_builds_a_map() {
    let result = flow(json!({
        "m": {"<<for": {"n": ["a", "b"]}, "<<mapkey": "(( n ))", "<<do": "(( index-n ))"}
    }));
    assert_eq!(result["m"], json!({"a": 0, "b": 1}));
}

#[test]
fn for_bodies_see_the_document() {
    let result = flow(json!({
        "base": 10,
        "r": {"<<for": [{"name": "i", "values": [1, 2]}], "<<do": {"v": "(( base + i ))"}}
    }));
    assert_eq!(result["r"], json!([{"v": 11}, {"v": 12}]));
}

#[test]
fn for_over_map_binds_keys() {
    let result = flow(json!({
        "ports": {"http": 80, "https": 443},
        "r": {"<<for": {"p": "(( ports ))"}, "<<do": "(( index-p \":\" p ))"}
    }));
    assert_eq!(result["r"], json!(["http:80", "https:443"]));
}

#[test]
fn for_reports_failing_rows() {
    let entry = failure(json!({
        "r": {"<<for": {"x": [1, 0]}, "<<do": "(( 10 / x ))"}
    }));
    assert_eq!(entry.message, "for loop failed");
    assert_eq!(entry.nested.len(), 1);
    assert_eq!(entry.nested[0].message, "row 2 (x=0)");
}

#[test]
fn for_requires_do() {
    let entry = failure(json!({"r": {"<<for": {"x": [1]}}}));
    assert_eq!(entry.message, "control '<<for' requires option '<<do'");
}

// =============================================================================
// merge
// =============================================================================

#[test]
fn merge_control_splices_maps() {
    let result = flow(json!({
        "base": {"a": 1, "b": 2},
        "extra": {"c": 3},
        "r": {"<<merge": "(( [base, extra] ))", "b": 20}
    }));
    assert_eq!(result["r"], json!({"a": 1, "b": 20, "c": 3}));
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn unknown_control_suggests_names() {
    let entry = failure(json!({"r": {"<<iff": true}}));
    assert_eq!(entry.message, "unknown control '<<iff'; did you mean: if?");
}

#[test]
fn unknown_option_suggests_names() {
    let entry = failure(json!({"r": {"<<if": true, "<<than": 1}}));
    assert_eq!(
        entry.message,
        "unknown option '<<than' for control '<<if'; did you mean: then?"
    );
}

#[test]
fn one_control_per_map() {
    let entry = failure(json!({"r": {"<<if": true, "<<switch": "a"}}));
    assert_eq!(
        entry.message,
        "multiple controls in one map: '<<if' and '<<switch'"
    );
}

#[test]
fn pending_control_input_waits() {
    let result = flow(json!({
        "r": {"<<if": "(( later ))", "<<then": "yes", "<<else": "no"},
        "later": "(( early ))",
        "early": true
    }));
    assert_eq!(result["r"], json!("yes"));
}

// =============================================================================
// Custom controls
// =============================================================================

fn shout(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let text = context.value.value.as_text().unwrap_or_default().to_uppercase();
    Ok(Some(context.node.with_value(Value::String(text))))
}

#[test]
fn registered_control_runs() {
    let mut engine = Engine::new();
    engine.controls_mut().register("shout", shout, &[]);
    let template = Node::from_json(
        json!({"name": "web", "r": {"<<shout": "(( name ))"}}),
        "template",
    )
    .unwrap();
    let result = engine.flow(template).unwrap().to_json().unwrap();
    assert_eq!(result["r"], json!("WEB"));
}
