//! Post-processing of flowed trees.

use std::collections::BTreeMap;

use crate::parser::{Embedded, classify_string};
use crate::types::path::{entry_identity, key_name};
use crate::types::{Node, Value};

/// Remove `&local` nodes, and `&temporary` nodes too if `temporary` is set.
///
/// Returns `None` if `node` itself is removed.
pub(crate) fn strip_flagged(node: Node, temporary: bool) -> Option<Node> {
    if node.annotation.local || (temporary && node.annotation.temporary) {
        return None;
    }
    let Node {
        value,
        annotation,
        source,
    } = node;
    let value = match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .filter_map(|(key, child)| strip_flagged(child, temporary).map(|child| (key, child)))
                .collect(),
        ),
        Value::List(items) => Value::List(
            items
                .into_iter()
                .filter_map(|item| strip_flagged(item, temporary))
                .collect(),
        ),
        other => other,
    };
    Some(Node {
        value,
        annotation,
        source,
    })
}

/// Turn escaped `((! ... ))` strings into their literal `(( ... ))` text.
pub(crate) fn unescape(node: &mut Node) {
    match &mut node.value {
        Value::String(text) => {
            if let Embedded::Escaped(literal) = classify_string(text) {
                *text = literal;
            }
        }
        Value::Map(map) => map.values_mut().for_each(unescape),
        Value::List(items) => items.iter_mut().for_each(unescape),
        _ => {}
    }
}

/// Collect the `&state` nodes of a flowed tree into a document of their own.
///
/// The state document keeps the maps and lists leading to each state node.
/// A list entry is found again by its identity, which is kept with it, or by
/// its index, which nil placeholders preserve.
pub(crate) fn extract_state(node: &Node, default_key: &str) -> Option<Node> {
    if node.annotation.state {
        let mut state = node.clone();
        state.annotation.state = false;
        return Some(state);
    }
    match &node.value {
        Value::Map(map) => {
            let fields: BTreeMap<String, Node> = map
                .iter()
                .filter_map(|(key, child)| {
                    extract_state(child, default_key).map(|state| (key.clone(), state))
                })
                .collect();
            if fields.is_empty() {
                return None;
            }
            Some(Node::new(Value::Map(fields), node.source.clone()))
        }
        Value::List(items) => extract_list_state(node, items, default_key),
        _ => None,
    }
}

fn extract_list_state(node: &Node, items: &[Node], default_key: &str) -> Option<Node> {
    let key = key_name(node, default_key);
    let keyed = items.iter().all(|item| entry_identity(item, key).is_some());
    let states: Vec<Option<Node>> = items
        .iter()
        .map(|item| extract_state(item, default_key))
        .collect();
    let last = states.iter().rposition(Option::is_some)?;

    let mut entries = Vec::new();
    for (item, state) in items.iter().zip(states).take(last + 1) {
        match state {
            Some(mut state) => {
                if let (Some(identity), Value::Map(fields)) = (item.get(key), &mut state.value) {
                    fields.entry(key.to_string()).or_insert_with(|| identity.clone());
                }
                entries.push(state);
            }
            None if keyed => {}
            None => entries.push(Node::new(Value::Nil, item.source.clone())),
        }
    }
    let mut list = Node::new(Value::List(entries), node.source.clone());
    list.annotation.key_name = node.annotation.key_name.clone();
    Some(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(json: &str) -> Node {
        Node::from_json_str(json, "test").unwrap()
    }

    #[test]
    fn temporary_nodes_are_stripped_on_request() {
        let mut root = tree(r#"{"a": 1, "b": {"c": 2, "d": 3}}"#);
        if let Value::Map(map) = &mut root.value {
            map.get_mut("a").unwrap().annotation.temporary = true;
            if let Value::Map(inner) = &mut map.get_mut("b").unwrap().value {
                inner.get_mut("d").unwrap().annotation.local = true;
            }
        }
        let kept = strip_flagged(root.clone(), false).unwrap();
        assert_eq!(kept.to_json().unwrap(), serde_json::json!({"a": 1, "b": {"c": 2}}));
        let stripped = strip_flagged(root, true).unwrap();
        assert_eq!(stripped.to_json().unwrap(), serde_json::json!({"b": {"c": 2}}));
    }

    #[test]
    fn escaped_expressions_become_literal() {
        let mut root = tree(r#"{"a": "((!foo))", "b": ["((! bar ))"], "c": "((x))"}"#);
        unescape(&mut root);
        assert_eq!(
            root.to_json().unwrap(),
            serde_json::json!({"a": "((foo))", "b": ["(( bar ))"], "c": "((x))"})
        );
    }

    #[test]
    fn state_nodes_keep_their_parent_maps() {
        let mut root = tree(r#"{"a": {"b": 1, "c": 2}, "d": 3}"#);
        if let Value::Map(map) = &mut root.value
            && let Value::Map(inner) = &mut map.get_mut("a").unwrap().value
        {
            inner.get_mut("b").unwrap().annotation.state = true;
        }
        let state = extract_state(&root, "name").unwrap();
        assert_eq!(state.to_json().unwrap(), serde_json::json!({"a": {"b": 1}}));
        assert!(extract_state(&tree(r#"{"x": 1}"#), "name").is_none());
    }

    fn mark_state(entry: &mut Node, field: &str) {
        if let Value::Map(fields) = &mut entry.value {
            fields.get_mut(field).unwrap().annotation.state = true;
        }
    }

    #[test]
    fn keyed_list_entries_keep_their_identity() {
        let mut root = tree(
            r#"{"jobs": [{"name": "web", "n": 1}, {"name": "db", "n": 2}, {"name": "api", "n": 3}]}"#,
        );
        if let Value::Map(map) = &mut root.value
            && let Value::List(jobs) = &mut map.get_mut("jobs").unwrap().value
        {
            mark_state(&mut jobs[1], "n");
        }
        let state = extract_state(&root, "name").unwrap();
        assert_eq!(
            state.to_json().unwrap(),
            serde_json::json!({"jobs": [{"name": "db", "n": 2}]})
        );
    }

    #[test]
    fn unkeyed_list_entries_keep_their_index() {
        let mut root = tree(r#"{"rows": [{"n": 1}, {"n": 2}, {"n": 3}]}"#);
        if let Value::Map(map) = &mut root.value
            && let Value::List(rows) = &mut map.get_mut("rows").unwrap().value
        {
            mark_state(&mut rows[1], "n");
        }
        let state = extract_state(&root, "name").unwrap();
        assert_eq!(
            state.to_json().unwrap(),
            serde_json::json!({"rows": [null, {"n": 2}]})
        );
    }
}
