//! `<<for`: iterate a template over the cartesian product of sequences.
//!
//! ```yaml
//! list:
//!   <<for:
//!     x: [1, 2]
//!     y: [a, b]
//!   <<do: (( x y ))
//! ```
//!
//! yields `[1a, 1b, 2a, 2b]`. The first variable varies slowest. Each row
//! sees the current element under the variable's name and its index (or key
//! for maps) as `index-<name>`. With `<<mapkey` the result is a map keyed by
//! the evaluated key of each row.

use std::collections::BTreeMap;

use super::ControlContext;
use crate::flow::flow_nested;
use crate::interpreter::{EvalError, Unresolved, aggregate};
use crate::types::{Node, Value};

/// Prefix of the per-variable index name.
const INDEX_PREFIX: &str = "index-";

struct Variable {
    name: String,
    /// `(index, element)` pairs.
    elements: Vec<(Node, Node)>,
}

pub(super) fn for_control(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let variables = variables(context.value)?;
    let Some(body) = context.option("do") else {
        return Err(EvalError::Message("missing '<<do'".to_string()).into());
    };
    let mapkey = context.option("mapkey");
    let source = context.node.source.clone();

    let mut list = Vec::new();
    let mut map = BTreeMap::new();
    let mut failures = Vec::new();
    for (row, locals) in rows(&variables).into_iter().enumerate() {
        let label = row_label(row, &locals, &variables);
        let value = match flow_nested(body, context.binding, Some(locals.clone()), None) {
            Ok(resolved) => resolved.value,
            Err(unresolved) => {
                failures.push(unresolved.context(label));
                continue;
            }
        };
        match mapkey {
            None => list.push(Node::new(value, source.clone())),
            Some(mapkey) => match flow_nested(mapkey, context.binding, Some(locals), None) {
                Ok(key) => match key.value.as_text() {
                    Some(key) => {
                        map.insert(key, Node::new(value, source.clone()));
                    }
                    None => failures.push(
                        Unresolved::from(EvalError::TypeMismatch {
                            expected: "string map key",
                            found: key.value.type_name(),
                        })
                        .context(label),
                    ),
                },
                Err(unresolved) => failures.push(unresolved.context(label)),
            },
        }
    }

    if !failures.is_empty() {
        return Err(aggregate("for loop failed", failures, true));
    }
    let value = match mapkey {
        Some(_) => Value::Map(map),
        None => Value::List(list),
    };
    Ok(Some(Node::new(value, source)))
}

/// Iteration variables from `{name: seq, ...}` or `[{name, values}, ...]`.
fn variables(spec: &Node) -> Result<Vec<Variable>, Unresolved> {
    match &spec.value {
        Value::Map(map) => map
            .iter()
            .map(|(name, values)| variable(name, values))
            .collect(),
        Value::List(items) => items
            .iter()
            .map(|item| {
                let name = item.get("name").and_then(|name| name.value.as_str());
                match (name, item.get("values")) {
                    (Some(name), Some(values)) => variable(name, values),
                    _ => Err(EvalError::Message(
                        "loop variables need 'name' and 'values' fields".to_string(),
                    )
                    .into()),
                }
            })
            .collect(),
        other => Err(EvalError::TypeMismatch {
            expected: "map or list of loop variables",
            found: other.type_name(),
        }
        .into()),
    }
}

fn variable(name: &str, values: &Node) -> Result<Variable, Unresolved> {
    let source = values.source.clone();
    let elements = match &values.value {
        Value::Nil => Vec::new(),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(index, item)| (Node::new(Value::from(index), source.clone()), item.clone()))
            .collect(),
        Value::Map(fields) => fields
            .iter()
            .map(|(key, item)| (Node::new(Value::from(key.as_str()), source.clone()), item.clone()))
            .collect(),
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "list or map",
                found: other.type_name(),
            }
            .into());
        }
    };
    Ok(Variable {
        name: name.to_string(),
        elements,
    })
}

/// Local bindings of every row, first variable varying slowest.
fn rows(variables: &[Variable]) -> Vec<BTreeMap<String, Node>> {
    let mut rows = vec![BTreeMap::new()];
    for variable in variables {
        let mut next = Vec::with_capacity(rows.len() * variable.elements.len());
        for row in &rows {
            for (index, element) in &variable.elements {
                let mut extended = row.clone();
                extended.insert(variable.name.clone(), element.clone());
                extended.insert(format!("{INDEX_PREFIX}{}", variable.name), index.clone());
                next.push(extended);
            }
        }
        rows = next;
    }
    rows
}

fn row_label(row: usize, locals: &BTreeMap<String, Node>, variables: &[Variable]) -> String {
    let values: Vec<String> = variables
        .iter()
        .filter_map(|variable| {
            locals
                .get(&variable.name)
                .map(|value| format!("{}={}", variable.name, value.value))
        })
        .collect();
    format!("row {} ({})", row + 1, values.join(", "))
}
