//! The expression evaluator.

use std::collections::BTreeMap;
use std::rc::Rc;

use stubflow_semantics::MarkerId;

use super::intrinsics::{evaluate_auto, evaluate_intrinsic, evaluate_merge};
use super::lambda::{curry, evaluate_arguments, evaluate_call};
use super::operators::{arithmetic, compare, concatenate};
use super::reference::{node_value, resolve_reference};
use super::{Binding, EvalError, Evaluation, Resolved, Unresolved, compute_suggestions};
use crate::flow::flow_nested;
use crate::parser::{Expr, LogicOp, Marker};
use crate::types::path::{parse_index, render_path, slice_range, step};
use crate::types::{LambdaValue, Node, TemplateValue, Value};

/// Evaluate an expression in a binding.
pub fn evaluate(expr: &Expr, binding: &Binding<'_>) -> Evaluation {
    match expr {
        Expr::Nil => Ok(Resolved::new(Value::Nil)),
        Expr::Undefined => Ok(Resolved::undefined()),
        Expr::Bool(b) => Ok(Resolved::new(*b)),
        Expr::Int(n) => Ok(Resolved::new(*n)),
        Expr::Float(n) => Ok(Resolved::new(*n)),
        Expr::String(s) => Ok(Resolved::new(s.as_str())),
        Expr::Reference(reference) => resolve_reference(reference, binding, false),
        Expr::Grouped(inner) => evaluate(inner, binding),

        Expr::Arithmetic { op, lhs, rhs } => {
            let lhs = evaluate(lhs, binding)?;
            let rhs = evaluate(rhs, binding)?;
            Ok(Resolved::new(arithmetic(*op, &lhs.value, &rhs.value)?))
        }
        Expr::Concatenation(lhs, rhs) => {
            let lhs = evaluate(lhs, binding)?;
            let rhs = evaluate(rhs, binding)?;
            Ok(Resolved::new(concatenate(
                lhs.value,
                rhs.value,
                &binding.source(),
            )?))
        }
        Expr::Comparison { op, lhs, rhs } => {
            let lhs = evaluate(lhs, binding)?;
            let rhs = evaluate(rhs, binding)?;
            Ok(Resolved::new(compare(*op, &lhs.value, &rhs.value)?))
        }
        Expr::Or(lhs, rhs) => match evaluate(lhs, binding) {
            Ok(resolved) if !resolved.info.undefined => Ok(resolved),
            Ok(_) | Err(Unresolved::Error(_)) => evaluate(rhs, binding),
            Err(pending) => Err(pending),
        },
        Expr::Logical { op, lhs, rhs } => {
            let left = evaluate(lhs, binding)?.value.is_truthy();
            let result = match op {
                LogicOp::And => left && evaluate(rhs, binding)?.value.is_truthy(),
                LogicOp::Or => left || evaluate(rhs, binding)?.value.is_truthy(),
            };
            Ok(Resolved::new(result))
        }
        Expr::Not(inner) => Ok(Resolved::new(!evaluate(inner, binding)?.value.is_truthy())),
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, binding)?.value.is_truthy() {
                evaluate(then, binding)
            } else {
                evaluate(otherwise, binding)
            }
        }

        Expr::List(items) => {
            let mut nodes = Vec::with_capacity(items.len());
            for item in items {
                let resolved = evaluate(item, binding)?;
                if !resolved.info.undefined {
                    nodes.push(into_node(resolved, binding));
                }
            }
            Ok(Resolved::new(Value::List(nodes)))
        }
        Expr::Range { start, end } => {
            let start = expect_int(evaluate(start, binding)?.value)?;
            let end = expect_int(evaluate(end, binding)?.value)?;
            let values: Vec<i64> = if start <= end {
                (start..=end).collect()
            } else {
                (end..=start).rev().collect()
            };
            let source = binding.source();
            Ok(Resolved::new(Value::List(
                values
                    .into_iter()
                    .map(|n| Node::new(Value::Int(n), source.clone()))
                    .collect(),
            )))
        }
        Expr::Map(entries) => {
            let mut map = BTreeMap::new();
            for entry in entries {
                let resolved = evaluate(&entry.value, binding)?;
                if !resolved.info.undefined {
                    map.insert(entry.key.clone(), into_node(resolved, binding));
                }
            }
            Ok(Resolved::new(Value::Map(map)))
        }

        Expr::Call { callee, args } => evaluate_call(callee, args, binding),
        Expr::Intrinsic { id, args } => evaluate_intrinsic(*id, args, binding),
        Expr::Curry { callee, args } => {
            let target = evaluate(callee, binding)?;
            let lambda = match target.value {
                Value::Lambda(lambda) => lambda,
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "lambda",
                        found: other.type_name(),
                    }
                    .into());
                }
            };
            let args = evaluate_arguments(args, binding)?;
            let curried = curry(&lambda, args)?;
            Ok(Resolved::new(Value::Lambda(Rc::new(curried))))
        }
        Expr::Lambda(lambda) => Ok(Resolved::new(Value::Lambda(Rc::new(LambdaValue::new(
            lambda.clone(),
            binding.scope.clone(),
        ))))),

        Expr::Merge(merge) => evaluate_merge(merge, binding),
        Expr::Auto => evaluate_auto(binding),
        Expr::Marker { markers, expr } => evaluate_marker(markers, expr.as_deref(), binding),
        Expr::Prefer(inner) => {
            let mut resolved = evaluate(inner, binding)?;
            resolved.info.preferred = true;
            Ok(resolved)
        }
        Expr::Substitution(inner) => {
            let target = evaluate(inner, binding)?;
            match target.value {
                Value::Template(template) => flow_nested(&template.node, binding, None, None),
                other => Err(EvalError::TypeMismatch {
                    expected: "template",
                    found: other.type_name(),
                }
                .into()),
            }
        }

        Expr::Dynamic { base, index } => {
            let base = evaluate(base, binding)?;
            let index = evaluate(index, binding)?;
            let path = index_path(index.value)?;
            navigate(base.value, &path, binding)
        }
        Expr::Slice { base, start, end } => {
            let base = evaluate(base, binding)?;
            let start = start
                .as_ref()
                .map(|e| evaluate(e, binding).and_then(|r| expect_int(r.value)))
                .transpose()?;
            let end = end
                .as_ref()
                .map(|e| evaluate(e, binding).and_then(|r| expect_int(r.value)))
                .transpose()?;
            let items = match base.value {
                Value::List(items) => items,
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "list",
                        found: other.type_name(),
                    }
                    .into());
                }
            };
            let range = slice_range(items.len(), start, end)
                .ok_or(EvalError::InvalidSlice { len: items.len() })?;
            Ok(Resolved::new(Value::List(items[range].to_vec())))
        }
        Expr::Projection { base, path } => {
            let base = evaluate(base, binding)?;
            let elements = match base.value {
                Value::List(items) => items,
                Value::Map(map) => map.into_values().collect(),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "list",
                        found: other.type_name(),
                    }
                    .into());
                }
            };
            let mut projected = Vec::with_capacity(elements.len());
            for element in elements {
                let resolved = navigate(element.value, path, binding)?;
                projected.push(into_node(resolved, binding));
            }
            Ok(Resolved::new(Value::List(projected)))
        }
        Expr::Qualified { base, path } => {
            let base = evaluate(base, binding)?;
            navigate(base.value, path, binding)
        }
    }
}

/// Evaluate with relaxed resolution: a reference to a container with
/// unresolved descendants yields the container.
pub fn evaluate_locally(expr: &Expr, binding: &Binding<'_>) -> Evaluation {
    match expr {
        Expr::Reference(reference) => resolve_reference(reference, binding, true),
        Expr::Grouped(inner) => evaluate_locally(inner, binding),
        other => evaluate(other, binding),
    }
}

/// Wrap an evaluation result as a tree node carrying its annotations.
pub fn into_node(resolved: Resolved, binding: &Binding<'_>) -> Node {
    let mut node = Node::new(resolved.value, binding.source());
    resolved.info.annotate(&mut node.annotation);
    node
}

fn evaluate_marker(markers: &[Marker], expr: Option<&Expr>, binding: &Binding<'_>) -> Evaluation {
    let is_template = markers
        .iter()
        .any(|m| *m == Marker::Flag(MarkerId::Template));
    let mut resolved = match expr {
        Some(inner) if is_template => {
            let captured = Node::new(Value::Expression(Rc::new(inner.clone())), binding.source());
            Resolved::new(Value::Template(Rc::new(TemplateValue::new(captured))))
        }
        Some(inner) => evaluate(inner, binding)?,
        None => Resolved::new(Value::Nil),
    };
    for marker in markers {
        resolved.info.add_marker(marker);
    }
    // Only a bare `&template` turns the surrounding map into a template.
    resolved.info.template = is_template && expr.is_none();
    Ok(resolved)
}

fn expect_int(value: Value) -> Result<i64, Unresolved> {
    value.as_int().ok_or_else(|| {
        EvalError::TypeMismatch {
            expected: "int",
            found: value.type_name(),
        }
        .into()
    })
}

/// Path segments denoted by a dynamic index value.
fn index_path(index: Value) -> Result<Vec<String>, Unresolved> {
    match index {
        Value::Int(n) => Ok(vec![n.to_string()]),
        Value::String(s) => Ok(s.split('.').map(str::to_string).collect()),
        Value::List(items) => items
            .iter()
            .map(|item| item.value.as_text())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                EvalError::TypeMismatch {
                    expected: "path segments",
                    found: "list",
                }
                .into()
            }),
        other => Err(EvalError::TypeMismatch {
            expected: "index",
            found: other.type_name(),
        }
        .into()),
    }
}

/// Follow a path inside an evaluated value.
fn navigate(value: Value, path: &[String], binding: &Binding<'_>) -> Evaluation {
    let root = Node::new(value, binding.source());
    let mut node = &root;
    for (i, segment) in path.iter().enumerate() {
        node = match step(node, segment, binding.default_key()) {
            Some(next) => next,
            None => return Err(missing_step(node, segment, &path[..=i])),
        };
    }
    node_value(&render_path(path), node, false)
}

fn missing_step(node: &Node, segment: &str, seen: &[String]) -> Unresolved {
    match (&node.value, parse_index(segment)) {
        (Value::List(items), Some(index)) => EvalError::IndexOutOfRange {
            index,
            len: items.len(),
        },
        (Value::List(_) | Value::Map(_), _) => EvalError::NotFound {
            name: render_path(seen),
            suggestions: node
                .value
                .as_map()
                .map(|map| compute_suggestions(segment, map.keys().map(String::as_str)))
                .unwrap_or_default(),
        },
        (other, _) => EvalError::TypeMismatch {
            expected: "map or list",
            found: other.type_name(),
        },
    }
    .into()
}
