//! Reference resolution.
//!
//! A relative name is searched in the local scope chain, then in the maps
//! enclosing the current node (innermost first, in the current pass's
//! snapshot), then in the scope of the document this one is nested in.
//! Absolute references and `doc::` start at the root of the outermost
//! document; other tags start at the tagged subtree.

use stubflow_semantics::DOCUMENT_TAG;

use super::error::compute_suggestions;
use super::{Binding, EvalError, EvalInfo, Evaluation, Resolved, Scope, Unresolved};
use crate::parser::Reference;
use crate::types::path::{lookup, render_path, step};
use crate::types::{Node, Value, is_embedded_expression};

/// Resolve a reference to a value.
///
/// With `locally` set, a container whose descendants are still unresolved is
/// returned as it is instead of making the reference pending.
pub fn resolve_reference(reference: &Reference, binding: &Binding<'_>, locally: bool) -> Evaluation {
    let node = find(reference, &binding.scope, binding.default_key())?;
    node_value(&reference.to_string(), node, locally)
}

/// True if a relative single name resolves to a node.
pub fn is_defined(name: &str, binding: &Binding<'_>) -> bool {
    let reference = Reference::relative(vec![name.to_string()]);
    find(&reference, &binding.scope, binding.default_key()).is_ok()
}

/// Turn a located node into an evaluation result.
pub fn node_value(name: &str, node: &Node, locally: bool) -> Evaluation {
    check_available(name, node)?;
    if !locally && !node.is_resolved() {
        return Err(Unresolved::Pending(EvalInfo {
            failed: node.has_error(),
            ..EvalInfo::with_issue(format!("'{name}' is unresolved"))
        }));
    }
    Ok(Resolved::new(node.value.clone()))
}

/// Pending if the node is an unevaluated expression or carries an error.
fn check_available(name: &str, node: &Node) -> Result<(), Unresolved> {
    if node.annotation.has_error || node.annotation.failed {
        return Err(Unresolved::Pending(EvalInfo {
            failed: true,
            ..EvalInfo::with_issue(format!("'{name}' depends on an error"))
        }));
    }
    let unparsed = matches!(&node.value, Value::String(text) if is_embedded_expression(text));
    if unparsed || matches!(node.value, Value::Expression(_)) {
        return Err(Unresolved::pending(format!("'{name}' is unresolved")));
    }
    Ok(())
}

fn find<'s>(reference: &Reference, scope: &'s Scope, default_key: &str) -> Result<&'s Node, Unresolved> {
    if let Some(tag) = &reference.tag {
        return find_tagged(tag, &reference.path, scope, default_key);
    }
    if reference.absolute {
        let root = &scope.root_scope().document.root;
        return walk(root, &[], &reference.path, default_key);
    }
    let Some((first, rest)) = reference.path.split_first() else {
        return Err(EvalError::Message("empty reference".to_string()).into());
    };

    if let Some(locals) = &scope.locals {
        if first == "_"
            && !rest.is_empty()
            && let Some(Node {
                value: Value::Lambda(lambda),
                ..
            }) = locals.get("_")
        {
            let inner = Reference::relative(rest.to_vec());
            return find(&inner, &lambda.scope, default_key);
        }
        if let Some(node) = locals.get(first) {
            return walk(node, &reference.path[..1], rest, default_key);
        }
    }

    let root = &scope.document.root;
    for depth in (0..scope.anchor.len()).rev() {
        let container = lookup(root, &scope.anchor[..depth], default_key);
        if let Some(node) = container.and_then(|c| c.get(first)) {
            return walk(node, &reference.path[..1], rest, default_key);
        }
    }

    if let Some(outer) = &scope.outer {
        return find(reference, outer, default_key);
    }

    Err(EvalError::NotFound {
        name: first.clone(),
        suggestions: compute_suggestions(first, visible_names(scope, default_key).iter().map(String::as_str)),
    }
    .into())
}

fn find_tagged<'s>(
    tag: &str,
    path: &[String],
    scope: &'s Scope,
    default_key: &str,
) -> Result<&'s Node, Unresolved> {
    let top = scope.root_scope();
    if tag == DOCUMENT_TAG {
        return walk(&top.document.root, &[], path, default_key);
    }
    if let Some(index) = tag
        .strip_prefix(DOCUMENT_TAG)
        .and_then(|rest| rest.strip_prefix('.'))
        .and_then(|n| n.parse::<usize>().ok())
    {
        let document = match index {
            0 => Some(&top.document.root),
            n => top.document.stubs.get(n - 1),
        };
        return match document {
            Some(root) => walk(root, &[], path, default_key),
            None => Err(EvalError::Message(format!("no document '{tag}'")).into()),
        };
    }
    match top.document.tags.get(tag) {
        Some(node) => walk(node, &[format!("{tag}::")], path, default_key),
        None => Err(EvalError::Message(format!("tag '{tag}' not found")).into()),
    }
}

/// Follow `rest` from `start`, which was reached through `walked`.
fn walk<'n>(start: &'n Node, walked: &[String], rest: &[String], default_key: &str) -> Result<&'n Node, Unresolved> {
    let mut node = start;
    let mut seen = walked.to_vec();
    for segment in rest {
        check_available(&render_path(&seen), node)?;
        match step(node, segment, default_key) {
            Some(next) => node = next,
            None => {
                let candidates: Vec<&str> = node
                    .value
                    .as_map()
                    .map(|map| map.keys().map(String::as_str).collect())
                    .unwrap_or_default();
                seen.push(segment.clone());
                return Err(EvalError::NotFound {
                    name: render_path(&seen),
                    suggestions: compute_suggestions(segment, candidates),
                }
                .into());
            }
        }
        seen.push(segment.clone());
    }
    Ok(node)
}

/// Names a relative reference could have meant.
fn visible_names(scope: &Scope, default_key: &str) -> Vec<String> {
    let mut names: Vec<String> = scope
        .locals
        .as_ref()
        .map(|locals| locals.names().into_iter().map(str::to_string).collect())
        .unwrap_or_default();
    for depth in 0..scope.anchor.len() {
        if let Some(map) = lookup(&scope.document.root, &scope.anchor[..depth], default_key)
            .and_then(|node| node.value.as_map())
        {
            names.extend(map.keys().cloned());
        }
    }
    if let Some(outer) = &scope.outer {
        names.extend(visible_names(outer, default_key));
    }
    names
}
