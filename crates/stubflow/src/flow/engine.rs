//! One flow pass over a tree, and the loop driving passes to a fixpoint.
//!
//! A pass rebuilds the whole tree. Every node is flowed in a binding whose
//! document is the snapshot of the previous pass, so evaluation order inside
//! a pass never influences the result. When stubs override the tree, their
//! values are seeded into it before the first pass.

use std::collections::BTreeMap;
use std::rc::Rc;

use stubflow_semantics::{CONTROL_PREFIX, DIRECTIVE_KEY, MarkerId};
use tracing::{debug, info, warn};

use crate::control::run_control;
use crate::engine::Engine;
use crate::interpreter::{
    Binding, Document, DocumentId, EvalInfo, LocalScope, Scope, Unresolved, evaluate,
};
use crate::parser::{Embedded, Expr, classify_string};
use crate::types::path::{entry_identity, entry_segment};
use crate::types::{Annotation, Issue, Node, TemplateValue, Value};

/// Everything a sequence of passes over one document shares.
pub(crate) struct FlowSetup<'e> {
    pub engine: &'e Engine,
    pub id: DocumentId,
    /// Prepared stubs, highest precedence first.
    pub stubs: Rc<Vec<Node>>,
    pub state: Option<Rc<Node>>,
    pub locals: Option<Rc<LocalScope>>,
    pub outer: Option<Rc<Scope>>,
    pub depth: usize,
    pub should_override: bool,
}

/// Result of the pass loop.
pub(crate) enum Fixpoint {
    /// The last pass did not change the tree.
    Reached(Node),
    /// The pass limit was hit first.
    Exhausted { passes: usize },
}

/// Flow `root` pass after pass until it stops changing.
pub(crate) fn run_to_fixpoint(root: Node, setup: &FlowSetup<'_>) -> Fixpoint {
    let max_passes = setup.engine.max_passes();
    let mut current = if setup.should_override {
        seed_overrides(&root, &pass_binding(setup, &root))
    } else {
        root
    };
    for pass in 1..=max_passes {
        let binding = pass_binding(setup, &current);
        let next = flow_node(&current, &binding, setup.should_override)
            .unwrap_or_else(|| Node::new(Value::Nil, current.source.clone()));
        debug!(pass, depth = setup.depth, "flow pass finished");
        if next == current {
            if setup.depth == 0 {
                info!(passes = pass, "flow reached fixpoint");
            }
            return Fixpoint::Reached(next);
        }
        current = next;
    }
    warn!(passes = max_passes, depth = setup.depth, "flow pass limit reached");
    Fixpoint::Exhausted { passes: max_passes }
}

/// Root binding over a snapshot of `root`.
fn pass_binding<'e>(setup: &FlowSetup<'e>, root: &Node) -> Binding<'e> {
    let document = Document::new(
        setup.id.clone(),
        root.clone(),
        setup.stubs.clone(),
        setup.state.clone(),
    );
    let scope = Scope {
        document: Rc::new(document),
        locals: setup.locals.clone(),
        anchor: Vec::new(),
        outer: setup.outer.clone(),
    };
    Binding::new(setup.engine, scope, setup.depth)
}

/// Replace every node a stub overrides by the stub value, evaluating nothing.
///
/// Subtrees whose shape is still decided by a control, a list directive or
/// a map directive moving their stub paths are left to the passes.
fn seed_overrides(node: &Node, binding: &Binding<'_>) -> Node {
    if node.annotation.blocks_override() {
        return node.clone();
    }
    match &node.value {
        Value::Map(map) => seed_map(node, map, binding),
        Value::List(items) => {
            if items.iter().any(|entry| list_directive(entry).is_some()) {
                return node.clone();
            }
            if let Some(result) = stub_override(node, binding, true) {
                return result;
            }
            let key = list_key(&node.annotation, binding);
            let entries = items
                .iter()
                .enumerate()
                .map(|(index, entry)| {
                    let segment = entry_segment(entry, index, &key);
                    seed_overrides(entry, &binding.entry(&segment, &key))
                })
                .collect();
            node.with_value(Value::List(entries))
        }
        Value::Expression(expr) => expression_override(node, expr, binding).unwrap_or_else(|| node.clone()),
        Value::String(text) => match classify_string(text) {
            Embedded::Expression(Ok(expr)) => {
                expression_override(node, &expr, binding).unwrap_or_else(|| node.clone())
            }
            _ => override_leaf(node, binding, true),
        },
        _ => override_leaf(node, binding, true),
    }
}

fn seed_map(node: &Node, map: &BTreeMap<String, Node>, binding: &Binding<'_>) -> Node {
    if let Some(stub) = binding.override_value()
        && !matches!(stub.value, Value::Map(_))
    {
        return overridden(node, stub, node.annotation.temporary);
    }
    let is_control = map
        .keys()
        .any(|key| key.strip_prefix(CONTROL_PREFIX).is_some_and(|name| !name.is_empty()));
    let reshaped = map
        .get(DIRECTIVE_KEY)
        .and_then(directive_expr)
        .is_some_and(|expr| !keeps_stub_paths(&expr));
    if is_control || reshaped {
        return node.clone();
    }
    let fields = map
        .iter()
        .map(|(key, child)| {
            let seeded = if key == DIRECTIVE_KEY {
                child.clone()
            } else {
                seed_overrides(child, &binding.child(key))
            };
            (key.clone(), seeded)
        })
        .collect();
    node.with_value(Value::Map(fields))
}

/// Directives under which fields keep their own stub paths: `(( merge ))`
/// without a redirect or `replace`, and markers other than `&template`.
fn keeps_stub_paths(expr: &Expr) -> bool {
    match expr.ungrouped() {
        Expr::Merge(merge) => merge.path.is_none() && !merge.replace,
        Expr::Marker { expr: inner, .. } => {
            !expr.has_marker(MarkerId::Template) && inner.as_deref().is_none_or(keeps_stub_paths)
        }
        _ => false,
    }
}

/// Flow one node. `None` removes the node from its parent.
pub(crate) fn flow_node(node: &Node, binding: &Binding<'_>, should_override: bool) -> Option<Node> {
    match &node.value {
        Value::Map(map) => flow_map(node, map, binding, should_override),
        Value::List(items) => Some(flow_list(node, items, binding, should_override)),
        Value::Expression(expr) => flow_expression(node, expr.clone(), binding, should_override),
        Value::String(text) => flow_string(node, text, binding, should_override),
        _ => Some(override_leaf(node, binding, should_override)),
    }
}

/// The override of a node by the first stub defining its path.
fn stub_override(node: &Node, binding: &Binding<'_>, should_override: bool) -> Option<Node> {
    if !should_override || node.annotation.blocks_override() {
        return None;
    }
    let stub = binding.override_value()?;
    Some(overridden(node, stub, node.annotation.temporary))
}

fn overridden(node: &Node, stub: &Node, temporary: bool) -> Node {
    let mut result = stub.clone();
    result.annotation.merged = true;
    result.annotation.temporary |= temporary;
    result.annotation.state |= node.annotation.state;
    result.annotation.clear_issue();
    result
}

fn override_leaf(node: &Node, binding: &Binding<'_>, should_override: bool) -> Node {
    stub_override(node, binding, should_override).unwrap_or_else(|| node.clone())
}

/// Strings are parsed when they are first flowed.
fn flow_string(node: &Node, text: &str, binding: &Binding<'_>, should_override: bool) -> Option<Node> {
    match classify_string(text) {
        Embedded::Literal | Embedded::Escaped(_) => Some(override_leaf(node, binding, should_override)),
        Embedded::Expression(Ok(expr)) => {
            let expr = Rc::new(expr);
            let parsed = node.with_value(Value::Expression(expr.clone()));
            flow_expression(&parsed, expr, binding, should_override)
        }
        Embedded::Expression(Err(error)) => {
            if let Some(result) = stub_override(node, binding, should_override) {
                return Some(result);
            }
            let mut result = node.clone();
            result.annotation.has_error = true;
            result.annotation.issue = Some(Issue::new(format!("parse error: {error}")));
            Some(result)
        }
    }
}

/// Static marker flags of an expression, e.g. `(( &temporary foo ))`.
fn static_info(expr: &Expr) -> EvalInfo {
    let mut info = EvalInfo::default();
    for marker in expr.markers() {
        info.add_marker(marker);
    }
    info
}

/// The stub override of an expression node. `merge` and `prefer` forms
/// are never overridden.
fn expression_override(node: &Node, expr: &Expr, binding: &Binding<'_>) -> Option<Node> {
    if node.annotation.blocks_override() || expr.contains_merge() || expr.is_preferred() {
        return None;
    }
    let stub = binding.override_value()?;
    Some(overridden(
        node,
        stub,
        node.annotation.temporary || static_info(expr).temporary,
    ))
}

fn flow_expression(
    node: &Node,
    expr: Rc<Expr>,
    binding: &Binding<'_>,
    should_override: bool,
) -> Option<Node> {
    if should_override
        && let Some(result) = expression_override(node, &expr, binding)
    {
        return Some(result);
    }

    let markers = static_info(&expr);

    if markers.state
        && let Some(state) = binding.state_value()
    {
        let mut result = state.clone();
        result.annotation = resolved_annotation(node);
        markers.annotate(&mut result.annotation);
        return Some(result);
    }

    match evaluate(&expr, binding) {
        Ok(resolved) if resolved.info.undefined => None,
        Ok(resolved) => {
            let mut result = Node::new(resolved.value, node.source.clone());
            result.annotation = resolved_annotation(node);
            resolved.info.annotate(&mut result.annotation);
            markers.annotate(&mut result.annotation);
            Some(result)
        }
        Err(unresolved) => Some(unresolved_node(node, expr, unresolved)),
    }
}

/// The annotation of a node whose expression resolved: flags survive,
/// diagnostics do not.
fn resolved_annotation(node: &Node) -> Annotation {
    let mut annotation = node.annotation.clone();
    annotation.clear_issue();
    annotation
}

fn unresolved_node(node: &Node, expr: Rc<Expr>, unresolved: Unresolved) -> Node {
    let is_error = unresolved.is_error();
    let info = unresolved.into_info();
    let mut result = node.with_value(Value::Expression(expr));
    result.annotation.has_error = is_error;
    result.annotation.failed = info.failed;
    result.annotation.issue = info.issue;
    result
}

/// The expression of a directive node, if it is one.
fn directive_expr(node: &Node) -> Option<Rc<Expr>> {
    match &node.value {
        Value::Expression(expr) => Some(expr.clone()),
        Value::String(text) => match classify_string(text) {
            Embedded::Expression(Ok(expr)) => Some(Rc::new(expr)),
            _ => None,
        },
        _ => None,
    }
}

/// `<<: (( &template ))`
fn is_template_directive(expr: &Expr) -> bool {
    matches!(expr.ungrouped(), Expr::Marker { expr: None, .. }) && expr.has_marker(MarkerId::Template)
}

fn flow_map(
    node: &Node,
    map: &BTreeMap<String, Node>,
    binding: &Binding<'_>,
    should_override: bool,
) -> Option<Node> {
    if should_override
        && !node.annotation.blocks_override()
        && let Some(stub) = binding.override_value()
        && !matches!(stub.value, Value::Map(_))
    {
        return Some(overridden(node, stub, node.annotation.temporary));
    }

    let directive = map
        .get(DIRECTIVE_KEY)
        .and_then(|directive| directive_expr(directive).map(|expr| (directive, expr)));

    if let Some((_, expr)) = &directive
        && is_template_directive(expr)
    {
        let mut body = map.clone();
        body.remove(DIRECTIVE_KEY);
        let mut template = Node::new(
            Value::Template(Rc::new(TemplateValue::new(node.with_value(Value::Map(body))))),
            node.source.clone(),
        );
        template.annotation = resolved_annotation(node);
        static_info(expr).annotate(&mut template.annotation);
        return Some(template);
    }

    if let Some(outcome) = run_control(node, map, binding) {
        return match outcome {
            Ok(Some(result)) => flow_node(&result, binding, should_override),
            Ok(None) => None,
            Err(unresolved) => {
                let mut result = node.clone();
                let is_error = unresolved.is_error();
                let info = unresolved.into_info();
                result.annotation.has_error = is_error;
                result.annotation.failed = info.failed;
                result.annotation.issue = info.issue;
                Some(result)
            }
        };
    }

    let mut fields = map.clone();
    let mut annotation = resolved_annotation(node);
    if annotation.state
        && let Some(state) = binding.state_value()
    {
        let mut result = state.clone();
        result.annotation = annotation;
        return Some(result);
    }

    if let Some((directive_node, expr)) = directive {
        match evaluate(&expr, &binding.directive()) {
            Ok(resolved) => {
                fields.remove(DIRECTIVE_KEY);
                let merged = annotation.merged;
                resolved.info.annotate(&mut annotation);
                annotation.merged = merged;
                let value = if resolved.info.undefined {
                    Value::Nil
                } else {
                    resolved.value
                };
                match value {
                    Value::Nil => {}
                    Value::Map(spliced) if resolved.info.replace => {
                        fields = spliced;
                        annotation.merged = true;
                    }
                    Value::Map(spliced) => {
                        for (key, value) in spliced {
                            fields.entry(key).or_insert(value);
                        }
                    }
                    other => {
                        let mut result = Node::new(other, node.source.clone());
                        result.annotation = annotation;
                        result.annotation.merged = true;
                        return Some(result);
                    }
                }
            }
            Err(unresolved) => {
                fields.insert(
                    DIRECTIVE_KEY.to_string(),
                    unresolved_node(directive_node, expr, unresolved),
                );
            }
        }
    }

    let binding = match &annotation.redirect_path {
        Some(path) => binding.redirected(path.clone()),
        None => binding.clone(),
    };
    let child_override = should_override && !annotation.blocks_override();
    let mut flowed = BTreeMap::new();
    for (key, child) in fields {
        if key == DIRECTIVE_KEY {
            flowed.insert(key, child);
            continue;
        }
        if let Some(result) = flow_node(&child, &binding.child(&key), child_override) {
            flowed.insert(key, result);
        }
    }
    Some(Node {
        value: Value::Map(flowed),
        annotation,
        source: node.source.clone(),
    })
}

/// A list entry of the form `- <<: (( ... ))`.
fn list_directive(entry: &Node) -> Option<Rc<Expr>> {
    let map = entry.value.as_map()?;
    if map.len() != 1 {
        return None;
    }
    directive_expr(map.get(DIRECTIVE_KEY)?)
}

fn flow_list(node: &Node, items: &[Node], binding: &Binding<'_>, should_override: bool) -> Node {
    let mut annotation = resolved_annotation(node);
    let mut entries = items.to_vec();

    let directive = items
        .iter()
        .enumerate()
        .find_map(|(position, entry)| list_directive(entry).map(|expr| (position, expr)));

    if let Some((position, expr)) = directive {
        match evaluate(&expr, &binding.directive()) {
            Ok(resolved) => {
                entries.remove(position);
                let merged = annotation.merged;
                resolved.info.annotate(&mut annotation);
                annotation.merged = merged;
                annotation.expanded = true;
                let value = if resolved.info.undefined {
                    Value::Nil
                } else {
                    resolved.value
                };
                match value {
                    Value::Nil => {}
                    Value::List(merged_items) if resolved.info.replace => {
                        entries = merged_items;
                        annotation.merged = true;
                    }
                    Value::List(merged_items) if resolved.info.merged => {
                        let key = list_key(&annotation, binding);
                        let known: Vec<String> = entries
                            .iter()
                            .filter_map(|entry| entry_identity(entry, &key))
                            .collect();
                        let added: Vec<Node> = merged_items
                            .into_iter()
                            .filter(|item| {
                                entry_identity(item, &key).is_none_or(|identity| !known.contains(&identity))
                            })
                            .collect();
                        entries.splice(position..position, added);
                    }
                    Value::List(spliced) => {
                        entries.splice(position..position, spliced);
                    }
                    other => {
                        annotation.has_error = true;
                        annotation.issue = Some(Issue::new(format!(
                            "list directive yields {}, list expected",
                            other.type_name()
                        )));
                        return Node {
                            value: Value::List(items.to_vec()),
                            annotation,
                            source: node.source.clone(),
                        };
                    }
                }
            }
            Err(unresolved) => {
                let directive_node = &items[position];
                if let Some(inner) = directive_node.get(DIRECTIVE_KEY) {
                    let mut entry = directive_node.clone();
                    let mut map = BTreeMap::new();
                    map.insert(
                        DIRECTIVE_KEY.to_string(),
                        unresolved_node(inner, expr, unresolved),
                    );
                    entry.value = Value::Map(map);
                    entries[position] = entry;
                }
            }
        }
    } else if !annotation.expanded
        && let Some(result) = stub_override(node, binding, should_override)
    {
        return result;
    }

    let child_override = should_override && !annotation.blocks_override();
    let key = list_key(&annotation, binding);
    let mut flowed = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if list_directive(entry).is_some() {
            flowed.push(entry.clone());
            continue;
        }
        let segment = entry_segment(entry, index, &key);
        if let Some(result) = flow_node(entry, &binding.entry(&segment, &key), child_override) {
            flowed.push(result);
        }
    }
    Node {
        value: Value::List(flowed),
        annotation,
        source: node.source.clone(),
    }
}

fn list_key(annotation: &Annotation, binding: &Binding<'_>) -> String {
    annotation
        .key_name
        .clone()
        .unwrap_or_else(|| binding.default_key().to_string())
}
