//! Flowing a subtree as a document of its own.
//!
//! Template substitution, `for` rows and `merge(...)` all evaluate to the
//! result of a nested flow. The nested document sees the caller's scope as
//! its outer scope; stub override only applies when stubs are given.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::cascade::prepare;
use super::engine::{FlowSetup, Fixpoint, run_to_fixpoint};
use super::output::strip_flagged;
use super::{FlowError, UnresolvedKind, UnresolvedReport};
use crate::interpreter::{
    Binding, EvalError, EvalInfo, Evaluation, LocalScope, Resolved, Unresolved,
};
use crate::types::{Issue, Node, Value};

/// Flow `node` in the context of `binding`.
///
/// `locals` are visible to all expressions of the nested document. With
/// `stubs`, they are prepared against each other and override the node.
pub fn flow_nested(
    node: &Node,
    binding: &Binding<'_>,
    locals: Option<BTreeMap<String, Node>>,
    stubs: Option<Vec<Node>>,
) -> Evaluation {
    if binding.depth >= binding.engine.max_depth() {
        return Err(EvalError::MaxDepthExceeded.into());
    }
    let outer = Some(Rc::new(binding.scope.clone()));
    let depth = binding.depth + 1;
    let id = binding.document().id.nested(&binding.path);
    let should_override = stubs.is_some();
    let stubs = match stubs {
        Some(stubs) => match prepare(binding.engine, &id, stubs, outer.clone(), depth, false) {
            Ok(prepared) => prepared.stubs,
            Err(FlowError::Unresolved(report)) => {
                return Err(unresolved_from(&report, "stub is unresolved"));
            }
            Err(error) => return Err(EvalError::Message(error.to_string()).into()),
        },
        None => Vec::new(),
    };

    let setup = FlowSetup {
        engine: binding.engine,
        id,
        stubs: Rc::new(stubs),
        state: None,
        locals: locals.map(|values| Rc::new(LocalScope::new(values, None))),
        outer,
        depth,
        should_override,
    };
    let tree = match run_to_fixpoint(node.clone(), &setup) {
        Fixpoint::Reached(tree) => tree,
        Fixpoint::Exhausted { passes } => {
            return Err(EvalError::Message(format!(
                "nested document did not settle after {passes} passes"
            ))
            .into());
        }
    };

    let report = UnresolvedReport::collect(&tree, binding.default_key());
    if !report.is_empty() {
        return Err(unresolved_from(&report, "nested document is unresolved"));
    }
    let result = strip_flagged(tree, true).map_or(Value::Nil, |node| node.value);
    Ok(Resolved::new(result))
}

/// Fold the entries of a report into one unresolved outcome.
pub(crate) fn unresolved_from(report: &UnresolvedReport, message: &str) -> Unresolved {
    let nested = report
        .entries
        .iter()
        .map(|entry| {
            let message = if entry.path.is_empty() {
                entry.message.clone()
            } else {
                format!("{}: {}", entry.path, entry.message)
            };
            Issue::with_nested(message, entry.nested.clone())
        })
        .collect();
    let has_error = report
        .entries
        .iter()
        .any(|entry| entry.kind == UnresolvedKind::LocalError);
    let failed = report
        .entries
        .iter()
        .any(|entry| entry.kind != UnresolvedKind::Unresolved);
    let info = EvalInfo {
        issue: Some(Issue::with_nested(message, nested)),
        failed,
        ..EvalInfo::default()
    };
    if has_error {
        Unresolved::Error(info)
    } else {
        Unresolved::Pending(info)
    }
}
