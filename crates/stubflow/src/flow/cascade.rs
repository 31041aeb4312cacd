//! Stub preparation and template application.

use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use super::engine::{FlowSetup, Fixpoint, run_to_fixpoint};
use super::output::{extract_state, strip_flagged, unescape};
use super::{FlowError, UnresolvedReport};
use crate::engine::Engine;
use crate::interpreter::{DocumentId, Scope};
use crate::types::path::{insert_at, lookup};
use crate::types::{Node, Value};

/// The result of applying stubs to a template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// The flowed document with temporary and local nodes removed.
    pub document: Node,
    /// The `&state` nodes of the document, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Node>,
    /// Nodes left unresolved, only ever set in partial mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unresolved: Option<UnresolvedReport>,
}

/// Stubs ready to override a template.
#[derive(Debug, Default)]
pub(crate) struct Prepared {
    /// Highest precedence first.
    pub stubs: Vec<Node>,
    /// Stub nodes kept unresolved in partial mode.
    pub unresolved: UnresolvedReport,
}

/// Flow each stub against the stubs that follow it.
///
/// `stubs` are ordered highest precedence first. The last stub is flowed on
/// its own; every other stub sees the prepared later stubs as merge
/// sources. Local nodes are stripped from the result. With `partial` set,
/// a stub with unresolved nodes is kept as it is and its nodes reported.
pub(crate) fn prepare(
    engine: &Engine,
    base: &DocumentId,
    stubs: Vec<Node>,
    outer: Option<Rc<Scope>>,
    depth: usize,
    partial: bool,
) -> Result<Prepared, FlowError> {
    let count = stubs.len();
    let mut prepared: Vec<Node> = Vec::with_capacity(count);
    let mut unresolved = UnresolvedReport::default();
    for (index, stub) in stubs.into_iter().enumerate().rev() {
        debug!(stub = index + 1, of = count, source = %stub.source, "preparing stub");
        let setup = FlowSetup {
            engine,
            id: base.nested(&[format!("stub{}", index + 1)]),
            stubs: Rc::new(prepared.clone()),
            state: None,
            locals: None,
            outer: outer.clone(),
            depth,
            should_override: false,
        };
        let tree = settled(run_to_fixpoint(stub, &setup))?;
        let report = UnresolvedReport::collect(&tree, engine.default_key());
        if !report.is_empty() {
            if !partial {
                return Err(FlowError::Unresolved(report));
            }
            debug!(stub = index + 1, nodes = report.len(), "keeping unresolved stub nodes");
            unresolved.absorb(report);
        }
        let source = tree.source.clone();
        let stub = strip_flagged(tree, false).unwrap_or_else(|| Node::new(Value::Nil, source));
        prepared.insert(0, stub);
    }
    Ok(Prepared {
        stubs: prepared,
        unresolved,
    })
}

/// Flow `template` against prepared stubs and an optional state document.
pub(crate) fn apply(
    engine: &Engine,
    mut template: Node,
    prepared: Prepared,
    state: Option<Node>,
) -> Result<Outcome, FlowError> {
    let Prepared { stubs, unresolved } = prepared;
    for stub in &stubs {
        insert_absent(&mut template, stub, &mut Vec::new(), engine.default_key());
    }
    let setup = FlowSetup {
        engine,
        id: DocumentId::new(),
        stubs: Rc::new(stubs),
        state: state.map(Rc::new),
        locals: None,
        outer: None,
        depth: 0,
        should_override: true,
    };
    let tree = settled(run_to_fixpoint(template, &setup))?;

    let mut report = UnresolvedReport::collect(&tree, engine.default_key());
    report.absorb(unresolved);
    let unresolved = if report.is_empty() {
        None
    } else if engine.partial() {
        Some(report)
    } else {
        return Err(FlowError::Unresolved(report));
    };

    let state = extract_state(&tree, engine.default_key()).and_then(|state| strip_flagged(state, false));
    let source = tree.source.clone();
    let mut document = strip_flagged(tree, true).unwrap_or_else(|| Node::new(Value::Nil, source));
    unescape(&mut document);
    Ok(Outcome {
        document,
        state,
        unresolved,
    })
}

fn settled(fixpoint: Fixpoint) -> Result<Node, FlowError> {
    match fixpoint {
        Fixpoint::Reached(tree) => Ok(tree),
        Fixpoint::Exhausted { passes } => Err(FlowError::PassLimit { passes }),
    }
}

/// Insert `&inject` and `&default` stub fields the template lacks.
fn insert_absent(template: &mut Node, stub: &Node, path: &mut Vec<String>, default_key: &str) {
    let Value::Map(fields) = &stub.value else {
        return;
    };
    for (key, field) in fields {
        path.push(key.clone());
        if lookup(template, path, default_key).is_none() {
            if field.annotation.inject || field.annotation.default {
                insert_at(template, path, field.clone());
            }
        } else {
            insert_absent(template, field, path, default_key);
        }
        path.pop();
    }
}
