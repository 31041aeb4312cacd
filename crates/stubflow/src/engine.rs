//! The user-facing entry point.
//!
//! An [`Engine`] holds the limits and registries used while flowing
//! documents. It is immutable while a flow runs; functions and controls are
//! registered up front.

use std::rc::Rc;
use std::time::Duration;

use bon::Builder;
use stubflow_semantics::DEFAULT_KEY_NAME;

use crate::control::ControlRegistry;
use crate::flow::{self, FlowError, Outcome, Prepared};
use crate::interpreter::{DocumentId, FunctionRegistry};
use crate::parser::parse_expression;
use crate::types::{Node, Value};

/// Source name of expressions evaluated through [`Engine::evaluate_str`].
const EXPRESSION_SOURCE: &str = "<expression>";

/// Flows templates and cascades stubs.
///
/// # Example
///
/// ```
/// use stubflow::{Engine, Node};
///
/// let engine = Engine::builder().max_passes(64).build();
/// let template = Node::from_json_str(r#"{"a": 1, "b": "(( a + 1 ))"}"#, "template").unwrap();
/// let document = engine.flow(template).unwrap();
///
/// assert_eq!(document.to_json().unwrap(), serde_json::json!({"a": 1, "b": 2}));
/// ```
#[derive(Debug, Builder)]
#[builder(on(String, into))]
pub struct Engine {
    /// Passes after which a flow gives up without reaching a fixpoint.
    #[builder(default = 256)]
    max_passes: usize,

    /// Limit on nested lambda calls and nested flows.
    #[builder(default = 256)]
    max_depth: usize,

    /// Field identifying list entries when a list does not name its own.
    #[builder(default = DEFAULT_KEY_NAME.to_string())]
    default_key: String,

    /// How long `sync` waits for its condition.
    #[builder(default = Duration::from_secs(300))]
    sync_timeout: Duration,

    /// Pause between two `sync` checks.
    #[builder(default = Duration::from_secs(1))]
    sync_interval: Duration,

    /// Return unresolved nodes from a cascade instead of failing.
    #[builder(default)]
    partial: bool,

    #[builder(default = FunctionRegistry::standard())]
    functions: FunctionRegistry,

    #[builder(default = ControlRegistry::standard())]
    controls: ControlRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::builder().build()
    }
}

impl Engine {
    /// Create an engine with default limits and the standard registries.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Settings
    // =========================================================================

    pub fn max_passes(&self) -> usize {
        self.max_passes
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn sync_timeout(&self) -> Duration {
        self.sync_timeout
    }

    pub fn sync_interval(&self) -> Duration {
        self.sync_interval
    }

    pub fn partial(&self) -> bool {
        self.partial
    }

    /// Switch partial mode on or off.
    pub fn set_partial(&mut self, partial: bool) {
        self.partial = partial;
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Mutable access for registering functions.
    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn controls(&self) -> &ControlRegistry {
        &self.controls
    }

    /// Mutable access for registering controls.
    pub fn controls_mut(&mut self) -> &mut ControlRegistry {
        &mut self.controls
    }

    // =========================================================================
    // Flowing
    // =========================================================================

    /// Flow a single document without stubs.
    pub fn flow(&self, template: Node) -> Result<Node, FlowError> {
        Ok(self.apply(template, Vec::new(), None)?.document)
    }

    /// Flow each stub against the stubs following it.
    ///
    /// `stubs` are ordered highest precedence first: a value in the first
    /// stub wins over the same path in any later one. In partial mode a stub
    /// with unresolved nodes is kept instead of failing.
    pub fn prepare_stubs(&self, stubs: Vec<Node>) -> Result<Vec<Node>, FlowError> {
        Ok(self.prepare(stubs)?.stubs)
    }

    fn prepare(&self, stubs: Vec<Node>) -> Result<Prepared, FlowError> {
        flow::prepare(self, &DocumentId::new(), stubs, None, 0, self.partial)
    }

    /// Flow `template` against already prepared stubs.
    ///
    /// `state` is the state document of a previous run; `&state` nodes take
    /// their value from it.
    pub fn apply(&self, template: Node, prepared: Vec<Node>, state: Option<Node>) -> Result<Outcome, FlowError> {
        let prepared = Prepared {
            stubs: prepared,
            ..Prepared::default()
        };
        flow::apply(self, template, prepared, state)
    }

    /// Prepare `stubs` and apply them to `template`.
    ///
    /// In partial mode, unresolved stub nodes are reported with the
    /// template's in [`Outcome::unresolved`].
    pub fn cascade(&self, template: Node, stubs: Vec<Node>) -> Result<Outcome, FlowError> {
        let prepared = self.prepare(stubs)?;
        flow::apply(self, template, prepared, None)
    }

    /// Like [`Engine::cascade`], starting from a previous state document.
    pub fn cascade_with_state(&self, template: Node, stubs: Vec<Node>, state: Node) -> Result<Outcome, FlowError> {
        let prepared = self.prepare(stubs)?;
        flow::apply(self, template, prepared, Some(state))
    }

    /// Evaluate a standalone expression, written without the `(( ))`.
    pub fn evaluate_str(&self, text: &str) -> Result<Node, FlowError> {
        let expr = parse_expression(text).map_err(|error| FlowError::Parse {
            source_name: EXPRESSION_SOURCE.to_string(),
            message: error.to_string(),
        })?;
        let node = Node::new(Value::Expression(Rc::new(expr)), Rc::from(EXPRESSION_SOURCE));
        self.flow(node)
    }
}
