//! Controls: map-shaped constructs keyed by `<<name`.
//!
//! A map carrying a control key (`<<if`, `<<switch`, `<<type`, `<<for`,
//! `<<merge`) is replaced by whatever the control computes from the key's
//! value and its option keys. Controls run before the map's merge directive
//! and before its fields are flowed.

mod conditional;
mod for_loop;
mod merge;
mod switch;

use std::collections::{BTreeMap, HashMap};

use stubflow_semantics::{
    CONTROL_PREFIX, ControlId, DIRECTIVE_KEY, OptionSpec, control_name, control_options,
};
use tracing::trace;

use crate::flow::engine::flow_node;
use crate::flow::{UnresolvedReport, unresolved_from};
use crate::interpreter::{Binding, EvalError, Unresolved, compute_suggestions};
use crate::types::path::render_path;
use crate::types::{Node, Value};

/// Control function signature.
///
/// Returns the node replacing the control map, `None` to remove the map, or
/// an unresolved outcome to retry on a later pass.
pub type ControlFn = fn(&ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved>;

/// Everything a control sees.
#[derive(Debug)]
pub struct ControlContext<'a, 'e> {
    /// Control name without the `<<` prefix.
    pub name: &'a str,
    /// The flowed, fully resolved value of the control key.
    pub value: &'a Node,
    /// The map carrying the control.
    pub node: &'a Node,
    /// Fields of the map that are neither the control nor one of its options.
    pub fields: BTreeMap<String, Node>,
    /// Option values by name without the `<<` prefix.
    ///
    /// Template options are passed as written; the others are flowed and
    /// resolved.
    pub options: BTreeMap<String, Node>,
    pub binding: &'a Binding<'e>,
}

impl ControlContext<'_, '_> {
    pub fn option(&self, name: &str) -> Option<&Node> {
        self.options.get(name)
    }
}

#[derive(Debug, Clone)]
struct Control {
    function: ControlFn,
    options: Vec<OptionSpec>,
}

/// Registry of controls, by name.
#[derive(Debug, Clone)]
pub struct ControlRegistry {
    controls: HashMap<String, Control>,
}

impl ControlRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            controls: HashMap::new(),
        }
    }

    /// A registry pre-loaded with `if`, `switch`, `type`, `for` and `merge`.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let builtins: [(ControlId, ControlFn); 5] = [
            (ControlId::If, conditional::if_control),
            (ControlId::Switch, switch::switch_control),
            (ControlId::Type, switch::type_control),
            (ControlId::For, for_loop::for_control),
            (ControlId::Merge, merge::merge_control),
        ];
        for (id, function) in builtins {
            registry.register(control_name(id), function, control_options(id));
        }
        registry
    }

    /// Register a control with the option keys it understands.
    pub fn register(&mut self, name: impl Into<String>, function: ControlFn, options: &[OptionSpec]) {
        self.controls.insert(
            name.into(),
            Control {
                function,
                options: options.to_vec(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<ControlFn> {
        self.controls.get(name).map(|control| control.function)
    }

    /// Option keys declared for a control.
    pub fn options(&self, name: &str) -> Option<&[OptionSpec]> {
        self.controls.get(name).map(|control| control.options.as_slice())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controls.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ControlRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Run the control of a map, if it has one.
///
/// `None` means the map carries no control key.
pub(crate) fn run_control(
    node: &Node,
    map: &BTreeMap<String, Node>,
    binding: &Binding<'_>,
) -> Option<Result<Option<Node>, Unresolved>> {
    let keys: Vec<&str> = map
        .keys()
        .filter_map(|key| key.strip_prefix(CONTROL_PREFIX))
        .filter(|name| !name.is_empty())
        .collect();
    if keys.is_empty() {
        return None;
    }
    let registry = binding.engine.controls();
    let controls: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|name| registry.get(name).is_some())
        .collect();
    Some(match controls.as_slice() {
        [] => Err(EvalError::Message(format!(
            "unknown control '{CONTROL_PREFIX}{}'{}",
            keys[0],
            suggestion(keys[0], registry.names())
        ))
        .into()),
        [name] => dispatch(name, node, map, binding),
        [first, second, ..] => Err(EvalError::Message(format!(
            "multiple controls in one map: '{CONTROL_PREFIX}{first}' and '{CONTROL_PREFIX}{second}'"
        ))
        .into()),
    })
}

fn suggestion(name: &str, candidates: Vec<&str>) -> String {
    let suggestions = compute_suggestions(name, candidates);
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}?", suggestions.join(", "))
    }
}

fn dispatch(
    name: &str,
    node: &Node,
    map: &BTreeMap<String, Node>,
    binding: &Binding<'_>,
) -> Result<Option<Node>, Unresolved> {
    let registry = binding.engine.controls();
    let (Some(function), Some(specs)) = (registry.get(name), registry.options(name)) else {
        return Ok(Some(node.clone()));
    };
    let key = format!("{CONTROL_PREFIX}{name}");
    let raw = map.get(&key).cloned().unwrap_or_else(|| Node::new(Value::Nil, node.source.clone()));
    let value = resolved(&raw, &binding.child(&key))?;

    let mut options = BTreeMap::new();
    for spec in specs {
        let option_key = format!("{CONTROL_PREFIX}{}", spec.name);
        match map.get(&option_key) {
            Some(option) if spec.template => {
                options.insert(spec.name.to_string(), option.clone());
            }
            Some(option) => {
                let flowed = resolved(option, &binding.child(&option_key))?;
                options.insert(spec.name.to_string(), flowed);
            }
            None if spec.required => {
                return Err(EvalError::Message(format!(
                    "control '{key}' requires option '{option_key}'"
                ))
                .into());
            }
            None => {}
        }
    }

    let mut fields = BTreeMap::new();
    for (field, child) in map {
        match field.strip_prefix(CONTROL_PREFIX) {
            None => {
                fields.insert(field.clone(), child.clone());
            }
            Some(_) if field == DIRECTIVE_KEY => {
                fields.insert(field.clone(), child.clone());
            }
            Some(option) if option == name || specs.iter().any(|spec| spec.name == option) => {}
            Some(option) => {
                return Err(EvalError::Message(format!(
                    "unknown option '{field}' for control '{key}'{}",
                    suggestion(option, specs.iter().map(|spec| spec.name).collect())
                ))
                .into());
            }
        }
    }

    trace!(control = name, path = %render_path(&binding.path), "running control");
    let context = ControlContext {
        name,
        value: &value,
        node,
        fields,
        options,
        binding,
    };
    function(&context)
}

/// Flow a control input without stub override and require it to be resolved.
pub(crate) fn resolved(node: &Node, binding: &Binding<'_>) -> Result<Node, Unresolved> {
    let Some(flowed) = flow_node(node, binding, false) else {
        return Ok(Node::new(Value::Nil, node.source.clone()));
    };
    if flowed.is_resolved() {
        return Ok(flowed);
    }
    let report = UnresolvedReport::collect(&flowed, binding.default_key());
    if report.is_empty() {
        return Err(Unresolved::pending("control input is unresolved"));
    }
    Err(unresolved_from(&report, "control input is unresolved"))
}
