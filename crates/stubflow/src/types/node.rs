use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;

use super::{Annotation, LambdaValue, TemplateValue};
use crate::parser::Expr;

/// A document tree node: a value, its annotations and the name of the
/// document it came from.
///
/// Nodes are immutable during a flow pass. Every pass builds a new tree; the
/// previous tree serves as the snapshot references are resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    pub annotation: Annotation,
    pub source: Rc<str>,
}

/// The value of a tree node.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Node>),
    Map(BTreeMap<String, Node>),
    /// A parsed `(( ... ))` expression that is not resolved yet.
    Expression(Rc<Expr>),
    Lambda(Rc<LambdaValue>),
    /// A captured subtree, re-evaluated wherever it is substituted.
    Template(Rc<TemplateValue>),
}

impl PartialEq for Value {
    /// Structural equality used by the fixpoint check.
    ///
    /// Floats compare by bit pattern so that a `NaN` result does not keep
    /// the pass loop running.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Expression(a), Value::Expression(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Template(a), Value::Template(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl Node {
    /// Create an unannotated node.
    pub fn new(value: Value, source: Rc<str>) -> Self {
        Self {
            value,
            annotation: Annotation::default(),
            source,
        }
    }

    /// A copy of this node with a different value, keeping annotations and source.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value,
            annotation: self.annotation.clone(),
            source: self.source.clone(),
        }
    }

    /// Map field access.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match &self.value {
            Value::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// True if neither this node nor any descendant is an unevaluated
    /// expression, an unparsed expression string, or carries an issue.
    pub fn is_resolved(&self) -> bool {
        if self.annotation.has_error || self.annotation.failed || self.annotation.issue.is_some() {
            return false;
        }
        match &self.value {
            Value::Expression(_) => false,
            Value::String(text) => !is_embedded_expression(text),
            Value::List(items) => items.iter().all(Node::is_resolved),
            Value::Map(map) => map.values().all(Node::is_resolved),
            _ => true,
        }
    }

    /// True if this node or a descendant carries a local error.
    pub fn has_error(&self) -> bool {
        if self.annotation.has_error || self.annotation.failed {
            return true;
        }
        match &self.value {
            Value::List(items) => items.iter().any(Node::has_error),
            Value::Map(map) => map.values().any(Node::has_error),
            _ => false,
        }
    }
}

/// True if a string holds a `(( ... ))` expression that has not been parsed yet.
pub fn is_embedded_expression(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.starts_with("((") && trimmed.ends_with("))") && !trimmed.starts_with("((!")
}

impl Value {
    /// Runtime type name as reported by `type(x)`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Expression(_) => "expression",
            Value::Lambda(_) => "lambda",
            Value::Template(_) => "template",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// nil, false, zero, and empty strings, lists and maps are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            Value::Expression(_) | Value::Lambda(_) | Value::Template(_) => true,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(*n),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Node>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Text form of string-like scalars, used by concatenation and equality.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(n) => Some(n.to_string()),
            Value::Float(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::List(items) => write!(f, "[list of {}]", items.len()),
            Value::Map(map) => write!(f, "{{map of {}}}", map.len()),
            Value::Expression(expr) => write!(f, "(( {expr} ))"),
            Value::Lambda(lambda) => write!(f, "(( {lambda} ))"),
            Value::Template(_) => write!(f, "(( &template ))"),
        }
    }
}
