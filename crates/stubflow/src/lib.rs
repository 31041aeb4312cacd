pub mod control;
pub mod engine;
pub mod flow;
pub mod interpreter;
pub mod parser;
pub mod types;

pub use control::{ControlContext, ControlFn, ControlRegistry};
pub use engine::Engine;
pub use flow::{FlowError, Outcome, UnresolvedEntry, UnresolvedKind, UnresolvedReport};
pub use interpreter::{
    Binding, BuiltinFn, EvalError, EvalInfo, Evaluation, FunctionRegistry, Resolved, Unresolved,
    compute_suggestions,
};
pub use parser::{Expr, ParseError, parse_expression};
pub use types::{Annotation, DocumentError, Issue, Node, Value};

/// Creates a `BTreeMap<String, Node>` from key-value pairs.
///
/// Values are converted via `Into<Value>` and get the source name `locals`.
/// Useful for the `locals` of a nested flow and for building test trees.
///
/// # Example
///
/// ```
/// use stubflow::{fields, Value};
///
/// let f = fields! { "count" => 3i64, "name" => "alice" };
/// assert_eq!(f.len(), 2);
/// assert_eq!(f["count"].value, Value::Int(3));
/// ```
#[macro_export]
macro_rules! fields {
    {} => {
        ::std::collections::BTreeMap::<String, $crate::Node>::new()
    };
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut map = ::std::collections::BTreeMap::<String, $crate::Node>::new();
            $(
                map.insert(
                    $key.to_string(),
                    $crate::Node::new(
                        ::std::convert::Into::<$crate::Value>::into($value),
                        ::std::rc::Rc::from("locals"),
                    ),
                );
            )+
            map
        }
    };
}
