//! Expression interpreter.
//!
//! This module evaluates parsed expressions against a [`Binding`]. Every
//! evaluation is tri-state: resolved, pending until a later flow pass, or a
//! local error. Lambdas, intrinsics, the function registry and reference
//! resolution all live here; the flow engine decides what to do with the
//! outcome.

mod binding;
mod builtins;
mod error;
mod evaluator;
mod functions;
mod info;
mod intrinsics;
mod lambda;
mod operators;
mod reference;

pub use binding::{Binding, Document, DocumentId, LocalScope, Scope};
pub use error::{EvalError, compute_suggestions};
pub use evaluator::{evaluate, evaluate_locally, into_node};
pub use functions::{BuiltinFn, FunctionRegistry};
pub use info::{EvalInfo, Evaluation, Resolved, Unresolved, aggregate};
pub use lambda::{ArgValue, invoke};
pub use operators::values_equal;
pub use reference::node_value;
