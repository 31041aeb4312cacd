//! Error types for expression evaluation.

use strsim::damerau_levenshtein;
use thiserror::Error;

use super::{EvalInfo, Unresolved};

/// A local failure of an expression.
///
/// These become the issue message of the node carrying the expression; they
/// never abort a flow pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Reference could not be resolved.
    #[error("'{name}' not found{}", format_suggestions(suggestions))]
    NotFound {
        name: String,
        suggestions: Vec<String>,
    },

    /// Call of a name that is neither in scope nor a registered function.
    #[error("unknown function '{name}'{}", format_suggestions(suggestions))]
    UnknownFunction {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    /// Operator applied to unsupported operand kinds.
    #[error("operator '{op}' cannot be applied to {lhs} and {rhs}")]
    Operands {
        op: &'static str,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("{lhs} and {rhs} cannot be concatenated")]
    Concatenation { lhs: &'static str, rhs: &'static str },

    #[error("{expected} expected, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("invalid slice for list of length {len}")]
    InvalidSlice { len: usize },

    #[error("{callee} takes {expected} arguments, got {got}")]
    TooManyArguments {
        callee: String,
        expected: usize,
        got: usize,
    },

    #[error("missing argument '{name}'")]
    MissingArgument { name: String },

    #[error("unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("'{name}' does not accept named arguments")]
    NamedArgument { name: String },

    #[error("maximum recursion depth exceeded")]
    MaxDepthExceeded,

    #[error("'{path}' not found in any stub")]
    StubNotFound { path: String },

    /// Free-form failure reported by a function or control.
    #[error("{0}")]
    Message(String),
}

impl From<EvalError> for Unresolved {
    fn from(error: EvalError) -> Self {
        Unresolved::Error(EvalInfo::with_issue(error.to_string()))
    }
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}?", suggestions.join(", "))
    }
}

/// Compute "did you mean" suggestions for a misspelled name.
///
/// Returns at most three candidates within an edit distance of two, closest
/// first.
pub fn compute_suggestions<'a>(
    target: &str,
    candidates: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    let mut scored: Vec<(usize, &str)> = candidates
        .into_iter()
        .filter(|candidate| *candidate != target)
        .map(|candidate| (damerau_levenshtein(target, candidate), candidate))
        .filter(|(distance, _)| *distance <= 2)
        .collect();
    scored.sort();
    scored.dedup();
    scored
        .into_iter()
        .take(3)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}
