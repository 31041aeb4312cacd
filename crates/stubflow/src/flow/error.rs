//! Error types for flowing documents.

use thiserror::Error;

use super::UnresolvedReport;
use crate::types::DocumentError;

/// Why a flow did not produce a fully resolved document.
#[derive(Debug, Error)]
pub enum FlowError {
    /// Nodes remained unresolved at the fixpoint.
    #[error("unresolved nodes:\n{0}")]
    Unresolved(UnresolvedReport),

    /// The tree kept changing for the maximum number of passes.
    #[error("no fixpoint reached after {passes} passes")]
    PassLimit { passes: usize },

    /// A document could not be parsed.
    #[error("{source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl FlowError {
    /// The unresolved-node report, if that is what failed.
    pub fn report(&self) -> Option<&UnresolvedReport> {
        match self {
            FlowError::Unresolved(report) => Some(report),
            _ => None,
        }
    }
}
