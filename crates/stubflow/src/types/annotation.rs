use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::Serialize;

/// A diagnostic message attached to an unresolved node.
///
/// Issues form a tree: a failing `for` row or a nested flow carries the
/// issues of the nodes that caused it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<Issue>,
    /// Nested issues are consecutive steps (rows, passes) rather than alternatives.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sequence: bool,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            nested: Vec::new(),
            sequence: false,
        }
    }

    pub fn with_nested(message: impl Into<String>, nested: Vec<Issue>) -> Self {
        Self {
            message: message.into(),
            nested,
            sequence: false,
        }
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.message)
    }
}

/// Flags and metadata riding on every tree node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    /// Visible during flow, removed from the final output.
    pub temporary: bool,
    /// Removed from the output and from prepared stubs.
    pub local: bool,
    /// Stub field inserted into the template when absent there.
    pub inject: bool,
    /// Stub field used only when the template has no value at its path.
    pub default: bool,
    /// Part of the persisted state document.
    pub state: bool,
    /// Merge result replaces the subtree instead of deep-overriding it.
    pub replace: bool,
    pub merged: bool,
    /// The list's merge directive was expanded; its entries are overridden one by one.
    pub expanded: bool,
    pub preferred: bool,
    /// The node's expression failed locally.
    pub has_error: bool,
    /// The node depends on something that failed.
    pub failed: bool,
    /// Path used for stub lookups of this subtree.
    pub redirect_path: Option<Vec<String>>,
    /// Field identifying entries of this list.
    pub key_name: Option<String>,
    pub tag: Option<String>,
    pub issue: Option<Issue>,
}

impl Annotation {
    /// True if any override-stopping flag is set.
    pub fn blocks_override(&self) -> bool {
        self.merged || self.preferred || self.replace
    }

    /// Drops diagnostics from a previous pass.
    pub fn clear_issue(&mut self) {
        self.has_error = false;
        self.failed = false;
        self.issue = None;
    }
}
