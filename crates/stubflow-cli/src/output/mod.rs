//! Output formatting for documents, reports and diagnostics.

mod diagnostic;
pub mod table;

pub use diagnostic::ExpressionDiagnostic;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

/// Render documents as YAML, separated by `---`, or as pretty JSON.
pub fn render_documents<T: Serialize>(documents: &[T], json: bool) -> Result<String> {
    let mut rendered = Vec::with_capacity(documents.len());
    for document in documents {
        let text = if json {
            serde_json::to_string_pretty(document).into_diagnostic()?
        } else {
            serde_yaml::to_string(document).into_diagnostic()?
        };
        rendered.push(text.trim_end().to_string());
    }
    let separator = if json { "\n" } else { "\n---\n" };
    Ok(rendered.join(separator))
}
