//! Miette diagnostic wrapper for expression syntax errors.

use miette::{Diagnostic, NamedSource, SourceSpan};
use stubflow::ParseError;
use thiserror::Error;

/// A miette-compatible diagnostic for a `(( ... ))` expression that does not parse.
///
/// Note: Fields are read by miette derive macros, not directly by code.
#[derive(Debug, Error, Diagnostic)]
#[error("syntax error: {message}")]
#[diagnostic(code(stubflow::syntax))]
pub struct ExpressionDiagnostic {
    #[source_code]
    src: NamedSource<String>,

    #[label("error here")]
    span: SourceSpan,

    message: String,

    #[help]
    help: Option<String>,
}

impl ExpressionDiagnostic {
    /// Create a diagnostic for `text`, whose expression starts at byte `start`.
    ///
    /// `err` positions are relative to the expression, not to `text`.
    pub fn new(name: &str, text: &str, start: usize, err: &ParseError) -> Self {
        let (line, column) = err.position();
        let (message, help) = match err {
            ParseError::Syntax { message, .. } => (message.clone(), None),
            ParseError::UnexpectedEof { .. } => (
                "unexpected end of expression".to_string(),
                Some("an operand or closing bracket is missing".to_string()),
            ),
        };

        let expression = text.get(start..).unwrap_or_default();
        let offset = start
            + expression
                .lines()
                .take(line.saturating_sub(1))
                .map(|l| l.len() + 1)
                .sum::<usize>()
            + column.saturating_sub(1);

        // Clamp offset to content length to avoid miette panic on out-of-bounds
        let offset = offset.min(text.len());
        let length = usize::from(offset < text.len());

        ExpressionDiagnostic {
            src: NamedSource::new(name, text.to_string()),
            span: (offset, length).into(),
            message,
            help,
        }
    }

    /// Create a diagnostic for a document string of the form `(( ... ))`.
    pub fn from_embedded(name: &str, text: &str, err: &ParseError) -> Self {
        let start = text.len() - text.trim_start().len() + "((".len();
        Self::new(name, text, start, err)
    }

    pub fn offset(&self) -> usize {
        self.span.offset()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syntax(line: usize, column: usize) -> ParseError {
        ParseError::Syntax {
            line,
            column,
            message: "unexpected character: ')'".to_string(),
        }
    }

    #[test]
    fn offsets_account_for_the_brackets() {
        let diagnostic = ExpressionDiagnostic::from_embedded("t.yml: a", "  (( a ) ))", &syntax(1, 4));
        assert_eq!(diagnostic.offset(), 7);
        assert_eq!(diagnostic.message(), "unexpected character: ')'");
    }

    #[test]
    fn later_lines_are_counted() {
        let diagnostic = ExpressionDiagnostic::new("<expression>", "a +\n b )", 0, &syntax(2, 4));
        assert_eq!(diagnostic.offset(), 7);
    }

    #[test]
    fn offsets_are_clamped() {
        let eof = ParseError::UnexpectedEof { line: 1, column: 40 };
        let diagnostic = ExpressionDiagnostic::new("<expression>", "1 +", 0, &eof);
        assert_eq!(diagnostic.offset(), 3);
        assert_eq!(diagnostic.message(), "unexpected end of expression");
    }
}
