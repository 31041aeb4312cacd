//! Recognition of `(( ... ))` expressions inside string values.

use super::ast::Expr;
use super::error::ParseError;
use super::expression::parse_expression;

/// What a document string turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Embedded {
    /// An ordinary string.
    Literal,
    /// `((! ... ))`: the literal text with the `!` removed.
    Escaped(String),
    /// `(( expr ))`, parsed.
    Expression(Result<Expr, ParseError>),
}

/// Classify a document string.
///
/// Only strings whose trimmed content is entirely wrapped in `((` and `))`
/// carry an expression.
pub fn classify_string(text: &str) -> Embedded {
    let trimmed = text.trim();
    let Some(inner) = trimmed
        .strip_prefix("((")
        .and_then(|rest| rest.strip_suffix("))"))
    else {
        return Embedded::Literal;
    };
    match inner.strip_prefix('!') {
        Some(escaped) => Embedded::Escaped(format!("(({escaped}))")),
        None => Embedded::Expression(parse_expression(inner)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_strings_are_literal() {
        assert_eq!(classify_string("hello"), Embedded::Literal);
        assert_eq!(classify_string("(( a )"), Embedded::Literal);
    }

    #[test]
    fn escape_drops_the_bang() {
        assert_eq!(
            classify_string("((!foo))"),
            Embedded::Escaped("((foo))".to_string())
        );
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert!(matches!(
            classify_string("  (( 1 + 2 ))  "),
            Embedded::Expression(Ok(_))
        ));
    }
}
