//! Expression parser.
//!
//! This module parses the expressions embedded in document strings as
//! `(( ... ))`. The parser produces an AST that the interpreter evaluates and
//! that external tooling can inspect or print back.

pub mod ast;
mod embedded;
pub mod error;
mod expression;

pub use ast::*;
pub use embedded::{Embedded, classify_string};
pub use error::ParseError;
pub use expression::parse_expression;
