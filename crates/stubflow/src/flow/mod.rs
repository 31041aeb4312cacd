//! The document flow engine.
//!
//! Flowing rewrites a document tree pass after pass until it reaches a
//! fixpoint. Cascading prepares stubs against each other and flows a
//! template against them.

mod cascade;
pub(crate) mod engine;
mod error;
mod nested;
mod output;
mod report;

pub use cascade::Outcome;
pub(crate) use cascade::{Prepared, apply, prepare};
pub use error::FlowError;
pub use nested::flow_nested;
pub(crate) use nested::unresolved_from;
pub use report::{UnresolvedEntry, UnresolvedKind, UnresolvedReport};
