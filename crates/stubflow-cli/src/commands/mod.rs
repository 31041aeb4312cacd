//! CLI command implementations.

mod check;
mod eval;
mod merge;

pub use check::{CheckArgs, run_check};
pub use eval::{EvalArgs, run_eval};
pub use merge::{MergeArgs, run_merge};
