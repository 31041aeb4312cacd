//! Function registry for named calls.
//!
//! Functions are invoked only once all their arguments are concrete values.
//! The standard library lives in [`super::builtins`]; embedders can register
//! their own functions on an engine.

use std::collections::HashMap;

use super::builtins;
use super::{Binding, Evaluation};
use crate::types::Value;

/// Function signature.
///
/// Takes the evaluated positional arguments and the binding of the call
/// site, which gives access to the engine for invoking lambda arguments.
pub type BuiltinFn = fn(&[Value], &Binding<'_>) -> Evaluation;

/// Registry of callable functions, by name.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, BuiltinFn>,
}

impl FunctionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// A registry pre-loaded with the standard functions.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for &(name, function) in builtins::STANDARD {
            registry.register(name, function);
        }
        registry
    }

    /// Register a function, replacing any previous one of the same name.
    pub fn register(&mut self, name: impl Into<String>, function: BuiltinFn) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<BuiltinFn> {
        self.functions.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
