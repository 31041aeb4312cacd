use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::rc::Rc;

use super::Node;
use crate::interpreter::Scope;
use crate::parser::LambdaExpr;

/// A function value: the lambda expression plus the scope it was created in.
#[derive(Debug, Clone)]
pub struct LambdaValue {
    pub expr: Rc<LambdaExpr>,
    /// Definition scope: local layers, anchor path and document.
    pub scope: Scope,
    /// Arguments bound by currying, keyed by parameter position.
    pub bound: BTreeMap<usize, Node>,
}

impl LambdaValue {
    pub fn new(expr: Rc<LambdaExpr>, scope: Scope) -> Self {
        Self {
            expr,
            scope,
            bound: BTreeMap::new(),
        }
    }

    /// Parameters not yet bound by currying.
    pub fn open_parameters(&self) -> usize {
        self.expr.params.len() - self.bound.len()
    }
}

impl PartialEq for LambdaValue {
    fn eq(&self, other: &Self) -> bool {
        (Rc::ptr_eq(&self.expr, &other.expr) || self.expr == other.expr)
            && self.scope.same_as(&other.scope)
            && self.bound == other.bound
    }
}

impl Display for LambdaValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.expr)
    }
}
