//! Calls: lambda invocation, currying and registry dispatch.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::evaluator::{evaluate, into_node};
use super::reference::is_defined;
use super::{Binding, EvalError, Evaluation, LocalScope, Scope, Unresolved, compute_suggestions};
use crate::parser::{Argument, Expr};
use crate::types::{LambdaValue, Node, Value};

/// An evaluated call argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Positional(Node),
    Named(String, Node),
    /// 1-based parameter position.
    Indexed(usize, Node),
}

/// Evaluate call arguments, expanding spread lists.
pub fn evaluate_arguments(args: &[Argument], binding: &Binding<'_>) -> Result<Vec<ArgValue>, Unresolved> {
    let mut values = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Argument::Positional(expr) => {
                values.push(ArgValue::Positional(into_node(evaluate(expr, binding)?, binding)));
            }
            Argument::Named(name, expr) => values.push(ArgValue::Named(
                name.clone(),
                into_node(evaluate(expr, binding)?, binding),
            )),
            Argument::Indexed(index, expr) => values.push(ArgValue::Indexed(
                *index,
                into_node(evaluate(expr, binding)?, binding),
            )),
            Argument::Spread(expr) => match evaluate(expr, binding)?.value {
                Value::List(items) => values.extend(items.into_iter().map(ArgValue::Positional)),
                other => {
                    return Err(EvalError::TypeMismatch {
                        expected: "list",
                        found: other.type_name(),
                    }
                    .into());
                }
            },
        }
    }
    Ok(values)
}

/// Evaluate `callee(args)`.
///
/// A simple name that is not defined in scope is looked up in the function
/// registry; its arguments must all be concrete and positional.
pub fn evaluate_call(callee: &Expr, args: &[Argument], binding: &Binding<'_>) -> Evaluation {
    if let Expr::Reference(reference) = callee.ungrouped()
        && let Some(name) = reference.simple_name()
        && !is_defined(name, binding)
    {
        let functions = binding.engine.functions();
        let Some(function) = functions.get(name) else {
            return Err(EvalError::UnknownFunction {
                name: name.to_string(),
                suggestions: compute_suggestions(name, functions.names()),
            }
            .into());
        };
        let values = concrete_arguments(name, args, binding)?;
        return function(&values, binding);
    }

    let target = evaluate(callee, binding)?;
    match target.value {
        Value::Lambda(lambda) => {
            let args = evaluate_arguments(args, binding)?;
            invoke(&lambda, args, binding)
        }
        other => Err(EvalError::TypeMismatch {
            expected: "lambda",
            found: other.type_name(),
        }
        .into()),
    }
}

fn concrete_arguments(name: &str, args: &[Argument], binding: &Binding<'_>) -> Result<Vec<Value>, Unresolved> {
    evaluate_arguments(args, binding)?
        .into_iter()
        .map(|arg| match arg {
            ArgValue::Positional(node) => Ok(node.value),
            ArgValue::Named(..) | ArgValue::Indexed(..) => Err(EvalError::NamedArgument {
                name: name.to_string(),
            }
            .into()),
        })
        .collect()
}

/// Invoke a lambda.
///
/// The body runs in the lambda's definition scope extended by one layer
/// holding the parameters and `_`, the lambda itself.
pub fn invoke(lambda: &Rc<LambdaValue>, args: Vec<ArgValue>, binding: &Binding<'_>) -> Evaluation {
    if binding.depth >= binding.engine.max_depth() {
        return Err(EvalError::MaxDepthExceeded.into());
    }
    let mut slots = lambda.bound.clone();
    bind_arguments(lambda, args, &mut slots)?;

    let scope = call_scope(lambda, binding);
    let source = binding.source();
    let mut values = BTreeMap::new();
    values.insert(
        "_".to_string(),
        Node::new(Value::Lambda(lambda.clone()), source.clone()),
    );
    for (position, param) in lambda.expr.params.iter().enumerate() {
        let node = match slots.remove(&position) {
            Some(node) => node,
            None if param.variadic => Node::new(Value::List(Vec::new()), source.clone()),
            None => match &param.default {
                // Defaults see the parameters bound before them.
                Some(default) => {
                    let layer = layered(&scope, values.clone());
                    into_node(evaluate(default, &binding.with_scope(layer))?, binding)
                }
                None => {
                    return Err(EvalError::MissingArgument {
                        name: param.name.clone(),
                    }
                    .into());
                }
            },
        };
        values.insert(param.name.clone(), node);
    }

    let body_scope = layered(&scope, values);
    evaluate(&lambda.expr.body, &binding.with_scope(body_scope))
}

/// Bind some parameters now, returning a new lambda expecting the rest.
pub fn curry(lambda: &LambdaValue, args: Vec<ArgValue>) -> Result<LambdaValue, Unresolved> {
    let mut curried = lambda.clone();
    bind_arguments(lambda, args, &mut curried.bound)?;
    Ok(curried)
}

fn bind_arguments(
    lambda: &LambdaValue,
    args: Vec<ArgValue>,
    slots: &mut BTreeMap<usize, Node>,
) -> Result<(), Unresolved> {
    let params = &lambda.expr.params;
    let variadic = params
        .last()
        .filter(|param| param.variadic)
        .map(|_| params.len() - 1);
    let mut rest = Vec::new();
    let mut next = 0;
    let mut given = slots.len();

    for arg in args {
        match arg {
            ArgValue::Positional(node) => {
                given += 1;
                while next < params.len() && slots.contains_key(&next) && Some(next) != variadic {
                    next += 1;
                }
                if Some(next) == variadic {
                    rest.push(node);
                } else if next < params.len() {
                    slots.insert(next, node);
                    next += 1;
                } else {
                    return Err(EvalError::TooManyArguments {
                        callee: "lambda".to_string(),
                        expected: params.len(),
                        got: given,
                    }
                    .into());
                }
            }
            ArgValue::Named(name, node) => {
                let Some(position) = params.iter().position(|param| param.name == name) else {
                    return Err(EvalError::UnknownParameter { name }.into());
                };
                slots.insert(position, node);
            }
            ArgValue::Indexed(index, node) => {
                if index == 0 || index > params.len() {
                    return Err(EvalError::UnknownParameter {
                        name: index.to_string(),
                    }
                    .into());
                }
                slots.insert(index - 1, node);
            }
        }
    }

    if let Some(position) = variadic
        && !rest.is_empty()
    {
        let source = rest[0].source.clone();
        match slots.get_mut(&position) {
            Some(Node {
                value: Value::List(items),
                ..
            }) => items.extend(rest),
            _ => {
                slots.insert(position, Node::new(Value::List(rest), source));
            }
        }
    }
    Ok(())
}

/// The definition scope, seeing the caller's current snapshot when the
/// lambda is invoked in the document it was created in.
fn call_scope(lambda: &LambdaValue, binding: &Binding<'_>) -> Scope {
    let mut scope = lambda.scope.clone();
    if scope.document.id == binding.scope.document.id {
        scope.document = binding.scope.document.clone();
    }
    scope
}

fn layered(scope: &Scope, values: BTreeMap<String, Node>) -> Scope {
    Scope {
        locals: Some(Rc::new(LocalScope::new(values, scope.locals.clone()))),
        ..scope.clone()
    }
}
