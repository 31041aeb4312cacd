//! Forms that receive their arguments unevaluated, plus `merge` and `auto`.

use std::collections::BTreeMap;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use stubflow_semantics::{IntrinsicId, intrinsic_name};
use tracing::debug;

use super::evaluator::{evaluate, evaluate_locally};
use super::lambda::{ArgValue, invoke};
use super::reference::node_value;
use super::{Binding, EvalError, EvalInfo, Evaluation, Resolved, Unresolved};
use crate::flow::flow_nested;
use crate::parser::{Argument, Expr, MergeExpr};
use crate::types::path::{entry_identity, render_path};
use crate::types::{LambdaValue, Node, Value};

/// Evaluate an intrinsic call.
pub fn evaluate_intrinsic(id: IntrinsicId, args: &[Argument], binding: &Binding<'_>) -> Evaluation {
    let args = positional(id, args)?;
    match id {
        IntrinsicId::Merge => merge_documents(&args, binding),
        IntrinsicId::Catch => catch(&args, binding),
        IntrinsicId::Sync => sync(&args, binding),
        IntrinsicId::Valid => {
            let [expr] = arity::<1>(id, &args)?;
            let valid = observe(evaluate_locally(expr, binding))?
                .is_some_and(|r| !r.info.undefined && !r.value.is_nil());
            Ok(Resolved::new(valid))
        }
        IntrinsicId::Defined => {
            let [expr] = arity::<1>(id, &args)?;
            let defined = observe(evaluate_locally(expr, binding))?.is_some_and(|r| !r.info.undefined);
            Ok(Resolved::new(defined))
        }
        IntrinsicId::Require => {
            let [expr] = arity::<1>(id, &args)?;
            let resolved = evaluate(expr, binding)?;
            if resolved.info.undefined || resolved.value.is_nil() {
                return Err(EvalError::Message(format!("'{expr}' is required")).into());
            }
            Ok(resolved)
        }
        IntrinsicId::Stub => stub(&args, binding),
    }
}

fn positional<'a>(id: IntrinsicId, args: &'a [Argument]) -> Result<Vec<&'a Expr>, Unresolved> {
    args.iter()
        .map(|arg| match arg {
            Argument::Positional(expr) => Ok(expr),
            _ => Err(EvalError::NamedArgument {
                name: intrinsic_name(id).to_string(),
            }
            .into()),
        })
        .collect()
}

fn arity<'a, const N: usize>(id: IntrinsicId, args: &[&'a Expr]) -> Result<[&'a Expr; N], Unresolved> {
    <[&'a Expr; N]>::try_from(args).map_err(|_| {
        EvalError::TooManyArguments {
            callee: intrinsic_name(id).to_string(),
            expected: N,
            got: args.len(),
        }
        .into()
    })
}

/// Turn an outcome into "resolved or not", keeping real pendingness.
///
/// Errors and dependencies on errors count as "no value".
fn observe(outcome: Evaluation) -> Result<Option<Resolved>, Unresolved> {
    match outcome {
        Ok(resolved) => Ok(Some(resolved)),
        Err(Unresolved::Error(_)) => Ok(None),
        Err(Unresolved::Pending(info)) if info.failed => Ok(None),
        Err(pending) => Err(pending),
    }
}

/// `merge(template, stub...)`: a nested cascade.
fn merge_documents(args: &[&Expr], binding: &Binding<'_>) -> Evaluation {
    let Some((template, stubs)) = args.split_first() else {
        return Err(EvalError::MissingArgument {
            name: "template".to_string(),
        }
        .into());
    };
    let template = document_argument(template, binding)?;
    let stubs = stubs
        .iter()
        .map(|stub| document_argument(stub, binding))
        .collect::<Result<Vec<_>, _>>()?;
    flow_nested(&template, binding, None, Some(stubs))
}

/// A map argument must be fully flowed; a raw map may still hold directives.
fn document_argument(expr: &Expr, binding: &Binding<'_>) -> Result<Node, Unresolved> {
    let resolved = evaluate(expr, binding)?;
    match resolved.value {
        Value::Template(template) => Ok(template.node.clone()),
        value @ Value::Map(_) => Ok(Node::new(value, binding.source())),
        other => Err(EvalError::TypeMismatch {
            expected: "map or template",
            found: other.type_name(),
        }
        .into()),
    }
}

/// `catch(expr)` or `catch(expr, |value, error|-> ...)`.
fn catch(args: &[&Expr], binding: &Binding<'_>) -> Evaluation {
    let (expr, handler) = match args {
        [expr] => (*expr, None),
        [expr, handler] => (*expr, Some(*handler)),
        _ => {
            return Err(EvalError::TooManyArguments {
                callee: "catch".to_string(),
                expected: 2,
                got: args.len(),
            }
            .into());
        }
    };
    let (value, error) = match evaluate(expr, binding) {
        Ok(resolved) => (resolved.value, None),
        Err(Unresolved::Pending(info)) if !info.failed => return Err(Unresolved::Pending(info)),
        Err(failure) => (Value::Nil, Some(failure.message())),
    };

    let source = binding.source();
    let error_value = Value::String(error.clone().unwrap_or_default());
    match handler {
        None => {
            let mut map = BTreeMap::new();
            map.insert(
                "valid".to_string(),
                Node::new(Value::Bool(error.is_none()), source.clone()),
            );
            map.insert("error".to_string(), Node::new(error_value, source.clone()));
            map.insert("value".to_string(), Node::new(value, source));
            Ok(Resolved::new(Value::Map(map)))
        }
        Some(handler) => {
            let lambda = expect_lambda(handler, binding)?;
            invoke(
                &lambda,
                vec![
                    ArgValue::Positional(Node::new(value, source.clone())),
                    ArgValue::Positional(Node::new(error_value, source)),
                ],
                binding,
            )
        }
    }
}

/// `sync(expr, |v|-> cond[, |v|-> value[, timeout]])`.
///
/// Re-evaluates `expr` until the condition holds or the timeout expires.
///
/// While `expr` is pending the node waits for the next pass like any other.
/// Once it resolves, every later pass reads the same snapshot value, so the
/// only inputs that can still change are functions reading outside state.
/// Those are polled here until the deadline.
fn sync(args: &[&Expr], binding: &Binding<'_>) -> Evaluation {
    let (expr, condition, value_fn, timeout) = match args {
        [expr, condition] => (*expr, *condition, None, None),
        [expr, condition, value] => (*expr, *condition, Some(*value), None),
        [expr, condition, value, timeout] => (*expr, *condition, Some(*value), Some(*timeout)),
        _ => {
            return Err(EvalError::TooManyArguments {
                callee: "sync".to_string(),
                expected: 4,
                got: args.len(),
            }
            .into());
        }
    };
    let condition = expect_lambda(condition, binding)?;
    let value_fn = value_fn
        .map(|expr| expect_lambda(expr, binding))
        .transpose()?;
    let timeout = match timeout {
        Some(expr) => {
            let seconds = evaluate(expr, binding)?;
            let seconds = seconds.value.as_int().ok_or(EvalError::TypeMismatch {
                expected: "int",
                found: seconds.value.type_name(),
            })?;
            Duration::from_secs(u64::try_from(seconds).unwrap_or_default())
        }
        None => binding.engine.sync_timeout(),
    };

    let deadline = Instant::now() + timeout;
    let mut attempt = 1;
    loop {
        let current = evaluate(expr, binding)?;
        let argument = Node::new(current.value.clone(), binding.source());
        let satisfied = invoke(
            &condition,
            vec![ArgValue::Positional(argument.clone())],
            binding,
        )?
        .value
        .is_truthy();
        if satisfied {
            return match &value_fn {
                Some(value_fn) => invoke(value_fn, vec![ArgValue::Positional(argument)], binding),
                None => Ok(current),
            };
        }
        if Instant::now() >= deadline {
            return Err(EvalError::Message(format!("sync timed out after {attempt} attempts")).into());
        }
        debug!(attempt, path = %render_path(&binding.path), "sync condition not met, retrying");
        thread::sleep(binding.engine.sync_interval());
        attempt += 1;
    }
}

/// `stub()` or `stub(ref)`: the first stub value at the current or referenced path.
fn stub(args: &[&Expr], binding: &Binding<'_>) -> Evaluation {
    let path = match args {
        [] => binding.stub_path.clone(),
        [expr] => match expr.ungrouped() {
            Expr::Reference(reference) => reference.path.clone(),
            other => {
                let resolved = evaluate(other, binding)?;
                match resolved.value {
                    Value::String(path) => path.split('.').map(str::to_string).collect(),
                    value => {
                        return Err(EvalError::TypeMismatch {
                            expected: "reference",
                            found: value.type_name(),
                        }
                        .into());
                    }
                }
            }
        },
        _ => {
            return Err(EvalError::TooManyArguments {
                callee: "stub".to_string(),
                expected: 1,
                got: args.len(),
            }
            .into());
        }
    };
    let rendered = render_path(&path);
    match binding.stub_value(&path) {
        Some(node) => node_value(&rendered, node, false),
        None => Err(EvalError::StubNotFound { path: rendered }.into()),
    }
}

fn expect_lambda(
    expr: &Expr,
    binding: &Binding<'_>,
) -> Result<Rc<LambdaValue>, Unresolved> {
    match evaluate(expr, binding)?.value {
        Value::Lambda(lambda) => Ok(lambda),
        other => Err(EvalError::TypeMismatch {
            expected: "lambda",
            found: other.type_name(),
        }
        .into()),
    }
}

/// `merge [replace|required] [on key] [path]`: the stub value at the
/// current or given path.
///
/// The first stub that has a value wins.
pub fn evaluate_merge(merge: &MergeExpr, binding: &Binding<'_>) -> Evaluation {
    let path = merge.path.clone().unwrap_or_else(|| binding.stub_path.clone());
    let info = EvalInfo {
        merged: true,
        replace: merge.replace,
        key_name: merge.key.clone(),
        redirect_path: merge.path.clone(),
        ..EvalInfo::default()
    };
    match binding.stub_value(&path) {
        Some(node) => {
            let resolved = node_value(&render_path(&path), node, false)?;
            Ok(Resolved::with_info(resolved.value, info))
        }
        None if merge.required => Err(EvalError::StubNotFound {
            path: render_path(&path),
        }
        .into()),
        None => Ok(Resolved::with_info(
            Value::Nil,
            EvalInfo {
                undefined: true,
                ..info
            },
        )),
    }
}

/// `auto`: the size of a resource pool, summed from the jobs using it.
pub fn evaluate_auto(binding: &Binding<'_>) -> Evaluation {
    let pool = match binding.path.as_slice() {
        [pools, name, size] if pools == "resource_pools" && size == "size" => name,
        _ => {
            return Err(EvalError::Message(
                "auto is only supported for resource pool sizes".to_string(),
            )
            .into());
        }
    };
    let root = &binding.document().root;
    let jobs: Vec<&Node> = match root.get("jobs").map(|jobs| &jobs.value) {
        Some(Value::List(items)) => items.iter().collect(),
        Some(Value::Map(map)) => map.values().collect(),
        _ => Vec::new(),
    };

    let mut total: i64 = 0;
    for job in jobs {
        let Some(field) = job.get("resource_pool") else {
            continue;
        };
        if !field.is_resolved() {
            return Err(Unresolved::pending("resource pool of a job is unresolved"));
        }
        if field.value.as_str() != Some(pool.as_str()) {
            continue;
        }
        let job_name = entry_identity(job, binding.default_key()).unwrap_or_default();
        let instances = match job.get("instances") {
            Some(node) => node_value(&format!("jobs.{job_name}.instances"), node, false)?.value,
            None => Value::Int(0),
        };
        let count = instances.as_int().ok_or(EvalError::TypeMismatch {
            expected: "int",
            found: instances.type_name(),
        })?;
        total = total.checked_add(count).ok_or(EvalError::Overflow)?;
    }
    Ok(Resolved::new(total))
}
