//! Standard function library.
//!
//! Only generic functions live here; hashing, address math beyond the
//! operators, file and process access are left to embedders.

use std::collections::BTreeMap;
use std::rc::Rc;

use stubflow_semantics::DIRECTIVE_KEY;

use super::functions::BuiltinFn;
use super::lambda::{ArgValue, invoke};
use super::operators::{arithmetic, values_equal};
use super::{Binding, EvalError, Evaluation, Resolved, Unresolved};
use crate::parser::ArithOp;
use crate::types::{LambdaValue, Node, Value};

/// The functions every engine starts with.
pub const STANDARD: &[(&str, BuiltinFn)] = &[
    ("contains", contains),
    ("error", error),
    ("format", format),
    ("join", join),
    ("keys", keys),
    ("length", length),
    ("lower", lower),
    ("map", map),
    ("max", max),
    ("min", min),
    ("select", select),
    ("split", split),
    ("sum", sum),
    ("trim", trim),
    ("type", type_of),
    ("uniq", uniq),
    ("upper", upper),
    ("values", values),
];

fn check_arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), Unresolved> {
    if args.len() < min {
        return Err(EvalError::MissingArgument {
            name: format!("{name} argument {}", args.len() + 1),
        }
        .into());
    }
    if args.len() > max {
        return Err(EvalError::TooManyArguments {
            callee: name.to_string(),
            expected: max,
            got: args.len(),
        }
        .into());
    }
    Ok(())
}

fn mismatch(expected: &'static str, found: &Value) -> Unresolved {
    EvalError::TypeMismatch {
        expected,
        found: found.type_name(),
    }
    .into()
}

fn text(value: &Value) -> Result<String, Unresolved> {
    value.as_text().ok_or_else(|| mismatch("string", value))
}

fn list_of(values: Vec<Value>, binding: &Binding<'_>) -> Value {
    let source = binding.source();
    Value::List(
        values
            .into_iter()
            .map(|value| Node::new(value, source.clone()))
            .collect(),
    )
}

fn length(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("length", args, 1, 1)?;
    let len = match &args[0] {
        Value::String(s) => s.chars().count(),
        Value::List(items) => items.len(),
        Value::Map(map) => map.len(),
        other => return Err(mismatch("string, list or map", other)),
    };
    Ok(Resolved::new(len))
}

fn keys(args: &[Value], binding: &Binding<'_>) -> Evaluation {
    check_arity("keys", args, 1, 1)?;
    let map = args[0].as_map().ok_or_else(|| mismatch("map", &args[0]))?;
    Ok(Resolved::new(list_of(
        map.keys().map(|key| Value::from(key.as_str())).collect(),
        binding,
    )))
}

fn values(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("values", args, 1, 1)?;
    let map = args[0].as_map().ok_or_else(|| mismatch("map", &args[0]))?;
    Ok(Resolved::new(Value::List(map.values().cloned().collect())))
}

/// `join(separator, items...)`: lists are flattened one level.
fn join(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("join", args, 1, usize::MAX)?;
    let separator = text(&args[0])?;
    let mut parts = Vec::new();
    for arg in &args[1..] {
        match arg {
            Value::List(items) => {
                for item in items {
                    parts.push(text(&item.value)?);
                }
            }
            other => parts.push(text(other)?),
        }
    }
    Ok(Resolved::new(parts.join(&separator)))
}

fn split(args: &[Value], binding: &Binding<'_>) -> Evaluation {
    check_arity("split", args, 2, 2)?;
    let separator = text(&args[0])?;
    let subject = text(&args[1])?;
    let parts = if separator.is_empty() {
        subject.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        subject.split(separator.as_str()).map(Value::from).collect()
    };
    Ok(Resolved::new(list_of(parts, binding)))
}

fn trim(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("trim", args, 1, 2)?;
    let subject = text(&args[0])?;
    let trimmed = match args.get(1) {
        Some(chars) => {
            let chars: Vec<char> = text(chars)?.chars().collect();
            subject.trim_matches(chars.as_slice()).to_string()
        }
        None => subject.trim().to_string(),
    };
    Ok(Resolved::new(trimmed))
}

fn upper(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("upper", args, 1, 1)?;
    Ok(Resolved::new(text(&args[0])?.to_uppercase()))
}

fn lower(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("lower", args, 1, 1)?;
    Ok(Resolved::new(text(&args[0])?.to_lowercase()))
}

fn contains(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("contains", args, 2, 2)?;
    let found = match &args[0] {
        Value::List(items) => items.iter().any(|item| values_equal(&item.value, &args[1])),
        Value::Map(map) => map.contains_key(&text(&args[1])?),
        Value::String(s) => s.contains(&text(&args[1])?),
        other => return Err(mismatch("list, map or string", other)),
    };
    Ok(Resolved::new(found))
}

/// `format(pattern, args...)` with `%s`, `%d`, `%v` and `%%`.
fn format(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("format", args, 1, usize::MAX)?;
    let pattern = text(&args[0])?;
    let mut remaining = args[1..].iter();
    let mut output = String::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => output.push('%'),
            Some(verb @ ('s' | 'd' | 'v')) => {
                let Some(value) = remaining.next() else {
                    return Err(EvalError::Message(format!("format: missing argument for %{verb}")).into());
                };
                if verb == 'd' && value.as_int().is_none() {
                    return Err(mismatch("int", value));
                }
                output.push_str(&value.to_string());
            }
            Some(other) => {
                return Err(EvalError::Message(format!("format: unknown verb %{other}")).into());
            }
            None => output.push('%'),
        }
    }
    Ok(Resolved::new(output))
}

fn numbers(name: &str, args: &[Value]) -> Result<Vec<Value>, Unresolved> {
    let items: Vec<Value> = match args {
        [Value::List(items)] => items.iter().map(|item| item.value.clone()).collect(),
        _ => args.to_vec(),
    };
    if items.is_empty() {
        return Err(EvalError::Message(format!("{name} needs at least one value")).into());
    }
    for item in &items {
        if item.as_float().is_none() {
            return Err(mismatch("number", item));
        }
    }
    Ok(items)
}

fn min(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    let items = numbers("min", args)?;
    extreme(items, |candidate, best| candidate < best)
}

fn max(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    let items = numbers("max", args)?;
    extreme(items, |candidate, best| candidate > best)
}

fn extreme(items: Vec<Value>, better: fn(f64, f64) -> bool) -> Evaluation {
    let mut best: Option<(f64, Value)> = None;
    for item in items {
        let number = item.as_float().unwrap_or_default();
        if best.as_ref().is_none_or(|(current, _)| better(number, *current)) {
            best = Some((number, item));
        }
    }
    Ok(Resolved::new(best.map(|(_, value)| value).unwrap_or(Value::Nil)))
}

fn error(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    let message = args
        .iter()
        .map(|arg| arg.as_text().unwrap_or_else(|| arg.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    Err(EvalError::Message(message).into())
}

fn type_of(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("type", args, 1, 1)?;
    Ok(Resolved::new(args[0].type_name()))
}

fn lambda_arg(value: &Value) -> Result<Rc<LambdaValue>, Unresolved> {
    match value {
        Value::Lambda(lambda) => Ok(lambda.clone()),
        other => Err(mismatch("lambda", other)),
    }
}

/// Arguments for one element: the value, or the key/index and the value
/// when the lambda takes two parameters.
fn element_args(lambda: &LambdaValue, key: Value, value: &Node, binding: &Binding<'_>) -> Vec<ArgValue> {
    if lambda.open_parameters() >= 2 {
        vec![
            ArgValue::Positional(Node::new(key, binding.source())),
            ArgValue::Positional(value.clone()),
        ]
    } else {
        vec![ArgValue::Positional(value.clone())]
    }
}

/// `map(list|map, lambda)`: a list of the lambda results.
fn map(args: &[Value], binding: &Binding<'_>) -> Evaluation {
    check_arity("map", args, 2, 2)?;
    let lambda = lambda_arg(&args[1])?;
    let mut results = Vec::new();
    for (key, value) in elements(&args[0])? {
        let resolved = invoke(&lambda, element_args(&lambda, key, value, binding), binding)?;
        if !resolved.info.undefined {
            results.push(Node::new(resolved.value, binding.source()));
        }
    }
    Ok(Resolved::new(Value::List(results)))
}

/// `select(list|map, lambda)`: the elements the lambda accepts.
fn select(args: &[Value], binding: &Binding<'_>) -> Evaluation {
    check_arity("select", args, 2, 2)?;
    let lambda = lambda_arg(&args[1])?;
    let accepts = |key: Value, value: &Node| -> Result<bool, Unresolved> {
        let resolved = invoke(&lambda, element_args(&lambda, key, value, binding), binding)?;
        Ok(resolved.value.is_truthy())
    };
    match &args[0] {
        Value::Map(map) => {
            let mut selected = BTreeMap::new();
            for (key, value) in map {
                if key != DIRECTIVE_KEY && accepts(Value::from(key.as_str()), value)? {
                    selected.insert(key.clone(), value.clone());
                }
            }
            Ok(Resolved::new(Value::Map(selected)))
        }
        other => {
            let mut selected = Vec::new();
            for (key, value) in elements(other)? {
                if accepts(key, value)? {
                    selected.push(value.clone());
                }
            }
            Ok(Resolved::new(Value::List(selected)))
        }
    }
}

/// `sum(list)` adds the numbers; `sum(list, initial, |acc, x|-> ...)` folds.
fn sum(args: &[Value], binding: &Binding<'_>) -> Evaluation {
    check_arity("sum", args, 1, 3)?;
    match args {
        [items] | [items, _] => {
            let mut total = args.get(1).cloned().unwrap_or(Value::Int(0));
            for (_, item) in elements(items)? {
                total = arithmetic(ArithOp::Add, &total, &item.value)?;
            }
            Ok(Resolved::new(total))
        }
        [items, initial, lambda] => {
            let lambda = lambda_arg(lambda)?;
            let mut accumulator = Node::new(initial.clone(), binding.source());
            for (_, item) in elements(items)? {
                let resolved = invoke(
                    &lambda,
                    vec![
                        ArgValue::Positional(accumulator),
                        ArgValue::Positional(item.clone()),
                    ],
                    binding,
                )?;
                accumulator = Node::new(resolved.value, binding.source());
            }
            Ok(Resolved::new(accumulator.value))
        }
        _ => Err(EvalError::MissingArgument {
            name: "list".to_string(),
        }
        .into()),
    }
}

fn uniq(args: &[Value], _binding: &Binding<'_>) -> Evaluation {
    check_arity("uniq", args, 1, 1)?;
    let items = args[0].as_list().ok_or_else(|| mismatch("list", &args[0]))?;
    let mut unique: Vec<Node> = Vec::new();
    for item in items {
        if !unique.iter().any(|seen| values_equal(&seen.value, &item.value)) {
            unique.push(item.clone());
        }
    }
    Ok(Resolved::new(Value::List(unique)))
}

/// Key (index or field name) and value of each element of a collection.
fn elements(collection: &Value) -> Result<Vec<(Value, &Node)>, Unresolved> {
    match collection {
        Value::List(items) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| (Value::from(index), item))
            .collect()),
        Value::Map(map) => Ok(map
            .iter()
            .filter(|(key, _)| key.as_str() != DIRECTIVE_KEY)
            .map(|(key, value)| (Value::from(key.as_str()), value))
            .collect()),
        other => Err(mismatch("list or map", other)),
    }
}
