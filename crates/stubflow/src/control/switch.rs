//! `<<switch` and `<<type`: pick a case by key, or by predicate.

use stubflow_semantics::is_type_name;

use super::{ControlContext, resolved};
use crate::interpreter::{ArgValue, EvalError, Unresolved, invoke, values_equal};
use crate::types::{Node, Value};

/// Field of a predicate case holding the value or lambda to match.
const CASE_FIELD: &str = "case";
/// Field of a predicate case holding its result.
const VALUE_FIELD: &str = "value";

/// `<<switch: key` with `<<cases` and an optional `<<default`.
///
/// `<<cases` is either a map from keys to results or a list of
/// `{case, value}` entries where `case` is a value or a predicate lambda.
pub(super) fn switch_control(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let selected = match context.option("cases") {
        None => None,
        Some(cases) => match &cases.value {
            Value::Map(map) => {
                let key = context.value.value.as_text().ok_or_else(|| EvalError::TypeMismatch {
                    expected: "string",
                    found: context.value.value.type_name(),
                })?;
                map.get(&key).cloned()
            }
            Value::List(entries) => select_case(context, entries)?,
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "map or list of cases",
                    found: other.type_name(),
                }
                .into());
            }
        },
    };
    choose(context, selected, &context.value.value.to_string())
}

/// `<<type: value` picking the case named after the runtime type.
pub(super) fn type_control(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let type_name = context.value.value.type_name();
    let selected = match context.option("cases").map(|cases| &cases.value) {
        None => None,
        Some(Value::Map(map)) => {
            if let Some(unknown) = map.keys().find(|name| !is_type_name(name)) {
                return Err(EvalError::Message(format!("'{unknown}' is not a type name")).into());
            }
            map.get(type_name).cloned()
        }
        Some(other) => {
            return Err(EvalError::TypeMismatch {
                expected: "map of cases",
                found: other.type_name(),
            }
            .into());
        }
    };
    choose(context, selected, type_name)
}

fn choose(context: &ControlContext<'_, '_>, selected: Option<Node>, what: &str) -> Result<Option<Node>, Unresolved> {
    match selected.or_else(|| context.option("default").cloned()) {
        Some(result) => Ok(Some(result)),
        None => Err(EvalError::Message(format!("no case for '{what}'")).into()),
    }
}

/// First `{case, value}` entry whose case matches the switch value.
fn select_case(context: &ControlContext<'_, '_>, entries: &[Node]) -> Result<Option<Node>, Unresolved> {
    let binding = context.binding.child("<<cases");
    for (index, entry) in entries.iter().enumerate() {
        let (Some(case), Some(value)) = (entry.get(CASE_FIELD), entry.get(VALUE_FIELD)) else {
            return Err(EvalError::Message(format!(
                "case {} needs '{CASE_FIELD}' and '{VALUE_FIELD}' fields",
                index + 1
            ))
            .into());
        };
        let case = resolved(case, &binding.child(&format!("[{index}]")).child(CASE_FIELD))?;
        let matches = match &case.value {
            Value::Lambda(predicate) => {
                let argument = ArgValue::Positional(context.value.clone());
                invoke(predicate, vec![argument], context.binding)?.value.is_truthy()
            }
            other => values_equal(other, &context.value.value),
        };
        if matches {
            return Ok(Some(value.clone()));
        }
    }
    Ok(None)
}
