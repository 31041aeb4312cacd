use std::collections::BTreeMap;

use super::ControlContext;
use crate::interpreter::{EvalError, Unresolved};
use crate::types::{Node, Value};

/// `<<merge: maps` splices a map, or a list of maps, into the fields of
/// the carrying map.
///
/// Later maps override earlier ones field by field; the map's own fields
/// win over all of them.
pub(super) fn merge_control(context: &ControlContext<'_, '_>) -> Result<Option<Node>, Unresolved> {
    let sources: Vec<&Node> = match &context.value.value {
        Value::Nil => Vec::new(),
        Value::Map(_) => vec![context.value],
        Value::List(items) => items.iter().collect(),
        other => {
            return Err(EvalError::TypeMismatch {
                expected: "map or list of maps",
                found: other.type_name(),
            }
            .into());
        }
    };

    let mut merged = BTreeMap::new();
    for source in sources {
        match &source.value {
            Value::Nil => {}
            Value::Map(fields) => merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
            other => {
                return Err(EvalError::TypeMismatch {
                    expected: "map",
                    found: other.type_name(),
                }
                .into());
            }
        }
    }
    merged.extend(context.fields.clone());
    Ok(Some(context.node.with_value(Value::Map(merged))))
}
