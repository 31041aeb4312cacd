//! Conversion between document trees and JSON values.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use stubflow_semantics::DIRECTIVE_KEY;
use thiserror::Error;

use super::{Node, Value};

/// Errors converting between documents and their serialized form.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// A number that fits neither `i64` nor `f64`.
    #[error("unsupported number '{0}'")]
    UnsupportedNumber(String),

    /// Serialization failed, e.g. on a non-finite float.
    #[error("cannot serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Node {
    /// Build a tree from a JSON value.
    ///
    /// Strings are kept as they are; embedded expressions are recognized
    /// when the tree is flowed.
    pub fn from_json(value: JsonValue, source: &str) -> Result<Node, DocumentError> {
        let source: Rc<str> = Rc::from(source);
        convert(value, &source)
    }

    /// Parse JSON text into a tree.
    pub fn from_json_str(text: &str, source: &str) -> Result<Node, DocumentError> {
        let value: JsonValue = serde_json::from_str(text)?;
        Node::from_json(value, source)
    }

    /// Render the tree as JSON. Unresolved expressions appear as `(( ... ))` strings.
    pub fn to_json(&self) -> Result<JsonValue, DocumentError> {
        Ok(serde_json::to_value(self)?)
    }
}

fn convert(value: JsonValue, source: &Rc<str>) -> Result<Node, DocumentError> {
    let value = match value {
        JsonValue::Null => Value::Nil,
        JsonValue::Bool(b) => Value::Bool(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                return Err(DocumentError::UnsupportedNumber(n.to_string()));
            }
        }
        JsonValue::String(s) => Value::String(s),
        JsonValue::Array(items) => Value::List(
            items
                .into_iter()
                .map(|item| convert(item, source))
                .collect::<Result<_, _>>()?,
        ),
        JsonValue::Object(fields) => Value::Map(
            fields
                .into_iter()
                .map(|(key, value)| Ok((key, convert(value, source)?)))
                .collect::<Result<BTreeMap<_, _>, DocumentError>>()?,
        ),
    };
    Ok(Node::new(value, source.clone()))
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.value {
            Value::Nil => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Float(n) if n.is_finite() => serializer.serialize_f64(*n),
            Value::Float(n) => Err(S::Error::custom(format!("non-finite float {n}"))),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, value) in fields {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Value::Expression(expr) => serializer.serialize_str(&format!("(( {expr} ))")),
            Value::Lambda(lambda) => serializer.serialize_str(&format!("(( {lambda} ))")),
            Value::Template(template) => match &template.node.value {
                Value::Map(fields) => {
                    let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                    map.serialize_entry(DIRECTIVE_KEY, "(( &template ))")?;
                    for (key, value) in fields {
                        map.serialize_entry(key, value)?;
                    }
                    map.end()
                }
                Value::Expression(expr) => {
                    serializer.serialize_str(&format!("(( &template ({expr}) ))"))
                }
                _ => template.node.serialize(serializer),
            },
        }
    }
}
