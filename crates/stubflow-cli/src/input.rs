//! Reading YAML and JSON documents from files.
//!
//! JSON is read through the YAML parser. A file may hold several documents
//! separated by `---`; each becomes its own tree.

use std::fs::read_to_string;
use std::io::{Error as IoError, Read, stdin};
use std::path::Path;

use miette::Diagnostic;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use stubflow::{DocumentError, Node};
use thiserror::Error;

/// Path that reads from standard input.
const STDIN_PATH: &str = "-";

/// Source name of documents read from standard input.
const STDIN_SOURCE: &str = "<stdin>";

/// Errors loading input documents.
#[derive(Debug, Error, Diagnostic)]
pub enum InputError {
    #[error("cannot read {path}")]
    #[diagnostic(code(stubflow::io))]
    Read {
        path: String,
        #[source]
        source: IoError,
    },

    #[error("{path} is neither valid YAML nor JSON")]
    #[diagnostic(code(stubflow::yaml))]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path} contains no documents")]
    #[diagnostic(code(stubflow::empty))]
    Empty { path: String },

    #[error("{0}")]
    #[diagnostic(code(stubflow::document))]
    Document(#[from] DocumentError),
}

/// One parsed document with the source name it is reported under.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub source: String,
    pub value: JsonValue,
}

/// Read every document of a file, `-` meaning standard input.
pub fn read_raw(path: &Path) -> Result<Vec<RawDocument>, InputError> {
    let (base, text) = if path.as_os_str() == STDIN_PATH {
        let mut text = String::new();
        stdin()
            .read_to_string(&mut text)
            .map_err(|source| InputError::Read {
                path: STDIN_SOURCE.to_string(),
                source,
            })?;
        (STDIN_SOURCE.to_string(), text)
    } else {
        let base = path.display().to_string();
        let text = read_to_string(path).map_err(|source| InputError::Read {
            path: base.clone(),
            source,
        })?;
        (base, text)
    };

    let documents = parse_documents(&text, &base).map_err(|source| InputError::Yaml {
        path: base.clone(),
        source,
    })?;
    if documents.is_empty() {
        return Err(InputError::Empty { path: base });
    }
    tracing::debug!(path = %base, documents = documents.len(), "read input");
    Ok(documents)
}

/// Read every document of a file as a tree.
pub fn read_documents(path: &Path) -> Result<Vec<Node>, InputError> {
    read_raw(path)?
        .into_iter()
        .map(|document| Ok(Node::from_json(document.value, &document.source)?))
        .collect()
}

/// Read the first document of a file as a tree.
pub fn read_document(path: &Path) -> Result<Node, InputError> {
    let mut documents = read_documents(path)?;
    Ok(documents.remove(0))
}

/// Split `text` into documents.
///
/// A single document is named `base`; several are named `base#1`, `base#2`
/// and so on.
pub fn parse_documents(text: &str, base: &str) -> Result<Vec<RawDocument>, serde_yaml::Error> {
    let values = serde_yaml::Deserializer::from_str(text)
        .map(JsonValue::deserialize)
        .collect::<Result<Vec<_>, _>>()?;
    let count = values.len();
    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| RawDocument {
            source: source_name(base, index, count),
            value,
        })
        .collect())
}

fn source_name(base: &str, index: usize, count: usize) -> String {
    if count == 1 {
        base.to_string()
    } else {
        format!("{base}#{}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn single_document_keeps_the_file_name() {
        let documents = parse_documents("a: 1\nb: \"(( a ))\"\n", "values.yml").unwrap();
        assert_eq!(
            documents,
            vec![RawDocument {
                source: "values.yml".to_string(),
                value: json!({"a": 1, "b": "(( a ))"}),
            }]
        );
    }

    #[test]
    fn documents_are_numbered() {
        let documents = parse_documents("a: 1\n---\na: 2\n", "stubs.yml").unwrap();
        let sources: Vec<&str> = documents.iter().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, vec!["stubs.yml#1", "stubs.yml#2"]);
        assert_eq!(documents[1].value, json!({"a": 2}));
    }

    #[test]
    fn json_is_accepted() {
        let documents = parse_documents(r#"{"list": [1, 2], "x": null}"#, "t.json").unwrap();
        assert_eq!(documents[0].value, json!({"list": [1, 2], "x": null}));
    }

    #[test]
    fn invalid_yaml_fails() {
        assert!(parse_documents("a: [1, 2", "bad.yml").is_err());
    }
}
