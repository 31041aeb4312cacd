//! Implementation of the `stubflow eval` command.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Args;
use miette::{IntoDiagnostic, Result, miette};
use serde_json::Value as JsonValue;
use stubflow::{Node, Value, parse_expression};

use super::merge::report_failure;
use crate::input::read_document;
use crate::output::{ExpressionDiagnostic, render_documents};
use crate::settings::EngineArgs;

/// Source name of the expression given on the command line.
const EXPRESSION_SOURCE: &str = "<expression>";

/// Source name of `--param` values.
const PARAM_SOURCE: &str = "<param>";

/// Arguments for the eval command.
#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Expression to evaluate, without the surrounding (( ))
    pub expression: String,

    /// Document whose fields the expression can reference
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Fields in name=value format (repeatable); values are read as YAML
    #[arg(short = 'p', long = "param", value_parser = parse_key_val)]
    pub params: Vec<(String, String)>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Parse a key=value parameter string.
fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid parameter format '{s}': expected name=value"))?;
    Ok((key.to_string(), value.to_string()))
}

/// Read a parameter value as YAML, falling back to the plain string.
fn param_value(text: &str) -> JsonValue {
    serde_yaml::from_str(text).unwrap_or_else(|_| JsonValue::String(text.to_string()))
}

/// Run the eval command.
pub fn run_eval(args: EvalArgs) -> Result<i32> {
    let engine = args.engine.engine(false);

    let expr = match parse_expression(&args.expression) {
        Ok(expr) => expr,
        Err(e) => {
            let diagnostic = ExpressionDiagnostic::new(EXPRESSION_SOURCE, &args.expression, 0, &e);
            return Err(diagnostic.into());
        }
    };

    let mut fields = match &args.document {
        Some(path) => match read_document(path)?.value {
            Value::Map(fields) => fields,
            other => {
                return Err(miette!(
                    "{} must be a map to provide fields, found {}",
                    path.display(),
                    other.type_name()
                ));
            }
        },
        None => BTreeMap::new(),
    };
    for (name, text) in &args.params {
        let node = Node::from_json(param_value(text), PARAM_SOURCE).into_diagnostic()?;
        fields.insert(name.clone(), node);
    }

    let source: Rc<str> = Rc::from(EXPRESSION_SOURCE);
    fields.insert(
        EXPRESSION_SOURCE.to_string(),
        Node::new(Value::Expression(Rc::new(expr)), source.clone()),
    );

    let flowed = match engine.flow(Node::new(Value::Map(fields), source)) {
        Ok(flowed) => flowed,
        Err(err) => return report_failure(&err, args.json),
    };
    match flowed.get(EXPRESSION_SOURCE) {
        Some(result) => println!("{}", render_documents(&[result], args.json)?),
        // The expression evaluated to an undefined value.
        None => println!("{}", render_documents(&[JsonValue::Null], args.json)?),
    }
    Ok(exitcode::OK)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn key_values_split_at_the_first_equals_sign() {
        assert_eq!(
            parse_key_val("url=a=b").unwrap(),
            ("url".to_string(), "a=b".to_string())
        );
        assert!(parse_key_val("flag").is_err());
    }

    #[test]
    fn params_are_typed_by_yaml() {
        assert_eq!(param_value("8080"), json!(8080));
        assert_eq!(param_value("[a, b]"), json!(["a", "b"]));
        assert_eq!(param_value("web"), json!("web"));
        assert_eq!(param_value("{oops"), json!("{oops"));
    }
}
