//! Implementation of the `stubflow check` command.

use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Report, Result};
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use serde_json::Value as JsonValue;
use stubflow::parser::{Embedded, classify_string};
use stubflow::{Node, ParseError};

use crate::input::read_raw;
use crate::output::ExpressionDiagnostic;
use crate::output::table::format_report_table;
use crate::settings::EngineArgs;

/// Arguments for the check command.
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Files to check (YAML or JSON)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Also flow each document and report unresolved nodes
    #[arg(long)]
    pub flow: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// A document string whose expression does not parse.
#[derive(Debug)]
struct SyntaxProblem {
    path: String,
    text: String,
    error: ParseError,
}

/// JSON output for one problem.
#[derive(Debug, Serialize)]
struct ProblemJson {
    source: String,
    path: String,
    message: String,
}

/// Run the check command.
pub fn run_check(args: CheckArgs) -> Result<i32> {
    let engine = args.engine.engine(false);
    let mut problems = Vec::new();
    let mut total = 0;

    for file in &args.files {
        let mut file_problems = 0;
        for document in read_raw(file)? {
            let syntax = syntax_problems(&document.value);
            file_problems += syntax.len();
            for problem in &syntax {
                if args.json {
                    problems.push(ProblemJson {
                        source: document.source.clone(),
                        path: problem.path.clone(),
                        message: problem.error.to_string(),
                    });
                } else {
                    let name = format!("{}: {}", document.source, problem.path);
                    let diagnostic = ExpressionDiagnostic::from_embedded(&name, &problem.text, &problem.error);
                    eprintln!("{:?}", Report::new(diagnostic));
                }
            }

            if !args.flow || !syntax.is_empty() {
                continue;
            }
            let node = Node::from_json(document.value, &document.source).into_diagnostic()?;
            let Err(err) = engine.flow(node) else {
                continue;
            };
            let Some(report) = err.report() else {
                eprintln!("{}: {err}", document.source);
                file_problems += 1;
                continue;
            };
            file_problems += report.len();
            if args.json {
                problems.extend(report.entries.iter().map(|entry| ProblemJson {
                    source: entry.source.clone(),
                    path: entry.path.clone(),
                    message: entry.message.clone(),
                }));
            } else {
                eprintln!("{}", format_report_table(report));
            }
        }

        total += file_problems;
        if !args.json {
            summarize(&file.display().to_string(), file_problems);
        }
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&problems).into_diagnostic()?);
    }
    Ok(if total == 0 { exitcode::OK } else { exitcode::DATAERR })
}

fn summarize(file: &str, problems: usize) {
    if problems == 0 {
        println!("{file}: {}", "ok".if_supports_color(Stream::Stdout, |text| text.green()));
    } else {
        let count = format!("{problems} problems");
        println!("{file}: {}", count.if_supports_color(Stream::Stdout, |text| text.red()));
    }
}

/// Every string in `value` holding a `(( ... ))` expression that does not parse.
fn syntax_problems(value: &JsonValue) -> Vec<SyntaxProblem> {
    let mut problems = Vec::new();
    collect(value, &mut Vec::new(), &mut problems);
    problems
}

fn collect(value: &JsonValue, path: &mut Vec<String>, problems: &mut Vec<SyntaxProblem>) {
    match value {
        JsonValue::String(text) => {
            if let Embedded::Expression(Err(error)) = classify_string(text) {
                problems.push(SyntaxProblem {
                    path: path.join("."),
                    text: text.clone(),
                    error,
                });
            }
        }
        JsonValue::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                path.push(format!("[{index}]"));
                collect(item, path, problems);
                path.pop();
            }
        }
        JsonValue::Object(fields) => {
            for (key, field) in fields {
                path.push(key.clone());
                collect(field, path, problems);
                path.pop();
            }
        }
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn finds_broken_expressions_by_path() {
        let problems = syntax_problems(&json!({
            "a": "(( 1 + ))",
            "b": ["ok", "(( ) ))", "(( b ))"],
            "c": "((! not parsed ))",
            "d": {"e": "(( [1, ))"}
        }));
        let paths: Vec<&str> = problems.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["a", "b.[1]", "d.e"]);
    }

    #[test]
    fn plain_documents_have_no_problems() {
        assert!(syntax_problems(&json!({"a": 1, "b": "text", "c": null})).is_empty());
    }
}
