//! Implementation of the `stubflow merge` command.

use std::fs::write;
use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Result, miette};
use owo_colors::{OwoColorize, Stream};
use stubflow::{FlowError, UnresolvedReport};

use crate::input::{read_document, read_documents};
use crate::output::render_documents;
use crate::output::table::format_report_table;
use crate::settings::EngineArgs;

/// Arguments for the merge command.
#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Template file (YAML or JSON, `-` for stdin); every document is flowed
    pub template: PathBuf,

    /// Stub files, highest precedence first
    pub stubs: Vec<PathBuf>,

    /// State document of a previous run
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Write the new state document to this file
    #[arg(long)]
    pub state_out: Option<PathBuf>,

    /// Print unresolved nodes as they are instead of failing
    #[arg(long, env = "STUBFLOW_PARTIAL")]
    pub partial: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Run the merge command.
pub fn run_merge(args: MergeArgs) -> Result<i32> {
    let engine = args.engine.engine(args.partial);

    let templates = read_documents(&args.template)?;
    let mut stubs = Vec::new();
    for path in &args.stubs {
        stubs.extend(read_documents(path)?);
    }
    let state = args.state.as_deref().map(read_document).transpose()?;
    tracing::debug!(templates = templates.len(), stubs = stubs.len(), "merging");

    let prepared = match engine.prepare_stubs(stubs) {
        Ok(prepared) => prepared,
        Err(err) => return report_failure(&err, args.json),
    };

    let mut documents = Vec::with_capacity(templates.len());
    let mut states = Vec::new();
    let mut unresolved = UnresolvedReport::default();
    if args.partial {
        for stub in &prepared {
            unresolved.absorb(UnresolvedReport::collect(stub, engine.default_key()));
        }
    }
    for template in templates {
        let outcome = match engine.apply(template, prepared.clone(), state.clone()) {
            Ok(outcome) => outcome,
            Err(err) => return report_failure(&err, args.json),
        };
        documents.push(outcome.document);
        states.extend(outcome.state);
        if let Some(report) = outcome.unresolved {
            unresolved.absorb(report);
        }
    }

    println!("{}", render_documents(&documents, args.json)?);

    if let Some(path) = &args.state_out {
        if states.is_empty() {
            tracing::warn!(path = %path.display(), "no state nodes, state file not written");
        } else {
            let text = render_documents(&states, false)?;
            write(path, format!("{text}\n"))
                .into_diagnostic()
                .map_err(|e| miette!("Cannot write state file {}: {}", path.display(), e))?;
        }
    }

    if !unresolved.is_empty() {
        eprintln!("{}", format_report_table(&unresolved));
        eprintln!(
            "{}",
            format!("{} unresolved nodes kept", unresolved.len())
                .if_supports_color(Stream::Stderr, |text| text.yellow())
        );
    }
    Ok(exitcode::OK)
}

/// Print why a flow failed and pick the exit code.
pub(crate) fn report_failure(err: &FlowError, json: bool) -> Result<i32> {
    match err {
        FlowError::Unresolved(report) => {
            if json {
                eprintln!("{}", serde_json::to_string_pretty(report).into_diagnostic()?);
            } else {
                eprintln!("{}", format_report_table(report));
                eprintln!(
                    "{}",
                    format!("{} unresolved nodes", report.len())
                        .if_supports_color(Stream::Stderr, |text| text.red())
                );
            }
            Ok(exitcode::DATAERR)
        }
        FlowError::PassLimit { .. } | FlowError::Parse { .. } => {
            if json {
                let output = serde_json::json!({ "error": err.to_string() });
                eprintln!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
            } else {
                eprintln!("{}", err.if_supports_color(Stream::Stderr, |text| text.red()));
            }
            Ok(exitcode::DATAERR)
        }
        FlowError::Document(_) => Err(miette!("{err}")),
    }
}
