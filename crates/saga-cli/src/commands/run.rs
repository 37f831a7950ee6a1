use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use clap::{Args, ValueEnum};
use saga_core::{
    DecisionLog, DecisionLogReporter, DecisionRecord, InMemoryDecisionLog, InMemoryReviewQueue,
    ReportError,
};
use saga_flows::Scenario;
use saga_flows::providers::JsonlDecisionLog;
use tracing::debug;

use crate::error::{CliError, Result};
use crate::output::{self, RunReport};

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Scenario file (TOML)
    pub scenario: PathBuf,

    /// Append the saga's decision to this JSON-lines file
    #[arg(long)]
    pub decision_log: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Plain)]
    pub format: OutputFormat,
}

/// Keeps decisions for the report and, when asked, appends them to a file.
///
/// A failed file write is held back so the report still shows the decision
/// and the command fails once it has printed.
struct RecordingLog {
    memory: InMemoryDecisionLog,
    file: Option<JsonlDecisionLog>,
    write_error: Mutex<Option<ReportError>>,
}

impl RecordingLog {
    fn new(file: Option<JsonlDecisionLog>) -> Self {
        Self {
            memory: InMemoryDecisionLog::new(),
            file,
            write_error: Mutex::new(None),
        }
    }

    fn take_write_error(&self) -> Option<ReportError> {
        self.write_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl DecisionLog for RecordingLog {
    fn append(&self, record: DecisionRecord) -> std::result::Result<(), ReportError> {
        if let Some(file) = &self.file {
            if let Err(err) = file.append(record.clone()) {
                let mut slot = self
                    .write_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                if slot.is_none() {
                    *slot = Some(err);
                }
            }
        }
        self.memory.append(record)
    }
}

pub(crate) fn run(args: &RunArgs) -> Result<bool> {
    let scenario = Scenario::from_path(&args.scenario)?;
    debug!(scenario = %args.scenario.display(), saga = %scenario.saga, "scenario loaded");

    let file = args
        .decision_log
        .as_ref()
        .map(JsonlDecisionLog::open)
        .transpose()?;
    let reporter = DecisionLogReporter::new(RecordingLog::new(file));
    let review_queue = InMemoryReviewQueue::new();

    let outcome = scenario.run(&reporter, &review_queue)?;

    let report = RunReport {
        outcome: &outcome,
        decisions: reporter.log().memory.records(),
        review_items: review_queue.items(),
    };
    match args.format {
        OutputFormat::Plain => print!("{}", output::plain(&report)),
        OutputFormat::Json => println!("{}", output::json(&report)?),
    }

    if let (Some(path), Some(source)) = (&args.decision_log, reporter.log().take_write_error()) {
        return Err(CliError::DecisionLogWrite {
            path: path.clone(),
            source,
        });
    }
    Ok(outcome.succeeded())
}
