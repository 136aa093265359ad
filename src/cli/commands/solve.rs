//! `solveloop solve`: run the synthesis loop for one problem.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    build_completion, build_sandbox, cancel_on_ctrl_c, ProblemArgs, SynthesisOverrides,
};
use crate::cli::output::table::describe_outcome;
use crate::cli::output::{create_spinner, output, CommandOutput, ProgressBarExt, TableFormatter};
use crate::cli::Unsolved;
use crate::domain::models::Config;
use crate::services::{RetryController, RunEvent, RunOutcome, RunReport, StatementRefiner};

#[derive(Args, Debug)]
pub struct SolveArgs {
    #[command(flatten)]
    pub problem: ProblemArgs,

    #[command(flatten)]
    pub overrides: SynthesisOverrides,

    /// Let the model rewrite the statement once before solving
    #[arg(long)]
    pub refine: bool,

    /// Write the full run report (attempts and context) as JSON
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct SolveOutput<'a> {
    #[serde(flatten)]
    pub report: &'a RunReport,
    pub duration_ms: u64,
}

impl CommandOutput for SolveOutput<'_> {
    fn to_human(&self) -> String {
        let report = self.report;
        let headline = match report.outcome {
            RunOutcome::Succeeded { .. } => style(describe_outcome(&report.outcome)).green().bold(),
            RunOutcome::Exhausted { .. } => style(describe_outcome(&report.outcome)).yellow().bold(),
            RunOutcome::Aborted(_) => style(describe_outcome(&report.outcome)).red().bold(),
        };

        let mut lines = vec![
            format!("Run {} ({})", report.run_id, report.language),
            format!(
                "{headline} in {}ms, {} completion request(s)",
                self.duration_ms, report.completion_requests
            ),
        ];

        if !report.attempts.is_empty() {
            lines.push(TableFormatter::new().format_attempts(report.attempts.entries()));
        }

        if let Some(passing) = report.passing_attempt() {
            lines.push(format!("\n{}", style("Passing program:").bold()));
            lines.push(passing.source_code.clone());
        }

        lines.join("\n")
    }
}

pub async fn execute(args: SolveArgs, config: &Config, json_mode: bool) -> Result<()> {
    let mut problem = args.problem.load()?;
    let settings = args.overrides.apply(&config.synthesis);
    let completion = build_completion(config)?;

    if args.refine {
        StatementRefiner::new(completion.clone(), settings.temperature)
            .refine_problem(&mut problem)
            .await
            .context("Failed to refine problem statement")?;
    }

    let iteration_limit = settings.iteration_limit;
    let (events_tx, events_rx) = mpsc::channel(64);
    let controller =
        RetryController::new(completion, build_sandbox(config), settings).with_events(events_tx);

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let spinner = create_spinner("starting", !json_mode);
    let watcher = tokio::spawn(follow_events(events_rx, spinner.clone(), iteration_limit));

    let result = controller.run(&problem, &cancel).await;

    // Dropping the controller closes the event channel so the watcher ends
    drop(controller);
    interrupt.abort();
    let _ = watcher.await;

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            spinner.finish_and_clear();
            return Err(err).context("Invalid problem or settings");
        }
    };

    if report.is_success() {
        spinner.finish_success(describe_outcome(&report.outcome));
    } else {
        spinner.finish_error(describe_outcome(&report.outcome));
    }

    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }

    output(
        &SolveOutput {
            report: &report,
            duration_ms: report.duration_ms(),
        },
        json_mode,
    );

    finish(&report)
}

/// Map a finished run onto the command result
pub fn finish(report: &RunReport) -> Result<()> {
    match &report.outcome {
        RunOutcome::Succeeded { .. } => Ok(()),
        RunOutcome::Exhausted { .. } => Err(Unsolved(describe_outcome(&report.outcome)).into()),
        RunOutcome::Aborted(reason) => Err(anyhow::anyhow!("Run aborted: {reason}")),
    }
}

pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write run report: {}", path.display()))
}

async fn follow_events(mut events: mpsc::Receiver<RunEvent>, spinner: ProgressBar, limit: u32) {
    while let Some(event) = events.recv().await {
        match event {
            RunEvent::StateEntered { state, attempt, .. } => {
                spinner.set_message(format!("attempt {attempt}/{limit}: {state}"));
            }
            RunEvent::AttemptRecorded { attempt, .. } => {
                let verdict = if attempt.passed {
                    style("passed").green()
                } else {
                    style("failed").red()
                };
                spinner.println(format!("  attempt {} {verdict}", attempt.index));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::EXIT_UNSOLVED;
    use crate::domain::models::{AttemptContext, AttemptLog, TargetLanguage};
    use crate::services::AbortReason;
    use chrono::Utc;
    use uuid::Uuid;

    fn report(outcome: RunOutcome) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            language: TargetLanguage::Python,
            iteration_limit: 3,
            outcome,
            attempts: AttemptLog::new(),
            context: AttemptContext::new(Vec::new()),
            completion_requests: 0,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_finish_maps_outcomes() {
        assert!(finish(&report(RunOutcome::Succeeded { attempt: 1 })).is_ok());

        let err = finish(&report(RunOutcome::Exhausted { iteration_limit: 3 })).unwrap_err();
        assert!(err.downcast_ref::<Unsolved>().is_some());
        assert_eq!(EXIT_UNSOLVED, 2);

        let err = finish(&report(RunOutcome::Aborted(AbortReason::Cancelled))).unwrap_err();
        assert!(err.downcast_ref::<Unsolved>().is_none());
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_report_is_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &report(RunOutcome::Exhausted { iteration_limit: 3 })).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["outcome"]["outcome"], "exhausted");
        assert_eq!(written["iteration_limit"], 3);
    }

    #[test]
    fn test_json_output_flattens_report() {
        let run = report(RunOutcome::Succeeded { attempt: 1 });
        let json = SolveOutput {
            report: &run,
            duration_ms: 5,
        }
        .to_json();
        assert_eq!(json["duration_ms"], 5);
        assert_eq!(json["language"], "python");
    }
}
