//! `solveloop batch`: solve several problems from one file concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::solve::write_report;
use super::{build_completion, build_sandbox, cancel_on_ctrl_c, SynthesisOverrides};
use crate::cli::output::table::{describe_outcome, BatchRow};
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::Unsolved;
use crate::domain::models::{Config, ProblemSpec};
use crate::services::{RetryController, RunReport, RunState};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// YAML or JSON file with a `problems` list
    pub file: PathBuf,

    /// Problems solved at the same time
    #[arg(short = 'n', long, default_value_t = 2)]
    pub concurrency: usize,

    #[command(flatten)]
    pub overrides: SynthesisOverrides,

    /// Directory to write one JSON run report per problem into
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,
}

/// Contents of a batch file
#[derive(Debug, Deserialize)]
pub struct BatchFile {
    pub problems: Vec<NamedProblem>,
}

#[derive(Debug, Deserialize)]
pub struct NamedProblem {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub problem: ProblemSpec,
}

#[derive(Debug, Serialize)]
pub struct BatchEntry {
    pub name: String,
    pub state: RunState,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
}

#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub total: usize,
    pub solved: usize,
    pub results: Vec<BatchEntry>,
}

impl CommandOutput for BatchOutput {
    fn to_human(&self) -> String {
        let rows: Vec<BatchRow<'_>> = self
            .results
            .iter()
            .map(|entry| BatchRow {
                name: &entry.name,
                state: entry.state,
                attempts: entry.report.as_ref().map_or(0, |r| r.attempts.len()),
                detail: entry.detail.clone(),
            })
            .collect();

        format!(
            "{}\nSolved {} of {} problem(s)",
            TableFormatter::new().format_batch(&rows),
            self.solved,
            self.total
        )
    }
}

pub fn read_batch_file(path: &Path) -> Result<Vec<(String, ProblemSpec)>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    let file: BatchFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse batch file: {}", path.display()))?;

    Ok(file
        .problems
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let name = entry.name.unwrap_or_else(|| format!("problem-{}", i + 1));
            (name, entry.problem)
        })
        .collect())
}

pub async fn execute(args: BatchArgs, config: &Config, json_mode: bool) -> Result<()> {
    let problems = read_batch_file(&args.file)?;
    if problems.is_empty() {
        anyhow::bail!("Batch file {} contains no problems", args.file.display());
    }
    if let Some(dir) = &args.report_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;
    }

    let settings = args.overrides.apply(&config.synthesis);
    let controller = Arc::new(RetryController::new(
        build_completion(config)?,
        build_sandbox(config),
        settings,
    ));

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let permits = Arc::new(Semaphore::new(args.concurrency.max(1)));
    let mut runs = JoinSet::new();

    info!(problems = problems.len(), concurrency = args.concurrency, "starting batch");

    for (position, (name, problem)) in problems.into_iter().enumerate() {
        let controller = Arc::clone(&controller);
        let permits = Arc::clone(&permits);
        let cancel = cancel.clone();

        runs.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result = controller.run(&problem, &cancel).await;
            (position, name, result)
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = runs.join_next().await {
        match joined {
            Ok(entry) => results.push(entry),
            Err(err) => warn!(error = %err, "batch run task failed"),
        }
    }
    interrupt.abort();
    results.sort_by_key(|(position, _, _)| *position);

    let mut entries = Vec::with_capacity(results.len());
    for (_, name, result) in results {
        let entry = match result {
            Ok(report) => {
                if let Some(dir) = &args.report_dir {
                    write_report(&dir.join(format!("{name}.json")), &report)?;
                }
                BatchEntry {
                    name,
                    state: report.outcome.state(),
                    detail: describe_outcome(&report.outcome),
                    report: Some(report),
                }
            }
            Err(err) => BatchEntry {
                name,
                state: RunState::Aborted,
                detail: format!("invalid problem: {err}"),
                report: None,
            },
        };
        entries.push(entry);
    }

    let solved = entries
        .iter()
        .filter(|entry| entry.state == RunState::Succeeded)
        .count();
    let summary = BatchOutput {
        total: entries.len(),
        solved,
        results: entries,
    };
    output(&summary, json_mode);

    if summary.solved == summary.total {
        Ok(())
    } else {
        Err(Unsolved(format!(
            "{} of {} problem(s) unsolved",
            summary.total - summary.solved,
            summary.total
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_batch_file_names_default_to_position() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"problems:
  - name: reverse
    statement: Reverse a string
    function_signature: "def reverse(s):"
    primary_test_case: '"hello"'
    expected_output: olleh
  - statement: Add two numbers
    function_signature: "def add(a, b):"
    primary_test_case: "2, 3"
    expected_output: "5"
    secondary_test_case: "1, 1"
    secondary_expected_output: "2"
"#
        )
        .unwrap();

        let problems = read_batch_file(file.path()).unwrap();
        assert_eq!(problems.len(), 2);
        assert_eq!(problems[0].0, "reverse");
        assert_eq!(problems[1].0, "problem-2");
        assert_eq!(problems[1].1.expected_output, "5");
        assert_eq!(problems[1].1.secondary_expected_output.as_deref(), Some("2"));
    }

    #[test]
    fn test_missing_problems_key_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "items: []").unwrap();
        assert!(read_batch_file(file.path()).is_err());
    }
}
