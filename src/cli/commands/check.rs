//! `solveloop check`: run a source file against a test case, no model involved.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use serde::Serialize;

use super::build_sandbox;
use crate::cli::output::{output, CommandOutput};
use crate::cli::Unsolved;
use crate::domain::models::{Config, TargetLanguage};
use crate::services::{verify_source, ResultComparator, Verification};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Source file to run
    pub source: PathBuf,

    /// Output the program must print
    #[arg(short, long)]
    pub expected: String,

    /// Text fed to the program on standard input
    #[arg(long, default_value = "")]
    pub input: String,

    /// Language of the source (defaults to synthesis.language)
    #[arg(short, long)]
    pub language: Option<TargetLanguage>,

    /// Compare outputs case-sensitively
    #[arg(long)]
    pub case_sensitive: bool,
}

#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub source: PathBuf,
    pub expected: String,
    #[serde(flatten)]
    pub verification: Verification,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let verdict = if self.verification.passed {
            style("PASS").green().bold()
        } else {
            style("FAIL").red().bold()
        };

        let mut lines = vec![format!(
            "{verdict} {} ({}, {}ms)",
            self.source.display(),
            self.verification.language,
            self.verification.duration_ms
        )];

        if let Some(stdout) = self.verification.outcome.output() {
            lines.push(format!("Output:\n{}", stdout.trim_end()));
        }
        if let Some(diagnostic) = self.verification.outcome.diagnostic() {
            lines.push(format!("Diagnostic: {diagnostic}"));
        }
        if !self.verification.passed {
            lines.push(format!("Expected:\n{}", self.expected));
        }

        lines.join("\n")
    }
}

pub async fn execute(args: CheckArgs, config: &Config, json_mode: bool) -> Result<()> {
    let source = tokio::fs::read_to_string(&args.source)
        .await
        .with_context(|| format!("Failed to read source file: {}", args.source.display()))?;
    let language = args.language.unwrap_or(config.synthesis.language);
    let comparator = ResultComparator::new(args.case_sensitive || config.synthesis.case_sensitive);
    let sandbox = build_sandbox(config);

    let verification = verify_source(
        sandbox.as_ref(),
        comparator,
        &source,
        &args.input,
        &args.expected,
        language,
    )
    .await
    .context("Sandbox could not run the program")?;

    let passed = verification.passed;
    output(
        &CheckOutput {
            source: args.source,
            expected: args.expected,
            verification,
        },
        json_mode,
    );

    if passed {
        Ok(())
    } else {
        Err(Unsolved("program output did not match the expected output".to_string()).into())
    }
}
