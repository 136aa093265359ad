//! `solveloop refine`: one-shot statement refinement.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use super::{build_completion, read_problem_file};
use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::ValidationError;
use crate::domain::models::Config;
use crate::services::StatementRefiner;

#[derive(Args, Debug)]
pub struct RefineArgs {
    /// Statement to refine
    #[arg(required_unless_present = "problem")]
    pub statement: Option<String>,

    /// Take the statement from a problem file instead
    #[arg(short, long, value_name = "FILE", conflicts_with = "statement")]
    pub problem: Option<PathBuf>,

    /// Sampling temperature (defaults to synthesis.temperature)
    #[arg(short, long)]
    pub temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
pub struct RefineOutput {
    pub original: String,
    pub refined: String,
}

impl CommandOutput for RefineOutput {
    fn to_human(&self) -> String {
        self.refined.clone()
    }
}

pub async fn execute(args: RefineArgs, config: &Config, json_mode: bool) -> Result<()> {
    let original = match (&args.statement, &args.problem) {
        (_, Some(path)) => read_problem_file(path)?.statement,
        (Some(statement), None) => statement.clone(),
        (None, None) => String::new(),
    };
    if original.trim().is_empty() {
        return Err(ValidationError::MissingField("statement").into());
    }

    let temperature = args.temperature.unwrap_or(config.synthesis.temperature);
    if !(0.0..=1.0).contains(&temperature) {
        return Err(ValidationError::TemperatureOutOfRange(temperature).into());
    }

    let refiner = StatementRefiner::new(build_completion(config)?, temperature);
    let refined = refiner
        .refine(&original)
        .await
        .context("Failed to refine problem statement")?;
    if refined.is_empty() {
        return Err(ValidationError::EmptyRefinement.into());
    }

    output(&RefineOutput { original, refined }, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_output_is_refined_text() {
        let out = RefineOutput {
            original: "reverse it".to_string(),
            refined: "Given a string s, return s reversed.".to_string(),
        };
        assert_eq!(out.to_human(), "Given a string s, return s reversed.");
        assert_eq!(out.to_json()["original"], "reverse it");
    }
}
