//! CLI command implementations.

pub mod batch;
pub mod check;
pub mod config;
pub mod refine;
pub mod solve;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::models::{Config, ProblemSpec, SynthesisConfig, TargetLanguage};
use crate::domain::ports::{CompletionClient, Sandbox};
use crate::infrastructure::llm::OpenAiCompletionClient;
use crate::infrastructure::sandbox::ProcessSandbox;

/// Where the problem comes from: a file or individual flags
#[derive(Args, Debug, Clone, Default)]
pub struct ProblemArgs {
    /// Problem file (YAML or JSON) with statement, function_signature,
    /// primary_test_case and expected_output
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["statement", "signature", "test_case", "expected"])]
    pub problem: Option<PathBuf>,

    /// Problem statement
    #[arg(long)]
    pub statement: Option<String>,

    /// Function signature the solution must implement
    #[arg(long)]
    pub signature: Option<String>,

    /// Test case the driver code must hardcode
    #[arg(long = "test-case")]
    pub test_case: Option<String>,

    /// Output the program must print
    #[arg(long)]
    pub expected: Option<String>,
}

impl ProblemArgs {
    /// Build the problem; fields left out become empty and fail validation later
    pub fn load(&self) -> Result<ProblemSpec> {
        if let Some(path) = &self.problem {
            return read_problem_file(path);
        }

        Ok(ProblemSpec::new(
            self.statement.clone().unwrap_or_default(),
            self.signature.clone().unwrap_or_default(),
            self.test_case.clone().unwrap_or_default(),
            self.expected.clone().unwrap_or_default(),
        ))
    }
}

/// Per-invocation overrides of the `synthesis` config section
#[derive(Args, Debug, Clone, Default)]
pub struct SynthesisOverrides {
    /// Maximum attempts (1-10)
    #[arg(short, long)]
    pub iterations: Option<u32>,

    /// Sampling temperature (0.0-1.0)
    #[arg(short, long)]
    pub temperature: Option<f32>,

    /// Language to solve in (python, cpp, javascript, java)
    #[arg(short, long)]
    pub language: Option<TargetLanguage>,
}

impl SynthesisOverrides {
    pub fn apply(&self, settings: &SynthesisConfig) -> SynthesisConfig {
        let mut settings = settings.clone();
        if let Some(iterations) = self.iterations {
            settings.iteration_limit = iterations;
        }
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        if let Some(language) = self.language {
            settings.language = language;
        }
        settings
    }
}

/// Parse a single problem from YAML (JSON is accepted as a YAML subset)
pub fn read_problem_file(path: &Path) -> Result<ProblemSpec> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read problem file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse problem file: {}", path.display()))
}

pub fn build_completion(config: &Config) -> Result<Arc<dyn CompletionClient>> {
    let client = OpenAiCompletionClient::from_config(&config.completion)
        .context("Failed to create completion client")?;
    Ok(Arc::new(client))
}

pub fn build_sandbox(config: &Config) -> Arc<dyn Sandbox> {
    Arc::new(ProcessSandbox::new(config.sandbox.clone()))
}

/// Cancel `token` on the first Ctrl-C
///
/// The returned handle should be aborted once the guarded work is done.
pub fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, cancelling");
                token.cancel();
            }
            Err(err) => warn!(error = %err, "could not listen for Ctrl-C"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_build_problem() {
        let args = ProblemArgs {
            statement: Some("Reverse a string".to_string()),
            signature: Some("def reverse(s):".to_string()),
            test_case: Some("\"hello\"".to_string()),
            expected: Some("olleh".to_string()),
            ..ProblemArgs::default()
        };
        let problem = args.load().unwrap();
        assert_eq!(problem.statement, "Reverse a string");
        assert!(problem.validate().is_ok());
    }

    #[test]
    fn test_missing_flag_fails_validation_not_loading() {
        let args = ProblemArgs {
            statement: Some("Reverse a string".to_string()),
            ..ProblemArgs::default()
        };
        let problem = args.load().unwrap();
        assert!(problem.validate().is_err());
    }

    #[test]
    fn test_problem_file_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "statement: Reverse a string\nfunction_signature: \"def reverse(s):\"\nprimary_test_case: '\"hello\"'\nexpected_output: olleh\n"
        )
        .unwrap();

        let args = ProblemArgs {
            problem: Some(file.path().to_path_buf()),
            ..ProblemArgs::default()
        };
        let problem = args.load().unwrap();
        assert_eq!(problem.function_signature, "def reverse(s):");
        assert_eq!(problem.primary_test_case, "\"hello\"");
        assert_eq!(problem.expected_output, "olleh");
    }

    #[test]
    fn test_overrides_leave_unset_fields() {
        let base = SynthesisConfig::default();
        let overrides = SynthesisOverrides {
            iterations: Some(7),
            ..SynthesisOverrides::default()
        };
        let applied = overrides.apply(&base);
        assert_eq!(applied.iteration_limit, 7);
        assert!((applied.temperature - base.temperature).abs() < f32::EPSILON);
        assert_eq!(applied.language, base.language);
    }
}
