//! Running a known program against a test case without the completion loop.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::errors::ProviderError;
use crate::domain::models::{ExecutionOutcome, TargetLanguage};
use crate::domain::ports::Sandbox;
use crate::services::result_comparator::ResultComparator;

/// Result of executing and judging one program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub language: TargetLanguage,
    pub outcome: ExecutionOutcome,
    pub passed: bool,
    pub duration_ms: u64,
}

/// Execute `source` on `test_input` and compare its output to `expected`.
pub async fn verify_source(
    sandbox: &dyn Sandbox,
    comparator: ResultComparator,
    source: &str,
    test_input: &str,
    expected: &str,
    language: TargetLanguage,
) -> Result<Verification, ProviderError> {
    let started = std::time::Instant::now();
    let outcome = sandbox.execute(source, test_input, language).await?;
    let passed = outcome
        .output()
        .is_some_and(|output| comparator.matches(output, expected));
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    info!(%language, passed, duration_ms, "verified source");

    Ok(Verification {
        language,
        outcome,
        passed,
        duration_ms,
    })
}
