use async_trait::async_trait;

use crate::domain::errors::ProviderError;
use crate::domain::models::{ExecutionOutcome, TargetLanguage};

/// Port trait for isolated execution of untrusted generated code
///
/// Implementations run `source` as a program in `language`, feed
/// `test_input` on standard input and capture standard output.
///
/// # Contract
///
/// - A crash, non-zero exit or timeout of the *program* is returned as
///   `Ok(ExecutionOutcome::Failed { .. })`; it is a property of the
///   generated code.
/// - `Err(ProviderError)` is reserved for the sandbox itself being unable to
///   run anything (no scratch space, interpreter missing, isolation
///   unavailable).
/// - Every execution gets its own scratch area and process; nothing is
///   shared between concurrent executions.
/// - All side effects are torn down before the call returns, and also when
///   the returned future is dropped mid-execution.
/// - Executions are bounded by a wall-clock timeout and never hang.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Run `source` against `test_input`
    async fn execute(
        &self,
        source: &str,
        test_input: &str,
        language: TargetLanguage,
    ) -> Result<ExecutionOutcome, ProviderError>;

    /// Check that programs in `language` can be launched at all
    async fn health_check(&self, language: TargetLanguage) -> Result<(), ProviderError>;
}
