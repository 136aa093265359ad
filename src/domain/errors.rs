//! Domain errors for the solveloop synthesis loop.
//!
//! Two families matter to callers of a run:
//!
//! - [`ValidationError`] is raised before any attempt is consumed. The caller
//!   can recover by supplying the missing input.
//! - [`ProviderError`] means the completion or execution backend failed. The
//!   run is aborted rather than retried, since the cause is infrastructural.
//!
//! Wrong answers from generated code are *not* errors; they are recorded as
//! failed attempts and fed back into the loop.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Input problems detected before a run starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid iteration limit: {0}. Must be between 1 and 10")]
    IterationLimitOutOfRange(u32),

    #[error("Invalid temperature: {0}. Must be between 0.0 and 1.0")]
    TemperatureOutOfRange(f32),

    #[error("Problem statement has already been refined once")]
    AlreadyRefined,

    #[error("Refined statement is empty")]
    EmptyRefinement,
}

/// Failures of the completion provider or the execution sandbox.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum ProviderError {
    #[error("Completion provider error: {0}")]
    Completion(String),

    #[error("Completion provider timed out after {0}s")]
    CompletionTimeout(u64),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Unsupported language for sandbox execution: {0}")]
    UnsupportedLanguage(String),
}

impl ProviderError {
    /// Whether the error came from the completion side (as opposed to the sandbox).
    pub const fn is_completion(&self) -> bool {
        matches!(self, Self::Completion(_) | Self::CompletionTimeout(_))
    }
}

/// Top-level error for operations that can fail either way.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;
