use std::io;

use thiserror::Error;

use crate::domain::errors::ProviderError;
use crate::domain::models::TargetLanguage;

/// Failures of the sandbox machinery itself (never of the program it runs)
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to create scratch directory: {0}")]
    Scratch(#[source] io::Error),

    #[error("failed to write source file: {0}")]
    WriteSource(#[source] io::Error),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to wait for program: {0}")]
    Wait(#[source] io::Error),

    #[error("failed to read program output: {0}")]
    Capture(#[source] io::Error),

    #[error("runtime '{program}' for {language} not found on PATH")]
    RuntimeMissing {
        program: String,
        language: TargetLanguage,
    },

    #[error("network isolation unavailable: {0}")]
    IsolationUnavailable(String),

    #[error("sandbox is shut down")]
    Closed,
}

impl From<SandboxError> for ProviderError {
    fn from(err: SandboxError) -> Self {
        Self::Sandbox(err.to_string())
    }
}
