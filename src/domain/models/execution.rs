use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a sandboxed program did not produce a usable result.
///
/// These are properties of the generated code, so they feed the normal
/// fail-and-retry path instead of aborting the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionFailure {
    /// Wall-clock limit exceeded; the process group was killed
    Timeout { limit_ms: u64 },
    /// Exited with a non-zero status
    NonZeroExit { code: i32 },
    /// Terminated by a signal (no exit code)
    Killed,
}

impl fmt::Display for ExecutionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { limit_ms } => write!(f, "timed out after {limit_ms}ms"),
            Self::NonZeroExit { code } => write!(f, "exited with status {code}"),
            Self::Killed => f.write_str("terminated by signal"),
        }
    }
}

/// Result of running one program in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The program exited cleanly; `stdout` is what it printed
    Completed {
        stdout: String,
        #[serde(default)]
        truncated: bool,
    },
    /// The program crashed, timed out or was killed
    Failed {
        failure: ExecutionFailure,
        diagnostic: String,
    },
}

impl ExecutionOutcome {
    pub fn completed(stdout: impl Into<String>) -> Self {
        Self::Completed {
            stdout: stdout.into(),
            truncated: false,
        }
    }

    pub fn failed(failure: ExecutionFailure, diagnostic: impl Into<String>) -> Self {
        Self::Failed {
            failure,
            diagnostic: diagnostic.into(),
        }
    }

    /// Captured standard output, if the program completed.
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Completed { stdout, .. } => Some(stdout),
            Self::Failed { .. } => None,
        }
    }

    /// Human-readable failure description, if the program failed.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Completed { truncated: true, .. } => {
                Some("output exceeded the capture limit and was truncated".to_string())
            }
            Self::Completed { .. } => None,
            Self::Failed {
                failure,
                diagnostic,
            } => {
                if diagnostic.trim().is_empty() {
                    Some(failure.to_string())
                } else {
                    Some(format!("{failure}: {}", diagnostic.trim()))
                }
            }
        }
    }

    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
