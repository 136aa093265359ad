//! solveloop - iterative LLM code synthesis with sandboxed verification
//!
//! Given an algorithmic problem, a function signature and one test case with
//! its expected output, solveloop asks a completion model for a program,
//! runs it in an isolated sandbox, compares what it prints with the expected
//! output and, on a mismatch, sends the failed code and its output back to
//! the model. The loop stops on the first pass, when the iteration limit is
//! reached, or when the provider fails or the run is cancelled.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): problem, attempt and context models, errors, ports
//! - **Service Layer** (`services`): context building, extraction, comparison, the retry controller
//! - **Infrastructure Layer** (`infrastructure`): completion client, process sandbox, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use solveloop::{ProblemSpec, RetryController, SynthesisConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let controller = RetryController::new(completion, sandbox, SynthesisConfig::default());
//! let problem = ProblemSpec::new("Reverse a string", "def reverse(s):", "\"hello\"", "olleh");
//! let report = controller.run(&problem, &CancellationToken::new()).await?;
//! assert!(report.is_success());
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{ProviderError, SynthesisError, ValidationError};
pub use domain::models::{
    Attempt, AttemptContext, AttemptLog, ChatMessage, Config, ExecutionFailure, ExecutionOutcome,
    ProblemSpec, SynthesisConfig, TargetLanguage,
};
pub use domain::ports::{CompletionClient, CompletionRequest, Sandbox};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    extract_code, ContextBuilder, ResultComparator, RetryController, RunOutcome, RunReport,
    RunState, StatementRefiner,
};
