pub mod attempt;
pub mod config;
pub mod context;
pub mod execution;
pub mod language;
pub mod problem;

pub use attempt::{Attempt, AttemptLog};
pub use config::{
    CompletionConfig, Config, ContextPolicyConfig, FilesystemIsolation, LoggingConfig,
    NetworkIsolation, RuntimeConfig, SandboxConfig, SynthesisConfig, MAX_ITERATION_LIMIT,
    MIN_ITERATION_LIMIT,
};
pub use context::{AttemptContext, ChatMessage, Role};
pub use execution::{ExecutionFailure, ExecutionOutcome};
pub use language::TargetLanguage;
pub use problem::ProblemSpec;
