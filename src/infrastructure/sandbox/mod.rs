//! Sandbox executor adapters
//!
//! Implements the `Sandbox` port by running generated programs as isolated
//! child processes.

pub mod errors;
pub mod process;

pub use errors::SandboxError;
pub use process::ProcessSandbox;
