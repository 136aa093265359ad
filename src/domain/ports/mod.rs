//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - CompletionClient: text completion from an LLM provider
//! - Sandbox: isolated execution of generated code
//!
//! These traits keep the synthesis loop independent of specific providers
//! and let tests script both sides.

pub mod completion_client;
pub mod sandbox;

pub use completion_client::{CompletionClient, CompletionRequest};
pub use sandbox::Sandbox;
