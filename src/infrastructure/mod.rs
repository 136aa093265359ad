//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - OpenAI-compatible completion client
//! - Process sandbox for generated code
//! - Configuration management
//! - Logging infrastructure
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod llm;
pub mod logging;
pub mod sandbox;
