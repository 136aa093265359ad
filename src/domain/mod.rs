//! Domain layer for solveloop
//!
//! This module contains the problem, attempt and context models, the error
//! taxonomy, and the ports the synthesis loop depends on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{ProviderError, SynthesisError, SynthesisResult, ValidationError};
