use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::ProviderError;
use crate::domain::models::ChatMessage;

/// A single request to the completion provider.
///
/// The provider keeps no memory between calls, so every request carries the
/// whole rendered history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation to complete, system message first
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature (0.0 to 1.0)
    pub temperature: f32,
}

impl CompletionRequest {
    pub const fn new(messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
        }
    }
}

/// Port trait for the text-completion provider
///
/// This is a **port** in hexagonal architecture terminology: the synthesis
/// loop depends on this trait, and adapters in the infrastructure layer
/// implement it over a concrete HTTP API. Test doubles implement it to
/// script model responses.
///
/// # Error Handling
///
/// Any failure to obtain a response (network, authentication, rate limits
/// that outlast the adapter's own retries, malformed payloads) is reported
/// as a [`ProviderError`]. The retry controller aborts the run on these
/// rather than counting them as wrong answers.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one client is shared by every
/// concurrent run.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Complete the conversation and return the raw response text
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;
}
