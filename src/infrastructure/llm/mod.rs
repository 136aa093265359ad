//! OpenAI-compatible completion provider adapter
//!
//! Implements the `CompletionClient` port over HTTP with rate limiting and
//! transport-level retries.

pub mod client;
pub mod errors;
pub mod rate_limiter;
pub mod retry;
pub mod types;

pub use client::OpenAiCompletionClient;
pub use errors::CompletionApiError;
pub use rate_limiter::TokenBucketRateLimiter;
pub use retry::RetryPolicy;
