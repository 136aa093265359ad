use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client as ReqwestClient};
use tracing::{debug, instrument};

use super::errors::CompletionApiError;
use super::rate_limiter::TokenBucketRateLimiter;
use super::retry::RetryPolicy;
use super::types::{ChatCompletionRequest, ChatCompletionResponse};
use crate::domain::errors::ProviderError;
use crate::domain::models::CompletionConfig;
use crate::domain::ports::{CompletionClient, CompletionRequest};

/// Longest error body kept in error messages
const MAX_ERROR_BODY_CHARS: usize = 500;

/// HTTP client for OpenAI-compatible chat-completions APIs
///
/// Features:
/// - Connection pooling (via reqwest::Client)
/// - Token bucket rate limiting
/// - Exponential backoff retry for transient errors (429, 5xx, network)
pub struct OpenAiCompletionClient {
    http_client: ReqwestClient,
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_tokens: Option<u32>,
    rate_limiter: TokenBucketRateLimiter,
    retry_policy: RetryPolicy,
}

impl OpenAiCompletionClient {
    /// Build a client from configuration
    ///
    /// A missing API key is not an error here; requests fail with
    /// [`CompletionApiError::MissingApiKey`] instead, so commands that never
    /// call the provider still work.
    pub fn from_config(config: &CompletionConfig) -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            api_key: config.resolved_api_key(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: (config.max_tokens > 0).then_some(config.max_tokens),
            rate_limiter: TokenBucketRateLimiter::new(config.requests_per_second),
            retry_policy: RetryPolicy::new(
                config.max_retries,
                config.initial_backoff_ms,
                config.max_backoff_ms,
            ),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, CompletionApiError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CompletionApiError::MissingApiKey)?;

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .header(header::CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(CompletionApiError::from_status(
                status,
                body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            ));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| {
            CompletionApiError::MalformedResponse(format!(
                "{err}: {}",
                body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>()
            ))
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: self.max_tokens,
        };

        self.rate_limiter.acquire().await;

        let response = self
            .retry_policy
            .execute(|| self.send_request(&body))
            .await?;

        if let Some(usage) = response.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion received"
            );
        }

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| {
                CompletionApiError::MalformedResponse("response contained no choices".to_string())
                    .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = CompletionConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            api_key: "sk-test".to_string(),
            ..CompletionConfig::default()
        };
        let client = OpenAiCompletionClient::from_config(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:1234/v1");
        assert_eq!(client.model(), "gpt-4");
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_without_request() {
        let config = CompletionConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..CompletionConfig::default()
        };
        let client = temp_env::with_var_unset("OPENAI_API_KEY", || {
            OpenAiCompletionClient::from_config(&config).unwrap()
        });

        let err = client
            .complete(CompletionRequest::new(Vec::new(), 0.5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }
}
