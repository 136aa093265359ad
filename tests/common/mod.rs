//! Common test utilities for integration tests
//!
//! Scripted doubles for both ports plus problem and settings fixtures.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use solveloop::domain::errors::ProviderError;
use solveloop::domain::models::{
    ExecutionFailure, ExecutionOutcome, ProblemSpec, SynthesisConfig, TargetLanguage,
};
use solveloop::domain::ports::{CompletionClient, CompletionRequest, Sandbox};

/// Completion client that replays a fixed script of replies
///
/// Every request is recorded so tests can inspect the rendered context.
/// When the script runs out, the last reply is repeated.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    last: Mutex<Option<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    delay: Option<Duration>,
}

impl ScriptedCompletion {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ProviderError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Replies that are all successful responses
    pub fn replying(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok((*r).to_string())))
    }

    /// Wait `delay` before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last
                .clone()
                .unwrap_or_else(|| Err(ProviderError::Completion("script exhausted".to_string()))),
        }
    }
}

/// Sandbox that interprets a tiny command language instead of running code
///
/// - `print:<text>` completes with `<text>` on stdout
/// - `timeout` fails with a timeout
/// - `crash:<message>` exits with status 1 and `<message>` on stderr
/// - `sandbox-down` makes the sandbox itself fail
/// - anything else completes with empty output
#[derive(Default)]
pub struct ScriptedSandbox {
    executions: Mutex<Vec<(String, String)>>,
}

impl ScriptedSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sources executed so far with the test input they received
    pub fn executions(&self) -> Vec<(String, String)> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sandbox for ScriptedSandbox {
    async fn execute(
        &self,
        source: &str,
        test_input: &str,
        _language: TargetLanguage,
    ) -> Result<ExecutionOutcome, ProviderError> {
        self.executions
            .lock()
            .unwrap()
            .push((source.to_string(), test_input.to_string()));

        let source = source.trim();
        if let Some(text) = source.strip_prefix("print:") {
            return Ok(ExecutionOutcome::completed(format!("{text}\n")));
        }
        if let Some(message) = source.strip_prefix("crash:") {
            return Ok(ExecutionOutcome::failed(
                ExecutionFailure::NonZeroExit { code: 1 },
                message,
            ));
        }
        match source {
            "timeout" => Ok(ExecutionOutcome::failed(
                ExecutionFailure::Timeout { limit_ms: 10_000 },
                "",
            )),
            "sandbox-down" => Err(ProviderError::Sandbox("no scratch space".to_string())),
            _ => Ok(ExecutionOutcome::completed("")),
        }
    }

    async fn health_check(&self, _language: TargetLanguage) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// Wrap `body` in a Python fence the way models usually answer
pub fn fenced(body: &str) -> String {
    format!("Here is the solution:\n```python\n{body}\n```\nIt prints the answer.")
}

pub fn reverse_problem() -> ProblemSpec {
    ProblemSpec::new("reverse a string", "def reverse(s):", "hello", "olleh")
}

pub fn settings(iteration_limit: u32) -> SynthesisConfig {
    SynthesisConfig {
        iteration_limit,
        ..SynthesisConfig::default()
    }
}

/// Initializes a tracing subscriber for test output
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
