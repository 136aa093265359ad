//! RetryController - the synthesis-verification state machine
//!
//! Drives one run from a validated problem to a terminal outcome:
//!
//! ```text
//! Idle -> Building -> Requesting -> Extracting -> Executing -> Comparing
//!            ^                                                    |
//!            +------------------ Retrying <-----------------------+
//!                                                                 |
//!                              Succeeded | Exhausted | Aborted <--+
//! ```
//!
//! Each state is a variant of an explicit step enum carrying the data it
//! needs, and the run loop is a trampoline over it. Wrong answers move to
//! `Retrying` until the iteration limit; provider failures and cancellation
//! move straight to `Aborted`. The attempt log and stored context survive
//! every terminal state and are returned in the [`RunReport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::domain::errors::{ProviderError, ValidationError};
use crate::domain::models::{
    Attempt, AttemptContext, AttemptLog, ChatMessage, ExecutionOutcome, ProblemSpec,
    SynthesisConfig, TargetLanguage, MAX_ITERATION_LIMIT, MIN_ITERATION_LIMIT,
};
use crate::domain::ports::{CompletionClient, CompletionRequest, Sandbox};
use crate::services::code_extractor::extract_code;
use crate::services::context_builder::ContextBuilder;
use crate::services::context_policy::ContextPolicy;
use crate::services::result_comparator::ResultComparator;

/// Observable state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Building,
    Requesting,
    Extracting,
    Executing,
    Comparing,
    Retrying,
    Succeeded,
    Exhausted,
    Aborted,
}

impl RunState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Building => "building",
            Self::Requesting => "requesting",
            Self::Extracting => "extracting",
            Self::Executing => "executing",
            Self::Comparing => "comparing",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
            Self::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run stopped before converging or exhausting its attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortReason {
    Cancelled,
    Provider { error: ProviderError },
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::Provider { error } => write!(f, "{error}"),
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The attempt at `attempt` produced the expected output
    Succeeded { attempt: u32 },
    /// Every allowed attempt failed
    Exhausted { iteration_limit: u32 },
    /// Stopped by cancellation or a provider failure
    Aborted(AbortReason),
}

impl RunOutcome {
    pub const fn state(&self) -> RunState {
        match self {
            Self::Succeeded { .. } => RunState::Succeeded,
            Self::Exhausted { .. } => RunState::Exhausted,
            Self::Aborted(_) => RunState::Aborted,
        }
    }
}

/// Everything a caller gets back from a run, whatever the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub language: TargetLanguage,
    pub iteration_limit: u32,
    pub outcome: RunOutcome,
    pub attempts: AttemptLog,
    pub context: AttemptContext,
    pub completion_requests: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Succeeded { .. })
    }

    /// The attempt whose output matched, if any.
    pub fn passing_attempt(&self) -> Option<&Attempt> {
        match self.outcome {
            RunOutcome::Succeeded { attempt } => self.attempts.get(attempt),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        u64::try_from((self.finished_at - self.started_at).num_milliseconds()).unwrap_or(0)
    }
}

/// Progress notifications for observers such as the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    StateEntered {
        run_id: Uuid,
        state: RunState,
        attempt: u32,
    },
    AttemptRecorded {
        run_id: Uuid,
        attempt: Attempt,
    },
}

/// One state plus the data it works on.
enum Step {
    Building,
    Requesting(Vec<ChatMessage>),
    Extracting(String),
    Executing(String),
    Comparing {
        source: String,
        outcome: ExecutionOutcome,
    },
    Retrying,
    Done(RunOutcome),
}

impl Step {
    const fn state(&self) -> RunState {
        match self {
            Self::Building => RunState::Building,
            Self::Requesting(_) => RunState::Requesting,
            Self::Extracting(_) => RunState::Extracting,
            Self::Executing(_) => RunState::Executing,
            Self::Comparing { .. } => RunState::Comparing,
            Self::Retrying => RunState::Retrying,
            Self::Done(outcome) => outcome.state(),
        }
    }
}

/// Per-attempt timing, reset when a new attempt starts building.
struct AttemptClock {
    started_at: DateTime<Utc>,
    started: Instant,
}

impl AttemptClock {
    fn start() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

enum Interrupted {
    Cancelled,
    Provider(ProviderError),
}

/// Runs the generate-execute-compare loop for one problem at a time.
///
/// The controller holds no per-run state, so one instance can serve many
/// concurrent runs.
pub struct RetryController {
    completion: Arc<dyn CompletionClient>,
    sandbox: Arc<dyn Sandbox>,
    settings: SynthesisConfig,
    builder: ContextBuilder,
    comparator: ResultComparator,
    policy: ContextPolicy,
    events: Option<mpsc::Sender<RunEvent>>,
}

impl RetryController {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        sandbox: Arc<dyn Sandbox>,
        settings: SynthesisConfig,
    ) -> Self {
        let builder = ContextBuilder::new(settings.language, settings.context.max_section_chars);
        let comparator = ResultComparator::new(settings.case_sensitive);
        let policy = ContextPolicy::from(&settings.context);

        Self {
            completion,
            sandbox,
            settings,
            builder,
            comparator,
            policy,
            events: None,
        }
    }

    /// Publish state changes and recorded attempts to `events`.
    #[must_use]
    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Check run inputs without consuming an attempt.
    pub fn validate(&self, problem: &ProblemSpec) -> Result<(), ValidationError> {
        problem.validate()?;

        let limit = self.settings.iteration_limit;
        if !(MIN_ITERATION_LIMIT..=MAX_ITERATION_LIMIT).contains(&limit) {
            return Err(ValidationError::IterationLimitOutOfRange(limit));
        }

        let temperature = self.settings.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ValidationError::TemperatureOutOfRange(temperature));
        }

        Ok(())
    }

    /// Run the loop to a terminal state.
    ///
    /// Returns `Err` only for invalid input, before any attempt is made.
    /// Success, exhaustion, provider failures and cancellation all come back
    /// as a [`RunReport`] carrying the attempt log.
    pub async fn run(
        &self,
        problem: &ProblemSpec,
        cancel: &CancellationToken,
    ) -> Result<RunReport, ValidationError> {
        self.validate(problem)?;

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "synthesis_run",
            %run_id,
            language = %self.settings.language,
            iteration_limit = self.settings.iteration_limit,
        );

        Ok(self.drive(run_id, problem, cancel).instrument(span).await)
    }

    async fn drive(
        &self,
        run_id: Uuid,
        problem: &ProblemSpec,
        cancel: &CancellationToken,
    ) -> RunReport {
        let started_at = Utc::now();
        let limit = self.settings.iteration_limit;
        let mut context = self.builder.initial_context(problem);
        let mut log = AttemptLog::new();
        let mut clock = AttemptClock::start();
        let mut completion_requests = 0_u32;

        info!("synthesis run started");
        self.emit_state(run_id, RunState::Idle, 0);

        let mut step = Step::Building;
        let outcome = loop {
            let state = step.state();
            let attempt = log.next_index();
            debug!(%state, attempt, "entering state");
            self.emit_state(run_id, state, attempt);

            step = match step {
                Step::Building => {
                    if cancel.is_cancelled() {
                        Step::Done(RunOutcome::Aborted(AbortReason::Cancelled))
                    } else {
                        clock = AttemptClock::start();
                        Step::Requesting(self.policy.render(&context, &log))
                    }
                }

                Step::Requesting(messages) => {
                    completion_requests += 1;
                    match self.request_completion(messages, cancel).await {
                        Ok(text) => Step::Extracting(text),
                        Err(Interrupted::Cancelled) => {
                            Step::Done(RunOutcome::Aborted(AbortReason::Cancelled))
                        }
                        Err(Interrupted::Provider(error)) => {
                            warn!(attempt, error = %error, "completion provider failed");
                            Step::Done(RunOutcome::Aborted(AbortReason::Provider { error }))
                        }
                    }
                }

                Step::Extracting(text) => Step::Executing(extract_code(&text)),

                Step::Executing(source) => {
                    match self
                        .sandbox
                        .execute(&source, &problem.primary_test_case, self.settings.language)
                        .await
                    {
                        Ok(outcome) => Step::Comparing { source, outcome },
                        Err(error) => {
                            warn!(attempt, error = %error, "sandbox failed");
                            Step::Done(RunOutcome::Aborted(AbortReason::Provider { error }))
                        }
                    }
                }

                Step::Comparing { source, outcome } => {
                    let passed = outcome
                        .output()
                        .is_some_and(|output| self.comparator.matches(output, &problem.expected_output));
                    let recorded = log
                        .record(source, &outcome, passed, clock.started_at, clock.elapsed_ms())
                        .clone();

                    info!(
                        attempt = recorded.index,
                        passed,
                        duration_ms = recorded.duration_ms,
                        "attempt recorded"
                    );
                    self.emit(RunEvent::AttemptRecorded {
                        run_id,
                        attempt: recorded.clone(),
                    });

                    if passed {
                        Step::Done(RunOutcome::Succeeded {
                            attempt: recorded.index,
                        })
                    } else if recorded.index >= limit {
                        Step::Done(RunOutcome::Exhausted {
                            iteration_limit: limit,
                        })
                    } else {
                        context.push_feedback(self.builder.feedback_message(problem, &recorded));
                        Step::Retrying
                    }
                }

                Step::Retrying => Step::Building,

                Step::Done(outcome) => break outcome,
            };
        };

        match &outcome {
            RunOutcome::Succeeded { attempt } => info!(attempt, "run succeeded"),
            RunOutcome::Exhausted { iteration_limit } => {
                info!(iteration_limit, "run exhausted its attempts");
            }
            RunOutcome::Aborted(reason) => warn!(reason = %reason, attempts = log.len(), "run aborted"),
        }

        RunReport {
            run_id,
            language: self.settings.language,
            iteration_limit: limit,
            outcome,
            attempts: log,
            context,
            completion_requests,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn request_completion(
        &self,
        messages: Vec<ChatMessage>,
        cancel: &CancellationToken,
    ) -> Result<String, Interrupted> {
        let request = CompletionRequest::new(messages, self.settings.temperature);
        let deadline = Duration::from_secs(self.settings.completion_timeout_secs);

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Interrupted::Cancelled),
            result = timeout(deadline, self.completion.complete(request)) => match result {
                Ok(Ok(text)) => Ok(text),
                Ok(Err(error)) => Err(Interrupted::Provider(error)),
                Err(_) => Err(Interrupted::Provider(ProviderError::CompletionTimeout(
                    self.settings.completion_timeout_secs,
                ))),
            },
        }
    }

    fn emit_state(&self, run_id: Uuid, state: RunState, attempt: u32) {
        self.emit(RunEvent::StateEntered {
            run_id,
            state,
            attempt,
        });
    }

    /// Never waits on the observer; a full channel drops the event.
    fn emit(&self, event: RunEvent) {
        let Some(events) = &self.events else {
            return;
        };

        match events.try_send(event) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(?event, "event channel full, dropping event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ExecutionFailure;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedCompletion {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Completion("script exhausted".into())))
        }
    }

    /// Runs nothing; "executes" by echoing the text after `print:`.
    struct EchoSandbox;

    #[async_trait]
    impl Sandbox for EchoSandbox {
        async fn execute(
            &self,
            source: &str,
            _test_input: &str,
            _language: TargetLanguage,
        ) -> Result<ExecutionOutcome, ProviderError> {
            Ok(match source.trim().strip_prefix("print:") {
                Some(text) => ExecutionOutcome::completed(format!("{text}\n")),
                None => ExecutionOutcome::failed(ExecutionFailure::NonZeroExit { code: 1 }, "boom"),
            })
        }

        async fn health_check(&self, _language: TargetLanguage) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn problem() -> ProblemSpec {
        ProblemSpec::new("Reverse a string", "def reverse(s)", "\"hello\"", "olleh")
    }

    fn controller(completion: Arc<ScriptedCompletion>, limit: u32) -> RetryController {
        RetryController::new(
            completion,
            Arc::new(EchoSandbox),
            SynthesisConfig {
                iteration_limit: limit,
                ..SynthesisConfig::default()
            },
        )
    }

    fn reply(body: &str) -> Result<String, ProviderError> {
        Ok(format!("```python\n{body}\n```"))
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let completion = ScriptedCompletion::new(vec![reply("print:OLLEH")]);
        let report = controller(completion.clone(), 5)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded { attempt: 1 });
        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.completion_requests, 1);
        assert!(report.context.feedback().is_empty());
        assert_eq!(completion.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_request_carries_feedback() {
        let completion =
            ScriptedCompletion::new(vec![reply("print:hello"), reply("print:olleh")]);
        let report = controller(completion.clone(), 5)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Succeeded { attempt: 2 });
        let requests = completion.requests.lock().unwrap();
        assert_eq!(requests[1].messages.len(), requests[0].messages.len() + 1);
        let feedback = &requests[1].messages.last().unwrap().content;
        assert!(feedback.contains("print:hello"));
        assert!(feedback.contains("olleh"));
    }

    #[tokio::test]
    async fn test_exhaustion_stops_at_limit() {
        let completion = ScriptedCompletion::new(vec![
            reply("print:a"),
            reply("crash"),
            reply("print:c"),
            reply("print:olleh"),
        ]);
        let report = controller(completion.clone(), 3)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Exhausted { iteration_limit: 3 });
        assert_eq!(report.attempts.len(), 3);
        assert!(report.attempts.iter().all(|attempt| !attempt.passed));
        assert_eq!(report.context.feedback().len(), 2);
        assert_eq!(completion.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_with_partial_log() {
        let completion = ScriptedCompletion::new(vec![
            reply("print:nope"),
            Err(ProviderError::Completion("503 Service Unavailable".into())),
        ]);
        let report = controller(completion, 5)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            report.outcome,
            RunOutcome::Aborted(AbortReason::Provider { .. })
        ));
        assert_eq!(report.attempts.len(), 1);
    }

    #[tokio::test]
    async fn test_validation_error_consumes_nothing() {
        let completion = ScriptedCompletion::new(vec![reply("print:olleh")]);
        let mut incomplete = problem();
        incomplete.function_signature = "   ".to_string();

        let err = controller(completion.clone(), 5)
            .run(&incomplete, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::MissingField("function_signature"));
        assert!(completion.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_limit_is_rejected() {
        let completion = ScriptedCompletion::new(vec![]);
        let err = controller(completion, 11)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ValidationError::IterationLimitOutOfRange(11));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_request() {
        let completion = ScriptedCompletion::new(vec![reply("print:olleh")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = controller(completion.clone(), 5)
            .run(&problem(), &cancel)
            .await
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Aborted(AbortReason::Cancelled));
        assert!(report.attempts.is_empty());
        assert!(completion.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_trace_the_state_machine() {
        let completion =
            ScriptedCompletion::new(vec![reply("print:x"), reply("print:olleh")]);
        let (tx, mut rx) = mpsc::channel(64);
        let report = controller(completion, 5)
            .with_events(tx)
            .run(&problem(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(report.is_success());

        let mut states = Vec::new();
        let mut recorded = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::StateEntered { state, .. } => states.push(state),
                RunEvent::AttemptRecorded { .. } => recorded += 1,
            }
        }

        use RunState::*;
        assert_eq!(
            states,
            vec![
                Idle, Building, Requesting, Extracting, Executing, Comparing, Retrying,
                Building, Requesting, Extracting, Executing, Comparing, Succeeded,
            ]
        );
        assert_eq!(recorded, 2);
    }

    #[test]
    fn test_report_serializes_outcome_tag() {
        let outcome = RunOutcome::Aborted(AbortReason::Provider {
            error: ProviderError::Sandbox("no scratch space".into()),
        });
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "aborted");
        assert_eq!(json["reason"], "provider");
    }
}
