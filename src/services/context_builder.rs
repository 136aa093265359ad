//! Construction of the messages sent to the completion provider.
//!
//! The base messages frame the task once per run. After every failed
//! attempt that will be followed by another one, a feedback message carrying
//! the attempt's source, the expected output and what actually happened is
//! appended.

use crate::domain::models::{
    Attempt, AttemptContext, AttemptLog, ChatMessage, ProblemSpec, TargetLanguage,
};
use crate::services::context_truncation::truncate_section;

const SOLVER_FRAME: &str = "You're an AI with proficiency in Data Structures and Algorithms. \
Your task is to write a function with driver code that solves the following problem:";

/// Builds base and feedback messages for one target language.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    language: TargetLanguage,
    max_section_chars: usize,
}

impl ContextBuilder {
    pub const fn new(language: TargetLanguage, max_section_chars: usize) -> Self {
        Self {
            language,
            max_section_chars,
        }
    }

    /// Fresh context holding only the base messages for `problem`.
    pub fn initial_context(&self, problem: &ProblemSpec) -> AttemptContext {
        AttemptContext::new(self.base_messages(problem))
    }

    /// Full context for a problem given the attempts made so far.
    ///
    /// Produces one feedback message per failed attempt, in attempt order.
    /// Building incrementally with [`Self::initial_context`] and
    /// [`Self::feedback_message`] yields the same result.
    pub fn build(&self, problem: &ProblemSpec, log: &AttemptLog) -> AttemptContext {
        let mut context = self.initial_context(problem);
        for attempt in log.failures() {
            context.push_feedback(self.feedback_message(problem, attempt));
        }
        context
    }

    pub fn base_messages(&self, problem: &ProblemSpec) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SOLVER_FRAME),
            ChatMessage::user(problem.statement.trim()),
            ChatMessage::user(format!(
                "The function signature: {}",
                problem.function_signature.trim()
            )),
            ChatMessage::user(format!(
                "The driver code must hardcode this test case as its only input: {}\n\
                 It must print exactly this output: {}",
                problem.primary_test_case.trim(),
                problem.expected_output.trim()
            )),
            ChatMessage::user(self.delivery_request()),
        ]
    }

    /// Corrective message for a failed attempt.
    pub fn feedback_message(&self, problem: &ProblemSpec, attempt: &Attempt) -> ChatMessage {
        let tag = self.language.fence_tags().first().copied().unwrap_or_default();
        let source = truncate_section(attempt.source_code.trim_end(), self.max_section_chars);

        let observed = match (&attempt.execution_output, &attempt.diagnostic) {
            (Some(output), diagnostic) => {
                let output = truncate_section(output.trim_end(), self.max_section_chars);
                let mut text = format!("Actual output:\n{output}");
                if let Some(note) = diagnostic {
                    text.push_str(&format!("\nNote: {note}"));
                }
                text
            }
            (None, Some(diagnostic)) => format!(
                "The program did not produce a usable output: {}",
                truncate_section(diagnostic, self.max_section_chars)
            ),
            (None, None) => "The program did not produce any output.".to_string(),
        };

        ChatMessage::user(format!(
            "Attempt {index} produced this code:\n```{tag}\n{source}\n```\n\
             Expected output:\n{expected}\n\
             {observed}\n\
             The output is wrong. Fix the code and send the complete corrected program. {request}",
            index = attempt.index,
            expected = problem.expected_output.trim(),
            request = self.delivery_request(),
        ))
    }

    fn delivery_request(&self) -> String {
        format!(
            "Send me the code in {} that solves this problem and it should have only one \
             testcase hardcoded in the driver code.",
            self.language.display_name()
        )
    }
}
