//! Rendering of a stored [`AttemptContext`] into the messages of one request.
//!
//! The stored context always keeps every message. The policy only decides
//! what is sent: everything, or the base plus the most recent feedback with
//! older failures folded into a one-line-per-attempt summary.

use crate::domain::models::{AttemptContext, AttemptLog, ChatMessage, ContextPolicyConfig};

/// Longest excerpt of an old attempt's output kept in the summary.
const SUMMARY_EXCERPT_CHARS: usize = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextPolicy {
    /// Send the full history
    #[default]
    Unbounded,
    /// Send only the last `keep` feedback messages verbatim
    RecentFeedback { keep: usize },
}

impl From<&ContextPolicyConfig> for ContextPolicy {
    fn from(config: &ContextPolicyConfig) -> Self {
        config
            .retained_feedback
            .map_or(Self::Unbounded, |keep| Self::RecentFeedback { keep })
    }
}

impl ContextPolicy {
    /// Messages for the next request.
    ///
    /// `log` supplies the attempts behind summarized feedback; the n-th
    /// feedback message belongs to the n-th failed attempt.
    pub fn render(&self, context: &AttemptContext, log: &AttemptLog) -> Vec<ChatMessage> {
        let feedback = context.feedback();
        let keep = match *self {
            Self::Unbounded => feedback.len(),
            Self::RecentFeedback { keep } => keep.min(feedback.len()),
        };
        let folded = feedback.len() - keep;

        let mut messages = Vec::with_capacity(context.base().len() + keep + 1);
        messages.extend_from_slice(context.base());

        if folded > 0 {
            let lines: Vec<String> = log
                .failures()
                .take(folded)
                .map(|attempt| {
                    let observed = attempt.execution_output.as_deref().map_or_else(
                        || {
                            attempt
                                .diagnostic
                                .clone()
                                .unwrap_or_else(|| "no output".to_string())
                        },
                        |output| format!("printed {:?}", excerpt(output.trim())),
                    );
                    format!("- attempt {}: {}", attempt.index, observed)
                })
                .collect();

            messages.push(ChatMessage::user(format!(
                "Earlier attempts also failed:\n{}",
                lines.join("\n")
            )));
        }

        messages.extend_from_slice(&feedback[folded..]);
        messages
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(SUMMARY_EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
