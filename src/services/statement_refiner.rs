//! One-shot rewriting of a problem statement into a simpler form.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::domain::errors::{SynthesisResult, ValidationError};
use crate::domain::models::{ChatMessage, ProblemSpec};
use crate::domain::ports::{CompletionClient, CompletionRequest};

const REFINER_FRAME: &str = "You're an AI with proficiency in Data Structures and Algorithms. \
Your task is to rewrite the following complex problem statement into a simpler one, \
ensuring that all necessary details for solving the problem are retained:";

/// Asks the completion provider for a simplified statement.
pub struct StatementRefiner {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl StatementRefiner {
    pub fn new(client: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// Refined text for `statement`, trimmed.
    ///
    /// A blank statement is rejected before any request is made.
    #[instrument(skip_all, fields(provider = self.client.name(), statement_chars = statement.len()))]
    pub async fn refine(&self, statement: &str) -> SynthesisResult<String> {
        if statement.trim().is_empty() {
            return Err(ValidationError::MissingField("statement").into());
        }

        let request = CompletionRequest::new(
            vec![
                ChatMessage::system(REFINER_FRAME),
                ChatMessage::user(statement.trim()),
            ],
            self.temperature,
        );
        let refined = self.client.complete(request).await?;
        debug!(refined_chars = refined.len(), "statement refined");
        Ok(refined.trim().to_string())
    }

    /// Refine `problem` in place. Fails if it was refined before.
    pub async fn refine_problem(&self, problem: &mut ProblemSpec) -> SynthesisResult<()> {
        if problem.is_refined() {
            return Err(ValidationError::AlreadyRefined.into());
        }

        let refined = self.refine(&problem.statement).await?;
        problem.apply_refinement(refined)?;
        Ok(())
    }
}
