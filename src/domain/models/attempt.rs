use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::execution::ExecutionOutcome;

/// One full cycle of code generation, execution and comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based position in the run
    pub index: u32,

    /// Source extracted from the model response
    pub source_code: String,

    /// Captured stdout; absent when execution failed
    pub execution_output: Option<String>,

    /// Failure description when execution failed or output was truncated
    pub diagnostic: Option<String>,

    /// Whether the output matched the expected output
    pub passed: bool,

    pub started_at: DateTime<Utc>,

    /// Wall-clock time for the whole cycle in milliseconds
    pub duration_ms: u64,
}

/// Append-only, ordered record of the attempts in one run.
///
/// The log hands out indices itself, so entries are always contiguous from
/// 1 and insertion order is attempt order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptLog {
    entries: Vec<Attempt>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next recorded attempt will receive.
    pub fn next_index(&self) -> u32 {
        u32::try_from(self.entries.len()).map_or(u32::MAX, |len| len.saturating_add(1))
    }

    /// Append an attempt built from an execution outcome.
    ///
    /// Must not be called after a passing attempt has been recorded.
    pub fn record(
        &mut self,
        source_code: String,
        outcome: &ExecutionOutcome,
        passed: bool,
        started_at: DateTime<Utc>,
        duration_ms: u64,
    ) -> &Attempt {
        debug_assert!(
            !self.is_converged(),
            "no attempt may follow a passing attempt"
        );

        let attempt = Attempt {
            index: self.next_index(),
            source_code,
            execution_output: outcome.output().map(str::to_string),
            diagnostic: outcome.diagnostic(),
            passed,
            started_at,
            duration_ms,
        };
        self.entries.push(attempt);
        &self.entries[self.entries.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Attempt> {
        self.entries.last()
    }

    pub fn get(&self, index: u32) -> Option<&Attempt> {
        let position = usize::try_from(index.checked_sub(1)?).ok()?;
        self.entries.get(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attempt> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Attempt] {
        &self.entries
    }

    /// Failed attempts in order; these drive feedback messages.
    pub fn failures(&self) -> impl Iterator<Item = &Attempt> {
        self.entries.iter().filter(|attempt| !attempt.passed)
    }

    /// True once the last entry passed.
    pub fn is_converged(&self) -> bool {
        self.entries.last().is_some_and(|attempt| attempt.passed)
    }
}

impl<'a> IntoIterator for &'a AttemptLog {
    type Item = &'a Attempt;
    type IntoIter = std::slice::Iter<'a, Attempt>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
