//! Table output formatting for CLI commands
//!
//! Renders attempt logs and batch summaries using comfy-table. Colors are
//! dropped when `NO_COLOR` is set or the terminal is dumb.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::Attempt;
use crate::services::{RunOutcome, RunState};

use super::{first_line, truncate};

/// Table formatter for CLI output
pub struct TableFormatter {
    use_colors: bool,
    max_width: Option<u16>,
}

/// One row of a batch summary
pub struct BatchRow<'a> {
    pub name: &'a str,
    pub state: RunState,
    pub attempts: usize,
    pub detail: String,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub const fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// Format an attempt log, one row per attempt
    pub fn format_attempts(&self, attempts: &[Attempt]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            header("#"),
            header("Result"),
            header("Output"),
            header("Diagnostic"),
            header("Duration"),
        ]);

        for attempt in attempts {
            let (label, color) = if attempt.passed {
                ("passed", Color::Green)
            } else {
                ("failed", Color::Red)
            };

            table.add_row(vec![
                Cell::new(attempt.index),
                self.colored(label, color),
                Cell::new(
                    attempt
                        .execution_output
                        .as_deref()
                        .map_or_else(|| "-".to_string(), |out| first_line(out, 40)),
                ),
                Cell::new(
                    attempt
                        .diagnostic
                        .as_deref()
                        .map_or_else(|| "-".to_string(), |diag| first_line(diag, 50)),
                ),
                Cell::new(format!("{}ms", attempt.duration_ms)),
            ]);
        }

        table.to_string()
    }

    /// Format the per-problem results of a batch
    pub fn format_batch(&self, rows: &[BatchRow<'_>]) -> String {
        let mut table = self.create_base_table();

        table.set_header(vec![
            header("Problem"),
            header("Outcome"),
            header("Attempts"),
            header("Detail"),
        ]);

        for row in rows {
            table.add_row(vec![
                Cell::new(truncate(row.name, 30)),
                self.colored(row.state.as_str(), state_color(row.state)),
                Cell::new(row.attempts),
                Cell::new(truncate(&row.detail, 60)),
            ]);
        }

        table.to_string()
    }

    fn colored(&self, text: &str, color: Color) -> Cell {
        if self.use_colors {
            Cell::new(text).fg(color)
        } else {
            Cell::new(text)
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        if !self.use_colors {
            table.force_no_tty();
        }

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn header(title: &str) -> Cell {
    Cell::new(title).add_attribute(Attribute::Bold)
}

/// Check if color output is supported
pub fn supports_color() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}

pub const fn state_color(state: RunState) -> Color {
    match state {
        RunState::Succeeded => Color::Green,
        RunState::Exhausted => Color::Yellow,
        RunState::Aborted => Color::Red,
        _ => Color::Cyan,
    }
}

/// Short human description of a terminal outcome
pub fn describe_outcome(outcome: &RunOutcome) -> String {
    match outcome {
        RunOutcome::Succeeded { attempt } => format!("solved on attempt {attempt}"),
        RunOutcome::Exhausted { iteration_limit } => {
            format!("no passing program after {iteration_limit} attempt(s)")
        }
        RunOutcome::Aborted(reason) => format!("aborted: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::AbortReason;
    use chrono::Utc;

    fn attempt(index: u32, output: Option<&str>, passed: bool) -> Attempt {
        Attempt {
            index,
            source_code: "print('olleh')".to_string(),
            execution_output: output.map(str::to_string),
            diagnostic: if output.is_none() {
                Some("exited with status 1: NameError".to_string())
            } else {
                None
            },
            passed,
            started_at: Utc::now(),
            duration_ms: 12,
        }
    }

    #[test]
    fn test_attempt_table_lists_every_attempt() {
        let formatter = TableFormatter::with_config(false, Some(120));
        let rendered = formatter.format_attempts(&[
            attempt(1, None, false),
            attempt(2, Some("olleh\n"), true),
        ]);

        assert!(rendered.contains("failed"));
        assert!(rendered.contains("passed"));
        assert!(rendered.contains("NameError"));
        assert!(rendered.contains("olleh"));
        assert!(rendered.contains("12ms"));
    }

    #[test]
    fn test_batch_table() {
        let formatter = TableFormatter::with_config(false, Some(120));
        let rendered = formatter.format_batch(&[BatchRow {
            name: "reverse",
            state: RunState::Exhausted,
            attempts: 3,
            detail: "no passing program after 3 attempt(s)".to_string(),
        }]);
        assert!(rendered.contains("reverse"));
        assert!(rendered.contains("exhausted"));
    }

    #[test]
    fn test_describe_outcome() {
        assert_eq!(
            describe_outcome(&RunOutcome::Succeeded { attempt: 2 }),
            "solved on attempt 2"
        );
        assert_eq!(
            describe_outcome(&RunOutcome::Aborted(AbortReason::Cancelled)),
            "aborted: cancelled"
        );
    }
}
