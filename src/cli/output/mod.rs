//! CLI output formatting
//!
//! Every command result implements [`CommandOutput`] so it can be printed
//! either for humans or as JSON (`--json`).

pub mod progress;
pub mod table;

use serde::Serialize;

pub use progress::{create_spinner, ProgressBarExt};
pub use table::TableFormatter;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!(
            "{}",
            serde_json::to_string_pretty(&result.to_json()).unwrap_or_default()
        );
    } else {
        println!("{}", result.to_human());
    }
}

/// Shorten `s` to at most `max_len` characters, appending "..." if cut.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

/// First line of `s`, shortened for a table cell.
pub fn first_line(s: &str, max_len: usize) -> String {
    let line = s.trim().lines().next().unwrap_or_default();
    let mut cell = truncate(line, max_len);
    if s.trim().lines().nth(1).is_some() && !cell.ends_with("...") {
        cell.push_str(" ...");
    }
    cell
}
