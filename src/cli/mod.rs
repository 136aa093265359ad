//! Command-line interface
//!
//! Commands print their result on stdout (human text or `--json`) and log on
//! stderr. Errors are rendered by [`handle_error`], which also decides the
//! process exit status.

pub mod commands;
pub mod output;
pub mod types;

use thiserror::Error;

pub use types::{Cli, Commands};

/// Exit status for errors (bad input, configuration, aborted runs)
pub const EXIT_ERROR: i32 = 1;

/// Exit status when everything ran but no program passed
pub const EXIT_UNSOLVED: i32 = 2;

/// A command finished normally but did not produce a passing program
#[derive(Debug, Error)]
#[error("{0}")]
pub struct Unsolved(pub String);

/// Report `err` and terminate the process
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    let code = if err.downcast_ref::<Unsolved>().is_some() {
        EXIT_UNSOLVED
    } else {
        EXIT_ERROR
    };

    if json_mode {
        let chain: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": chain,
            "exit_code": code,
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| err.to_string())
        );
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }

    std::process::exit(code)
}
