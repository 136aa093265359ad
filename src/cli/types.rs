//! CLI type definitions
//!
//! This module contains the top-level clap structures. Each subcommand keeps
//! its own argument struct next to its implementation in `commands`.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use crate::cli::commands::{
    batch::BatchArgs, check::CheckArgs, config::ConfigArgs, refine::RefineArgs, solve::SolveArgs,
};

#[derive(Parser, Debug)]
#[command(name = "solveloop")]
#[command(
    about = "Ask an LLM for a program, run it in a sandbox, and retry with feedback until it prints the expected output",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (replaces .solveloop/config.yaml and local.yaml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate, run and repair a program until it passes the test case
    Solve(SolveArgs),

    /// Rewrite a problem statement once with the model
    Refine(RefineArgs),

    /// Run an existing source file against a test case without the model
    Check(CheckArgs),

    /// Solve every problem in a file with bounded concurrency
    Batch(BatchArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
