//! solveloop CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::Level;

use solveloop::cli::{commands, Cli, Commands};
use solveloop::infrastructure::config::ConfigLoader;
use solveloop::infrastructure::logging::{LogSettings, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        solveloop::cli::handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ConfigLoader::load(cli.config.as_deref()).context("Failed to load configuration")?;

    let verbosity = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let settings = LogSettings::from_config(&config.logging)?.with_min_level(verbosity);
    let _logger = LoggerImpl::init(&settings).context("Failed to initialize logging")?;

    match cli.command {
        Commands::Solve(args) => commands::solve::execute(args, &config, cli.json).await,
        Commands::Refine(args) => commands::refine::execute(args, &config, cli.json).await,
        Commands::Check(args) => commands::check::execute(args, &config, cli.json).await,
        Commands::Batch(args) => commands::batch::execute(args, &config, cli.json).await,
        Commands::Config(args) => commands::config::execute(args, &config, cli.json).await,
    }
}
