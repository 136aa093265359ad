use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, MAX_ITERATION_LIMIT, MIN_ITERATION_LIMIT};

/// Directory holding project configuration, relative to the working directory
pub const CONFIG_DIR: &str = ".solveloop";

/// Prefix for environment overrides; nesting uses `__`
pub const ENV_PREFIX: &str = "SOLVELOOP_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid iteration_limit: {0}. Must be between 1 and 10")]
    InvalidIterationLimit(u32),

    #[error("Invalid temperature: {0}. Must be between 0.0 and 1.0")]
    InvalidTemperature(f32),

    #[error("Invalid completion_timeout_secs: {0}. Must be at least 1")]
    InvalidCompletionTimeout(u64),

    #[error("Invalid max_section_chars: {0}. Must be at least 1")]
    InvalidSectionBudget(usize),

    #[error("Invalid retained_feedback: 0. Omit it to keep the full history")]
    InvalidRetainedFeedback,

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Completion {0} cannot be empty")]
    EmptyCompletionSetting(&'static str),

    #[error("Invalid sandbox {0}: must be greater than 0")]
    InvalidSandboxLimit(&'static str),

    #[error("Runtime for {0} has an empty program")]
    EmptyRuntimeProgram(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration relative to the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .solveloop/config.yaml (project config)
    /// 3. .solveloop/local.yaml (local overrides, optional)
    /// 4. `explicit`, the file named by `--config`
    /// 5. Environment variables (SOLVELOOP_* prefix, highest priority)
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        Self::load_from_dir(Path::new("."), explicit)
    }

    /// Same as [`Self::load`] with the project directory given explicitly
    pub fn load_from_dir(project_dir: &Path, explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            if !path.is_file() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
        }

        let config: Config = Self::figment(project_dir, explicit)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(project_dir: &Path, explicit: Option<&Path>) -> Figment {
        let config_dir: PathBuf = project_dir.join(CONFIG_DIR);
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(config_dir.join("config.yaml")))
            .merge(Yaml::file(config_dir.join("local.yaml")));

        if let Some(path) = explicit {
            figment = figment.merge(Yaml::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let synthesis = &config.synthesis;
        if !(MIN_ITERATION_LIMIT..=MAX_ITERATION_LIMIT).contains(&synthesis.iteration_limit) {
            return Err(ConfigError::InvalidIterationLimit(synthesis.iteration_limit));
        }
        if !(0.0..=1.0).contains(&synthesis.temperature) {
            return Err(ConfigError::InvalidTemperature(synthesis.temperature));
        }
        if synthesis.completion_timeout_secs == 0 {
            return Err(ConfigError::InvalidCompletionTimeout(0));
        }
        if synthesis.context.max_section_chars == 0 {
            return Err(ConfigError::InvalidSectionBudget(0));
        }
        if synthesis.context.retained_feedback == Some(0) {
            return Err(ConfigError::InvalidRetainedFeedback);
        }

        let completion = &config.completion;
        if completion.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyCompletionSetting("base_url"));
        }
        if completion.model.trim().is_empty() {
            return Err(ConfigError::EmptyCompletionSetting("model"));
        }
        if completion.requests_per_second <= 0.0 || completion.requests_per_second.is_nan() {
            return Err(ConfigError::InvalidRateLimit(completion.requests_per_second));
        }
        if completion.initial_backoff_ms >= completion.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                completion.initial_backoff_ms,
                completion.max_backoff_ms,
            ));
        }

        let sandbox = &config.sandbox;
        if sandbox.timeout_ms == 0 {
            return Err(ConfigError::InvalidSandboxLimit("timeout_ms"));
        }
        if sandbox.max_output_bytes == 0 {
            return Err(ConfigError::InvalidSandboxLimit("max_output_bytes"));
        }
        if sandbox.max_concurrent == 0 {
            return Err(ConfigError::InvalidSandboxLimit("max_concurrent"));
        }
        if let Some(runtime) = sandbox.runtimes.iter().find(|rt| rt.program.trim().is_empty()) {
            return Err(ConfigError::EmptyRuntimeProgram(runtime.language.to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}
