use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use tracing::Level;

use crate::domain::models::LoggingConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow!("Invalid log format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

impl FromStr for RotationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            "never" => Ok(Self::Never),
            other => Err(anyhow!("Invalid log rotation: {other}")),
        }
    }
}

/// Parsed, typed form of [`LoggingConfig`]
#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub log_dir: Option<PathBuf>,
    pub rotation: RotationPolicy,
}

impl LogSettings {
    pub fn from_config(config: &LoggingConfig) -> Result<Self> {
        Ok(Self {
            level: parse_log_level(&config.level)?,
            format: config.format.parse()?,
            log_dir: config.log_dir.as_ref().map(PathBuf::from),
            rotation: config.rotation.parse()?,
        })
    }

    /// Raise the level to at least `level`, as `-v` flags do
    #[must_use]
    pub fn with_min_level(mut self, level: Level) -> Self {
        // tracing orders levels by verbosity: TRACE > DEBUG > ... > ERROR
        if level > self.level {
            self.level = level;
        }
        self
    }
}

/// Parse log level string to Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => anyhow::bail!("Invalid log level: {level}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("warn"), Ok(Level::WARN)));
        assert!(matches!(parse_log_level("error"), Ok(Level::ERROR)));
        assert!(matches!(parse_log_level("TRACE"), Ok(Level::TRACE)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_settings_from_default_config() {
        let settings = LogSettings::from_config(&LoggingConfig::default()).unwrap();
        assert_eq!(settings.level, Level::WARN);
        assert_eq!(settings.format, LogFormat::Pretty);
        assert_eq!(settings.rotation, RotationPolicy::Daily);
        assert!(settings.log_dir.is_none());
    }

    #[test]
    fn test_min_level_only_raises_verbosity() {
        let settings = LogSettings::from_config(&LoggingConfig::default()).unwrap();
        assert_eq!(settings.clone().with_min_level(Level::DEBUG).level, Level::DEBUG);
        assert_eq!(settings.with_min_level(Level::ERROR).level, Level::WARN);
    }

    #[test]
    fn test_rejects_unknown_format() {
        let config = LoggingConfig {
            format: "xml".to_string(),
            ..LoggingConfig::default()
        };
        assert!(LogSettings::from_config(&config).is_err());
    }
}
