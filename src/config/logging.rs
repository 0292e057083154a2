//! Logging configuration

use serde::Deserialize;
use tracing::Level;

use super::error::ValidationError;

/// Log output settings
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LoggingConfig {
    /// Parsed level, falling back to INFO.
    pub fn max_level(&self) -> Level {
        self.level.parse::<Level>().unwrap_or(Level::INFO)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.level
            .parse::<Level>()
            .map(|_| ())
            .map_err(|_| ValidationError::InvalidLogLevel(self.level.clone()))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.max_level(), Level::INFO);
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn test_parses_level_case_insensitively() {
        let config = LoggingConfig {
            level: "DEBUG".to_string(),
            ..Default::default()
        };
        assert_eq!(config.max_level(), Level::DEBUG);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_level() {
        let config = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidLogLevel("chatty".to_string()))
        );
        assert_eq!(config.max_level(), Level::INFO);
    }
}
