//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Batch size must be at least 1")]
    InvalidBatchSize,

    #[error("Confidence threshold must be within [0, 1)")]
    InvalidConfidenceThreshold,

    #[error("Root prefix must end with '.'")]
    InvalidRootPrefix,

    #[error("Invalid base URL format")]
    InvalidBaseUrl,

    #[error("Unknown log level: {0}")]
    InvalidLogLevel(String),
}
