//! Conversation tuning

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::conversation::{
    ConversationSettings, DEFAULT_BATCH_SIZE, DEFAULT_CONFIDENCE_THRESHOLD,
};
use crate::domain::form::DEFAULT_ROOT_PREFIX;

/// Conversation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Simple fields asked together
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Extraction results at or below this confidence are discarded
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Prefix stripped from qualified field names
    #[serde(default = "default_root_prefix")]
    pub root_prefix: String,
}

impl ConversationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if !(0.0..1.0).contains(&self.confidence_threshold) {
            return Err(ValidationError::InvalidConfidenceThreshold);
        }
        if !self.root_prefix.ends_with('.') {
            return Err(ValidationError::InvalidRootPrefix);
        }
        Ok(())
    }

    pub fn settings(&self) -> ConversationSettings {
        ConversationSettings {
            batch_size: self.batch_size,
            confidence_threshold: self.confidence_threshold,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            confidence_threshold: default_confidence_threshold(),
            root_prefix: default_root_prefix(),
        }
    }
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_confidence_threshold() -> f64 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

fn default_root_prefix() -> String {
    DEFAULT_ROOT_PREFIX.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ConversationConfig::default();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.root_prefix, "$form.");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = ConversationConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBatchSize));
    }

    #[test]
    fn test_threshold_must_be_below_one() {
        let config = ConversationConfig {
            confidence_threshold: 1.0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::InvalidConfidenceThreshold)
        );
    }

    #[test]
    fn test_root_prefix_needs_trailing_dot() {
        let config = ConversationConfig {
            root_prefix: "$form".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidRootPrefix));
    }

    #[test]
    fn test_settings_mirror_config() {
        let config = ConversationConfig {
            batch_size: 5,
            confidence_threshold: 0.8,
            ..Default::default()
        };
        let settings = config.settings();
        assert_eq!(settings.batch_size, 5);
        assert_eq!(settings.confidence_threshold, 0.8);
    }
}
