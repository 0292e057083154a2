//! Language model configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::ai::OpenAiConfig;

/// Language model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Backend used for question phrasing and answer extraction
    #[serde(default = "default_provider")]
    pub provider: AiProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Chat completions base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries on transient failures
    #[serde(default = "default_retries")]
    pub max_retries: u32,
}

/// Language model backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    OpenAI,
    /// No model; templated questions and direct answers only
    Disabled,
}

impl AiConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if OpenAI is configured
    pub fn has_openai(&self) -> bool {
        self.openai_api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    /// Builds the adapter configuration for the OpenAI backend.
    pub fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig::new(self.openai_api_key.clone().unwrap_or_default())
            .with_model(&self.model)
            .with_base_url(self.base_url.trim_end_matches('/'))
            .with_timeout(self.timeout())
            .with_max_retries(self.max_retries)
    }

    /// Validate language model configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if self.provider == AiProvider::OpenAI {
            if !self.has_openai() {
                return Err(ValidationError::MissingRequired("OPENAI_API_KEY"));
            }
            if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
                return Err(ValidationError::InvalidBaseUrl);
            }
        }

        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            openai_api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
        }
    }
}

fn default_provider() -> AiProvider {
    AiProvider::OpenAI
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_retries() -> u32 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AiConfig {
            timeout_secs: 15,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_validation_openai_requires_key() {
        assert_eq!(
            AiConfig::default().validate(),
            Err(ValidationError::MissingRequired("OPENAI_API_KEY"))
        );
    }

    #[test]
    fn test_validation_disabled_needs_no_key() {
        let config = AiConfig {
            provider: AiProvider::Disabled,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_base_url() {
        let config = AiConfig {
            openai_api_key: Some("sk-xxx".to_string()),
            base_url: "api.openai.com".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidBaseUrl));
    }

    #[test]
    fn test_openai_config_carries_settings() {
        let config = AiConfig {
            openai_api_key: Some("sk-xxx".to_string()),
            base_url: "http://localhost:8000/v1/".to_string(),
            max_retries: 0,
            ..Default::default()
        };
        let openai = config.openai_config();
        assert_eq!(openai.base_url, "http://localhost:8000/v1");
        assert_eq!(openai.max_retries, 0);
        assert_eq!(openai.model, "gpt-4o-mini");
    }
}
