//! Form definition loader.
//!
//! `http://` and `https://` URLs are fetched; anything else is read from
//! disk (a leading `file://` is stripped). Definitions ending in `.yaml` or
//! `.yml` are parsed as YAML, everything else as JSON.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::json_form::JsonFormRuntime;
use crate::domain::form::DEFAULT_ROOT_PREFIX;
use crate::ports::{FormLoader, FormRuntime, FormRuntimeError};

/// Loads form definitions into `JsonFormRuntime` instances.
pub struct DefinitionLoader {
    client: Client,
    root_prefix: String,
}

impl DefinitionLoader {
    pub fn new(timeout: Duration) -> Result<Self, FormRuntimeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FormRuntimeError::transport(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            root_prefix: DEFAULT_ROOT_PREFIX.to_string(),
        })
    }

    /// Sets the prefix stripped from qualified names.
    pub fn with_root_prefix(mut self, root_prefix: impl Into<String>) -> Self {
        self.root_prefix = root_prefix.into();
        self
    }

    async fn fetch(&self, url: &str) -> Result<String, FormRuntimeError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FormRuntimeError::load(url, e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(FormRuntimeError::load(url, format!("HTTP {}", status)));
            }
            return response
                .text()
                .await
                .map_err(|e| FormRuntimeError::load(url, e.to_string()));
        }

        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| FormRuntimeError::load(url, e.to_string()))
    }
}

/// Parses definition text, choosing YAML or JSON by extension.
pub fn parse_definition(url: &str, text: &str) -> Result<Value, FormRuntimeError> {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        serde_yaml::from_str(text)
            .map_err(|e| FormRuntimeError::invalid_definition(format!("YAML: {}", e)))
    } else {
        serde_json::from_str(text)
            .map_err(|e| FormRuntimeError::invalid_definition(format!("JSON: {}", e)))
    }
}

#[async_trait]
impl FormLoader for DefinitionLoader {
    async fn load(&self, url: &str) -> Result<Arc<dyn FormRuntime>, FormRuntimeError> {
        tracing::info!(url, "loading form definition");
        let text = self.fetch(url).await?;
        let definition = parse_definition(url, &text)?;
        let runtime = JsonFormRuntime::with_root_prefix(&definition, &self.root_prefix)?;
        Ok(Arc::new(runtime))
    }
}
