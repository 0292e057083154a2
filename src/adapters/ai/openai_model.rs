//! OpenAI language model - `LanguageModel` over the chat completions API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = OpenAiConfig::new(api_key)
//!     .with_model("gpt-4o-mini")
//!     .with_base_url("https://api.openai.com/v1");
//!
//! let model = OpenAiLanguageModel::new(config)?;
//! ```
//!
//! Each session keeps its system prompt and sends it ahead of every prompt.
//! Prompts are independent requests; the API keeps no state between them.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    Availability, ContentPart, LanguageModel, MessageRole, ModelError, ModelInfo, ModelSession,
    PromptInput, SessionOptions,
};

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    api_key: Secret<String>,
    /// Model to use (e.g., "gpt-4o-mini").
    pub model: String,
    /// Base URL for the API (default: https://api.openai.com/v1).
    pub base_url: String,
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

/// OpenAI-backed language model.
pub struct OpenAiLanguageModel {
    inner: Arc<OpenAiClient>,
}

impl OpenAiLanguageModel {
    pub fn new(config: OpenAiConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::InvalidRequest(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            inner: Arc::new(OpenAiClient { config, client }),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiLanguageModel {
    async fn availability(&self) -> Availability {
        if self.inner.config.api_key().trim().is_empty() {
            Availability::Unavailable
        } else {
            Availability::Available
        }
    }

    async fn create(&self, options: SessionOptions) -> Result<Arc<dyn ModelSession>, ModelError> {
        if self.inner.config.api_key().trim().is_empty() {
            return Err(ModelError::unavailable("no OpenAI API key configured"));
        }
        tracing::debug!(
            model = %self.inner.config.model,
            inputs = ?options.expected_inputs,
            "creating OpenAI session"
        );
        Ok(Arc::new(OpenAiSession {
            client: Arc::clone(&self.inner),
            system_prompt: options.system_prompt,
        }))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo::new("openai", &self.inner.config.model)
    }
}

/// One session: a system prompt plus the shared HTTP client.
pub struct OpenAiSession {
    client: Arc<OpenAiClient>,
    system_prompt: String,
}

impl OpenAiSession {
    fn to_request(&self, input: &PromptInput) -> ChatRequest {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: ChatContent::Text(self.system_prompt.clone()),
        }];

        match input {
            PromptInput::Text(text) => messages.push(ChatMessage {
                role: "user",
                content: ChatContent::Text(text.clone()),
            }),
            PromptInput::Messages(prompt_messages) => {
                for message in prompt_messages {
                    let parts = message
                        .content
                        .iter()
                        .map(|part| match part {
                            ContentPart::Text(text) => ChatPart::Text { text: text.clone() },
                            ContentPart::Image(image) => ChatPart::ImageUrl {
                                image_url: ImageUrl { url: image.to_url() },
                            },
                        })
                        .collect();
                    messages.push(ChatMessage {
                        role: role_name(message.role),
                        content: ChatContent::Parts(parts),
                    });
                }
            }
        }

        ChatRequest {
            model: self.client.config.model.clone(),
            messages,
        }
    }

    async fn send_request(&self, request: &ChatRequest) -> Result<Response, ModelError> {
        let config = &self.client.config;
        self.client
            .client
            .post(format!("{}/chat/completions", config.base_url))
            .header("Authorization", format!("Bearer {}", config.api_key()))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        timeout_secs: config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    ModelError::network(format!("Connection failed: {}", e))
                } else {
                    ModelError::network(e.to_string())
                }
            })
    }

    async fn parse_response(response: Response) -> Result<String, ModelError> {
        let response = handle_response_status(response).await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::parse(format!("Failed to parse response: {}", e)))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::parse("No choices in response"))
    }
}

#[async_trait]
impl ModelSession for OpenAiSession {
    async fn prompt(&self, input: PromptInput) -> Result<String, ModelError> {
        let request = self.to_request(&input);
        let max_retries = self.client.config.max_retries;
        let mut last_error = ModelError::network("No attempts made");
        let mut retry_count = 0;

        while retry_count <= max_retries {
            let result = match self.send_request(&request).await {
                Ok(response) => Self::parse_response(response).await,
                Err(err) => Err(err),
            };
            match result {
                Ok(content) => return Ok(content),
                Err(err) => {
                    if !err.is_retryable() || retry_count >= max_retries {
                        return Err(err);
                    }
                    tracing::warn!(error = %err, attempt = retry_count + 1, "OpenAI request failed, retrying");
                    last_error = err;
                }
            }

            // Exponential backoff: 1s, 2s, 4s, ...
            sleep(Duration::from_secs(1 << retry_count)).await;
            retry_count += 1;
        }

        Err(last_error)
    }
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
    }
}

async fn handle_response_status(response: Response) -> Result<Response, ModelError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    match status.as_u16() {
        401 => Err(ModelError::AuthenticationFailed),
        429 => Err(ModelError::rate_limited(parse_retry_after(&error_body))),
        400 => Err(ModelError::InvalidRequest(error_body)),
        500..=599 => Err(ModelError::unavailable(format!(
            "Server error {}: {}",
            status, error_body
        ))),
        _ => Err(ModelError::network(format!(
            "Unexpected status {}: {}",
            status, error_body
        ))),
    }
}

/// Reads "try again in Ns" from an error body; 30 seconds otherwise.
fn parse_retry_after(error_body: &str) -> u32 {
    serde_json::from_str::<serde_json::Value>(error_body)
        .ok()
        .and_then(|parsed| {
            let message = parsed.get("error")?.get("message")?.as_str()?.to_string();
            let rest = &message[message.find("try again in ")? + 13..];
            let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .unwrap_or(30)
}

// ----- OpenAI API Types -----

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ImageInput;
    use serde_json::json;

    fn session(system_prompt: &str) -> OpenAiSession {
        let model = OpenAiLanguageModel::new(OpenAiConfig::new("test-key").with_model("gpt-4o")).unwrap();
        OpenAiSession {
            client: model.inner,
            system_prompt: system_prompt.to_string(),
        }
    }

    #[test]
    fn config_builder_works() {
        let config = OpenAiConfig::new("test-key")
            .with_model("gpt-4o")
            .with_base_url("https://custom.api.com")
            .with_timeout(Duration::from_secs(30))
            .with_max_retries(5);

        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.base_url, "https://custom.api.com");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.api_key(), "test-key");
    }

    #[tokio::test]
    async fn empty_key_is_unavailable() {
        let model = OpenAiLanguageModel::new(OpenAiConfig::new("")).unwrap();
        assert_eq!(model.availability().await, Availability::Unavailable);
        assert!(model.create(SessionOptions::new("sys")).await.is_err());
    }

    #[tokio::test]
    async fn keyed_model_is_available() {
        let model = OpenAiLanguageModel::new(OpenAiConfig::new("sk-test")).unwrap();
        assert_eq!(model.availability().await, Availability::Available);
        assert_eq!(model.model_info().name, "openai");
        assert_eq!(model.model_info().model, "gpt-4o-mini");
    }

    #[test]
    fn text_prompt_follows_system_prompt() {
        let request = session("be json").to_request(&PromptInput::text("hello"));
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["model"], json!("gpt-4o"));
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "be json"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hello"}));
    }

    #[test]
    fn image_prompt_uses_content_parts() {
        let input = PromptInput::with_image("read this", ImageInput::bytes("image/png", vec![1, 2, 3]));
        let body = serde_json::to_value(session("sys").to_request(&input)).unwrap();

        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0], json!({"type": "text", "text": "read this"}));
        assert_eq!(parts[1]["type"], json!("image_url"));
        assert_eq!(parts[1]["image_url"]["url"], json!("data:image/png;base64,AQID"));
    }

    #[test]
    fn parse_retry_after_from_message() {
        let error = r#"{"error":{"message":"Rate limit exceeded. Please try again in 12 seconds."}}"#;
        assert_eq!(parse_retry_after(error), 12);
    }

    #[test]
    fn parse_retry_after_default() {
        assert_eq!(parse_retry_after(r#"{"error":{"message":"Something went wrong"}}"#), 30);
        assert_eq!(parse_retry_after("not json"), 30);
    }
}
