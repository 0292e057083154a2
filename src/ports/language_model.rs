//! Language Model Port - Interface for text-generation backends.
//!
//! The conversation creates one session per conversation and sends it
//! prompts. Every response is raw, untrusted text; callers run it through
//! `ResponseExtractor` before use.
//!
//! # Example
//!
//! ```ignore
//! let session = model
//!     .create(SessionOptions::new(SYSTEM_PROMPT).with_image_input())
//!     .await?;
//! let raw = session.prompt(PromptInput::text("Ask for the user's name")).await?;
//! ```

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Port for a language-model backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Reports whether sessions can be created.
    async fn availability(&self) -> Availability;

    /// Creates a session primed with a system prompt.
    async fn create(&self, options: SessionOptions) -> Result<Arc<dyn ModelSession>, ModelError>;

    /// Backend name and model identifier.
    fn model_info(&self) -> ModelInfo;
}

/// A primed conversation with the model.
#[async_trait]
pub trait ModelSession: Send + Sync {
    /// Sends a prompt and returns the raw response text.
    async fn prompt(&self, input: PromptInput) -> Result<String, ModelError>;

    /// Like `prompt`, but gives up with `ModelError::Aborted` as soon as
    /// `cancel` fires.
    async fn prompt_cancellable(
        &self,
        input: PromptInput,
        cancel: &CancellationToken,
    ) -> Result<String, ModelError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Aborted),
            result = self.prompt(input) => result,
        }
    }
}

/// Whether the backend can serve sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    /// Usable once model weights are fetched; creating a session starts that.
    Downloadable,
    Unavailable,
}

impl Availability {
    pub fn is_usable(&self) -> bool {
        !matches!(self, Availability::Unavailable)
    }
}

/// Kinds of input a session will be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Image,
}

/// Options for a new session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub system_prompt: String,
    pub expected_inputs: Vec<InputModality>,
}

impl SessionOptions {
    /// Text-only session with the given system prompt.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            expected_inputs: vec![InputModality::Text],
        }
    }

    /// Declares that prompts may carry images.
    pub fn with_image_input(mut self) -> Self {
        if !self.expected_inputs.contains(&InputModality::Image) {
            self.expected_inputs.push(InputModality::Image);
        }
        self
    }
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// An image attached to a prompt or a user reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// Remote or data URL.
    Url(String),
    /// Raw bytes with their MIME type.
    Bytes { mime_type: String, data: Vec<u8> },
}

impl ImageInput {
    pub fn bytes(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Bytes {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// URL form, encoding raw bytes as a base64 data URL.
    pub fn to_url(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Bytes { mime_type, data } => {
                format!("data:{};base64,{}", mime_type, STANDARD.encode(data))
            }
        }
    }
}

/// One typed part of a prompt message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImageInput),
}

/// A role-tagged multi-part message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: MessageRole,
    pub content: Vec<ContentPart>,
}

/// What a prompt call sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptInput {
    Text(String),
    Messages(Vec<PromptMessage>),
}

impl PromptInput {
    pub fn text(text: impl Into<String>) -> Self {
        PromptInput::Text(text.into())
    }

    /// A single user message carrying text and an image.
    pub fn with_image(text: impl Into<String>, image: ImageInput) -> Self {
        PromptInput::Messages(vec![PromptMessage {
            role: MessageRole::User,
            content: vec![ContentPart::Text(text.into()), ContentPart::Image(image)],
        }])
    }

    /// All text parts joined with newlines.
    pub fn text_content(&self) -> String {
        match self {
            PromptInput::Text(text) => text.clone(),
            PromptInput::Messages(messages) => messages
                .iter()
                .flat_map(|m| m.content.iter())
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    ContentPart::Image(_) => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Returns true if any part is an image.
    pub fn has_image(&self) -> bool {
        match self {
            PromptInput::Text(_) => false,
            PromptInput::Messages(messages) => messages
                .iter()
                .flat_map(|m| m.content.iter())
                .any(|part| matches!(part, ContentPart::Image(_))),
        }
    }
}

/// Backend identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Backend name (e.g., "openai", "mock").
    pub name: String,
    /// Model identifier.
    pub model: String,
}

impl ModelInfo {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
        }
    }
}

/// Language model errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// Rate limited by the backend.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// Backend is absent or down.
    #[error("model unavailable: {message}")]
    Unavailable { message: String },

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse the backend's envelope (not the model text).
    #[error("parse error: {0}")]
    Parse(String),

    /// Backend rejected the request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },

    /// The caller cancelled the request.
    #[error("request aborted")]
    Aborted,
}

impl ModelError {
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ModelError::RateLimited { .. }
                | ModelError::Unavailable { .. }
                | ModelError::Network(_)
                | ModelError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct SlowSession;

    #[async_trait]
    impl ModelSession for SlowSession {
        async fn prompt(&self, _input: PromptInput) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".to_string())
        }
    }

    #[test]
    fn image_bytes_become_data_url() {
        let image = ImageInput::bytes("image/png", vec![1, 2, 3]);
        assert_eq!(image.to_url(), "data:image/png;base64,AQID");
        assert_eq!(ImageInput::Url("https://x/y.png".into()).to_url(), "https://x/y.png");
    }

    #[test]
    fn prompt_with_image_keeps_text_and_image_parts() {
        let input = PromptInput::with_image("read this", ImageInput::Url("u".into()));
        assert!(input.has_image());
        assert_eq!(input.text_content(), "read this");
        assert!(!PromptInput::text("plain").has_image());
    }

    #[test]
    fn session_options_add_image_once() {
        let options = SessionOptions::new("sys").with_image_input().with_image_input();
        assert_eq!(
            options.expected_inputs,
            vec![InputModality::Text, InputModality::Image]
        );
    }

    #[test]
    fn retryable_classification() {
        assert!(ModelError::rate_limited(30).is_retryable());
        assert!(ModelError::unavailable("down").is_retryable());
        assert!(ModelError::network("reset").is_retryable());
        assert!(ModelError::Timeout { timeout_secs: 30 }.is_retryable());

        assert!(!ModelError::AuthenticationFailed.is_retryable());
        assert!(!ModelError::Aborted.is_retryable());
        assert!(!ModelError::InvalidRequest("bad".into()).is_retryable());
    }

    #[test]
    fn availability_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Availability::Downloadable).unwrap(), "\"downloadable\"");
        assert!(Availability::Downloadable.is_usable());
        assert!(!Availability::Unavailable.is_usable());
    }

    #[tokio::test]
    async fn prompt_cancellable_stops_on_cancel() {
        let token = CancellationToken::new();
        token.cancel();
        let result = SlowSession
            .prompt_cancellable(PromptInput::text("hi"), &token)
            .await;
        assert!(matches!(result, Err(ModelError::Aborted)));
    }
}
