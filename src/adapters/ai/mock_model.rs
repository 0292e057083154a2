//! Mock language model for testing.
//!
//! Provides a configurable implementation of the `LanguageModel` port so
//! conversations can run without a real backend.
//!
//! # Features
//!
//! - Queued responses, consumed in order across all sessions
//! - Simulated delays for cancellation testing
//! - Error injection for fallback testing
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let model = MockLanguageModel::new()
//!     .with_response(r#"{"message":"What is your name?","requestedFields":["f1"]}"#);
//!
//! let session = model.create(SessionOptions::new("sys")).await?;
//! let raw = session.prompt(PromptInput::text("ask")).await?;
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    Availability, LanguageModel, ModelError, ModelInfo, ModelSession, PromptInput, SessionOptions,
};

/// Mock language model for testing.
#[derive(Debug, Clone)]
pub struct MockLanguageModel {
    /// Pre-configured responses (consumed in order).
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    availability: Availability,
    /// Error returned by `create` instead of a session.
    create_error: Option<MockError>,
    delay: Duration,
    calls: Arc<Mutex<Vec<PromptInput>>>,
    sessions: Arc<Mutex<Vec<SessionOptions>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Return this raw text.
    Success(String),
    /// Return an error.
    Error(MockError),
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for ModelError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => ModelError::rate_limited(retry_after_secs),
            MockError::Unavailable { message } => ModelError::unavailable(message),
            MockError::AuthenticationFailed => ModelError::AuthenticationFailed,
            MockError::Network { message } => ModelError::network(message),
            MockError::Timeout { timeout_secs } => ModelError::Timeout { timeout_secs },
        }
    }
}

impl Default for MockLanguageModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLanguageModel {
    /// Creates an available mock with an empty response queue.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            availability: Availability::Available,
            create_error: None,
            delay: Duration::ZERO,
            calls: Arc::new(Mutex::new(Vec::new())),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self::new().with_availability(Availability::Unavailable)
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push_response(content);
        self
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Error(error));
        self
    }

    /// Sets simulated latency per prompt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_availability(mut self, availability: Availability) -> Self {
        self.availability = availability;
        self
    }

    /// Makes `create` fail with `error`.
    pub fn with_create_error(mut self, error: MockError) -> Self {
        self.create_error = Some(error);
        self
    }

    /// Queues a response on a model that is already shared.
    pub fn push_response(&self, content: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(MockResponse::Success(content.into()));
    }

    /// Returns the number of prompts sent to any session.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Returns all recorded prompts.
    pub fn get_calls(&self) -> Vec<PromptInput> {
        self.calls.lock().unwrap().clone()
    }

    /// Clears the prompt history.
    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Returns the number of sessions created.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Options passed to the most recent `create`.
    pub fn last_session_options(&self) -> Option<SessionOptions> {
        self.sessions.lock().unwrap().last().cloned()
    }

    fn next_response(&self) -> MockResponse {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success("Mock response".to_string()))
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn availability(&self) -> Availability {
        self.availability
    }

    async fn create(&self, options: SessionOptions) -> Result<Arc<dyn ModelSession>, ModelError> {
        if !self.availability.is_usable() {
            return Err(ModelError::unavailable("mock model is unavailable"));
        }
        if let Some(err) = self.create_error.clone() {
            return Err(err.into());
        }
        self.sessions.lock().unwrap().push(options);
        Ok(Arc::new(MockSession {
            model: self.clone(),
        }))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo::new("mock", "mock-model-1")
    }
}

/// Session handed out by `MockLanguageModel`; shares its queue and call log.
#[derive(Debug)]
pub struct MockSession {
    model: MockLanguageModel,
}

#[async_trait]
impl ModelSession for MockSession {
    async fn prompt(&self, input: PromptInput) -> Result<String, ModelError> {
        self.model.calls.lock().unwrap().push(input);

        if !self.model.delay.is_zero() {
            sleep(self.model.delay).await;
        }

        match self.model.next_response() {
            MockResponse::Success(content) => Ok(content),
            MockResponse::Error(err) => Err(err.into()),
        }
    }
}
