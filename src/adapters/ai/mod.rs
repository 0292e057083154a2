//! Language model adapters.
//!
//! Implementations of the `LanguageModel` port.
//!
//! ## Available Adapters
//!
//! - `MockLanguageModel` - Configurable mock for testing
//! - `OpenAiLanguageModel` - OpenAI chat completions
//! - `DisabledLanguageModel` - Always unavailable; forces templated questions

mod disabled;
mod mock_model;
mod openai_model;

pub use disabled::DisabledLanguageModel;
pub use mock_model::{MockError, MockLanguageModel, MockResponse, MockSession};
pub use openai_model::{OpenAiConfig, OpenAiLanguageModel, OpenAiSession};
