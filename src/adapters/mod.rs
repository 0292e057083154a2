//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Language model backends (OpenAI, disabled, mock)
//! - `form` - JSON form runtime and definition loader
//! - `chat` - Chat surfaces that render conversation turns

pub mod ai;
pub mod chat;
pub mod form;

pub use ai::{DisabledLanguageModel, MockLanguageModel, OpenAiConfig, OpenAiLanguageModel};
pub use chat::ChannelSurface;
pub use form::{DefinitionLoader, JsonFormRuntime};
