//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `FormRuntime` / `FormLoader` - The live, validating form being filled
//! - `LanguageModel` / `ModelSession` - Question phrasing and answer extraction
//! - `ChatSurface` - Where conversation turns are rendered

mod chat_surface;
mod form_runtime;
mod language_model;

pub use chat_surface::ChatSurface;
pub use form_runtime::{
    FieldChange, FieldProperty, FormLoader, FormRuntime, FormRuntimeError, PropertyChange,
};
pub use language_model::{
    Availability, ContentPart, ImageInput, InputModality, LanguageModel, MessageRole, ModelError,
    ModelInfo, ModelSession, PromptInput, PromptMessage, SessionOptions,
};
