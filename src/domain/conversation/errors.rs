//! Conversation error types.

use thiserror::Error;

use super::response::ResponseParseError;
use super::state::ConversationState;
use crate::domain::foundation::{ErrorCode, ValidationError};
use crate::ports::{FormRuntimeError, ModelError};

/// Failures surfaced by the conversation controller.
#[derive(Debug, Clone, Error)]
pub enum ConversationError {
    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error(transparent)]
    ResponseParse(#[from] ResponseParseError),

    #[error("model request failed: {0}")]
    Model(#[from] ModelError),

    #[error("form runtime error: {0}")]
    Transport(#[from] FormRuntimeError),

    #[error("invalid state transition: {0}")]
    InvalidTransition(#[from] ValidationError),

    #[error("conversation is not accepting input while {0:?}")]
    NotAcceptingInput(ConversationState),

    #[error("no form is loaded")]
    FormNotLoaded,
}

impl ConversationError {
    /// Maps the error onto its stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConversationError::ModelUnavailable(_) => ErrorCode::ModelUnavailable,
            ConversationError::ResponseParse(_) => ErrorCode::ResponseParse,
            ConversationError::Model(ModelError::Aborted) => ErrorCode::Aborted,
            ConversationError::Model(ModelError::Unavailable { .. }) => ErrorCode::ModelUnavailable,
            ConversationError::Model(_) => ErrorCode::ModelFailed,
            ConversationError::Transport(_) => ErrorCode::Transport,
            ConversationError::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            ConversationError::NotAcceptingInput(_) => ErrorCode::NotAcceptingInput,
            ConversationError::FormNotLoaded => ErrorCode::FormNotLoaded,
        }
    }

    /// True when the error came from cancelling an in-flight call.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ConversationError::Model(ModelError::Aborted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_model_errors_by_kind() {
        assert_eq!(
            ConversationError::from(ModelError::Aborted).code(),
            ErrorCode::Aborted
        );
        assert_eq!(
            ConversationError::from(ModelError::unavailable("gone")).code(),
            ErrorCode::ModelUnavailable
        );
        assert_eq!(
            ConversationError::from(ModelError::network("reset")).code(),
            ErrorCode::ModelFailed
        );
    }

    #[test]
    fn transport_errors_keep_their_message() {
        let err = ConversationError::from(FormRuntimeError::transport("import rejected"));
        assert_eq!(err.code(), ErrorCode::Transport);
        assert_eq!(err.to_string(), "form runtime error: transport error: import rejected");
    }

    #[test]
    fn not_accepting_input_names_state() {
        let err = ConversationError::NotAcceptingInput(ConversationState::Reconciling);
        assert_eq!(err.to_string(), "conversation is not accepting input while Reconciling");
    }
}
