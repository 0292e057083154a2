//! Error types for the domain layer.

use std::fmt;
use thiserror::Error;

/// Errors raised when a value or a transition breaks a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Stable codes for every failure the conversation can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,
    InvalidStateTransition,

    // Lookup errors
    FieldNotFound,
    FormNotLoaded,

    // Model errors
    ModelUnavailable,
    ModelFailed,
    ResponseParse,
    Aborted,

    // Collaborator errors
    Transport,
    ConversationBusy,
    NotAcceptingInput,
}

impl ErrorCode {
    /// Returns true when the conversation can carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ErrorCode::InvalidStateTransition)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::FieldNotFound => "FIELD_NOT_FOUND",
            ErrorCode::FormNotLoaded => "FORM_NOT_LOADED",
            ErrorCode::ModelUnavailable => "MODEL_UNAVAILABLE",
            ErrorCode::ModelFailed => "MODEL_FAILED",
            ErrorCode::ResponseParse => "RESPONSE_PARSE",
            ErrorCode::Aborted => "ABORTED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::ConversationBusy => "CONVERSATION_BUSY",
            ErrorCode::NotAcceptingInput => "NOT_ACCEPTING_INPUT",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("email");
        assert_eq!(format!("{}", err), "Field 'email' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("age", 0, 120, 150);
        assert_eq!(
            format!("{}", err),
            "Field 'age' must be between 0 and 120, got 150"
        );
    }

    #[test]
    fn validation_error_invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("state_transition", "Idle to Complete");
        assert_eq!(
            format!("{}", err),
            "Field 'state_transition' has invalid format: Idle to Complete"
        );
    }

    #[test]
    fn error_code_display_formats_correctly() {
        assert_eq!(format!("{}", ErrorCode::ResponseParse), "RESPONSE_PARSE");
        assert_eq!(format!("{}", ErrorCode::ModelUnavailable), "MODEL_UNAVAILABLE");
        assert_eq!(format!("{}", ErrorCode::ConversationBusy), "CONVERSATION_BUSY");
    }

    #[test]
    fn only_invalid_transitions_are_unrecoverable() {
        assert!(!ErrorCode::InvalidStateTransition.is_recoverable());
        assert!(ErrorCode::ResponseParse.is_recoverable());
        assert!(ErrorCode::Transport.is_recoverable());
    }
}
