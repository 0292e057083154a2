//! Foundation module - Shared domain primitives.
//!
//! Error vocabulary, the state machine contract and timestamps used by the
//! form and conversation modules.

mod errors;
mod state_machine;
mod timestamp;

pub use errors::{ErrorCode, ValidationError};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
