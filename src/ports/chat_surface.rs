//! Chat surface port - where conversation turns are rendered.

use crate::domain::conversation::ConversationTurn;

/// Receives every turn appended to the conversation history.
///
/// Implementations must not block; rendering happens elsewhere.
pub trait ChatSurface: Send + Sync {
    fn post(&self, turn: &ConversationTurn);
}
