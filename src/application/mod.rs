//! Application layer - coordinates the conversation for a front end.

mod conversation_session;

pub use conversation_session::{ConversationSession, SessionError, SessionSnapshot};
