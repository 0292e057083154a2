//! Channel-backed chat surface.

use tokio::sync::mpsc;

use crate::domain::conversation::ConversationTurn;
use crate::ports::ChatSurface;

/// Forwards every turn to an unbounded channel for a renderer task.
#[derive(Debug, Clone)]
pub struct ChannelSurface {
    sender: mpsc::UnboundedSender<ConversationTurn>,
}

impl ChannelSurface {
    /// Creates a surface and the receiver its turns arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConversationTurn>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ChatSurface for ChannelSurface {
    fn post(&self, turn: &ConversationTurn) {
        if self.sender.send(turn.clone()).is_err() {
            tracing::debug!("chat surface receiver dropped, turn not rendered");
        }
    }
}
