//! ConversationSession - serialises access to one conversation.
//!
//! A turn holds the controller for its whole duration. A second reply that
//! arrives meanwhile is rejected with `SessionError::Busy` rather than
//! queued. `reset` and `abandon` go through the cancellation token, so they
//! interrupt an in-flight model call instead of waiting for it.

use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::domain::conversation::{
    ConversationController, ConversationError, ConversationState, ConversationTurn, Progress,
    TurnOutcome, UserResponse,
};

/// Session-level failures.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("conversation is busy with another turn")]
    Busy,

    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

/// Point-in-time view of a conversation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub state: ConversationState,
    pub progress: Progress,
    pub collected_data: Value,
    pub declined: Vec<String>,
    pub turns: Vec<ConversationTurn>,
}

/// Shareable handle on one conversation.
#[derive(Clone)]
pub struct ConversationSession {
    controller: Arc<Mutex<ConversationController>>,
    cancel: Arc<StdMutex<CancellationToken>>,
}

impl ConversationSession {
    pub fn new(controller: ConversationController) -> Self {
        let cancel = controller.cancellation_token();
        Self {
            controller: Arc::new(Mutex::new(controller)),
            cancel: Arc::new(StdMutex::new(cancel)),
        }
    }

    /// Loads the form and asks the first question.
    pub async fn start(&self, form_url: &str) -> Result<TurnOutcome, SessionError> {
        let mut controller = self.controller.try_lock().map_err(|_| SessionError::Busy)?;
        self.store_token(controller.renew_cancellation_token());
        Ok(controller.start(form_url).await?)
    }

    /// Handles one user reply; fails fast when a turn is already running.
    pub async fn respond(&self, response: UserResponse) -> Result<TurnOutcome, SessionError> {
        let mut controller = self.controller.try_lock().map_err(|_| {
            tracing::debug!("reply rejected, turn in progress");
            SessionError::Busy
        })?;
        self.store_token(controller.renew_cancellation_token());
        Ok(controller.handle_user_response(response).await?)
    }

    /// Cancels any in-flight call without clearing state.
    ///
    /// The aborted turn returns `Aborted` and the conversation goes back to
    /// the state the turn started from; the next turn runs on a fresh token.
    pub fn abandon(&self) {
        self.token().cancel();
    }

    /// Cancels any in-flight call, then clears data and history.
    pub async fn reset(&self) {
        self.abandon();
        let mut controller = self.controller.lock().await;
        controller.reset();
        self.store_token(controller.cancellation_token());
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let controller = self.controller.lock().await;
        SessionSnapshot {
            state: controller.state(),
            progress: controller.progress(),
            collected_data: controller.collected_data().to_value(),
            declined: controller.declined_fields(),
            turns: controller.history().turns().to_vec(),
        }
    }

    fn token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_token(&self, token: CancellationToken) {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }
}
