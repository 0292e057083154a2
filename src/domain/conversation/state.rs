//! Conversation state machine.
//!
//! Defines the lifecycle states of a form-filling conversation and the
//! transitions between them.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

/// The lifecycle state of a conversation.
///
/// - `Idle`: nothing loaded
/// - `AwaitingFormReady`: model session and form are being set up
/// - `Planning`: choosing and phrasing the next question
/// - `AwaitingAnswer`: a question is out, waiting for the user
/// - `Reconciling`: merging the user's answer into the collected data
/// - `Repairing`: asking about a field the form rejected
/// - `Complete`: every fillable field is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    AwaitingFormReady,
    Planning,
    AwaitingAnswer,
    Reconciling,
    Repairing,
    Complete,
}

impl ConversationState {
    /// Returns true if a user reply can be processed in this state.
    pub fn accepts_user_input(&self) -> bool {
        matches!(self, Self::AwaitingAnswer)
    }

    /// Returns true while a turn is being worked on.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::AwaitingFormReady | Self::Planning | Self::Reconciling | Self::Repairing
        )
    }
}

impl StateMachine for ConversationState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConversationState::*;
        matches!(
            (self, target),
            (Idle, AwaitingFormReady)
                | (AwaitingFormReady, Planning)
                // Loading failed; start may be retried
                | (AwaitingFormReady, Idle)
                | (Planning, AwaitingAnswer)
                | (Planning, Complete)
                | (AwaitingAnswer, Reconciling)
                | (Reconciling, Planning)
                | (Reconciling, Repairing)
                // Answer not understood; ask again
                | (Reconciling, AwaitingAnswer)
                | (Reconciling, Complete)
                | (Repairing, AwaitingAnswer)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConversationState::*;
        match self {
            Idle => vec![AwaitingFormReady],
            AwaitingFormReady => vec![Planning, Idle],
            Planning => vec![AwaitingAnswer, Complete],
            AwaitingAnswer => vec![Reconciling],
            Reconciling => vec![Planning, Repairing, AwaitingAnswer, Complete],
            Repairing => vec![AwaitingAnswer],
            Complete => vec![],
        }
    }
}
