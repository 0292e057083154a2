//! Conversation domain module.
//!
//! Runs one form-filling conversation: plans questions over the fillable
//! fields, reconciles answers into nested form data, and asks again until
//! every field is answered or declined.

mod controller;
mod errors;
mod planner;
mod prompts;
mod reconciler;
mod response;
mod state;
mod turn;

pub use controller::{
    CompletionSummary, ConversationController, ConversationSettings, Progress, TurnOutcome,
    DEFAULT_THANK_YOU_MESSAGE, MODEL_AVAILABLE_MESSAGE, MODEL_UNAVAILABLE_MESSAGE,
    NOT_UNDERSTOOD_MESSAGE,
};
pub use errors::ConversationError;
pub use planner::{PlanSource, QuestionPlan, QuestionPlanner, DEFAULT_BATCH_SIZE};
pub use prompts::{extraction_prompt, question_prompt, SYSTEM_PROMPT};
pub use reconciler::{
    AnswerReconciler, ExtractionResult, ReconcileReport, DEFAULT_CONFIDENCE_THRESHOLD,
};
pub use response::{ResponseExtractor, ResponseParseError};
pub use state::ConversationState;
pub use turn::{
    ConversationHistory, ConversationTurn, ResponseKind, Sender, TurnId, TurnType, UserResponse,
};
