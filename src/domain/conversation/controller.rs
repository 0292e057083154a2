//! The conversation controller: one form-filling conversation end to end.
//!
//! The controller owns the state machine and drives the other pieces in
//! turn: field discovery, question planning, answer reconciliation and the
//! validity check that decides what to ask next. Every async step checks
//! the cancellation token afterwards and stops before writing anything if
//! the conversation was reset or abandoned meanwhile.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::errors::ConversationError;
use super::planner::{PlanSource, QuestionPlanner, DEFAULT_BATCH_SIZE};
use super::prompts::SYSTEM_PROMPT;
use super::reconciler::{AnswerReconciler, ReconcileReport, DEFAULT_CONFIDENCE_THRESHOLD};
use super::state::ConversationState;
use super::turn::{ConversationHistory, ConversationTurn, ResponseKind, TurnType, UserResponse};
use crate::domain::form::{CollectedData, FieldExtractor, FieldStats, FormField};
use crate::domain::foundation::StateMachine;
use crate::ports::{
    ChatSurface, FormLoader, FormRuntime, LanguageModel, ModelError, ModelSession, SessionOptions,
};

pub const MODEL_AVAILABLE_MESSAGE: &str = "AI Model is available";
pub const MODEL_UNAVAILABLE_MESSAGE: &str = "Built-in conversational AI is unavailable";
pub const NOT_UNDERSTOOD_MESSAGE: &str = "I didn't quite understand that. Could you please try again?";
pub const DEFAULT_THANK_YOU_MESSAGE: &str = "Thank you for your submission!";

/// Tunables for one conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSettings {
    /// Simple fields asked together.
    pub batch_size: usize,
    /// Extraction results must be strictly above this to be kept.
    pub confidence_threshold: f64,
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }
}

/// Answered-field progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl Progress {
    fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((current as f64 / total as f64) * 100.0).round() as u8
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// Final result of a completed conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub message: String,
    pub is_complete: bool,
    pub collected_data: Value,
    /// Ids of fields the user chose not to answer.
    pub declined: Vec<String>,
}

/// What handling one user reply led to.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// Command replies are left to the front end.
    Ignored,
    /// A new question is out for these field ids.
    Asked { requested: Vec<String> },
    /// The form rejected a value; the user is asked to fix this field.
    Repairing { field_id: String },
    /// The reply could not be interpreted; the same question stands.
    NotUnderstood,
    /// The collected data could not be pushed into the form.
    FormUpdateFailed,
    /// Every fillable field is answered.
    Completed(CompletionSummary),
    /// Reply after completion; the thank-you message was shown.
    ThankYou,
}

/// Drives one form-filling conversation.
pub struct ConversationController {
    settings: ConversationSettings,
    model: Arc<dyn LanguageModel>,
    loader: Arc<dyn FormLoader>,
    surface: Option<Arc<dyn ChatSurface>>,
    session: Option<Arc<dyn ModelSession>>,
    extractor: Option<FieldExtractor>,
    planner: QuestionPlanner,
    reconciler: AnswerReconciler,
    history: ConversationHistory,
    state: ConversationState,
    requested: Vec<FormField>,
    declined: HashSet<String>,
    form_url: Option<String>,
    cancel: CancellationToken,
}

impl ConversationController {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        loader: Arc<dyn FormLoader>,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            planner: QuestionPlanner::new(settings.batch_size),
            reconciler: AnswerReconciler::new(settings.confidence_threshold),
            settings,
            model,
            loader,
            surface: None,
            session: None,
            extractor: None,
            history: ConversationHistory::new(),
            state: ConversationState::Idle,
            requested: Vec::new(),
            declined: HashSet::new(),
            form_url: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Mirrors every history entry to `surface`.
    pub fn with_surface(mut self, surface: Arc<dyn ChatSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn collected_data(&self) -> &CollectedData {
        self.reconciler.data()
    }

    pub fn requested_fields(&self) -> &[FormField] {
        &self.requested
    }

    pub fn form_url(&self) -> Option<&str> {
        self.form_url.as_deref()
    }

    /// True once a session was created; false means templated questions only.
    pub fn has_model_session(&self) -> bool {
        self.session.is_some()
    }

    /// Token that aborts the in-flight model call.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Sorted ids of fields the user declined.
    pub fn declined_fields(&self) -> Vec<String> {
        let mut declined: Vec<String> = self.declined.iter().cloned().collect();
        declined.sort();
        declined
    }

    /// Field counts from the last extraction, if a form is loaded.
    pub fn field_stats(&self) -> Option<FieldStats> {
        self.extractor.as_ref().map(|e| e.field_stats())
    }

    /// Collected leaves against collected plus still-open fields.
    pub fn progress(&self) -> Progress {
        let current = self.reconciler.data().leaf_count();
        let remaining = self
            .extractor
            .as_ref()
            .map(|e| {
                e.fillable_fields()
                    .iter()
                    .filter(|f| !self.declined.contains(&f.id))
                    .count()
            })
            .unwrap_or(0);
        Progress::new(current, current + remaining)
    }

    /// Sets up the model session, loads the form and asks the first question.
    ///
    /// A load failure is recorded in the history and leaves the controller
    /// `Idle` so `start` can be retried.
    pub async fn start(&mut self, form_url: &str) -> Result<TurnOutcome, ConversationError> {
        self.transition(ConversationState::AwaitingFormReady)?;
        let result = self.load_and_plan(form_url).await;
        self.resume_if_aborted(result, ConversationState::Idle)
    }

    async fn load_and_plan(&mut self, form_url: &str) -> Result<TurnOutcome, ConversationError> {
        self.form_url = Some(form_url.to_string());
        let cancel = self.cancel.clone();

        self.record(ConversationTurn::system("Loading Form Conversational AI..."));
        let availability_message = self.setup_model().await;
        self.bail_if_cancelled(&cancel)?;
        self.record(ConversationTurn::system(availability_message));

        self.record(ConversationTurn::system("Loading form..."));
        let runtime = match self.loader.load(form_url).await {
            Ok(runtime) => runtime,
            Err(e) => return Err(self.abandon_start(e.into())),
        };
        self.bail_if_cancelled(&cancel)?;

        self.record(ConversationTurn::system("Waiting for form to ready..."));
        if let Err(e) = runtime.wait_ready().await {
            return Err(self.abandon_start(e.into()));
        }
        self.bail_if_cancelled(&cancel)?;
        self.record(ConversationTurn::system("Form ready"));

        let mut extractor = FieldExtractor::new(runtime);
        extractor.extract_fillable_fields();
        self.extractor = Some(extractor);

        self.transition(ConversationState::Planning)?;
        self.plan_next().await
    }

    async fn setup_model(&mut self) -> &'static str {
        let availability = self.model.availability().await;
        if !availability.is_usable() {
            tracing::warn!(?availability, "language model unavailable, using templated questions");
            self.enter_degraded_mode();
            return MODEL_UNAVAILABLE_MESSAGE;
        }

        let options = SessionOptions::new(SYSTEM_PROMPT).with_image_input();
        match self.model.create(options).await {
            Ok(session) => {
                let info = self.model.model_info();
                tracing::info!(backend = %info.name, model = %info.model, "model session created");
                self.session = Some(session);
                self.planner.set_batch_size(self.settings.batch_size);
                MODEL_AVAILABLE_MESSAGE
            }
            Err(e) => {
                tracing::warn!(error = %e, "model session creation failed, using templated questions");
                self.enter_degraded_mode();
                MODEL_UNAVAILABLE_MESSAGE
            }
        }
    }

    fn enter_degraded_mode(&mut self) {
        self.session = None;
        self.planner.set_batch_size(1);
    }

    fn abandon_start(&mut self, error: ConversationError) -> ConversationError {
        tracing::warn!(error = %error, error_code = %error.code(), "form failed to load");
        self.record(ConversationTurn::assistant(format!(
            "Sorry, the form could not be loaded: {}",
            error
        )));
        self.state = ConversationState::Idle;
        error
    }

    /// Handles one reply from the chat surface.
    pub async fn handle_user_response(
        &mut self,
        response: UserResponse,
    ) -> Result<TurnOutcome, ConversationError> {
        if response.kind == ResponseKind::Command {
            return Ok(TurnOutcome::Ignored);
        }

        if self.state == ConversationState::Complete {
            let message = self
                .extractor
                .as_ref()
                .and_then(|e| e.runtime().thank_you_message())
                .unwrap_or_else(|| DEFAULT_THANK_YOU_MESSAGE.to_string());
            self.record(ConversationTurn::assistant_html(message));
            return Ok(TurnOutcome::ThankYou);
        }

        if !self.state.accepts_user_input() {
            return Err(ConversationError::NotAcceptingInput(self.state));
        }

        let turn_type = if response.image.is_some() {
            TurnType::Image
        } else {
            TurnType::Text
        };
        self.record(ConversationTurn::user(response.display_text(), turn_type));
        let resume = self.state;
        self.transition(ConversationState::Reconciling)?;
        let result = self.reconcile(response).await;
        self.resume_if_aborted(result, resume)
    }

    async fn reconcile(&mut self, response: UserResponse) -> Result<TurnOutcome, ConversationError> {
        if let Some(field) = response.field.as_ref() {
            self.reconciler.apply_direct(field, response.content.clone());
            return self.after_write().await;
        }

        let Some(session) = self.session.clone() else {
            return self.reconcile_without_model(&response).await;
        };

        self.record(ConversationTurn::system("Extracting data from user response..."));
        let cancel = self.cancel.clone();
        let runtime = self.runtime()?;
        let text = response.display_text();
        let result = self
            .reconciler
            .extract(
                &self.requested,
                &text,
                response.image.as_ref(),
                session.as_ref(),
                &cancel,
                move |id| runtime.field(id),
            )
            .await;

        match result {
            Ok(report) => {
                self.bail_if_cancelled(&cancel)?;
                self.note_extraction(&report);
                self.after_write().await
            }
            Err(e) if e.is_aborted() => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, error_code = %e.code(), "could not interpret user reply");
                self.record(ConversationTurn::assistant(NOT_UNDERSTOOD_MESSAGE));
                self.transition(ConversationState::AwaitingAnswer)?;
                Ok(TurnOutcome::NotUnderstood)
            }
        }
    }

    async fn reconcile_without_model(
        &mut self,
        response: &UserResponse,
    ) -> Result<TurnOutcome, ConversationError> {
        let Some(field) = self.requested.first().cloned() else {
            self.record(ConversationTurn::assistant(NOT_UNDERSTOOD_MESSAGE));
            self.transition(ConversationState::AwaitingAnswer)?;
            return Ok(TurnOutcome::NotUnderstood);
        };
        self.reconciler
            .apply_direct(&field, Value::String(response.display_text()));
        self.after_write().await
    }

    fn note_extraction(&mut self, report: &ReconcileReport) {
        let data = self.reconciler.data();
        let extracted: Map<String, Value> = report
            .written
            .iter()
            .map(|path| (path.clone(), data.get(path).cloned().unwrap_or(Value::Null)))
            .collect();
        let summary = serde_json::to_string(&extracted).unwrap_or_default();
        self.record(ConversationTurn::system(format!("Extracted data: {}", summary)));
        tracing::info!(
            written = report.written.len(),
            discarded = report.discarded.len(),
            declined = report.declined.len(),
            "reconciled user reply"
        );
        self.declined.extend(report.declined.iter().cloned());
    }

    /// Pushes collected data into the form and decides the next step.
    async fn after_write(&mut self) -> Result<TurnOutcome, ConversationError> {
        let cancel = self.cancel.clone();
        let runtime = self.runtime()?;

        self.record(ConversationTurn::system("Updating form data..."));
        if let Err(e) = runtime.import_data(&self.reconciler.data().to_value()).await {
            self.bail_if_cancelled(&cancel)?;
            tracing::warn!(error = %e, "form rejected collected data");
            self.record(ConversationTurn::assistant(format!(
                "I couldn't update the form: {}. Please try again.",
                e
            )));
            self.transition(ConversationState::AwaitingAnswer)?;
            return Ok(TurnOutcome::FormUpdateFailed);
        }
        self.bail_if_cancelled(&cancel)?;
        self.record(ConversationTurn::system("Form data updated"));

        let invalid = match self.extractor.as_mut() {
            Some(extractor) => {
                extractor.extract_fillable_fields();
                extractor.drain_changes();
                extractor.invalid_fields()
            }
            None => return Err(ConversationError::FormNotLoaded),
        };

        let first_invalid = invalid
            .into_iter()
            .find(|f| !self.declined.contains(&f.id));

        match first_invalid {
            Some(field) => self.ask_for_repair(field),
            None => {
                self.transition(ConversationState::Planning)?;
                self.plan_next().await
            }
        }
    }

    fn ask_for_repair(&mut self, field: FormField) -> Result<TurnOutcome, ConversationError> {
        self.transition(ConversationState::Repairing)?;
        let reason = field
            .validation_message
            .clone()
            .unwrap_or_else(|| "the value is not valid".to_string());
        let message = format!("Invalid field: {}, reason: {}", field.display_label(), reason);
        tracing::info!(field_id = %field.id, "asking user to repair field");

        let turn = if field.field_type.is_complex() {
            ConversationTurn::widget(message, field.clone())
        } else {
            ConversationTurn::assistant(message)
        };
        self.record(turn);

        let field_id = field.id.clone();
        self.requested = vec![field];
        self.transition(ConversationState::AwaitingAnswer)?;
        Ok(TurnOutcome::Repairing { field_id })
    }

    /// Asks about the next batch, or completes when nothing is left.
    async fn plan_next(&mut self) -> Result<TurnOutcome, ConversationError> {
        let candidates: Vec<FormField> = match self.extractor.as_ref() {
            Some(extractor) => extractor
                .fillable_fields()
                .iter()
                .filter(|f| !self.declined.contains(&f.id))
                .cloned()
                .collect(),
            None => return Err(ConversationError::FormNotLoaded),
        };

        let batch = self.planner.select_next_fields(&candidates);
        if batch.is_empty() {
            return self.complete();
        }

        let cancel = self.cancel.clone();
        let session = self.session.clone();
        let lone_complex = batch.len() == 1 && batch[0].field_type.is_complex();
        if !lone_complex {
            let labels: Vec<&str> = batch.iter().map(|f| f.display_label()).collect();
            self.record(ConversationTurn::system(format!(
                "Generating question for fields: {}",
                labels.join(", ")
            )));
        }

        let plan = self
            .planner
            .plan_question(&batch, session.as_deref(), &cancel)
            .await;
        self.bail_if_cancelled(&cancel)?;

        if plan.source == PlanSource::Model {
            self.record(ConversationTurn::system(format!(
                "Generated question: {}",
                plan.message
            )));
        }
        self.record(plan.to_turn());
        self.requested = plan.requested_fields.clone();
        self.transition(ConversationState::AwaitingAnswer)?;
        Ok(TurnOutcome::Asked {
            requested: plan.requested_ids(),
        })
    }

    fn complete(&mut self) -> Result<TurnOutcome, ConversationError> {
        let data = self.reconciler.data();
        let summary = if data.is_empty() {
            "All done!".to_string()
        } else {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_default();
            format!("I've collected: {}", pretty)
        };
        let message = format!(
            "Perfect! {}\n\nYour form is now complete and ready to submit.",
            summary
        );
        let completion = CompletionSummary {
            message: message.clone(),
            is_complete: true,
            collected_data: data.to_value(),
            declined: self.declined_fields(),
        };

        self.record(ConversationTurn::assistant(message));
        self.requested.clear();
        self.transition(ConversationState::Complete)?;
        Ok(TurnOutcome::Completed(completion))
    }

    /// Token for the next turn. A token cancelled while no turn was running
    /// is replaced first.
    pub fn renew_cancellation_token(&mut self) -> CancellationToken {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.cancel.clone()
    }

    /// Puts an aborted turn back to where it started, with a fresh token.
    /// Anything already pushed into the form stays there.
    fn resume_if_aborted(
        &mut self,
        result: Result<TurnOutcome, ConversationError>,
        resume: ConversationState,
    ) -> Result<TurnOutcome, ConversationError> {
        if matches!(&result, Err(e) if e.is_aborted()) && self.state.is_busy() {
            tracing::info!(from = ?self.state, to = ?resume, "turn aborted");
            self.state = resume;
            self.cancel = CancellationToken::new();
        }
        result
    }

    /// Aborts any in-flight call, clears collected data and history, and
    /// returns to `Idle`. The form must be started again.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.reconciler.reset();
        self.history.clear();
        self.requested.clear();
        self.declined.clear();
        self.extractor = None;
        self.session = None;
        self.planner.set_batch_size(self.settings.batch_size);
        self.state = ConversationState::Idle;
        tracing::info!("conversation reset");
    }

    fn runtime(&self) -> Result<Arc<dyn FormRuntime>, ConversationError> {
        self.extractor
            .as_ref()
            .map(|e| e.runtime().clone())
            .ok_or(ConversationError::FormNotLoaded)
    }

    fn bail_if_cancelled(&self, cancel: &CancellationToken) -> Result<(), ConversationError> {
        if cancel.is_cancelled() {
            tracing::debug!(state = ?self.state, "turn abandoned after cancellation");
            return Err(ModelError::Aborted.into());
        }
        Ok(())
    }

    fn transition(&mut self, target: ConversationState) -> Result<(), ConversationError> {
        let next = self.state.transition_to(target)?;
        tracing::debug!(from = ?self.state, to = ?next, "conversation state changed");
        self.state = next;
        Ok(())
    }

    fn record(&mut self, turn: ConversationTurn) {
        if let Some(surface) = &self.surface {
            surface.post(&turn);
        }
        self.history.push(turn);
    }
}
