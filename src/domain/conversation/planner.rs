//! Question planning: which fields to ask about next, and how to ask.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::prompts::question_prompt;
use super::response::ResponseExtractor;
use super::turn::ConversationTurn;
use crate::domain::form::{FormField, Schema};
use crate::ports::{ModelSession, PromptInput};

/// Simple fields asked together by default.
pub const DEFAULT_BATCH_SIZE: usize = 3;

/// How a question was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    /// Phrased by the language model.
    Model,
    /// Templated because the model was absent or failed.
    Fallback,
    /// A complex field asked through its widget.
    Widget,
}

/// A question ready to be shown, and the fields it asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPlan {
    pub message: String,
    pub requested_fields: Vec<FormField>,
    pub source: PlanSource,
}

impl QuestionPlan {
    /// The assistant turn that presents this question.
    pub fn to_turn(&self) -> ConversationTurn {
        match (self.source, self.requested_fields.first()) {
            (PlanSource::Widget, Some(field)) => {
                ConversationTurn::widget(self.message.clone(), field.clone())
            }
            _ => ConversationTurn::assistant(self.message.clone()),
        }
    }

    pub fn requested_ids(&self) -> Vec<String> {
        self.requested_fields.iter().map(|f| f.id.clone()).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelQuestion {
    message: String,
    #[serde(default)]
    requested_fields: Vec<String>,
}

/// Batches fillable fields and turns each batch into a question.
#[derive(Debug, Clone)]
pub struct QuestionPlanner {
    batch_size: usize,
}

impl Default for QuestionPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl QuestionPlanner {
    /// Creates a planner; a batch size of zero is treated as one.
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    /// Picks the next batch.
    ///
    /// A run of simple fields (up to the batch size) is returned as soon as a
    /// complex field follows it. A complex field reached with nothing
    /// accumulated is returned alone. Complex fields are never mixed in.
    pub fn select_next_fields(&self, fillable: &[FormField]) -> Vec<FormField> {
        let mut batch = Vec::new();
        for field in fillable {
            if field.field_type.is_complex() {
                if batch.is_empty() {
                    batch.push(field.clone());
                }
                return batch;
            }
            batch.push(field.clone());
            if batch.len() >= self.batch_size {
                break;
            }
        }
        batch
    }

    /// Produces a question for `fields`. Never fails.
    ///
    /// A lone complex field gets a widget prompt without a model call. Model
    /// errors, parse failures and a missing session all fall back to a
    /// templated question.
    pub async fn plan_question(
        &self,
        fields: &[FormField],
        session: Option<&dyn ModelSession>,
        cancel: &CancellationToken,
    ) -> QuestionPlan {
        if let [field] = fields {
            if field.field_type.is_complex() {
                return QuestionPlan {
                    message: field.display_label().to_string(),
                    requested_fields: fields.to_vec(),
                    source: PlanSource::Widget,
                };
            }
        }

        let Some(session) = session else {
            return Self::fallback(fields);
        };

        let schema = Schema::from_fields(fields);
        let raw = match session
            .prompt_cancellable(PromptInput::text(question_prompt(&schema)), cancel)
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "question generation failed, using template");
                return Self::fallback(fields);
            }
        };

        let question: ModelQuestion = match ResponseExtractor::extract_as(&raw) {
            Ok(question) => question,
            Err(e) => {
                tracing::warn!(error = %e, "question response unparseable, using template");
                return Self::fallback(fields);
            }
        };

        if question.message.trim().is_empty() {
            tracing::warn!("model returned an empty question, using template");
            return Self::fallback(fields);
        }

        let requested: Vec<FormField> = fields
            .iter()
            .filter(|f| {
                question
                    .requested_fields
                    .iter()
                    .any(|r| *r == f.id || *r == f.name)
            })
            .cloned()
            .collect();
        if requested.len() != fields.len() {
            tracing::debug!(
                asked = fields.len(),
                named = requested.len(),
                "model requested a different field set"
            );
        }

        QuestionPlan {
            message: question.message.trim().to_string(),
            requested_fields: if requested.is_empty() {
                fields.to_vec()
            } else {
                requested
            },
            source: PlanSource::Model,
        }
    }

    /// Templated question listing the field labels.
    pub fn fallback(fields: &[FormField]) -> QuestionPlan {
        let labels = fields
            .iter()
            .map(|f| f.display_label())
            .collect::<Vec<_>>()
            .join(", ");
        QuestionPlan {
            message: format!(
                "I'd like to collect some information: {}. Could you please provide these details?",
                labels
            ),
            requested_fields: fields.to_vec(),
            source: PlanSource::Fallback,
        }
    }
}
