//! Turning user replies into collected field values.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::errors::ConversationError;
use super::prompts::extraction_prompt;
use super::response::ResponseExtractor;
use crate::domain::form::{CollectedData, FormField, Schema};
use crate::ports::{ImageInput, ModelError, ModelSession, PromptInput};

/// Results at or below this confidence are treated as not provided.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// The model's verdict for one field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub value: Value,
    #[serde(default, deserialize_with = "lenient_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl ExtractionResult {
    /// Null value given with full confidence and a refusal reason.
    pub fn is_refusal(&self) -> bool {
        if !self.value.is_null() || self.confidence < 1.0 {
            return false;
        }
        let reasoning = self.reasoning.to_lowercase();
        reasoning.contains("refus") || reasoning.contains("declin")
    }
}

/// Accepts numbers or numeric strings, clamped to `[0, 1]`.
fn lenient_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let confidence = match raw {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(confidence.clamp(0.0, 1.0))
}

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    /// Data paths written.
    pub written: Vec<String>,
    /// Result keys dropped for low confidence or bad shape.
    pub discarded: Vec<String>,
    /// Field ids the user declined.
    pub declined: Vec<String>,
}

impl ReconcileReport {
    pub fn has_writes(&self) -> bool {
        !self.written.is_empty()
    }
}

/// Owns the collected data and every write to it.
#[derive(Debug, Clone)]
pub struct AnswerReconciler {
    data: CollectedData,
    threshold: f64,
}

impl Default for AnswerReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl AnswerReconciler {
    pub fn new(threshold: f64) -> Self {
        Self {
            data: CollectedData::new(),
            threshold,
        }
    }

    pub fn data(&self) -> &CollectedData {
        &self.data
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    /// Writes a typed value for a known field, bypassing the model.
    ///
    /// Used for widget replies and for raw text when no model is available.
    pub fn apply_direct(&mut self, field: &FormField, value: Value) -> ReconcileReport {
        let path = data_path(field);
        let mut report = ReconcileReport::default();
        if self.data.set(&path, value) {
            tracing::debug!(field_id = %field.id, path = %path, "stored direct answer");
            report.written.push(path);
        }
        report
    }

    /// Asks the model to extract values for `fields` from a free-text reply
    /// and merges the confident ones.
    ///
    /// Nothing is written if `cancel` fires before the merge.
    pub async fn extract(
        &mut self,
        fields: &[FormField],
        content: &str,
        image: Option<&ImageInput>,
        session: &dyn ModelSession,
        cancel: &CancellationToken,
        resolve: impl Fn(&str) -> Option<FormField>,
    ) -> Result<ReconcileReport, ConversationError> {
        let schema = Schema::from_fields(fields);
        let prompt = extraction_prompt(&schema, content, image.is_some());
        let input = match image {
            Some(image) => PromptInput::with_image(prompt, image.clone()),
            None => PromptInput::text(prompt),
        };

        let raw = session.prompt_cancellable(input, cancel).await?;
        if cancel.is_cancelled() {
            return Err(ModelError::Aborted.into());
        }

        let object = ResponseExtractor::extract(&raw)?;
        Ok(self.merge(object, fields, resolve))
    }

    /// Merges parsed extraction results.
    ///
    /// Each result is matched to a field by id among `fields`, then by name,
    /// then through `resolve`. Results that match no field are discarded.
    pub fn merge(
        &mut self,
        results: Map<String, Value>,
        fields: &[FormField],
        resolve: impl Fn(&str) -> Option<FormField>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for (name, raw) in results {
            let result: ExtractionResult = match raw {
                Value::Object(_) => match serde_json::from_value(raw) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::debug!(field = %name, error = %e, "malformed extraction result");
                        report.discarded.push(name);
                        continue;
                    }
                },
                _ => {
                    tracing::debug!(field = %name, "extraction result is not an object");
                    report.discarded.push(name);
                    continue;
                }
            };

            if result.confidence <= self.threshold {
                tracing::debug!(field = %name, confidence = result.confidence, "discarded low-confidence value");
                report.discarded.push(name);
                continue;
            }

            let field = result
                .id
                .as_deref()
                .and_then(|id| fields.iter().find(|f| f.id == id).cloned())
                .or_else(|| fields.iter().find(|f| f.name == name).cloned())
                .or_else(|| result.id.as_deref().and_then(&resolve));

            let Some(field) = field else {
                tracing::debug!(field = %name, "extraction result matches no form field");
                report.discarded.push(name);
                continue;
            };
            let path = data_path(&field);

            if result.is_refusal() {
                tracing::info!(field_id = %field.id, "user declined field");
                report.declined.push(field.id.clone());
            }

            if self.data.set(&path, result.value) {
                report.written.push(path);
            }
        }

        report
    }
}

fn data_path(field: &FormField) -> String {
    if field.qualified_path.is_empty() {
        field.name.clone()
    } else {
        field.qualified_path.clone()
    }
}
