//! Recovery of a JSON object from free-form model output.
//!
//! Models wrap their JSON in code fences and prose. Recovery is a fixed
//! cascade that stops at the first attempt producing an object:
//!
//! 1. trim and strip code fence markers
//! 2. take the outermost `{...}` span of what remains
//! 3. parse it
//! 4. collapse whitespace runs and parse again
//! 5. take the outermost `{...}` span of the untouched input, collapse, parse
//!
//! Nothing beyond whitespace normalization is repaired.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:[jJ][sS][oO][nN])?").expect("fence pattern"));

static OBJECT_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("object pattern"));

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

const EXCERPT_CHARS: usize = 120;

/// Model output that no recovery step could turn into a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not recover a JSON object from model output: {excerpt}")]
pub struct ResponseParseError {
    pub excerpt: String,
}

impl ResponseParseError {
    fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let mut excerpt: String = trimmed.chars().take(EXCERPT_CHARS).collect();
        if trimmed.chars().count() > EXCERPT_CHARS {
            excerpt.push_str("...");
        }
        Self { excerpt }
    }
}

/// Best-effort JSON object recovery.
pub struct ResponseExtractor;

impl ResponseExtractor {
    /// Recovers the single JSON object in `raw`.
    pub fn extract(raw: &str) -> Result<Map<String, Value>, ResponseParseError> {
        let mut text = raw.trim().to_string();
        if text.contains("```") {
            text = FENCE.replace_all(&text, "").trim().to_string();
        }

        let candidate = OBJECT_SPAN
            .find(&text)
            .map(|m| m.as_str())
            .unwrap_or(text.as_str());

        if let Some(object) = parse_object(candidate) {
            tracing::debug!(step = "direct", "parsed model response");
            return Ok(object);
        }

        if let Some(object) = parse_object(&collapse_whitespace(candidate)) {
            tracing::debug!(step = "collapsed", "parsed model response");
            return Ok(object);
        }

        if let Some(span) = OBJECT_SPAN.find(raw) {
            if let Some(object) = parse_object(&collapse_whitespace(span.as_str())) {
                tracing::debug!(step = "rescan", "parsed model response");
                return Ok(object);
            }
        }

        tracing::warn!(length = raw.len(), "model response held no recoverable JSON object");
        Err(ResponseParseError::from_raw(raw))
    }

    /// Recovers the object and deserializes it into `T`.
    pub fn extract_as<T: DeserializeOwned>(raw: &str) -> Result<T, ResponseParseError> {
        let object = Self::extract(raw)?;
        serde_json::from_value(Value::Object(object)).map_err(|e| {
            tracing::warn!(error = %e, "model response had unexpected shape");
            ResponseParseError::from_raw(raw)
        })
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}
