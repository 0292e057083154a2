//! Form runtime port - the live form model the conversation fills in.
//!
//! The runtime owns field values and validity. The core only ever reads
//! snapshots (`FormNode`, `FormField`) and pushes collected answers back
//! through `import_data`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::domain::form::{FormField, FormNode};

/// Port for a live, validating form instance.
#[async_trait]
pub trait FormRuntime: Send + Sync {
    /// Snapshot of the whole field tree.
    fn root(&self) -> FormNode;

    /// Fresh snapshot of one field.
    fn field(&self, id: &str) -> Option<FormField>;

    /// Ids of fields the runtime currently considers invalid.
    fn invalid_field_ids(&self) -> Vec<String>;

    /// Pushes a nested data document into the form, revalidating every
    /// field it touches.
    async fn import_data(&self, data: &Value) -> Result<(), FormRuntimeError>;

    /// Subscribes to field property changes.
    fn subscribe(&self) -> broadcast::Receiver<FieldChange>;

    /// Resolves once the form has finished initialising.
    async fn wait_ready(&self) -> Result<(), FormRuntimeError>;

    /// Message to show after the form has been completed.
    fn thank_you_message(&self) -> Option<String>;

    /// Current data document of the form.
    fn export_data(&self) -> Value;
}

/// Port for turning a form URL into a running form instance.
#[async_trait]
pub trait FormLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Arc<dyn FormRuntime>, FormRuntimeError>;
}

/// Property named in a change notification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldProperty {
    Value,
    Valid,
    Visible,
    Enabled,
    ReadOnly,
    Items,
}

/// One property that moved from `previous` to `current`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    #[serde(rename = "propertyName")]
    pub property: FieldProperty,
    #[serde(rename = "prevValue")]
    pub previous: Value,
    #[serde(rename = "currentValue")]
    pub current: Value,
}

/// Change notification for a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field_id: String,
    pub changes: Vec<PropertyChange>,
}

impl FieldChange {
    pub fn new(field_id: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            changes: Vec::new(),
        }
    }

    /// Adds a property change.
    pub fn with_change(mut self, property: FieldProperty, previous: Value, current: Value) -> Self {
        self.changes.push(PropertyChange {
            property,
            previous,
            current,
        });
        self
    }

    /// Returns true if `property` is among the changes.
    pub fn touches(&self, property: &FieldProperty) -> bool {
        self.changes.iter().any(|c| &c.property == property)
    }
}

/// Form runtime and loader errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FormRuntimeError {
    /// The definition could not be fetched.
    #[error("failed to load form from {url}: {message}")]
    Load { url: String, message: String },

    /// The definition was fetched but is not a usable form.
    #[error("invalid form definition: {0}")]
    InvalidDefinition(String),

    /// Data could not be moved across the runtime boundary.
    #[error("transport error: {0}")]
    Transport(String),

    /// The form did not become ready.
    #[error("form not ready: {0}")]
    NotReady(String),
}

impl FormRuntimeError {
    pub fn load(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn invalid_definition(message: impl Into<String>) -> Self {
        Self::InvalidDefinition(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_change_reports_touched_properties() {
        let change = FieldChange::new("f1").with_change(FieldProperty::Value, json!(null), json!("x"));
        assert!(change.touches(&FieldProperty::Value));
        assert!(!change.touches(&FieldProperty::Valid));
    }

    #[test]
    fn property_change_uses_runtime_keys() {
        let change = FieldChange::new("f1").with_change(FieldProperty::ReadOnly, json!(false), json!(true));
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["fieldId"], json!("f1"));
        assert_eq!(json["changes"][0]["propertyName"], json!("readOnly"));
        assert_eq!(json["changes"][0]["currentValue"], json!(true));
    }

    #[test]
    fn load_error_names_url() {
        let err = FormRuntimeError::load("forms/contact.json", "not found");
        assert_eq!(err.to_string(), "failed to load form from forms/contact.json: not found");
    }
}
