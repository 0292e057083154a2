//! Conversation turns, the append-only history, and user replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::domain::form::{FieldType, FormField};
use crate::domain::foundation::Timestamp;
use crate::ports::ImageInput;

/// Unique identifier for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(Uuid);

impl TurnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TurnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    System,
    Assistant,
    User,
}

/// How the chat surface should render a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnType {
    Text,
    Html,
    /// Yes/no control for a checkbox.
    Boolean,
    /// Option picker for drop-downs, radio and checkbox groups.
    Choice,
    /// The field's own widget (date, file, range, color).
    Field,
    Image,
}

impl TurnType {
    /// Widget turn type for asking about a complex field.
    pub fn for_widget(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Checkbox => TurnType::Boolean,
            FieldType::DropDown | FieldType::RadioGroup | FieldType::CheckboxGroup => {
                TurnType::Choice
            }
            _ => TurnType::Field,
        }
    }
}

/// One immutable entry in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    id: TurnId,
    sender: Sender,
    content: String,
    #[serde(rename = "type")]
    turn_type: TurnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<FormField>,
    created_at: Timestamp,
}

impl ConversationTurn {
    pub fn new(sender: Sender, content: impl Into<String>, turn_type: TurnType) -> Self {
        Self {
            id: TurnId::new(),
            sender,
            content: content.into(),
            turn_type,
            field: None,
            created_at: Timestamp::now(),
        }
    }

    /// Plain assistant text.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content, TurnType::Text)
    }

    /// Assistant HTML.
    pub fn assistant_html(content: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, content, TurnType::Html)
    }

    /// Progress and status notices.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Sender::System, content, TurnType::Text)
    }

    /// What the user said.
    pub fn user(content: impl Into<String>, turn_type: TurnType) -> Self {
        Self::new(Sender::User, content, turn_type)
    }

    /// Assistant prompt rendered with the field's widget.
    pub fn widget(content: impl Into<String>, field: FormField) -> Self {
        let turn_type = TurnType::for_widget(&field.field_type);
        Self {
            field: Some(field),
            ..Self::new(Sender::Assistant, content, turn_type)
        }
    }

    pub fn with_field(mut self, field: FormField) -> Self {
        self.field = Some(field);
        self
    }

    pub fn id(&self) -> TurnId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn turn_type(&self) -> TurnType {
        self.turn_type
    }

    pub fn field(&self) -> Option<&FormField> {
        self.field.as_ref()
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }
}

/// Ordered, append-only record of the conversation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: ConversationTurn) -> &ConversationTurn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns from one sender.
    pub fn by_sender(&self, sender: Sender) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().filter(move |t| t.sender == sender)
    }

    /// Only a conversation reset may clear the record.
    pub(crate) fn clear(&mut self) {
        self.turns.clear();
    }
}

/// Where a user reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Text,
    Image,
    /// A typed value from a field widget.
    Widget,
    /// A front-end command; the controller ignores these.
    Command,
}

/// One reply delivered by the chat surface.
#[derive(Debug, Clone, PartialEq)]
pub struct UserResponse {
    pub content: Value,
    pub image: Option<ImageInput>,
    /// Set when the reply came from a field widget.
    pub field: Option<FormField>,
    pub kind: ResponseKind,
}

impl UserResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            image: None,
            field: None,
            kind: ResponseKind::Text,
        }
    }

    /// Free text accompanied by an image.
    pub fn image(content: impl Into<String>, image: ImageInput) -> Self {
        Self {
            content: Value::String(content.into()),
            image: Some(image),
            field: None,
            kind: ResponseKind::Image,
        }
    }

    /// A typed widget value for `field`.
    pub fn widget(field: FormField, value: Value) -> Self {
        Self {
            content: value,
            image: None,
            field: Some(field),
            kind: ResponseKind::Widget,
        }
    }

    pub fn command(content: impl Into<String>) -> Self {
        Self {
            content: Value::String(content.into()),
            image: None,
            field: None,
            kind: ResponseKind::Command,
        }
    }

    /// Content as display text.
    pub fn display_text(&self) -> String {
        match &self.content {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn widget_turn_types_follow_field_type() {
        assert_eq!(TurnType::for_widget(&FieldType::Checkbox), TurnType::Boolean);
        assert_eq!(TurnType::for_widget(&FieldType::RadioGroup), TurnType::Choice);
        assert_eq!(TurnType::for_widget(&FieldType::CheckboxGroup), TurnType::Choice);
        assert_eq!(TurnType::for_widget(&FieldType::DateInput), TurnType::Field);
        assert_eq!(TurnType::for_widget(&FieldType::Color), TurnType::Field);
    }

    #[test]
    fn widget_turn_carries_field() {
        let field = FormField::new("f2", "plan", FieldType::DropDown).with_label("Plan");
        let turn = ConversationTurn::widget("Plan", field);
        assert_eq!(turn.sender(), Sender::Assistant);
        assert_eq!(turn.turn_type(), TurnType::Choice);
        assert_eq!(turn.field().unwrap().id, "f2");
    }

    #[test]
    fn history_is_ordered() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::system("Loading form..."));
        history.push(ConversationTurn::assistant("What is your name?"));
        history.push(ConversationTurn::user("Ada", TurnType::Text));

        let contents: Vec<_> = history.turns().iter().map(|t| t.content()).collect();
        assert_eq!(contents, vec!["Loading form...", "What is your name?", "Ada"]);
        assert_eq!(history.by_sender(Sender::User).count(), 1);
    }

    #[test]
    fn turn_serializes_for_chat_surface() {
        let json = serde_json::to_value(ConversationTurn::assistant_html("<b>Hi</b>")).unwrap();
        assert_eq!(json["sender"], json!("assistant"));
        assert_eq!(json["type"], json!("html"));
        assert!(json.get("field").is_none());
    }

    #[test]
    fn display_text_renders_non_string_content() {
        assert_eq!(UserResponse::text("hi").display_text(), "hi");
        let field = FormField::new("c", "agree", FieldType::Checkbox);
        assert_eq!(UserResponse::widget(field, json!(true)).display_text(), "true");
    }
}
