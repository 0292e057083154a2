//! Field snapshots taken from the live form runtime.
//!
//! A `FormField` is an owned, immutable view of one runtime field at the moment
//! it was read. The core never keeps these beyond one extraction pass; it asks
//! the runtime for a fresh snapshot instead.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The kind of control a field renders as.
///
/// Serialized in the runtime's kebab-case vocabulary (`text-input`,
/// `drop-down`, ...). Unknown kinds are preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    TextInput,
    MultilineInput,
    NumberInput,
    Email,
    Password,
    Tel,
    Url,
    DateInput,
    DatetimeInput,
    FileInput,
    DropDown,
    RadioGroup,
    CheckboxGroup,
    Checkbox,
    Range,
    Color,
    Captcha,
    Panel,
    Other(String),
}

impl FieldType {
    /// Returns the runtime name of this type.
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::TextInput => "text-input",
            FieldType::MultilineInput => "multiline-input",
            FieldType::NumberInput => "number-input",
            FieldType::Email => "email",
            FieldType::Password => "password",
            FieldType::Tel => "tel",
            FieldType::Url => "url",
            FieldType::DateInput => "date-input",
            FieldType::DatetimeInput => "datetime-input",
            FieldType::FileInput => "file-input",
            FieldType::DropDown => "drop-down",
            FieldType::RadioGroup => "radio-group",
            FieldType::CheckboxGroup => "checkbox-group",
            FieldType::Checkbox => "checkbox",
            FieldType::Range => "range",
            FieldType::Color => "color",
            FieldType::Captcha => "captcha",
            FieldType::Panel => "panel",
            FieldType::Other(name) => name,
        }
    }

    /// True for every type the conversation is allowed to visit.
    pub fn is_fillable_type(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }

    /// Complex types always get a dedicated, widget-backed question.
    pub fn is_complex(&self) -> bool {
        matches!(
            self,
            FieldType::DropDown
                | FieldType::RadioGroup
                | FieldType::CheckboxGroup
                | FieldType::Checkbox
                | FieldType::DateInput
                | FieldType::DatetimeInput
                | FieldType::FileInput
                | FieldType::Range
                | FieldType::Color
        )
    }

    /// Containers are visited for their children but never asked about.
    pub fn is_container(&self) -> bool {
        matches!(self, FieldType::Panel)
    }

    /// Data type advertised in the schema when the field does not declare one.
    pub fn default_data_type(&self) -> &'static str {
        match self {
            FieldType::NumberInput | FieldType::Range => "number",
            FieldType::Checkbox => "boolean",
            FieldType::CheckboxGroup => "array",
            FieldType::FileInput => "file",
            FieldType::Panel => "object",
            _ => "string",
        }
    }
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "text-input" => FieldType::TextInput,
            "multiline-input" => FieldType::MultilineInput,
            "number-input" => FieldType::NumberInput,
            "email" => FieldType::Email,
            "password" => FieldType::Password,
            "tel" => FieldType::Tel,
            "url" => FieldType::Url,
            "date-input" => FieldType::DateInput,
            "datetime-input" => FieldType::DatetimeInput,
            "file-input" => FieldType::FileInput,
            "drop-down" => FieldType::DropDown,
            "radio-group" => FieldType::RadioGroup,
            "checkbox-group" => FieldType::CheckboxGroup,
            "checkbox" => FieldType::Checkbox,
            "range" => FieldType::Range,
            "color" => FieldType::Color,
            "captcha" => FieldType::Captcha,
            "panel" => FieldType::Panel,
            _ => FieldType::Other(value),
        }
    }
}

impl From<&str> for FieldType {
    fn from(value: &str) -> Self {
        FieldType::from(value.to_string())
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub id: String,
    pub name: String,
    /// Dotted path into the collected data document.
    pub qualified_path: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub placeholder: String,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Vec<Value>,
    #[serde(default)]
    pub enum_labels: Vec<String>,
    #[serde(default)]
    pub value: Value,
    /// `None` until the runtime has validated the field.
    #[serde(default)]
    pub valid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_message: Option<String>,
    pub visible: bool,
    pub enabled: bool,
    pub read_only: bool,
}

impl FormField {
    /// Creates a visible, enabled, empty field whose qualified path is its name.
    pub fn new(id: impl Into<String>, name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            qualified_path: name.clone(),
            name,
            field_type,
            data_type: None,
            label: String::new(),
            description: String::new(),
            placeholder: String::new(),
            required: false,
            enum_values: Vec::new(),
            enum_labels: Vec::new(),
            value: Value::Null,
            valid: None,
            validation_message: None,
            visible: true,
            enabled: true,
            read_only: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    pub fn with_qualified_path(mut self, path: impl Into<String>) -> Self {
        self.qualified_path = path.into();
        self
    }

    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Sets the allowed values and their display labels.
    pub fn with_enum(mut self, values: Vec<Value>, labels: Vec<String>) -> Self {
        self.enum_values = values;
        self.enum_labels = labels;
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Records the runtime's validity verdict.
    pub fn with_validity(mut self, valid: bool, message: Option<String>) -> Self {
        self.valid = Some(valid);
        self.validation_message = message;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Label shown to the user, falling back to the field name.
    pub fn display_label(&self) -> &str {
        if self.label.trim().is_empty() {
            &self.name
        } else {
            &self.label
        }
    }

    /// Data type advertised to the language model.
    pub fn schema_type(&self) -> &str {
        self.data_type
            .as_deref()
            .unwrap_or_else(|| self.field_type.default_data_type())
    }

    /// True when the value is neither null nor an empty string/list.
    pub fn has_value(&self) -> bool {
        is_present(&self.value)
    }

    /// True when the field holds a value the runtime has not rejected.
    pub fn is_validly_filled(&self) -> bool {
        self.has_value() && self.valid != Some(false)
    }

    /// Visible, enabled and writable.
    pub fn is_interactive(&self) -> bool {
        self.visible && self.enabled && !self.read_only
    }

    /// Returns true if the runtime has marked this field invalid.
    pub fn is_invalid(&self) -> bool {
        self.valid == Some(false)
    }
}

/// True when a JSON value counts as an answer.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// A node in the runtime's field tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FormNode {
    pub field: FormField,
    pub children: Vec<FormNode>,
    /// Child names in presentation order. Children not listed follow in
    /// natural order.
    pub items_order: Vec<String>,
}

impl FormNode {
    /// Creates a leaf node.
    pub fn leaf(field: FormField) -> Self {
        Self {
            field,
            children: Vec::new(),
            items_order: Vec::new(),
        }
    }

    /// Creates a container node.
    pub fn container(field: FormField, children: Vec<FormNode>, items_order: Vec<String>) -> Self {
        Self {
            field,
            children,
            items_order,
        }
    }

    /// Children in presentation order.
    pub fn ordered_children(&self) -> Vec<&FormNode> {
        let mut ordered: Vec<&FormNode> = Vec::with_capacity(self.children.len());
        for key in &self.items_order {
            if let Some(child) = self
                .children
                .iter()
                .find(|c| &c.field.name == key || &c.field.id == key)
            {
                if !ordered.iter().any(|o| std::ptr::eq(*o, child)) {
                    ordered.push(child);
                }
            }
        }
        for child in &self.children {
            if !ordered.iter().any(|o| std::ptr::eq(*o, child)) {
                ordered.push(child);
            }
        }
        ordered
    }

    /// Depth-first iterator over every field below this node, itself included.
    pub fn walk(&self) -> Vec<&FormField> {
        let mut out = vec![&self.field];
        for child in self.ordered_children() {
            out.extend(child.walk());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod field_type {
        use super::*;

        #[test]
        fn parses_kebab_case_names() {
            assert_eq!(FieldType::from("drop-down"), FieldType::DropDown);
            assert_eq!(FieldType::from("text-input"), FieldType::TextInput);
            assert_eq!(
                FieldType::from("signature"),
                FieldType::Other("signature".to_string())
            );
        }

        #[test]
        fn serializes_to_runtime_name() {
            let json = serde_json::to_string(&FieldType::DatetimeInput).unwrap();
            assert_eq!(json, "\"datetime-input\"");
        }

        #[test]
        fn unknown_types_are_not_fillable() {
            assert!(!FieldType::Other("plain-text".into()).is_fillable_type());
            assert!(FieldType::Captcha.is_fillable_type());
            assert!(FieldType::Panel.is_fillable_type());
        }

        #[test]
        fn complex_set_matches_widget_types() {
            for t in ["drop-down", "radio-group", "checkbox-group", "checkbox", "date-input",
                      "datetime-input", "file-input", "range", "color"] {
                assert!(FieldType::from(t).is_complex(), "{t} should be complex");
            }
            for t in ["text-input", "email", "tel", "multiline-input", "number-input"] {
                assert!(!FieldType::from(t).is_complex(), "{t} should be simple");
            }
        }
    }

    mod form_field {
        use super::*;

        #[test]
        fn display_label_falls_back_to_name() {
            let field = FormField::new("f1", "firstName", FieldType::TextInput);
            assert_eq!(field.display_label(), "firstName");
            assert_eq!(field.with_label("First name").display_label(), "First name");
        }

        #[test]
        fn empty_strings_and_lists_are_not_values() {
            let field = FormField::new("f1", "a", FieldType::TextInput);
            assert!(!field.clone().with_value(json!("  ")).has_value());
            assert!(!field.clone().with_value(json!([])).has_value());
            assert!(field.clone().with_value(json!(false)).has_value());
            assert!(field.with_value(json!(0)).has_value());
        }

        #[test]
        fn invalid_value_is_not_validly_filled() {
            let field = FormField::new("f1", "email", FieldType::Email)
                .with_value(json!("nope"))
                .with_validity(false, Some("Please enter a valid email".into()));
            assert!(field.has_value());
            assert!(!field.is_validly_filled());
        }

        #[test]
        fn schema_type_defaults_per_field_type() {
            assert_eq!(FormField::new("a", "a", FieldType::Checkbox).schema_type(), "boolean");
            assert_eq!(FormField::new("a", "a", FieldType::NumberInput).schema_type(), "number");
            assert_eq!(
                FormField::new("a", "a", FieldType::TextInput)
                    .with_data_type("integer")
                    .schema_type(),
                "integer"
            );
        }

        #[test]
        fn serializes_enum_under_runtime_key() {
            let field = FormField::new("f2", "plan", FieldType::DropDown)
                .with_enum(vec![json!("A"), json!("B")], vec!["Plan A".into(), "Plan B".into()]);
            let json = serde_json::to_value(&field).unwrap();
            assert_eq!(json["enum"], json!(["A", "B"]));
            assert_eq!(json["fieldType"], json!("drop-down"));
            assert_eq!(json["qualifiedPath"], json!("plan"));
        }
    }

    mod form_node {
        use super::*;

        fn leaf(name: &str) -> FormNode {
            FormNode::leaf(FormField::new(name, name, FieldType::TextInput))
        }

        #[test]
        fn ordered_children_follow_items_order_then_natural_order() {
            let panel = FormNode::container(
                FormField::new("p", "panel", FieldType::Panel),
                vec![leaf("a"), leaf("b"), leaf("c")],
                vec!["c".into(), "a".into()],
            );
            let names: Vec<_> = panel
                .ordered_children()
                .iter()
                .map(|n| n.field.name.clone())
                .collect();
            assert_eq!(names, vec!["c", "a", "b"]);
        }

        #[test]
        fn unknown_order_keys_are_ignored() {
            let panel = FormNode::container(
                FormField::new("p", "panel", FieldType::Panel),
                vec![leaf("a"), leaf("b")],
                vec!["zzz".into(), "b".into(), "b".into()],
            );
            let names: Vec<_> = panel
                .ordered_children()
                .iter()
                .map(|n| n.field.name.clone())
                .collect();
            assert_eq!(names, vec!["b", "a"]);
        }

        #[test]
        fn walk_visits_depth_first() {
            let inner = FormNode::container(
                FormField::new("inner", "inner", FieldType::Panel),
                vec![leaf("x")],
                vec![],
            );
            let root = FormNode::container(
                FormField::new("root", "root", FieldType::Panel),
                vec![leaf("a"), inner, leaf("b")],
                vec![],
            );
            let ids: Vec<_> = root.walk().iter().map(|f| f.id.clone()).collect();
            assert_eq!(ids, vec!["root", "a", "inner", "x", "b"]);
        }
    }
}
