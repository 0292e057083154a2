//! JSON form runtime - a validating form model built from a JSON definition.
//!
//! Definitions look like this:
//!
//! ```json
//! {
//!   "properties": { "thankYouMessageContent": "<p>Thanks!</p>" },
//!   ":items": {
//!     "contact": {
//!       "fieldType": "panel",
//!       ":itemsOrder": ["email", "age"],
//!       ":items": {
//!         "email": { "fieldType": "email", "required": true, "label": { "value": "Email" } },
//!         "age": { "fieldType": "number-input", "minimum": 18 }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Children may also be given as an `items` array. Every field gets a
//! qualified name (`$form.contact.email`) and a data path (`contact.email`);
//! `import_data` reads values at those paths, revalidates, and broadcasts a
//! `FieldChange` for each field whose value or validity moved.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::domain::form::{
    get_nested_value, is_present, qualified_path_from_name, set_nested_value, FieldType, FormField,
    FormNode, DEFAULT_ROOT_PREFIX,
};
use crate::ports::{FieldChange, FieldProperty, FormRuntime, FormRuntimeError};

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid"));

const CHANGE_CAPACITY: usize = 256;

/// Per-field constraints taken from the definition.
#[derive(Debug, Clone, Default)]
struct Constraints {
    pattern: Option<Regex>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    messages: HashMap<String, String>,
}

impl Constraints {
    fn message(&self, key: &str, default: impl FnOnce() -> String) -> String {
        self.messages.get(key).cloned().unwrap_or_else(default)
    }
}

#[derive(Debug)]
struct FormState {
    root: FormNode,
    constraints: HashMap<String, Constraints>,
    touched: HashSet<String>,
}

/// In-process form runtime over a JSON definition.
#[derive(Debug)]
pub struct JsonFormRuntime {
    state: RwLock<FormState>,
    changes: broadcast::Sender<FieldChange>,
    thank_you: Option<String>,
}

impl JsonFormRuntime {
    /// Builds a runtime using the default `$form.` root prefix.
    pub fn from_definition(definition: &Value) -> Result<Self, FormRuntimeError> {
        Self::with_root_prefix(definition, DEFAULT_ROOT_PREFIX)
    }

    /// Builds a runtime whose qualified names start with `root_prefix`.
    pub fn with_root_prefix(definition: &Value, root_prefix: &str) -> Result<Self, FormRuntimeError> {
        let Value::Object(object) = definition else {
            return Err(FormRuntimeError::invalid_definition(
                "form definition must be a JSON object",
            ));
        };

        let root_name = root_prefix.trim_end_matches('.');
        let mut constraints = HashMap::new();
        let mut builder = TreeBuilder {
            root_prefix,
            constraints: &mut constraints,
            seen_ids: HashSet::new(),
        };
        let (children, items_order) = builder.children(object, root_name)?;
        let root_field = FormField::new(
            object
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or(root_name),
            root_name,
            FieldType::from("form"),
        );
        let root = FormNode::container(root_field, children, items_order);

        let thank_you = object
            .get("properties")
            .and_then(|p| p.get("thankYouMessageContent"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        let runtime = Self {
            state: RwLock::new(FormState {
                root,
                constraints,
                touched: HashSet::new(),
            }),
            changes,
            thank_you,
        };
        runtime.revalidate_all();
        Ok(runtime)
    }

    fn read(&self) -> RwLockReadGuard<'_, FormState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FormState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn revalidate_all(&self) {
        let mut guard = self.write();
        let state = &mut *guard;
        for_each_leaf_mut(&mut state.root, &mut |field| {
            let rules = state.constraints.get(&field.id).cloned().unwrap_or_default();
            apply_validation(field, &rules);
        });
    }
}

struct TreeBuilder<'a> {
    root_prefix: &'a str,
    constraints: &'a mut HashMap<String, Constraints>,
    seen_ids: HashSet<String>,
}

impl TreeBuilder<'_> {
    fn children(
        &mut self,
        parent: &Map<String, Value>,
        parent_qualified: &str,
    ) -> Result<(Vec<FormNode>, Vec<String>), FormRuntimeError> {
        let mut children = Vec::new();
        let mut items_order = Vec::new();

        if let Some(items) = parent.get(":items").and_then(Value::as_object) {
            for (key, item) in items {
                children.push(self.node(item, Some(key), parent_qualified)?);
            }
            items_order = parent
                .get(":itemsOrder")
                .and_then(Value::as_array)
                .map(|order| {
                    order
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
        } else if let Some(items) = parent.get("items").and_then(Value::as_array) {
            for item in items {
                children.push(self.node(item, None, parent_qualified)?);
            }
        }

        Ok((children, items_order))
    }

    fn node(
        &mut self,
        definition: &Value,
        key: Option<&str>,
        parent_qualified: &str,
    ) -> Result<FormNode, FormRuntimeError> {
        let Value::Object(object) = definition else {
            return Err(FormRuntimeError::invalid_definition(format!(
                "item under {} is not an object",
                parent_qualified
            )));
        };
        let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);
        let flag = |key: &str, default: bool| object.get(key).and_then(Value::as_bool).unwrap_or(default);

        let name = text("name")
            .or_else(|| key.map(str::to_string))
            .or_else(|| text("id"))
            .ok_or_else(|| {
                FormRuntimeError::invalid_definition(format!(
                    "item under {} has neither name nor id",
                    parent_qualified
                ))
            })?;
        let qualified_name = format!("{}.{}", parent_qualified, name);
        let id = text("id").unwrap_or_else(|| qualified_name.clone());
        if !self.seen_ids.insert(id.clone()) {
            return Err(FormRuntimeError::invalid_definition(format!(
                "duplicate field id {}",
                id
            )));
        }

        let field_type = FieldType::from(text("fieldType").unwrap_or_else(|| "text-input".to_string()));
        let mut field = FormField::new(&id, &name, field_type.clone())
            .with_qualified_path(qualified_path_from_name(&qualified_name, self.root_prefix))
            .with_value(object.get("default").cloned().unwrap_or(Value::Null));

        if let Some(label) = object.get("label") {
            let value = label.get("value").unwrap_or(label);
            if let Some(label) = value.as_str() {
                field = field.with_label(label);
            }
        }
        if let Some(description) = text("description") {
            field = field.with_description(description);
        }
        if let Some(placeholder) = text("placeholder") {
            field = field.with_placeholder(placeholder);
        }
        if let Some(data_type) = text("type") {
            field = field.with_data_type(data_type);
        }
        if let Some(values) = object.get("enum").and_then(Value::as_array) {
            let labels = object
                .get("enumNames")
                .and_then(Value::as_array)
                .map(|names| {
                    names
                        .iter()
                        .map(|n| n.as_str().map(str::to_string).unwrap_or_else(|| n.to_string()))
                        .collect()
                })
                .unwrap_or_default();
            field = field.with_enum(values.clone(), labels);
        }
        if flag("required", false) {
            field = field.required();
        }
        if !flag("visible", true) {
            field = field.hidden();
        }
        if !flag("enabled", true) {
            field = field.disabled();
        }
        if flag("readOnly", false) {
            field = field.read_only();
        }

        if field_type.is_container() {
            let (children, items_order) = self.children(object, &qualified_name)?;
            return Ok(FormNode::container(field, children, items_order));
        }

        self.constraints.insert(id, Self::constraints(object)?);
        Ok(FormNode::leaf(field))
    }

    fn constraints(object: &Map<String, Value>) -> Result<Constraints, FormRuntimeError> {
        let pattern = match object.get("pattern").and_then(Value::as_str) {
            Some(pattern) => Some(Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                FormRuntimeError::invalid_definition(format!("bad pattern {}: {}", pattern, e))
            })?),
            None => None,
        };
        let length = |key: &str| object.get(key).and_then(Value::as_u64).map(|n| n as usize);
        let messages = object
            .get("constraintMessages")
            .and_then(Value::as_object)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|m| (k.clone(), m.to_string())))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Constraints {
            pattern,
            min_length: length("minLength"),
            max_length: length("maxLength"),
            minimum: object.get("minimum").and_then(Value::as_f64),
            maximum: object.get("maximum").and_then(Value::as_f64),
            messages,
        })
    }
}

fn for_each_leaf_mut(node: &mut FormNode, apply: &mut dyn FnMut(&mut FormField)) {
    if node.children.is_empty() && !node.field.field_type.is_container() {
        apply(&mut node.field);
    }
    for child in &mut node.children {
        for_each_leaf_mut(child, apply);
    }
}

/// Converts text answers into the JSON type the field stores.
fn coerce(field_type: &FieldType, value: Value) -> Value {
    match (field_type, &value) {
        (FieldType::NumberInput | FieldType::Range, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(|n| match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Value::from(f as i64),
                _ => Value::Number(n),
            })
            .unwrap_or(value),
        (FieldType::Checkbox, Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "on" => Value::Bool(true),
            "false" | "no" | "n" | "off" => Value::Bool(false),
            _ => value,
        },
        _ => value,
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    a == b
        || match (a, b) {
            (Value::String(s), other) | (other, Value::String(s)) => match other {
                Value::Number(n) => s.trim() == n.to_string(),
                Value::Bool(v) => s.trim() == v.to_string(),
                _ => false,
            },
            _ => false,
        }
}

/// Checks `field.value` against its constraints.
fn validate(field: &FormField, rules: &Constraints) -> Result<(), String> {
    let value = &field.value;
    if !is_present(value) {
        if field.required {
            return Err(rules.message("required", || "This field is required".to_string()));
        }
        return Ok(());
    }

    if !field.enum_values.is_empty() {
        let in_enum = |v: &Value| field.enum_values.iter().any(|e| loosely_equal(e, v));
        let ok = match value {
            Value::Array(items) => items.iter().all(in_enum),
            other => in_enum(other),
        };
        if !ok {
            return Err(rules.message("enum", || {
                "Please select one of the available options".to_string()
            }));
        }
    }

    match field.field_type {
        FieldType::NumberInput | FieldType::Range => {
            let Some(number) = value.as_f64() else {
                return Err(rules.message("type", || "Please enter a valid number".to_string()));
            };
            if let Some(min) = rules.minimum.filter(|min| number < *min) {
                return Err(rules.message("minimum", || format!("Value must be at least {}", min)));
            }
            if let Some(max) = rules.maximum.filter(|max| number > *max) {
                return Err(rules.message("maximum", || format!("Value must be at most {}", max)));
            }
        }
        FieldType::Email => {
            if !value.as_str().map(|s| EMAIL.is_match(s.trim())).unwrap_or(false) {
                return Err(rules.message("type", || {
                    "Please enter a valid email address".to_string()
                }));
            }
        }
        _ => {}
    }

    if let Value::String(text) = value {
        let length = text.chars().count();
        if let Some(min) = rules.min_length.filter(|min| length < *min) {
            return Err(rules.message("minLength", || {
                format!("Value must be at least {} characters", min)
            }));
        }
        if let Some(max) = rules.max_length.filter(|max| length > *max) {
            return Err(rules.message("maxLength", || {
                format!("Value must be at most {} characters", max)
            }));
        }
        if let Some(pattern) = rules.pattern.as_ref().filter(|p| !p.is_match(text)) {
            tracing::trace!(pattern = %pattern, "pattern mismatch");
            return Err(rules.message("pattern", || {
                "Value does not match the required format".to_string()
            }));
        }
    }

    Ok(())
}

fn apply_validation(field: &mut FormField, rules: &Constraints) {
    match validate(field, rules) {
        Ok(()) => {
            field.valid = Some(true);
            field.validation_message = None;
        }
        Err(message) => {
            field.valid = Some(false);
            field.validation_message = Some(message);
        }
    }
}

#[async_trait]
impl FormRuntime for JsonFormRuntime {
    fn root(&self) -> FormNode {
        self.read().root.clone()
    }

    fn field(&self, id: &str) -> Option<FormField> {
        self.read()
            .root
            .walk()
            .into_iter()
            .find(|f| f.id == id)
            .cloned()
    }

    fn invalid_field_ids(&self) -> Vec<String> {
        let state = self.read();
        state
            .root
            .walk()
            .into_iter()
            .filter(|f| state.touched.contains(&f.id) && f.is_invalid())
            .map(|f| f.id.clone())
            .collect()
    }

    async fn import_data(&self, data: &Value) -> Result<(), FormRuntimeError> {
        if !data.is_object() {
            return Err(FormRuntimeError::transport("form data must be a JSON object"));
        }

        let mut notifications = Vec::new();
        {
            let mut guard = self.write();
            let state = &mut *guard;
            let mut touched = Vec::new();
            for_each_leaf_mut(&mut state.root, &mut |field| {
                if field.read_only || field.qualified_path.is_empty() {
                    return;
                }
                let Some(incoming) = get_nested_value(data, &field.qualified_path) else {
                    return;
                };
                let incoming = coerce(&field.field_type, incoming.clone());
                touched.push(field.id.clone());

                let previous_value = field.value.clone();
                let previous_valid = field.valid;
                field.value = incoming;
                let rules = state.constraints.get(&field.id).cloned().unwrap_or_default();
                apply_validation(field, &rules);

                let mut change = FieldChange::new(&field.id);
                if previous_value != field.value {
                    change = change.with_change(FieldProperty::Value, previous_value, field.value.clone());
                }
                if previous_valid != field.valid {
                    change = change.with_change(
                        FieldProperty::Valid,
                        previous_valid.map(Value::Bool).unwrap_or(Value::Null),
                        field.valid.map(Value::Bool).unwrap_or(Value::Null),
                    );
                }
                if !change.changes.is_empty() {
                    notifications.push(change);
                }
            });
            state.touched.extend(touched);
        }

        tracing::debug!(changed = notifications.len(), "imported form data");
        for change in notifications {
            // No subscribers is fine.
            let _ = self.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<FieldChange> {
        self.changes.subscribe()
    }

    async fn wait_ready(&self) -> Result<(), FormRuntimeError> {
        Ok(())
    }

    fn thank_you_message(&self) -> Option<String> {
        self.thank_you.clone()
    }

    fn export_data(&self) -> Value {
        let mut data = Value::Object(Map::new());
        let state = self.read();
        for field in state.root.walk() {
            if field.field_type.is_container() || field.qualified_path.is_empty() {
                continue;
            }
            if is_present(&field.value) {
                set_nested_value(&mut data, &field.qualified_path, field.value.clone());
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contact_form() -> JsonFormRuntime {
        JsonFormRuntime::from_definition(&json!({
            "properties": { "thankYouMessageContent": "<p>Thanks!</p>" },
            ":itemsOrder": ["contact", "plan"],
            ":items": {
                "plan": {
                    "fieldType": "drop-down",
                    "id": "plan",
                    "enum": ["basic", "pro"],
                    "enumNames": ["Basic", "Pro"]
                },
                "contact": {
                    "fieldType": "panel",
                    "id": "contact",
                    ":itemsOrder": ["email", "age"],
                    ":items": {
                        "age": {
                            "fieldType": "number-input",
                            "id": "age",
                            "minimum": 18,
                            "constraintMessages": { "minimum": "Adults only" }
                        },
                        "email": {
                            "fieldType": "email",
                            "id": "email",
                            "required": true,
                            "label": { "value": "Email address" }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    mod definition {
        use super::*;

        #[test]
        fn computes_qualified_paths_and_order() {
            let form = contact_form();
            let root = form.root();
            let names: Vec<&str> = root.walk().iter().map(|f| f.name.as_str()).collect();
            assert_eq!(names, vec!["$form", "contact", "email", "age", "plan"]);

            let email = form.field("email").unwrap();
            assert_eq!(email.qualified_path, "contact.email");
            assert_eq!(email.label, "Email address");
            assert!(email.required);
        }

        #[test]
        fn reads_enum_and_labels() {
            let plan = contact_form().field("plan").unwrap();
            assert_eq!(plan.enum_values, vec![json!("basic"), json!("pro")]);
            assert_eq!(plan.enum_labels, vec!["Basic", "Pro"]);
        }

        #[test]
        fn accepts_items_array() {
            let form = JsonFormRuntime::from_definition(&json!({
                "items": [
                    { "fieldType": "text-input", "name": "first" },
                    { "fieldType": "text-input", "name": "last", "visible": false }
                ]
            }))
            .unwrap();
            let first = form.field("$form.first").unwrap();
            assert_eq!(first.qualified_path, "first");
            assert!(!form.field("$form.last").unwrap().visible);
        }

        #[test]
        fn rejects_non_object_definition() {
            assert!(matches!(
                JsonFormRuntime::from_definition(&json!([1, 2])),
                Err(FormRuntimeError::InvalidDefinition(_))
            ));
        }

        #[test]
        fn rejects_duplicate_ids() {
            let result = JsonFormRuntime::from_definition(&json!({
                "items": [
                    { "name": "a", "id": "x" },
                    { "name": "b", "id": "x" }
                ]
            }));
            assert!(result.is_err());
        }

        #[test]
        fn rejects_bad_pattern() {
            let result = JsonFormRuntime::from_definition(&json!({
                "items": [{ "name": "code", "pattern": "([" }]
            }));
            assert!(result.is_err());
        }

        #[test]
        fn exposes_thank_you_message() {
            assert_eq!(contact_form().thank_you_message().as_deref(), Some("<p>Thanks!</p>"));
        }
    }

    mod import {
        use super::*;

        #[tokio::test]
        async fn writes_values_and_validates() {
            let form = contact_form();
            form.import_data(&json!({"contact": {"email": "ada@example.com", "age": "36"}}))
                .await
                .unwrap();

            let email = form.field("email").unwrap();
            assert_eq!(email.value, json!("ada@example.com"));
            assert_eq!(email.valid, Some(true));
            assert_eq!(form.field("age").unwrap().value, json!(36));
            assert!(form.invalid_field_ids().is_empty());
        }

        #[tokio::test]
        async fn reports_touched_invalid_fields_only() {
            let form = contact_form();
            form.import_data(&json!({"contact": {"age": 12}})).await.unwrap();

            assert_eq!(form.invalid_field_ids(), vec!["age"]);
            let age = form.field("age").unwrap();
            assert_eq!(age.validation_message.as_deref(), Some("Adults only"));
        }

        #[tokio::test]
        async fn rejects_values_outside_enum() {
            let form = contact_form();
            form.import_data(&json!({"plan": "enterprise"})).await.unwrap();
            assert_eq!(form.invalid_field_ids(), vec!["plan"]);
        }

        #[tokio::test]
        async fn broadcasts_value_and_validity_changes() {
            let form = contact_form();
            let mut changes = form.subscribe();

            form.import_data(&json!({"contact": {"email": "not-an-email"}}))
                .await
                .unwrap();

            let change = changes.try_recv().unwrap();
            assert_eq!(change.field_id, "email");
            assert!(change.touches(&FieldProperty::Value));
            assert!(!form.field("email").unwrap().is_validly_filled());
        }

        #[tokio::test]
        async fn unchanged_import_broadcasts_nothing() {
            let form = contact_form();
            form.import_data(&json!({"plan": "pro"})).await.unwrap();
            let mut changes = form.subscribe();

            form.import_data(&json!({"plan": "pro"})).await.unwrap();
            assert!(changes.try_recv().is_err());
        }

        #[tokio::test]
        async fn rejects_non_object_data() {
            let form = contact_form();
            assert!(form.import_data(&json!("nope")).await.is_err());
        }

        #[tokio::test]
        async fn export_returns_nested_document() {
            let form = contact_form();
            form.import_data(&json!({"contact": {"email": "ada@example.com"}, "plan": "basic"}))
                .await
                .unwrap();
            assert_eq!(
                form.export_data(),
                json!({"contact": {"email": "ada@example.com"}, "plan": "basic"})
            );
        }
    }

    mod validation {
        use super::*;

        fn field(field_type: FieldType, value: Value) -> FormField {
            FormField::new("f", "f", field_type).with_value(value)
        }

        #[test]
        fn required_empty_value_fails() {
            let f = field(FieldType::TextInput, json!("")).required();
            assert_eq!(
                validate(&f, &Constraints::default()).unwrap_err(),
                "This field is required"
            );
        }

        #[test]
        fn optional_empty_value_passes() {
            assert!(validate(&field(FieldType::Email, Value::Null), &Constraints::default()).is_ok());
        }

        #[test]
        fn pattern_must_match_whole_value() {
            let rules = Constraints {
                pattern: Some(Regex::new("^(?:[0-9]{5})$").unwrap()),
                ..Constraints::default()
            };
            assert!(validate(&field(FieldType::TextInput, json!("12345")), &rules).is_ok());
            assert!(validate(&field(FieldType::TextInput, json!("123456")), &rules).is_err());
        }

        #[test]
        fn length_limits_count_characters() {
            let rules = Constraints {
                max_length: Some(3),
                ..Constraints::default()
            };
            assert!(validate(&field(FieldType::TextInput, json!("héé")), &rules).is_ok());
            assert!(validate(&field(FieldType::TextInput, json!("abcd")), &rules).is_err());
        }

        #[test]
        fn checkbox_group_values_must_all_be_options() {
            let f = field(FieldType::CheckboxGroup, json!(["a", "c"]))
                .with_enum(vec![json!("a"), json!("b")], vec![]);
            assert!(validate(&f, &Constraints::default()).is_err());
        }

        #[test]
        fn numeric_enum_accepts_matching_text() {
            let f = field(FieldType::RadioGroup, json!("2")).with_enum(vec![json!(1), json!(2)], vec![]);
            assert!(validate(&f, &Constraints::default()).is_ok());
        }

        #[test]
        fn coerces_yes_no_for_checkbox() {
            assert_eq!(coerce(&FieldType::Checkbox, json!("Yes")), json!(true));
            assert_eq!(coerce(&FieldType::Checkbox, json!("maybe")), json!("maybe"));
            assert_eq!(coerce(&FieldType::NumberInput, json!("2.5")), json!(2.5));
            assert_eq!(coerce(&FieldType::NumberInput, json!("abc")), json!("abc"));
        }
    }
}
