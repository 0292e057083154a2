//! Projection of form fields into the compact schema sent to the model.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::field::FormField;

/// What the model is told about one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaProperty {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(rename = "enum")]
    pub enum_values: Vec<Value>,
    pub description: String,
    pub placeholder: String,
}

impl From<&FormField> for SchemaProperty {
    fn from(field: &FormField) -> Self {
        Self {
            id: field.id.clone(),
            data_type: field.schema_type().to_string(),
            enum_values: field.enum_values.clone(),
            description: field.description.clone(),
            placeholder: field.placeholder.clone(),
        }
    }
}

/// A field given either as a snapshot or as an id still to be resolved.
#[derive(Debug, Clone)]
pub enum FieldRef {
    Field(FormField),
    Id(String),
}

impl From<FormField> for FieldRef {
    fn from(field: FormField) -> Self {
        FieldRef::Field(field)
    }
}

impl From<&FormField> for FieldRef {
    fn from(field: &FormField) -> Self {
        FieldRef::Field(field.clone())
    }
}

impl From<&str> for FieldRef {
    fn from(id: &str) -> Self {
        FieldRef::Id(id.to_string())
    }
}

/// Object schema keyed by field name, in projection order.
///
/// Serializes as `{"type":"object","properties":{...}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    properties: Vec<(String, SchemaProperty)>,
}

impl Schema {
    /// Projects fields into a schema. Ids are resolved through `resolve`;
    /// ids that do not resolve are skipped. A repeated name keeps its first
    /// position and takes the later definition.
    pub fn project<I, R>(fields: I, resolve: R) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
        R: Fn(&str) -> Option<FormField>,
    {
        let mut schema = Schema::default();
        for field in fields {
            let field = match field.into() {
                FieldRef::Field(field) => field,
                FieldRef::Id(id) => match resolve(&id) {
                    Some(field) => field,
                    None => {
                        tracing::debug!(field_id = %id, "skipping unresolvable field in schema");
                        continue;
                    }
                },
            };
            schema.insert(field.name.clone(), SchemaProperty::from(&field));
        }
        schema
    }

    /// Projects snapshots that need no resolution.
    pub fn from_fields(fields: &[FormField]) -> Self {
        Self::project(fields, |_| None)
    }

    fn insert(&mut self, name: String, property: SchemaProperty) {
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = property,
            None => self.properties.push((name, property)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaProperty> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Pretty JSON for embedding in prompts.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

struct Properties<'a>(&'a [(String, SchemaProperty)]);

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, property) in self.0 {
            map.serialize_entry(name, property)?;
        }
        map.end()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut schema = serializer.serialize_struct("Schema", 2)?;
        schema.serialize_field("type", "object")?;
        schema.serialize_field("properties", &Properties(&self.properties))?;
        schema.end()
    }
}
