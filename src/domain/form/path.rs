//! Dotted-path helpers and the collected answer document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root prefix the runtime puts in front of every qualified name.
pub const DEFAULT_ROOT_PREFIX: &str = "$form.";

/// Writes `value` at a dotted `path`, creating intermediate objects.
///
/// Non-object intermediates are replaced. Writing the same value twice leaves
/// the document unchanged. Returns false when the path has no segments.
pub fn set_nested_value(target: &mut Value, path: &str, value: Value) -> bool {
    let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }

    let mut cursor = target;
    for segment in parents {
        let Value::Object(map) = cursor else {
            return false;
        };
        let entry = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        cursor = entry;
    }

    match cursor {
        Value::Object(map) => {
            map.insert(last.to_string(), value);
            true
        }
        _ => false,
    }
}

/// Reads the value at a dotted `path`, if every segment exists.
pub fn get_nested_value<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(source, |node, segment| node.get(segment))
}

/// Turns a runtime qualified name (`$form.contact.email`) into a data path
/// (`contact.email`).
pub fn qualified_path_from_name(qualified_name: &str, root_prefix: &str) -> String {
    let trimmed = root_prefix.trim_end_matches('.');
    if qualified_name == trimmed {
        return String::new();
    }
    qualified_name
        .strip_prefix(root_prefix)
        .unwrap_or(qualified_name)
        .to_string()
}

/// Nested answers gathered during one conversation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectedData(Map<String, Value>);

impl CollectedData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes a value at a dotted path.
    pub fn set(&mut self, path: &str, value: Value) -> bool {
        let mut root = Value::Object(std::mem::take(&mut self.0));
        let written = set_nested_value(&mut root, path, value);
        if let Value::Object(map) = root {
            self.0 = map;
        }
        written
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.').filter(|s| !s.is_empty());
        let first = self.0.get(segments.next()?)?;
        segments.try_fold(first, |node, segment| node.get(segment))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of non-object values anywhere in the document.
    pub fn leaf_count(&self) -> usize {
        fn count(value: &Value) -> usize {
            match value {
                Value::Object(map) => map.values().map(count).sum(),
                _ => 1,
            }
        }
        self.0.values().map(count).sum()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod set_nested_value {
        use super::*;

        #[test]
        fn creates_intermediate_levels() {
            let mut doc = json!({});
            assert!(set_nested_value(&mut doc, "a.b.c", json!(5)));
            assert_eq!(doc, json!({"a": {"b": {"c": 5}}}));
        }

        #[test]
        fn repeated_identical_write_is_idempotent() {
            let mut doc = json!({});
            set_nested_value(&mut doc, "a.b.c", json!(5));
            let once = doc.clone();
            set_nested_value(&mut doc, "a.b.c", json!(5));
            assert_eq!(doc, once);
        }

        #[test]
        fn keeps_sibling_values() {
            let mut doc = json!({"a": {"x": 1}});
            set_nested_value(&mut doc, "a.y", json!(2));
            assert_eq!(doc, json!({"a": {"x": 1, "y": 2}}));
        }

        #[test]
        fn replaces_scalar_intermediates() {
            let mut doc = json!({"a": "text"});
            set_nested_value(&mut doc, "a.b", json!(true));
            assert_eq!(doc, json!({"a": {"b": true}}));
        }

        #[test]
        fn empty_path_writes_nothing() {
            let mut doc = json!({"a": 1});
            assert!(!set_nested_value(&mut doc, "", json!(2)));
            assert!(!set_nested_value(&mut doc, "..", json!(2)));
            assert_eq!(doc, json!({"a": 1}));
        }
    }

    mod paths {
        use super::*;

        #[test]
        fn get_nested_value_walks_segments() {
            let doc = json!({"contact": {"email": "a@b.c"}});
            assert_eq!(get_nested_value(&doc, "contact.email"), Some(&json!("a@b.c")));
            assert_eq!(get_nested_value(&doc, "contact.phone"), None);
        }

        #[test]
        fn strips_root_prefix() {
            assert_eq!(
                qualified_path_from_name("$form.contact.email", DEFAULT_ROOT_PREFIX),
                "contact.email"
            );
            assert_eq!(qualified_path_from_name("name", DEFAULT_ROOT_PREFIX), "name");
            assert_eq!(qualified_path_from_name("$form", DEFAULT_ROOT_PREFIX), "");
        }
    }

    mod collected_data {
        use super::*;

        #[test]
        fn counts_leaves_across_levels() {
            let mut data = CollectedData::new();
            data.set("name", json!("Ada"));
            data.set("contact.email", json!("ada@example.com"));
            data.set("contact.phone", Value::Null);
            assert_eq!(data.leaf_count(), 3);
            assert_eq!(data.get("contact.email"), Some(&json!("ada@example.com")));
        }

        #[test]
        fn clear_empties_document() {
            let mut data = CollectedData::new();
            data.set("a", json!(1));
            data.clear();
            assert!(data.is_empty());
            assert_eq!(data.to_value(), json!({}));
        }

        #[test]
        fn serializes_as_plain_object() {
            let mut data = CollectedData::new();
            data.set("a.b", json!(1));
            assert_eq!(serde_json::to_string(&data).unwrap(), r#"{"a":{"b":1}}"#);
        }
    }
}
