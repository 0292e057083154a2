//! Form module - field snapshots, fillable discovery, schema projection and
//! the nested answer document.

mod extractor;
mod field;
mod path;
mod schema;

pub use extractor::{FieldExtractor, FieldStats};
pub use field::{is_present, FieldType, FormField, FormNode};
pub use path::{
    get_nested_value, qualified_path_from_name, set_nested_value, CollectedData,
    DEFAULT_ROOT_PREFIX,
};
pub use schema::{FieldRef, Schema, SchemaProperty};

#[cfg(test)]
pub(crate) use extractor::test_support;
