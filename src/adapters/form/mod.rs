//! Form runtime adapters.

mod json_form;
mod loader;

pub use json_form::JsonFormRuntime;
pub use loader::{parse_definition, DefinitionLoader};
