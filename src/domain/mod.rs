//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (errors, state machine trait, timestamps)
//! - `form` - Field snapshots, fillable discovery, schema projection, nested data
//! - `conversation` - Question planning, answer reconciliation and the controller

pub mod conversation;
pub mod form;
pub mod foundation;
