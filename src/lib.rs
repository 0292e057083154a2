//! Form Concierge - conversational form filling
//!
//! This crate turns a validating form into a chat: it finds the fields
//! still to be answered, asks about them in small batches, extracts typed
//! values from free-text (or image) replies with a language model, writes
//! them back into the form, and repairs whatever the form rejects.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
