//! HTTP route handlers.
//!
//! The transport layer only: request bodies are handed to the import
//! pipeline and its summary is rendered back as JSON.

pub mod health;
pub mod imports;
