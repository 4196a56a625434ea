//! # Error Handling
//!
//! Error types for the secrets subsystem, built with `thiserror`.

pub mod types;

pub use types::{Result, SecretsError};
