//! # Configuration Management
//!
//! Environment-driven configuration for provider selection, vault access and
//! logging. See [`SecretsConfig::from_env`] for the variables read.

pub mod settings;

pub use settings::{IdentityConfig, LogFormat, LoggingConfig, SecretsConfig, VaultConfig};
