//! # Strongbox
//!
//! Secret lifecycle management for services that must refuse to start with
//! missing or weak credentials.
//!
//! ## Architecture
//!
//! ```text
//! startup ──► SecretsManager::load_all ──► provider (env | vault) ──► StrengthValidator
//! runtime ──► SecretsManager::get_secret ──► cache ──► provider
//! ```
//!
//! ## Core Components
//!
//! - **Registry**: every secret the process needs, with its policy
//! - **Strength Validator**: environment-sensitive length, forbidden-value and entropy checks
//! - **Providers**: process environment for local work, a remote vault for deployments
//! - **Manager**: cache, write-through lifecycle API and fail-fast loading
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use strongbox::{Result, SecretRegistry, SecretsConfig, SecretsManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SecretsConfig::from_env()?;
//!     let manager = SecretsManager::from_config(&config, SecretRegistry::standard()?)?;
//!     manager.load_all(config.environment).await?;
//!     let _jwt = manager.get_secret("JWT_SECRET").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types
pub use config::{LoggingConfig, SecretsConfig};
pub use errors::{Result, SecretsError};
pub use observability::init_logging;
pub use secrets::{Environment, SecretRegistry, SecretString, SecretsManager};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
