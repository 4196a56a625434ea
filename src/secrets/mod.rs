//! Secret lifecycle management.
//!
//! Defines, validates, retrieves, stores, rotates and caches the credentials
//! the rest of the application consumes (signing keys, database passwords,
//! encryption keys, session secrets).
//!
//! # Architecture
//!
//! ```text
//! SecretsManager ── SecretCache (manager layer)
//!   │   ├── SecretRegistry + StrengthValidator
//!   │   └── dyn SecretProvider
//!   │         ├── EnvironmentProvider   (process environment)
//!   │         └── VaultProvider ── SecretCache (vault layer)
//!   │                            └── AuthSessionManager ── identity endpoint
//! ```
//!
//! Application code only talks to [`SecretsManager`]: `load_all` once at
//! startup, `get_secret` afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use strongbox::secrets::{Environment, SecretRegistry, SecretsManager};
//! use strongbox::config::SecretsConfig;
//!
//! let config = SecretsConfig::from_env()?;
//! let manager = SecretsManager::from_config(&config, SecretRegistry::standard()?)?;
//!
//! manager.load_all(config.environment).await?;
//! let jwt = manager.get_secret("JWT_SECRET").await?;
//! ```
//!
//! # Security
//!
//! - Values travel as [`SecretString`], which redacts itself in logs and
//!   serialized output and zeroes its buffer on drop
//! - Errors name secrets but never carry their values
//! - Only production turns policy violations into failures

pub mod auth;
pub mod cache;
pub mod definitions;
pub mod env;
pub mod manager;
pub mod provider;
pub mod types;
pub mod validator;
pub mod vault;

pub use auth::{AuthSession, AuthSessionManager};
pub use cache::{SecretCache, DEFAULT_CACHE_TTL};
pub use definitions::{SecretConstraint, SecretDefinition, SecretRegistry, SecretRegistryBuilder};
pub use env::EnvironmentProvider;
pub use manager::SecretsManager;
pub use provider::{
    GenerateOptions, GetOptions, HealthState, HealthStatus, ProviderKind, RotationOrder,
    SecretListing, SecretProvider, SecretReference, StoreOptions,
};
pub use types::{Environment, SecretString};
pub use validator::{advisories, Advisory, StrengthValidator};
pub use vault::{is_direct_reference, VaultProvider};
