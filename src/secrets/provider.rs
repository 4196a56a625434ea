//! Secret provider trait and shared types
//!
//! Defines the interface every secret source implements, plus the option,
//! listing and health types that cross it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::definitions::SecretDefinition;
use super::types::SecretString;
use crate::errors::{Result, SecretsError};

/// Which provider backs the secrets manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Process environment variables
    #[default]
    Environment,
    /// Remote vault behind an identity service
    Vault,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Vault => "vault",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = SecretsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environment" | "env" => Ok(Self::Environment),
            "vault" => Ok(Self::Vault),
            other => Err(SecretsError::config(format!("Unknown secrets provider: {}", other))),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for a single read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Skip the provider cache and fetch from the source.
    pub refresh: bool,
}

impl GetOptions {
    pub fn refresh() -> Self {
        Self { refresh: true }
    }
}

/// Metadata submitted alongside a stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreOptions {
    pub algorithm: Option<String>,
    pub bit_length: Option<u32>,
    pub mode: Option<String>,
    /// ISO-8601 expiry understood by the vault.
    pub expiration: Option<String>,
    /// Defaults to `text/plain`.
    pub payload_content_type: String,
    /// Set to `base64` when the payload is already base64-encoded binary.
    pub payload_content_encoding: Option<String>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            bit_length: None,
            mode: None,
            expiration: None,
            payload_content_type: "text/plain".to_string(),
            payload_content_encoding: None,
        }
    }
}

/// Parameters for a vault-side generated secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerateOptions {
    pub algorithm: String,
    pub bit_length: u32,
    pub mode: String,
    pub expiration: Option<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self { algorithm: "aes".to_string(), bit_length: 256, mode: "cbc".to_string(), expiration: None }
    }
}

/// Pointer to a stored secret inside the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretReference {
    pub url: String,
}

impl SecretReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The trailing path segment, which the vault uses as the secret id.
    pub fn id(&self) -> &str {
        self.url.trim_end_matches('/').rsplit('/').next().unwrap_or(&self.url)
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

/// One entry from [`SecretProvider::list_secrets`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretListing {
    pub name: String,
    pub reference: String,
    pub status: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Result of a provider health probe. Probes report failures here instead of
/// returning an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: HealthState,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy(authenticated: bool) -> Self {
        Self { status: HealthState::Healthy, authenticated, error: None }
    }

    pub fn unhealthy(authenticated: bool, error: impl Into<String>) -> Self {
        Self { status: HealthState::Unhealthy, authenticated, error: Some(error.into()) }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// How [`SecretProvider::rotate_secret`] sequences its two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationOrder {
    /// Delete the current secret, then store the replacement. Not atomic: if
    /// the store fails the secret is gone.
    #[default]
    DeleteThenStore,
    /// Store the replacement, then delete the previous reference. Briefly
    /// leaves two versions; lookups prefer the newest.
    StoreThenDelete,
}

impl FromStr for RotationOrder {
    type Err = SecretsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "delete-then-store" => Ok(Self::DeleteThenStore),
            "store-then-delete" => Ok(Self::StoreThenDelete),
            other => Err(SecretsError::config(format!("Unknown rotation order: {}", other))),
        }
    }
}

/// A source of secret values.
///
/// Absent values are `Ok(None)`; errors are reserved for transport,
/// authentication and other genuine failures. Implementations must never log
/// secret values.
#[async_trait]
pub trait SecretProvider: Send + Sync + fmt::Debug {
    /// Which provider this is.
    fn kind(&self) -> ProviderKind;

    /// Reads the value for `definition`, or `None` if the source has none.
    async fn get_secret(
        &self,
        definition: &SecretDefinition,
        options: GetOptions,
    ) -> Result<Option<SecretString>>;

    /// Stores `value` under `name` and returns where it landed.
    async fn store_secret(
        &self,
        name: &str,
        value: &SecretString,
        options: &StoreOptions,
    ) -> Result<SecretReference>;

    /// Deletes the secret stored under `name`.
    async fn delete_secret(&self, name: &str) -> Result<()>;

    /// Replaces the secret stored under `name` with `value`.
    async fn rotate_secret(&self, name: &str, value: &SecretString) -> Result<SecretReference>;

    /// Has the provider generate a value itself and store it under `name`.
    async fn generate_secret(&self, name: &str, options: &GenerateOptions) -> Result<SecretReference>;

    /// Every secret the provider can see.
    async fn list_secrets(&self) -> Result<Vec<SecretListing>>;

    /// Cheap liveness probe. Never fails; problems are reported in the status.
    async fn health_check(&self) -> HealthStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_roundtrip() {
        for kind in [ProviderKind::Environment, ProviderKind::Vault] {
            let parsed: ProviderKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
        assert_eq!("ENV".parse::<ProviderKind>().unwrap(), ProviderKind::Environment);
        assert!("aws".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_serialization() {
        let json = serde_json::to_string(&ProviderKind::Vault).unwrap();
        assert_eq!(json, "\"vault\"");
        assert_eq!(ProviderKind::default(), ProviderKind::Environment);
    }

    #[test]
    fn test_rotation_order_parsing() {
        assert_eq!(RotationOrder::default(), RotationOrder::DeleteThenStore);
        assert_eq!("store_then_delete".parse::<RotationOrder>().unwrap(), RotationOrder::StoreThenDelete);
        assert_eq!("Delete-Then-Store".parse::<RotationOrder>().unwrap(), RotationOrder::DeleteThenStore);
        assert!("atomic".parse::<RotationOrder>().is_err());
    }

    #[test]
    fn test_option_defaults() {
        let generate = GenerateOptions::default();
        assert_eq!(generate.algorithm, "aes");
        assert_eq!(generate.bit_length, 256);
        assert_eq!(generate.mode, "cbc");
        assert_eq!(StoreOptions::default().payload_content_type, "text/plain");
        assert!(GetOptions::refresh().refresh);
        assert!(!GetOptions::default().refresh);
    }

    #[test]
    fn test_unknown_option_keys_rejected() {
        let result = serde_json::from_str::<GenerateOptions>(
            r#"{"algorithm":"aes","bit_length":128,"mode":"cbc","expiration":null,"lenght":1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_secret_reference_id() {
        let reference = SecretReference::new("https://vault.example.com/v1/secrets/abc-123/");
        assert_eq!(reference.id(), "abc-123");
        assert_eq!(SecretReference::new("plain").id(), "plain");
    }

    #[test]
    fn test_health_status_serialization() {
        let json = serde_json::to_value(HealthStatus::unhealthy(false, "connection refused")).unwrap();
        assert_eq!(json["status"], "unhealthy");
        assert_eq!(json["error"], "connection refused");
        assert!(HealthStatus::healthy(true).is_healthy());
    }
}
