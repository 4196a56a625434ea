//! Environment variable secrets provider.
//!
//! Reads each secret from the process environment variable named by its
//! definition's `source_key`. Intended for local development and CI.
//!
//! # Security Warning
//!
//! Environment variables are visible to anything that can inspect the process
//! and offer no rotation or audit trail. Production deployments should use the
//! vault provider.
//!
//! # Limitations
//!
//! - Read-only: store, delete, rotate and generate return
//!   [`SecretsError::Unsupported`]
//! - No caching; the environment is already local and cheap to read
//! - Empty variables are reported as absent

use async_trait::async_trait;
use std::env;

use super::definitions::{SecretDefinition, SecretRegistry};
use super::provider::{
    GenerateOptions, GetOptions, HealthStatus, ProviderKind, SecretListing, SecretProvider,
    SecretReference, StoreOptions,
};
use super::types::SecretString;
use crate::errors::{Result, SecretsError};
use crate::secret_span;

/// Read-only provider backed by process environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider {
    /// `(name, source_key)` pairs reported by `list_secrets`.
    known: Vec<(String, String)>,
}

impl EnvironmentProvider {
    /// Provider with no registry knowledge; `list_secrets` returns nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that can list every secret declared in `registry`.
    pub fn for_registry(registry: &SecretRegistry) -> Self {
        Self {
            known: registry.definitions().map(|d| (d.name.clone(), d.source_key.clone())).collect(),
        }
    }

    fn read(source_key: &str) -> Result<Option<SecretString>> {
        match env::var(source_key) {
            Ok(value) if value.is_empty() => Ok(None),
            Ok(value) => Ok(Some(SecretString::new(value))),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(SecretsError::config(format!(
                "Environment variable {} is not valid UTF-8",
                source_key
            ))),
        }
    }

    fn read_only(operation: &str) -> SecretsError {
        SecretsError::unsupported(ProviderKind::Environment.as_str(), operation)
    }
}

#[async_trait]
impl SecretProvider for EnvironmentProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Environment
    }

    async fn get_secret(
        &self,
        definition: &SecretDefinition,
        _options: GetOptions,
    ) -> Result<Option<SecretString>> {
        let span = secret_span!("env.get", &definition.name);
        let _guard = span.enter();

        let value = Self::read(&definition.source_key)?;
        tracing::debug!(
            secret = %definition.name,
            source_key = %definition.source_key,
            present = value.is_some(),
            "Read secret from environment"
        );
        Ok(value)
    }

    async fn store_secret(
        &self,
        _name: &str,
        _value: &SecretString,
        _options: &StoreOptions,
    ) -> Result<SecretReference> {
        Err(Self::read_only("store"))
    }

    async fn delete_secret(&self, _name: &str) -> Result<()> {
        Err(Self::read_only("delete"))
    }

    async fn rotate_secret(&self, _name: &str, _value: &SecretString) -> Result<SecretReference> {
        Err(Self::read_only("rotate"))
    }

    async fn generate_secret(&self, _name: &str, _options: &GenerateOptions) -> Result<SecretReference> {
        Err(Self::read_only("generate"))
    }

    async fn list_secrets(&self) -> Result<Vec<SecretListing>> {
        Ok(self
            .known
            .iter()
            .map(|(name, source_key)| {
                let present = env::var_os(source_key).is_some_and(|v| !v.is_empty());
                SecretListing {
                    name: name.clone(),
                    reference: format!("env:{}", source_key),
                    status: if present { "set" } else { "unset" }.to_string(),
                }
            })
            .collect())
    }

    async fn health_check(&self) -> HealthStatus {
        // Nothing to authenticate against.
        HealthStatus::healthy(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests mutate the process environment; keep them from interleaving.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn test_reads_source_key() {
        let _lock = ENV_MUTEX.lock().unwrap();
        env::set_var("STRONGBOX_TEST_ENV_DB_PASS", "Zx9#db-password-value");

        let provider = EnvironmentProvider::new();
        let definition = SecretDefinition::new("DB_PASSWORD").source_key("STRONGBOX_TEST_ENV_DB_PASS");
        let value = provider.get_secret(&definition, GetOptions::default()).await.unwrap();
        assert_eq!(value.unwrap().expose_secret(), "Zx9#db-password-value");

        env::remove_var("STRONGBOX_TEST_ENV_DB_PASS");
    }

    #[tokio::test]
    async fn test_missing_and_empty_are_absent() {
        let _lock = ENV_MUTEX.lock().unwrap();
        env::remove_var("STRONGBOX_TEST_ENV_MISSING");
        env::set_var("STRONGBOX_TEST_ENV_EMPTY", "");

        let provider = EnvironmentProvider::new();
        for key in ["STRONGBOX_TEST_ENV_MISSING", "STRONGBOX_TEST_ENV_EMPTY"] {
            let definition = SecretDefinition::new("X").source_key(key);
            assert!(provider.get_secret(&definition, GetOptions::default()).await.unwrap().is_none());
        }

        env::remove_var("STRONGBOX_TEST_ENV_EMPTY");
    }

    #[tokio::test]
    async fn test_writes_are_unsupported() {
        let provider = EnvironmentProvider::new();
        let value = SecretString::new("v");

        let err = provider.store_secret("A", &value, &StoreOptions::default()).await.unwrap_err();
        assert!(matches!(err, SecretsError::Unsupported { ref operation, .. } if operation == "store"));
        assert!(provider.delete_secret("A").await.is_err());
        assert!(provider.rotate_secret("A", &value).await.is_err());
        assert!(provider.generate_secret("A", &GenerateOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_list_reports_registry_presence() {
        let _lock = ENV_MUTEX.lock().unwrap();
        env::set_var("STRONGBOX_TEST_ENV_LIST_A", "value");
        env::remove_var("STRONGBOX_TEST_ENV_LIST_B");

        let registry = SecretRegistry::builder()
            .define(SecretDefinition::new("A").source_key("STRONGBOX_TEST_ENV_LIST_A"))
            .define(SecretDefinition::new("B").source_key("STRONGBOX_TEST_ENV_LIST_B"))
            .build()
            .unwrap();
        let listing = EnvironmentProvider::for_registry(&registry).list_secrets().await.unwrap();

        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].status, "set");
        assert_eq!(listing[0].reference, "env:STRONGBOX_TEST_ENV_LIST_A");
        assert_eq!(listing[1].status, "unset");

        env::remove_var("STRONGBOX_TEST_ENV_LIST_A");
    }

    #[tokio::test]
    async fn test_health_check_is_always_healthy() {
        let status = EnvironmentProvider::new().health_check().await;
        assert!(status.is_healthy());
        assert_eq!(EnvironmentProvider::new().kind(), ProviderKind::Environment);
    }
}
