//! Secrets manager façade.
//!
//! The only entry point the rest of the application uses. It owns the
//! registry, the active provider and a manager-level cache, and applies the
//! strength validator to everything it hands out.
//!
//! [`SecretsManager::load_all`] resolves every registered secret concurrently,
//! collects every violation, and fails once with the full list. After a
//! successful load the values sit in the cache, and
//! [`SecretsManager::get_secret`] serves them until the TTL lapses.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn, Instrument};

use super::cache::SecretCache;
use super::definitions::{SecretConstraint, SecretDefinition, SecretRegistry};
use super::env::EnvironmentProvider;
use super::provider::{
    GenerateOptions, GetOptions, HealthStatus, ProviderKind, SecretListing, SecretProvider,
    SecretReference, StoreOptions,
};
use super::types::{Environment, SecretString};
use super::validator::StrengthValidator;
use super::vault::VaultProvider;
use crate::config::SecretsConfig;
use crate::errors::{Result, SecretsError};
use crate::observability::MetricsRecorder;
use crate::secret_span;

/// Uniform lifecycle API over one provider.
#[derive(Debug, Clone)]
pub struct SecretsManager {
    registry: SecretRegistry,
    provider: Arc<dyn SecretProvider>,
    cache: SecretCache,
    /// Enforcement rules for runtime reads; replaced by a successful `load_all`.
    environment: Arc<RwLock<Environment>>,
    metrics: MetricsRecorder,
}

impl SecretsManager {
    /// `environment` governs validation for runtime reads until a
    /// [`load_all`](Self::load_all) succeeds under another one.
    pub fn new(
        registry: SecretRegistry,
        provider: Arc<dyn SecretProvider>,
        environment: Environment,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            registry,
            provider,
            cache: SecretCache::new(cache_ttl).with_layer("manager"),
            environment: Arc::new(RwLock::new(environment)),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Selects the provider named by `config`.
    pub fn from_config(config: &SecretsConfig, registry: SecretRegistry) -> Result<Self> {
        let provider: Arc<dyn SecretProvider> = match config.provider {
            ProviderKind::Environment => Arc::new(EnvironmentProvider::for_registry(&registry)),
            ProviderKind::Vault => {
                let vault = config.vault.as_ref().ok_or_else(|| {
                    SecretsError::config("Vault provider selected but vault settings are missing")
                })?;
                Arc::new(VaultProvider::new(vault)?)
            }
        };

        info!(
            provider = %config.provider,
            environment = %config.environment,
            secrets = registry.len(),
            "Secrets manager initialized"
        );
        Ok(Self::new(registry, provider, config.environment, config.cache_ttl()))
    }

    pub fn registry(&self) -> &SecretRegistry {
        &self.registry
    }

    /// Environment whose rules apply to runtime reads.
    pub async fn environment(&self) -> Environment {
        *self.environment.read().await
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider.kind()
    }

    /// Resolves and validates every registered secret.
    ///
    /// Every definition is checked even after a failure; the error lists all
    /// violations. A provider error counts as a violation for required
    /// secrets and as absence for optional ones.
    ///
    /// On success `environment` also governs every later read, so a value
    /// refetched after its TTL is held to the same rules.
    pub async fn load_all(&self, environment: Environment) -> Result<BTreeMap<String, SecretString>> {
        let span = secret_span!("manager.load_all");
        async {
            let validator = StrengthValidator::new(environment);

            let fetches = self.registry.definitions().map(|definition| async move {
                let fetched = self.provider.get_secret(definition, GetOptions::default()).await;
                (definition, fetched)
            });

            let mut resolved = BTreeMap::new();
            let mut violations = Vec::new();

            for (definition, fetched) in join_all(fetches).await {
                let value = match fetched {
                    Ok(value) => value,
                    Err(e) if definition.required => {
                        error!(secret = %definition.name, error = %e, "Failed to fetch required secret");
                        violations.push(e);
                        continue;
                    }
                    Err(e) => {
                        warn!(secret = %definition.name, error = %e, "Failed to fetch optional secret; treating as absent");
                        None
                    }
                };

                match validator.validate(definition, value) {
                    Ok(Some(value)) => {
                        resolved.insert(definition.name.clone(), value);
                    }
                    Ok(None) => {}
                    Err(violation) => violations.push(violation),
                }
            }

            violations.extend(self.check_constraints(environment, &resolved));
            self.metrics.record_load(environment.as_str(), &violations);

            if !violations.is_empty() {
                error!(
                    environment = %environment,
                    violations = violations.len(),
                    "Secret loading failed"
                );
                return Err(SecretsError::LoadFailed { violations });
            }

            *self.environment.write().await = environment;
            for (name, value) in &resolved {
                self.cache.insert(name, value.clone()).await;
            }

            info!(
                environment = %environment,
                loaded = resolved.len(),
                registered = self.registry.len(),
                "Secrets loaded"
            );
            Ok(resolved)
        }
        .instrument(span)
        .await
    }

    fn check_constraints(
        &self,
        environment: Environment,
        resolved: &BTreeMap<String, SecretString>,
    ) -> Vec<SecretsError> {
        let mut violations = Vec::new();
        for constraint in self.registry.constraints() {
            match constraint {
                SecretConstraint::MustDiffer(a, b) => {
                    let (Some(left), Some(right)) = (resolved.get(a), resolved.get(b)) else {
                        continue;
                    };
                    if left != right {
                        continue;
                    }
                    if environment.is_production() {
                        error!(first = %a, second = %b, "Secrets must differ but share a value");
                        violations.push(SecretsError::policy(b, format!("must differ from '{}'", a)));
                    } else {
                        warn!(first = %a, second = %b, "Secrets must differ but share a value; not enforced here");
                    }
                }
            }
        }
        violations
    }

    /// Returns the value for a registered secret.
    ///
    /// Fails with `UnknownSecret` for unregistered names and `MissingSecret`
    /// when the provider has no value.
    pub async fn get_secret(&self, name: &str) -> Result<SecretString> {
        self.get_optional(name).await?.ok_or_else(|| SecretsError::missing(name))
    }

    /// Like [`get_secret`](Self::get_secret) but an absent value is `None`,
    /// for optional features that fall back when unconfigured.
    pub async fn get_optional(&self, name: &str) -> Result<Option<SecretString>> {
        let definition = self.registry.require(name)?;
        if let Some(value) = self.cache.get(name).await {
            return Ok(Some(value));
        }
        self.fetch(definition, GetOptions::default()).await
    }

    /// Drops the cached value and reads through the provider cache too.
    pub async fn refresh_secret(&self, name: &str) -> Result<SecretString> {
        let definition = self.registry.require(name)?;
        self.cache.invalidate(name).await;
        self.fetch(definition, GetOptions::refresh()).await?.ok_or_else(|| SecretsError::missing(name))
    }

    async fn fetch(&self, definition: &SecretDefinition, options: GetOptions) -> Result<Option<SecretString>> {
        let value = self
            .provider
            .get_secret(definition, options)
            .instrument(secret_span!("manager.fetch", &definition.name))
            .await?;

        let environment = *self.environment.read().await;
        let validated = StrengthValidator::new(environment).validate(definition, value)?;
        if let Some(value) = &validated {
            self.cache.insert(&definition.name, value.clone()).await;
        }
        Ok(validated)
    }

    /// Stores a new value for `name`.
    ///
    /// The value is not strength-checked here; the next read validates it.
    pub async fn set_secret(&self, name: &str, value: SecretString) -> Result<SecretReference> {
        self.set_secret_with(name, value, &StoreOptions::default()).await
    }

    pub async fn set_secret_with(
        &self,
        name: &str,
        value: SecretString,
        options: &StoreOptions,
    ) -> Result<SecretReference> {
        let definition = self.registry.require(name)?;
        let result = self.provider.store_secret(&definition.source_key, &value, options).await;
        self.cache.invalidate(name).await;
        result
    }

    pub async fn delete_secret(&self, name: &str) -> Result<()> {
        let definition = self.registry.require(name)?;
        let result = self.provider.delete_secret(&definition.source_key).await;
        self.cache.invalidate(name).await;
        if let Err(e) = &result {
            warn!(secret = %name, error = %e, "Secret deletion failed");
        }
        result
    }

    /// Swaps `value` in for `name`.
    ///
    /// Errors from either provider step are returned as-is.
    pub async fn rotate_secret(&self, name: &str, value: SecretString) -> Result<SecretReference> {
        let definition = self.registry.require(name)?;

        let result = self
            .provider
            .rotate_secret(&definition.source_key, &value)
            .instrument(secret_span!("manager.rotate", name))
            .await;
        self.cache.invalidate(name).await;

        match &result {
            Ok(reference) => info!(secret = %name, reference = %reference.id(), "Secret rotated"),
            Err(e) => error!(secret = %name, error = %e, "Secret rotation failed"),
        }
        result
    }

    pub async fn generate_secret(&self, name: &str, options: &GenerateOptions) -> Result<SecretReference> {
        let definition = self.registry.require(name)?;
        let result = self.provider.generate_secret(&definition.source_key, options).await;
        self.cache.invalidate(name).await;
        result
    }

    pub async fn list_secrets(&self) -> Result<Vec<SecretListing>> {
        self.provider.list_secrets().await
    }

    pub async fn health_check(&self) -> HealthStatus {
        self.provider.health_check().await
    }

    /// Drops every manager-level cached value.
    pub async fn clear_cache(&self) {
        debug!("Clearing manager secret cache");
        self.cache.clear().await;
    }
}
