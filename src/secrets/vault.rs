//! Remote vault secrets provider.
//!
//! Talks to a reference-based vault REST API. Every call carries the identity
//! token from [`AuthSessionManager`] in the `X-Auth-Token` header.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | lookup    | `GET {base}/secrets?name={label}&sort=created:desc&limit=1` |
//! | fetch     | `GET {secret_ref}/payload` |
//! | store     | `POST {base}/secrets` with payload |
//! | generate  | `POST {base}/secrets` without payload |
//! | delete    | `DELETE {secret_ref}` |
//! | list      | `GET {base}/secrets?limit=&offset=` until exhausted |
//!
//! A label in canonical UUID form is treated as a direct reference and skips
//! the lookup. Fetched values are cached per label for the configured TTL;
//! every write drops the cached entry for its label.
//!
//! # Rotation
//!
//! [`RotationOrder::DeleteThenStore`] is not atomic: if storing the
//! replacement fails after the delete succeeded, the secret is gone and the
//! call fails with [`SecretsError::RotationFailed`]. Use
//! [`RotationOrder::StoreThenDelete`] where a brief window with two versions
//! is acceptable.

use async_trait::async_trait;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

use super::auth::AuthSessionManager;
use super::cache::SecretCache;
use super::definitions::SecretDefinition;
use super::provider::{
    GenerateOptions, GetOptions, HealthStatus, ProviderKind, RotationOrder, SecretListing,
    SecretProvider, SecretReference, StoreOptions,
};
use super::types::SecretString;
use crate::config::VaultConfig;
use crate::errors::{Result, SecretsError};
use crate::observability::MetricsRecorder;
use crate::secret_span;

/// Request header carrying the session token.
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

const DEFAULT_LIST_PAGE_SIZE: usize = 100;

static UUID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("UUID regex is valid at compile time")
});

/// True if `label` is a canonical 8-4-4-4-12 hyphenated UUID.
pub fn is_direct_reference(label: &str) -> bool {
    UUID_PATTERN.is_match(label)
}

#[derive(Debug, Deserialize)]
struct SecretPage {
    #[serde(default)]
    secrets: Vec<SecretEntry>,
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SecretEntry {
    secret_ref: String,
    name: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedSecret {
    secret_ref: String,
}

#[derive(Serialize)]
struct NewSecret<'a> {
    name: &'a str,
    secret_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_content_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload_content_encoding: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    algorithm: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bit_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<&'a str>,
}

/// Provider backed by the remote vault.
pub struct VaultProvider {
    client: Client,
    base_url: String,
    auth: AuthSessionManager,
    cache: SecretCache,
    request_timeout: Duration,
    rotation_order: RotationOrder,
    list_page_size: usize,
    metrics: MetricsRecorder,
}

impl std::fmt::Debug for VaultProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultProvider")
            .field("base_url", &self.base_url)
            .field("auth", &self.auth)
            .field("cache_ttl", &self.cache.default_ttl())
            .field("rotation_order", &self.rotation_order)
            .finish_non_exhaustive()
    }
}

impl VaultProvider {
    /// Build a provider from validated vault settings.
    pub fn new(config: &VaultConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SecretsError::config(format!("Failed to build HTTP client: {}", e)))?;

        let auth = AuthSessionManager::new(
            client.clone(),
            config.identity.clone(),
            config.token_refresh_buffer(),
        );

        info!(
            vault_url = %config.url,
            cache_ttl_ms = config.cache_ttl_ms,
            rotation_order = ?config.rotation_order,
            "Vault secrets provider configured"
        );

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            auth,
            cache: SecretCache::new(config.cache_ttl()).with_layer("vault"),
            request_timeout: config.request_timeout(),
            rotation_order: config.rotation_order,
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            metrics: MetricsRecorder::new(),
        })
    }

    /// Build a provider from `VAULT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(&VaultConfig::from_env()?)
    }

    /// Page size used by [`list`](Self::list).
    pub fn with_list_page_size(mut self, size: usize) -> Self {
        self.list_page_size = size.max(1);
        self
    }

    pub fn rotation_order(&self) -> RotationOrder {
        self.rotation_order
    }

    /// Session used for vault calls.
    pub fn auth(&self) -> &AuthSessionManager {
        &self.auth
    }

    /// Drops every cached value.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Fetches the value stored under `label`.
    ///
    /// Fails with [`SecretsError::NotFound`] when the vault has no match.
    pub async fn get(&self, label: &str, options: GetOptions) -> Result<SecretString> {
        if !options.refresh {
            if let Some(value) = self.cache.get(label).await {
                return Ok(value);
            }
        }

        let span = secret_span!("vault.get", label);
        async {
            let reference = self.resolve(label).await?;
            let value = self.fetch_payload(label, &reference).await?;
            self.cache.insert(label, value.clone()).await;
            debug!(reference = %reference.id(), "Fetched secret from vault");
            Ok::<_, SecretsError>(value)
        }
        .instrument(span)
        .await
    }

    /// Stores `value` under `label` and returns its new reference.
    pub async fn store(
        &self,
        label: &str,
        value: &SecretString,
        options: &StoreOptions,
    ) -> Result<SecretReference> {
        let body = NewSecret {
            name: label,
            secret_type: "opaque",
            payload: Some(value.expose_secret()),
            payload_content_type: Some(options.payload_content_type.as_str()),
            payload_content_encoding: options.payload_content_encoding.as_deref(),
            algorithm: options.algorithm.as_deref(),
            bit_length: options.bit_length,
            mode: options.mode.as_deref(),
            expiration: options.expiration.as_deref(),
        };

        let result = self.create("store", label, &body).instrument(secret_span!("vault.store", label)).await;
        self.cache.invalidate(label).await;
        if let Ok(reference) = &result {
            info!(secret = %label, reference = %reference.id(), "Stored secret in vault");
        }
        result
    }

    /// Deletes the newest secret stored under `label`.
    pub async fn delete(&self, label: &str) -> Result<()> {
        let result = async {
            let reference = self.resolve(label).await?;
            self.delete_reference(label, &reference).await
        }
        .instrument(secret_span!("vault.delete", label))
        .await;

        self.cache.invalidate(label).await;
        if result.is_ok() {
            info!(secret = %label, "Deleted secret from vault");
        }
        result
    }

    /// Replaces the secret under `label` according to the rotation order.
    pub async fn rotate(&self, label: &str, value: &SecretString) -> Result<SecretReference> {
        let result = match self.rotation_order {
            RotationOrder::DeleteThenStore => self.rotate_delete_first(label, value).await,
            RotationOrder::StoreThenDelete => self.rotate_store_first(label, value).await,
        };
        self.cache.invalidate(label).await;
        result
    }

    async fn rotate_delete_first(&self, label: &str, value: &SecretString) -> Result<SecretReference> {
        self.delete(label).await?;

        self.store(label, value, &StoreOptions::default()).await.map_err(|e| {
            error!(secret = %label, error = %e, "Rotation stored nothing after deleting the previous version");
            SecretsError::rotation_failed(
                label,
                format!("previous version deleted but storing the replacement failed: {}", e),
            )
        })
    }

    async fn rotate_store_first(&self, label: &str, value: &SecretString) -> Result<SecretReference> {
        let previous = match self.resolve(label).await {
            Ok(reference) => Some(reference),
            Err(SecretsError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        let reference = self.store(label, value, &StoreOptions::default()).await?;

        if let Some(previous) = previous {
            self.delete_reference(label, &previous).await.map_err(|e| {
                warn!(secret = %label, previous = %previous.id(), error = %e, "Previous version left behind after rotation");
                SecretsError::rotation_failed(
                    label,
                    format!("replacement stored at {} but deleting the previous version failed: {}", reference, e),
                )
            })?;
        }

        Ok(reference)
    }

    /// Has the vault generate and store a value; no plaintext leaves it.
    pub async fn generate(&self, label: &str, options: &GenerateOptions) -> Result<SecretReference> {
        let body = NewSecret {
            name: label,
            secret_type: "symmetric",
            payload: None,
            payload_content_type: None,
            payload_content_encoding: None,
            algorithm: Some(options.algorithm.as_str()),
            bit_length: Some(options.bit_length),
            mode: Some(options.mode.as_str()),
            expiration: options.expiration.as_deref(),
        };

        let result =
            self.create("generate", label, &body).instrument(secret_span!("vault.generate", label)).await;
        self.cache.invalidate(label).await;
        result
    }

    /// Every secret visible to the session, across all pages.
    pub async fn list(&self) -> Result<Vec<SecretListing>> {
        let mut listings = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = self
                .client
                .get(self.secrets_url())
                .query(&[("limit", self.list_page_size), ("offset", offset)]);
            let response = self.send("list", "secrets", request).await?;
            let page: SecretPage = self.read_json("list", response).await?;

            let count = page.secrets.len();
            listings.extend(page.secrets.into_iter().map(|entry| SecretListing {
                name: entry.name.unwrap_or_default(),
                reference: entry.secret_ref,
                status: entry.status.map(|s| s.to_lowercase()).unwrap_or_else(|| "unknown".to_string()),
            }));
            offset += count;

            let exhausted = match page.total {
                Some(total) => offset >= total,
                None => count < self.list_page_size,
            };
            if count == 0 || exhausted {
                break;
            }
        }

        debug!(count = listings.len(), "Listed vault secrets");
        Ok(listings)
    }

    /// Authenticates and performs a one-item list.
    pub async fn health(&self) -> HealthStatus {
        if let Err(e) = self.auth.get_token().await {
            return HealthStatus::unhealthy(false, e.to_string());
        }

        let request = self.client.get(self.secrets_url()).query(&[("limit", "1")]);
        match self.send("health", "secrets", request).await {
            Ok(_) => HealthStatus::healthy(true),
            Err(e) => {
                warn!(error = %e, "Vault health check failed");
                HealthStatus::unhealthy(self.auth.is_authenticated().await, e.to_string())
            }
        }
    }

    fn secrets_url(&self) -> String {
        format!("{}/secrets", self.base_url)
    }

    /// Maps a label to a reference, by UUID or by newest name match.
    async fn resolve(&self, label: &str) -> Result<SecretReference> {
        if is_direct_reference(label) {
            return Ok(SecretReference::new(format!("{}/{}", self.secrets_url(), label)));
        }

        let request = self
            .client
            .get(self.secrets_url())
            .query(&[("name", label), ("sort", "created:desc"), ("limit", "1")]);
        let response = self.send("lookup", label, request).await?;
        let page: SecretPage = self.read_json("lookup", response).await?;

        page.secrets
            .into_iter()
            .next()
            .map(|entry| SecretReference::new(entry.secret_ref))
            .ok_or_else(|| SecretsError::not_found(label))
    }

    async fn fetch_payload(&self, label: &str, reference: &SecretReference) -> Result<SecretString> {
        let url = format!("{}/payload", reference.url.trim_end_matches('/'));
        let request = self.client.get(url).header(ACCEPT, "text/plain, application/octet-stream");
        let response = self.send("fetch", label, request).await?;

        let binary = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/octet-stream"));
        let bytes = response.bytes().await.map_err(|e| self.transport_error("fetch", e))?;

        if binary {
            return Ok(SecretString::new(base64::engine::general_purpose::STANDARD.encode(&bytes)));
        }
        String::from_utf8(bytes.to_vec())
            .map(SecretString::new)
            .map_err(|_| SecretsError::invalid_response(format!("payload for '{}' is not valid UTF-8", label)))
    }

    async fn create(&self, operation: &'static str, label: &str, body: &NewSecret<'_>) -> Result<SecretReference> {
        let request = self.client.post(self.secrets_url()).json(body);
        let response = self.send(operation, label, request).await?;
        let created: CreatedSecret = self.read_json(operation, response).await?;
        Ok(SecretReference::new(created.secret_ref))
    }

    async fn delete_reference(&self, label: &str, reference: &SecretReference) -> Result<()> {
        let request = self.client.delete(&reference.url);
        self.send("delete", label, request).await?;
        Ok(())
    }

    /// Attaches the session token, sends, and maps failure statuses.
    async fn send(&self, operation: &'static str, subject: &str, request: RequestBuilder) -> Result<Response> {
        let token = self.auth.get_token().await?;
        let response = request
            .header(AUTH_TOKEN_HEADER, token.expose_secret())
            .send()
            .await
            .map_err(|e| self.transport_error(operation, e))?;

        let status = response.status();
        self.metrics.record_vault_request(operation, status.as_u16());

        if status.is_success() {
            return Ok(response);
        }

        Err(match status {
            StatusCode::NOT_FOUND => SecretsError::not_found(subject),
            StatusCode::UNAUTHORIZED => {
                self.auth.invalidate().await;
                SecretsError::authentication_failed(format!("vault rejected the session token during {}", operation))
            }
            StatusCode::FORBIDDEN => {
                SecretsError::authentication_failed(format!("session is not permitted to {} '{}'", operation, subject))
            }
            s if s.is_server_error() => {
                SecretsError::unavailable(format!("vault returned {} during {}", s, operation))
            }
            s => SecretsError::invalid_response(format!("vault rejected {} with {}", operation, s)),
        })
    }

    /// Reads the whole body and decodes it; a malformed body is a `Serialization` error.
    async fn read_json<T: DeserializeOwned>(&self, operation: &'static str, response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(operation, e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn transport_error(&self, operation: &'static str, error: reqwest::Error) -> SecretsError {
        self.metrics.record_vault_request(operation, 0);
        if error.is_timeout() {
            SecretsError::timeout(format!("vault.{}", operation), self.request_timeout.as_millis() as u64)
        } else {
            SecretsError::from(error)
        }
    }
}

#[async_trait]
impl SecretProvider for VaultProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Vault
    }

    async fn get_secret(
        &self,
        definition: &SecretDefinition,
        options: GetOptions,
    ) -> Result<Option<SecretString>> {
        match self.get(&definition.source_key, options).await {
            Ok(value) => Ok(Some(value)),
            Err(SecretsError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn store_secret(
        &self,
        name: &str,
        value: &SecretString,
        options: &StoreOptions,
    ) -> Result<SecretReference> {
        self.store(name, value, options).await
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.delete(name).await
    }

    async fn rotate_secret(&self, name: &str, value: &SecretString) -> Result<SecretReference> {
        self.rotate(name, value).await
    }

    async fn generate_secret(&self, name: &str, options: &GenerateOptions) -> Result<SecretReference> {
        self.generate(name, options).await
    }

    async fn list_secrets(&self) -> Result<Vec<SecretListing>> {
        self.list().await
    }

    async fn health_check(&self) -> HealthStatus {
        self.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;

    #[test]
    fn test_direct_reference_detection() {
        assert!(is_direct_reference("3f2504e0-4f89-11d3-9a0c-0305e82c3301"));
        assert!(is_direct_reference("3F2504E0-4F89-11D3-9A0C-0305E82C3301"));
        assert!(!is_direct_reference("3f2504e04f8911d39a0c0305e82c3301"));
        assert!(!is_direct_reference("{3f2504e0-4f89-11d3-9a0c-0305e82c3301}"));
        assert!(!is_direct_reference("3f2504e0-4f89-11d3-9a0c-0305e82c3301x"));
        assert!(!is_direct_reference("JWT_SECRET"));
    }

    #[test]
    fn test_new_secret_body_omits_absent_fields() {
        let body = NewSecret {
            name: "JWT_SECRET",
            secret_type: "symmetric",
            payload: None,
            payload_content_type: None,
            payload_content_encoding: None,
            algorithm: Some("aes"),
            bit_length: Some(256),
            mode: Some("cbc"),
            expiration: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["algorithm"], "aes");
        assert!(json.get("payload").is_none());
        assert!(json.get("expiration").is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let identity = IdentityConfig::new("https://id.example.com", "u", "p", "proj");
        let config = VaultConfig::new("not-a-url", identity);
        assert!(matches!(VaultProvider::new(&config), Err(SecretsError::Config { .. })));
    }

    #[test]
    fn test_page_size_floor() {
        let identity = IdentityConfig::new("https://id.example.com", "u", "p", "proj");
        let config = VaultConfig::new("https://vault.example.com/v1/", identity);
        let provider = VaultProvider::new(&config).unwrap().with_list_page_size(0);
        assert_eq!(provider.list_page_size, 1);
        assert_eq!(provider.secrets_url(), "https://vault.example.com/v1/secrets");
    }
}
