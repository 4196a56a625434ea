//! Shared fixtures for integration tests
//!
//! - [`MockProvider`]: in-memory provider with call counters and injectable
//!   delete failures, for exercising the manager
//! - wiremock helpers standing in for the identity and vault endpoints

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use strongbox::config::{IdentityConfig, VaultConfig};
use strongbox::errors::{Result, SecretsError};
use strongbox::secrets::{
    GenerateOptions, GetOptions, HealthStatus, ProviderKind, SecretDefinition, SecretListing,
    SecretProvider, SecretReference, SecretString, StoreOptions,
};
use wiremock::ResponseTemplate;

/// Strong values that satisfy the standard registry's policies.
pub const JWT_SECRET: &str = "Qm4#vT9!pL2@xR7$wN5%kB8^hJ3&cF6*";
pub const JWT_REFRESH_SECRET: &str = "Zt8!nW3#gY6$mD1%sV4^qH7&bK2*fP9@";
pub const SESSION_SECRET: &str = "Hc5$rM8%jX2^wQ6&dL9*tG3@yN7!kV4#";
pub const ENCRYPTION_KEY: &str = "Pb6%fK1^zS5&hR9*cW2@mJ8!vT4#gX7$";
pub const DATABASE_PASSWORD: &str = "Wy3^Lq8&Dn5*Gs";

/// 45 random-looking characters, long enough for every signing key.
pub const LONG_RANDOM: &str = "Rf7#Kd2!Wq9@Lm4$Xv8%Bn3^Hs6&Tz1*Pc5(Gy0)Jw2_M";

/// Source-key/value pairs for a fully valid standard registry.
pub fn standard_values() -> Vec<(&'static str, &'static str)> {
    vec![
        ("JWT_SECRET", JWT_SECRET),
        ("JWT_REFRESH_SECRET", JWT_REFRESH_SECRET),
        ("SESSION_SECRET", SESSION_SECRET),
        ("ENCRYPTION_KEY", ENCRYPTION_KEY),
        ("DATABASE_PASSWORD", DATABASE_PASSWORD),
    ]
}

/// In-memory provider keyed by source key.
#[derive(Debug, Default)]
pub struct MockProvider {
    values: Mutex<HashMap<String, String>>,
    pub get_calls: AtomicUsize,
    pub store_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    fail_deletes: AtomicBool,
}

impl MockProvider {
    pub fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        let provider = Self::default();
        for (key, value) in pairs {
            provider.put(key, value);
        }
        Arc::new(provider)
    }

    pub fn put(&self, key: &str, value: &str) {
        self.values.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    pub fn gets(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretProvider for MockProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Environment
    }

    async fn get_secret(
        &self,
        definition: &SecretDefinition,
        _options: GetOptions,
    ) -> Result<Option<SecretString>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value(&definition.source_key).map(SecretString::new))
    }

    async fn store_secret(
        &self,
        name: &str,
        value: &SecretString,
        _options: &StoreOptions,
    ) -> Result<SecretReference> {
        self.store_calls.fetch_add(1, Ordering::SeqCst);
        self.put(name, value.expose_secret());
        Ok(SecretReference::new(format!("mock://{}", name)))
    }

    async fn delete_secret(&self, name: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SecretsError::unavailable("mock vault refused the delete"));
        }
        if self.values.lock().unwrap().remove(name).is_none() {
            return Err(SecretsError::not_found(name));
        }
        Ok(())
    }

    async fn rotate_secret(&self, name: &str, value: &SecretString) -> Result<SecretReference> {
        self.delete_secret(name).await?;
        self.store_secret(name, value, &StoreOptions::default()).await
    }

    async fn generate_secret(&self, name: &str, _options: &GenerateOptions) -> Result<SecretReference> {
        self.store_secret(name, &SecretString::new("Generated#Value9!x"), &StoreOptions::default()).await
    }

    async fn list_secrets(&self) -> Result<Vec<SecretListing>> {
        let values = self.values.lock().unwrap();
        Ok(values
            .keys()
            .map(|key| SecretListing {
                name: key.clone(),
                reference: format!("mock://{}", key),
                status: "active".to_string(),
            })
            .collect())
    }

    async fn health_check(&self) -> HealthStatus {
        HealthStatus::healthy(false)
    }
}

/// Identity response issuing `token`, valid for `valid_for` from now.
pub fn token_response(token: &str, valid_for: chrono::Duration) -> ResponseTemplate {
    let expires_at = (Utc::now() + valid_for).to_rfc3339();
    ResponseTemplate::new(201)
        .insert_header("X-Subject-Token", token)
        .set_body_json(json!({ "token": { "expires_at": expires_at } }))
}

/// Lookup response with one match per reference, newest first.
pub fn lookup_response(references: &[String]) -> ResponseTemplate {
    let secrets: Vec<_> = references
        .iter()
        .map(|r| json!({ "secret_ref": r, "name": "match", "status": "ACTIVE" }))
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({ "secrets": secrets, "total": references.len() }))
}

/// Vault and identity both served from `base`.
pub fn vault_config(base: &str) -> VaultConfig {
    VaultConfig::new(base, IdentityConfig::new(base, "svc-secrets", "identity-pw", "platform"))
}
