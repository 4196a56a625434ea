//! Integration tests for configuration loading
//!
//! These tests mutate process environment variables, so they are serialized
//! through a mutex and restore every variable they touch.

use std::env;
use std::sync::Mutex;
use std::time::Duration;

use strongbox::config::{LogFormat, SecretsConfig};
use strongbox::secrets::{Environment, ProviderKind, RotationOrder, SecretsManager};
use strongbox::{Result, SecretRegistry, SecretsError};

// Use a mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const KEYS: &[&str] = &[
    "SECRETS_PROVIDER",
    "SECRETS_ENVIRONMENT",
    "APP_ENV",
    "SECRETS_CACHE_TTL_MS",
    "VAULT_URL",
    "VAULT_IDENTITY_URL",
    "VAULT_USERNAME",
    "VAULT_PASSWORD",
    "VAULT_PROJECT",
    "VAULT_ROTATION_ORDER",
    "VAULT_REQUEST_TIMEOUT_MS",
    "LOG_LEVEL",
    "LOG_FORMAT",
];

/// Clears every config variable and puts the originals back on drop.
struct EnvSnapshot(Vec<(&'static str, Option<String>)>);

impl EnvSnapshot {
    fn clean() -> Self {
        let saved = KEYS.iter().map(|key| (*key, env::var(key).ok())).collect();
        for key in KEYS {
            env::remove_var(key);
        }
        Self(saved)
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (key, value) in &self.0 {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }
}

fn set_vault_vars() {
    env::set_var("SECRETS_PROVIDER", "vault");
    env::set_var("VAULT_URL", "https://vault.example.com/v1");
    env::set_var("VAULT_IDENTITY_URL", "https://identity.example.com/v3");
    env::set_var("VAULT_USERNAME", "svc-secrets");
    env::set_var("VAULT_PASSWORD", "identity-pw");
    env::set_var("VAULT_PROJECT", "platform");
}

/// Test that configuration defaults work when no environment variables are set
#[test]
fn test_defaults_without_environment() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _snapshot = EnvSnapshot::clean();

    let config = SecretsConfig::from_env()?;

    assert_eq!(config.provider, ProviderKind::Environment);
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.cache_ttl(), Duration::from_secs(300));
    assert!(config.vault.is_none());
    assert_eq!(config.logging.format, LogFormat::Text);
    Ok(())
}

#[test]
fn test_environment_falls_back_to_app_env() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _snapshot = EnvSnapshot::clean();

    env::set_var("APP_ENV", "production");
    assert_eq!(SecretsConfig::from_env()?.environment, Environment::Production);

    env::set_var("SECRETS_ENVIRONMENT", "staging");
    assert_eq!(SecretsConfig::from_env()?.environment, Environment::Staging);
    Ok(())
}

#[test]
fn test_vault_settings_are_read() -> Result<()> {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _snapshot = EnvSnapshot::clean();

    set_vault_vars();
    env::set_var("VAULT_ROTATION_ORDER", "store-then-delete");
    env::set_var("VAULT_REQUEST_TIMEOUT_MS", "2500");
    env::set_var("LOG_FORMAT", "json");

    let config = SecretsConfig::from_env()?;
    let vault = config.vault.as_ref().unwrap();

    assert_eq!(config.provider, ProviderKind::Vault);
    assert_eq!(vault.url, "https://vault.example.com/v1");
    assert_eq!(vault.identity.username, "svc-secrets");
    assert_eq!(vault.identity.user_domain, "Default");
    assert_eq!(vault.rotation_order, RotationOrder::StoreThenDelete);
    assert_eq!(vault.request_timeout(), Duration::from_millis(2500));
    assert_eq!(config.logging.format, LogFormat::Json);

    let manager = SecretsManager::from_config(&config, SecretRegistry::standard()?)?;
    assert_eq!(manager.provider_kind(), ProviderKind::Vault);
    Ok(())
}

#[test]
fn test_vault_provider_lists_missing_variables() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _snapshot = EnvSnapshot::clean();

    env::set_var("SECRETS_PROVIDER", "vault");
    env::set_var("VAULT_URL", "https://vault.example.com/v1");

    let err = SecretsConfig::from_env().unwrap_err();
    let message = err.to_string();

    assert!(matches!(err, SecretsError::Config { .. }));
    assert!(message.contains("VAULT_USERNAME"));
    assert!(message.contains("VAULT_PASSWORD"));
    assert!(!message.contains("VAULT_URL,"));
}

#[test]
fn test_invalid_values_are_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let _snapshot = EnvSnapshot::clean();

    env::set_var("SECRETS_CACHE_TTL_MS", "five minutes");
    assert!(matches!(SecretsConfig::from_env(), Err(SecretsError::Config { .. })));

    env::set_var("SECRETS_CACHE_TTL_MS", "0");
    assert!(SecretsConfig::from_env().is_err());

    env::remove_var("SECRETS_CACHE_TTL_MS");
    env::set_var("SECRETS_ENVIRONMENT", "qa");
    assert!(SecretsConfig::from_env().is_err());

    env::remove_var("SECRETS_ENVIRONMENT");
    set_vault_vars();
    env::set_var("VAULT_URL", "ftp://vault.example.com");
    assert!(SecretsConfig::from_env().is_err());
}
