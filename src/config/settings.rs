//! # Configuration Settings
//!
//! Configuration structures for the secrets subsystem, read from the
//! environment and checked with the `validator` crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::errors::{Result, SecretsError};
use crate::secrets::{Environment, ProviderKind, RotationOrder, SecretString};

const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TOKEN_REFRESH_BUFFER_SECS: u64 = 60;
const DEFAULT_DOMAIN: &str = "Default";

/// Top-level secrets configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecretsConfig {
    /// Which provider supplies secret values
    pub provider: ProviderKind,

    /// Environment whose enforcement rules apply
    pub environment: Environment,

    /// Manager-level cache TTL in milliseconds
    #[validate(range(min = 1, message = "Cache TTL must be at least 1ms"))]
    pub cache_ttl_ms: u64,

    /// Vault connection settings; present iff `provider` is vault
    pub vault: Option<VaultConfig>,

    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Environment,
            environment: Environment::Development,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            vault: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl SecretsConfig {
    /// Read configuration from process environment variables.
    ///
    /// The vault section is only read when `SECRETS_PROVIDER=vault`.
    pub fn from_env() -> Result<Self> {
        let provider = match env_opt("SECRETS_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::default(),
        };

        let environment = match env_opt("SECRETS_ENVIRONMENT").or_else(|| env_opt("APP_ENV")) {
            Some(value) => value.parse()?,
            None => Environment::default(),
        };

        let vault = match provider {
            ProviderKind::Vault => Some(VaultConfig::from_env()?),
            ProviderKind::Environment => None,
        };

        let config = Self {
            provider,
            environment,
            cache_ttl_ms: env_parse("SECRETS_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS)?,
            vault,
            logging: LoggingConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SecretsError::from)?;

        match (self.provider, &self.vault) {
            (ProviderKind::Vault, None) => {
                return Err(SecretsError::config("Vault provider selected but vault settings are missing"));
            }
            (ProviderKind::Vault, Some(vault)) => vault.validate()?,
            (ProviderKind::Environment, _) => {}
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Remote vault connection settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct VaultConfig {
    /// Base URL of the vault API, e.g. `https://vault.example.com/v1`
    #[validate(url(message = "Vault URL must be a valid URL"))]
    pub url: String,

    #[validate(nested)]
    pub identity: IdentityConfig,

    /// Provider-level cache TTL in milliseconds
    #[validate(range(min = 1, message = "Vault cache TTL must be at least 1ms"))]
    pub cache_ttl_ms: u64,

    #[validate(range(min = 1, max = 300_000, message = "Request timeout must be between 1ms and 5 minutes"))]
    pub request_timeout_ms: u64,

    /// Seconds shaved off the server-declared token expiry
    pub token_refresh_buffer_secs: u64,

    pub rotation_order: RotationOrder,
}

impl VaultConfig {
    /// Minimal config for `url` and `identity`, with defaults for the rest.
    pub fn new(url: impl Into<String>, identity: IdentityConfig) -> Self {
        Self {
            url: url.into(),
            identity,
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            token_refresh_buffer_secs: DEFAULT_TOKEN_REFRESH_BUFFER_SECS,
            rotation_order: RotationOrder::default(),
        }
    }

    /// Read vault settings from `VAULT_*` variables.
    pub fn from_env() -> Result<Self> {
        let url = env_required("VAULT_URL");
        let identity = IdentityConfig::from_env();

        let missing: Vec<&str> = [
            ("VAULT_URL", url.is_none()),
            ("VAULT_IDENTITY_URL", identity.url.is_empty()),
            ("VAULT_USERNAME", identity.username.is_empty()),
            ("VAULT_PASSWORD", identity.password.is_empty()),
            ("VAULT_PROJECT", identity.project.is_empty()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        if !missing.is_empty() {
            return Err(SecretsError::config(format!(
                "Vault provider requires environment variables: {}",
                missing.join(", ")
            )));
        }

        let rotation_order = match env_opt("VAULT_ROTATION_ORDER") {
            Some(value) => value.parse()?,
            None => RotationOrder::default(),
        };

        Ok(Self {
            url: url.unwrap_or_default(),
            identity,
            cache_ttl_ms: env_parse("VAULT_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS)?,
            request_timeout_ms: env_parse("VAULT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
            token_refresh_buffer_secs: env_parse(
                "VAULT_TOKEN_REFRESH_BUFFER_SECS",
                DEFAULT_TOKEN_REFRESH_BUFFER_SECS,
            )?,
            rotation_order,
        })
    }

    /// Validate field rules plus URL schemes.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SecretsError::from)?;
        check_http_url("Vault URL", &self.url)?;
        check_http_url("Identity URL", &self.identity.url)?;
        if self.identity.password.is_empty() {
            return Err(SecretsError::config("Identity password cannot be empty"));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn token_refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.token_refresh_buffer_secs)
    }
}

/// Credentials and scope for the identity endpoint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct IdentityConfig {
    /// Base URL; tokens are requested from `{url}/auth/tokens`
    #[validate(url(message = "Identity URL must be a valid URL"))]
    pub url: String,

    #[validate(length(min = 1, message = "Identity username cannot be empty"))]
    pub username: String,

    pub password: SecretString,

    #[validate(length(min = 1, message = "Project cannot be empty"))]
    pub project: String,

    #[validate(length(min = 1, message = "User domain cannot be empty"))]
    pub user_domain: String,

    #[validate(length(min = 1, message = "Project domain cannot be empty"))]
    pub project_domain: String,
}

impl IdentityConfig {
    pub fn new(
        url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<SecretString>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            username: username.into(),
            password: password.into(),
            project: project.into(),
            user_domain: DEFAULT_DOMAIN.to_string(),
            project_domain: DEFAULT_DOMAIN.to_string(),
        }
    }

    /// Read identity settings; absent values come back empty.
    fn from_env() -> Self {
        Self {
            url: env_required("VAULT_IDENTITY_URL").unwrap_or_default(),
            username: env_required("VAULT_USERNAME").unwrap_or_default(),
            password: SecretString::new(env_required("VAULT_PASSWORD").unwrap_or_default()),
            project: env_required("VAULT_PROJECT").unwrap_or_default(),
            user_domain: env_opt("VAULT_USER_DOMAIN").unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            project_domain: env_opt("VAULT_PROJECT_DOMAIN")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = SecretsError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(SecretsError::config(format!("Unknown log format: {}", other))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let format = match env_opt("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::default(),
        };
        Ok(Self { level: env_opt("LOG_LEVEL").unwrap_or_else(|| "info".to_string()), format })
    }
}

/// Non-empty, trimmed value of `key`.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Like [`env_opt`] but keeps surrounding whitespace, for credentials.
fn env_required(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: fmt::Display,
{
    match env_opt(key) {
        Some(value) => value
            .parse()
            .map_err(|e| SecretsError::config(format!("Invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}

fn check_http_url(label: &str, raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| SecretsError::config(format!("{} is not a valid URL: {}", label, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(SecretsError::config(format!("{} must use http or https, got {}", label, scheme))),
    }
}
