//! # Error Types
//!
//! Error taxonomy for the secrets subsystem using `thiserror`.
//!
//! Variants carry secret *names* and policy details only. A secret value must
//! never end up inside an error message.

use std::fmt;

/// Result type for secrets operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Errors produced while defining, loading, fetching or mutating secrets.
#[derive(thiserror::Error, Debug)]
pub enum SecretsError {
    /// A required secret has no value.
    #[error("Required secret '{name}' is missing")]
    MissingSecret { name: String },

    /// A secret is shorter than its definition allows.
    #[error("Secret '{name}' must be at least {min_length} characters, got {actual}")]
    WeakSecret { name: String, min_length: usize, actual: usize },

    /// A secret contains a disallowed substring.
    #[error("Secret '{name}' contains forbidden value '{pattern}'")]
    ForbiddenValue { name: String, pattern: String },

    /// A policy rule spanning one or more secrets was broken.
    #[error("Secret '{name}' violates policy: {reason}")]
    PolicyViolation { name: String, reason: String },

    /// The identity exchange with the vault's auth endpoint failed.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The vault has no secret with this name or reference.
    #[error("Secret not found: {name}")]
    NotFound { name: String },

    /// Transport-level failure while talking to the vault.
    #[error("Secrets provider unavailable: {message}")]
    ProviderUnavailable { message: String },

    /// A network call exceeded its deadline.
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// The caller asked for a name outside the secret registry.
    #[error("Unknown secret '{name}': not defined in the secret registry")]
    UnknownSecret { name: String },

    /// Startup loading found one or more violations.
    #[error("{}", LoadReport(.violations))]
    LoadFailed { violations: Vec<SecretsError> },

    /// The active provider cannot perform this operation.
    #[error("Provider '{provider}' does not support {operation}")]
    Unsupported { provider: String, operation: String },

    /// Rotation could not be completed.
    #[error("Rotation failed for secret '{name}': {reason}")]
    RotationFailed { name: String, reason: String },

    /// The vault answered with something we could not interpret.
    #[error("Invalid provider response: {message}")]
    InvalidResponse { message: String },

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A vault response body that is not the expected JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Renders the aggregated startup report, one violation per line.
struct LoadReport<'a>(&'a [SecretsError]);

impl fmt::Display for LoadReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to load secrets: {} violation(s)", self.0.len())?;
        for violation in self.0 {
            write!(f, "\n  - {}", violation)?;
        }
        Ok(())
    }
}

impl SecretsError {
    /// Create a missing secret error.
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingSecret { name: name.into() }
    }

    /// Create a weak secret error.
    pub fn weak(name: impl Into<String>, min_length: usize, actual: usize) -> Self {
        Self::WeakSecret { name: name.into(), min_length, actual }
    }

    /// Create a forbidden value error.
    pub fn forbidden(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::ForbiddenValue { name: name.into(), pattern: pattern.into() }
    }

    /// Create a policy violation error.
    pub fn policy(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PolicyViolation { name: name.into(), reason: reason.into() }
    }

    /// Create an authentication failed error.
    pub fn authentication_failed(message: impl Into<String>) -> Self {
        Self::AuthenticationFailed { message: message.into() }
    }

    /// Create a not found error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create a provider unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::ProviderUnavailable { message: message.into() }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create an unknown secret error.
    pub fn unknown(name: impl Into<String>) -> Self {
        Self::UnknownSecret { name: name.into() }
    }

    /// Create an unsupported operation error.
    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported { provider: provider.into(), operation: operation.into() }
    }

    /// Create a rotation failed error.
    pub fn rotation_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RotationFailed { name: name.into(), reason: reason.into() }
    }

    /// Create an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse { message: message.into() }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// True for strength/policy outcomes produced by validation.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingSecret { .. }
                | Self::WeakSecret { .. }
                | Self::ForbiddenValue { .. }
                | Self::PolicyViolation { .. }
        )
    }

    /// True when the failure points at the network or the vault itself rather
    /// than at configuration or policy.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable { .. } | Self::Timeout { .. })
    }

    /// Violations carried by an aggregated load error, empty for anything else.
    pub fn violations(&self) -> &[SecretsError] {
        match self {
            Self::LoadFailed { violations } => violations,
            _ => &[],
        }
    }
}

impl From<reqwest::Error> for SecretsError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::invalid_response(error.to_string())
        } else {
            Self::unavailable(error.to_string())
        }
    }
}

impl From<validator::ValidationErrors> for SecretsError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::config(format!("Validation failed: {}", message))
    }
}
