//! # Metrics Collection
//!
//! Counters for the secrets subsystem, recorded through the `metrics` facade.
//! The crate installs no exporter; the host process decides where they go.

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register metric descriptions with whatever recorder is installed.
///
/// Only the first call does anything.
pub fn describe_metrics() {
    DESCRIBED.get_or_init(|| {
        describe_counter!("secrets_cache_lookups_total", "Secret cache lookups by layer and result");
        describe_counter!("secrets_authentications_total", "Identity exchanges by outcome");
        describe_counter!("secrets_vault_requests_total", "Vault API calls by operation and status");
        describe_counter!("secrets_load_violations_total", "Violations found by load_all, by kind");
        describe_counter!("secrets_loads_total", "load_all runs by outcome");
    });
}

/// Metrics recorder that tracks secrets subsystem metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a cache lookup for the given layer (`manager`, `vault`)
    pub fn record_cache_lookup(&self, layer: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        let labels = [("layer", layer.to_string()), ("result", result.to_string())];
        counter!("secrets_cache_lookups_total", &labels).increment(1);
    }

    /// Record an identity exchange
    pub fn record_authentication(&self, success: bool) {
        let status = if success { "success" } else { "failure" };
        let labels = [("status", status.to_string())];
        counter!("secrets_authentications_total", &labels).increment(1);
    }

    /// Record a vault API call and its HTTP status (0 for transport failures)
    pub fn record_vault_request(&self, operation: &str, status: u16) {
        let labels = [("operation", operation.to_string()), ("status", status.to_string())];
        counter!("secrets_vault_requests_total", &labels).increment(1);
    }

    /// Record the outcome of a full load
    pub fn record_load(&self, environment: &str, violations: &[crate::errors::SecretsError]) {
        let outcome = if violations.is_empty() { "success" } else { "failure" };
        let labels = [("environment", environment.to_string()), ("outcome", outcome.to_string())];
        counter!("secrets_loads_total", &labels).increment(1);

        for violation in violations {
            let labels = [("kind", violation_kind(violation).to_string())];
            counter!("secrets_load_violations_total", &labels).increment(1);
        }
    }
}

fn violation_kind(error: &crate::errors::SecretsError) -> &'static str {
    use crate::errors::SecretsError::*;
    match error {
        MissingSecret { .. } => "missing",
        WeakSecret { .. } => "weak",
        ForbiddenValue { .. } => "forbidden",
        PolicyViolation { .. } => "policy",
        AuthenticationFailed { .. } => "authentication",
        NotFound { .. } => "not_found",
        ProviderUnavailable { .. } | Timeout { .. } => "unavailable",
        _ => "other",
    }
}
