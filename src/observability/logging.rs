//! # Structured Logging
//!
//! Subscriber setup and span helpers built on the tracing ecosystem.
//!
//! Log fields carry secret *names*, source keys and outcomes. Secret values are
//! wrapped in [`SecretString`](crate::secrets::SecretString), which renders as
//! `[REDACTED]` if it ever reaches a formatter.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Create a tracing span for a secret operation.
///
/// ```rust,ignore
/// let span = secret_span!("vault.fetch", "JWT_SECRET");
/// let span = secret_span!("manager.load_all");
/// ```
#[macro_export]
macro_rules! secret_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            secret = tracing::field::Empty
        )
    };
    ($operation:expr, $name:expr) => {
        tracing::debug_span!(
            "secret_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            secret = %$name
        )
    };
}

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Calling this when a subscriber
/// is already installed (a second call, or a test harness) is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.format {
        LogFormat::Json => fmt().with_env_filter(filter).json().with_current_span(true).try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(false).try_init(),
    };

    // Subscriber already set elsewhere (e.g. integration tests); ignore.
    let _ = result;
}
