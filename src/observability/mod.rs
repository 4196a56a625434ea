//! # Observability
//!
//! Structured logging and metrics for the secrets subsystem.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{describe_metrics, MetricsRecorder};
