//! Runs in its own test binary (own process): `init_logging` installs a global
//! subscriber, which conflicts with `#[traced_test]` tests in the lib unit tests.

use strongbox::config::LogFormat;
use strongbox::{init_logging, LoggingConfig};

#[test]
fn test_init_logging_twice_is_harmless() {
    let config = LoggingConfig::default();
    init_logging(&config);
    init_logging(&LoggingConfig { format: LogFormat::Json, ..config });
}
