//! Global subscriber installation.
//!
//! Lives in its own test binary because it installs the process-wide
//! subscriber, which would break `traced_test` in the library's unit tests.

use vault_migrator::config::LoggingConfig;
use vault_migrator::observability::init_logging;

#[test]
fn test_init_logging_twice_is_ok() {
    let config = LoggingConfig::default();
    assert!(init_logging(&config).is_ok());
    assert!(init_logging(&config).is_ok());
}

#[test]
fn test_init_logging_json_after_plain_is_ok() {
    let plain = LoggingConfig::default();
    let json = LoggingConfig { level: "debug".to_string(), json: true };
    assert!(init_logging(&plain).is_ok());
    assert!(init_logging(&json).is_ok());
}
