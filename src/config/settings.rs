//! # Configuration Settings
//!
//! Defines the configuration structure for a migration run.

use crate::errors::{MigrationError, Result};
use crate::store::EndpointConfig;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

/// Root prefixes migrated when none are configured
pub const DEFAULT_ROOT_PREFIXES: [&str; 3] = ["kv/issuers/", "kv/holders/", "transit/keys/"];

/// Retries after the first attempt before a leaf is abandoned
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 2;

/// Maximum number of leaf tasks in flight
pub const DEFAULT_BATCH_WIDTH: usize = 80;

const DEFAULT_NAMESPACE: &str = "admin";
const DEFAULT_TRANSIT_MOUNT: &str = "transit";

/// Complete configuration for one run
#[derive(Debug, Clone, Validate)]
pub struct MigrationConfig {
    /// Endpoint entries are copied from
    #[validate(nested)]
    pub source: StoreConfig,

    /// Endpoint entries are copied to and verified against
    #[validate(nested)]
    pub destination: StoreConfig,

    /// Namespaces to migrate, visited in order
    #[validate(length(min = 1, message = "At least one root prefix is required"))]
    pub root_prefixes: Vec<String>,

    /// Mount segment of the transit engine
    #[validate(length(min = 1, message = "Transit mount cannot be empty"))]
    pub transit_mount: String,

    /// Scheduling and retry settings
    #[validate(nested)]
    pub run: RunConfig,

    /// Failure log database
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

impl MigrationConfig {
    /// Load configuration from `MIGRATOR_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let root_prefixes = match std::env::var("MIGRATOR_ROOT_PREFIXES") {
            Ok(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => DEFAULT_ROOT_PREFIXES.iter().map(|p| p.to_string()).collect(),
        };

        let config = Self {
            source: StoreConfig::from_env("SOURCE")?,
            destination: StoreConfig::from_env("DESTINATION")?,
            root_prefixes,
            transit_mount: env_or("MIGRATOR_TRANSIT_MOUNT", DEFAULT_TRANSIT_MOUNT),
            run: RunConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(MigrationError::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        if let Some(prefix) = self.root_prefixes.iter().find(|p| !p.ends_with('/')) {
            return Err(MigrationError::validation_field(
                format!("Root prefix '{}' must end with '/'", prefix),
                "root_prefixes",
            ));
        }

        if self.source.address.trim_end_matches('/') == self.destination.address.trim_end_matches('/')
            && self.source.namespace == self.destination.namespace
        {
            return Err(MigrationError::validation(
                "Source and destination must be different endpoints",
            ));
        }

        Ok(())
    }

    /// Connection settings for the source endpoint
    pub fn source_endpoint(&self) -> EndpointConfig {
        self.source.endpoint(&self.transit_mount, self.run.request_timeout())
    }

    /// Connection settings for the destination endpoint
    pub fn destination_endpoint(&self) -> EndpointConfig {
        self.destination.endpoint(&self.transit_mount, self.run.request_timeout())
    }
}

/// One secret store endpoint
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct StoreConfig {
    /// Base URL
    #[validate(url(message = "Store address must be a valid URL"))]
    pub address: String,

    /// Access token
    #[validate(length(min = 1, message = "Store token cannot be empty"))]
    pub token: String,

    /// Namespace selector header value
    pub namespace: Option<String>,
}

impl StoreConfig {
    /// Read `MIGRATOR_<SIDE>_ADDR` / `_TOKEN` / `_NAMESPACE`.
    ///
    /// The namespace falls back to `MIGRATOR_NAMESPACE`, then `admin`. An
    /// empty namespace disables the header.
    fn from_env(side: &str) -> Result<Self> {
        let address = required(&format!("MIGRATOR_{}_ADDR", side))?;
        let token = required(&format!("MIGRATOR_{}_TOKEN", side))?;
        let namespace = std::env::var(format!("MIGRATOR_{}_NAMESPACE", side))
            .or_else(|_| std::env::var("MIGRATOR_NAMESPACE"))
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let namespace = if namespace.is_empty() { None } else { Some(namespace) };

        Ok(Self { address, token, namespace })
    }

    fn endpoint(&self, transit_mount: &str, timeout: Duration) -> EndpointConfig {
        EndpointConfig::new(&self.address, &self.token)
            .with_namespace(self.namespace.clone())
            .with_transit_mount(transit_mount)
            .with_timeout(timeout)
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("address", &self.address)
            .field("token", &"[REDACTED]")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Scheduling and retry settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RunConfig {
    /// Copy missing entries to the destination (otherwise verify only)
    pub write_enabled: bool,

    /// Retries after the first attempt
    #[validate(range(max = 100, message = "Max retry count must be at most 100"))]
    pub max_retry_count: u32,

    /// Fixed delay between attempts in milliseconds
    pub retry_backoff_ms: u64,

    /// Maximum leaf tasks in flight before a full drain
    #[validate(range(min = 1, max = 10000, message = "Batch width must be between 1 and 10000"))]
    pub batch_width: usize,

    /// Per-request network timeout in seconds
    #[validate(range(min = 1, message = "Request timeout must be at least 1 second"))]
    pub request_timeout_seconds: u64,

    /// Log progress every N listing entries
    #[validate(range(min = 1, message = "Progress interval must be at least 1"))]
    pub progress_interval: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            write_enabled: false,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            retry_backoff_ms: 1000,
            batch_width: DEFAULT_BATCH_WIDTH,
            request_timeout_seconds: 36_000,
            progress_interval: 2000,
        }
    }
}

impl RunConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            write_enabled: false,
            max_retry_count: parse_env("MIGRATOR_MAX_RETRY_COUNT", defaults.max_retry_count)?,
            retry_backoff_ms: parse_env("MIGRATOR_RETRY_BACKOFF_MS", defaults.retry_backoff_ms)?,
            batch_width: parse_env("MIGRATOR_BATCH_WIDTH", defaults.batch_width)?,
            request_timeout_seconds: parse_env(
                "MIGRATOR_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout_seconds,
            )?,
            progress_interval: parse_env("MIGRATOR_PROGRESS_INTERVAL", defaults.progress_interval)?,
        })
    }

    /// Backoff between attempts as Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Failure log database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1, max = 100, message = "Max connections must be between 1 and 100"))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(min = 1, max = 60, message = "Connect timeout must be between 1 and 60 seconds"))]
    pub connect_timeout_seconds: u64,

    /// Idle timeout in seconds (0 = no timeout)
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: 4,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 600,
        }
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            url: std::env::var("MIGRATOR_FAILURE_DB_URL").unwrap_or(defaults.url),
            max_connections: parse_env("MIGRATOR_FAILURE_DB_MAX_CONNECTIONS", defaults.max_connections)?,
            ..defaults
        })
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }
}

/// A fresh database per run, named after the start time.
fn default_database_url() -> String {
    format!("sqlite://./database-{}.db", chrono::Utc::now().timestamp_millis())
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "vault_migrator=debug"
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        let level = std::env::var("MIGRATOR_LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());
        let json = parse_env("MIGRATOR_LOG_JSON", false)?;
        Ok(Self { level, json })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| MigrationError::config(format!("{} environment variable not set", name)))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| MigrationError::config(format!("Invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serialises tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 8] = [
        "MIGRATOR_SOURCE_ADDR",
        "MIGRATOR_SOURCE_TOKEN",
        "MIGRATOR_DESTINATION_ADDR",
        "MIGRATOR_DESTINATION_TOKEN",
        "MIGRATOR_ROOT_PREFIXES",
        "MIGRATOR_BATCH_WIDTH",
        "MIGRATOR_NAMESPACE",
        "MIGRATOR_MAX_RETRY_COUNT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn set_endpoints() {
        env::set_var("MIGRATOR_SOURCE_ADDR", "https://source.vault.local");
        env::set_var("MIGRATOR_SOURCE_TOKEN", "s.source");
        env::set_var("MIGRATOR_DESTINATION_ADDR", "https://destination.vault.local");
        env::set_var("MIGRATOR_DESTINATION_TOKEN", "s.destination");
    }

    fn sample_config() -> MigrationConfig {
        MigrationConfig {
            source: StoreConfig {
                address: "https://source.vault.local".to_string(),
                token: "s.source".to_string(),
                namespace: Some("admin".to_string()),
            },
            destination: StoreConfig {
                address: "https://destination.vault.local".to_string(),
                token: "s.destination".to_string(),
                namespace: Some("admin".to_string()),
            },
            root_prefixes: vec!["kv/issuers/".to_string()],
            transit_mount: "transit".to_string(),
            run: RunConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn test_from_env_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_endpoints();

        let config = MigrationConfig::from_env().unwrap();
        assert_eq!(config.root_prefixes, DEFAULT_ROOT_PREFIXES.to_vec());
        assert_eq!(config.run.max_retry_count, 2);
        assert_eq!(config.run.batch_width, 80);
        assert_eq!(config.run.retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.source.namespace, Some("admin".to_string()));
        assert!(!config.run.write_enabled);
        assert!(config.database.url.starts_with("sqlite://./database-"));

        clear_env();
    }

    #[test]
    fn test_from_env_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_endpoints();
        env::set_var("MIGRATOR_ROOT_PREFIXES", "kv/a/, kv/b/ ,");
        env::set_var("MIGRATOR_BATCH_WIDTH", "10");
        env::set_var("MIGRATOR_NAMESPACE", "");

        let config = MigrationConfig::from_env().unwrap();
        assert_eq!(config.root_prefixes, vec!["kv/a/", "kv/b/"]);
        assert_eq!(config.run.batch_width, 10);
        assert_eq!(config.destination.namespace, None);

        clear_env();
    }

    #[test]
    fn test_from_env_missing_source() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();

        let err = MigrationConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("MIGRATOR_SOURCE_ADDR"));
    }

    #[test]
    fn test_from_env_invalid_number() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_endpoints();
        env::set_var("MIGRATOR_MAX_RETRY_COUNT", "many");

        let err = MigrationConfig::from_env().unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));

        clear_env();
    }

    #[test]
    fn test_validation_rules() {
        assert!(sample_config().validate().is_ok());

        let mut config = sample_config();
        config.root_prefixes = vec!["kv/issuers".to_string()];
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.run.batch_width = 0;
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.destination.address = config.source.address.clone();
        assert!(config.validate().is_err());

        let mut config = sample_config();
        config.source.address = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nested_validation_messages_name_the_field() {
        let mut config = sample_config();
        config.source.address = "not a url".to_string();
        config.run.batch_width = 0;
        config.run.max_retry_count = 101;

        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("source.address: Store address must be a valid URL"), "{}", message);
        assert!(
            message.contains("run.batch_width: Batch width must be between 1 and 10000"),
            "{}",
            message
        );
        assert!(
            message.contains("run.max_retry_count: Max retry count must be at most 100"),
            "{}",
            message
        );
    }

    #[test]
    fn test_store_config_debug_redacts_token() {
        let debug = format!("{:?}", sample_config().source);
        assert!(!debug.contains("s.source"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_endpoints_carry_run_settings() {
        let mut config = sample_config();
        config.run.request_timeout_seconds = 30;
        let endpoint = config.destination_endpoint();
        assert_eq!(endpoint.address, "https://destination.vault.local");
        assert_eq!(endpoint.timeout, Duration::from_secs(30));
        assert_eq!(endpoint.transit_mount, "transit");
    }
}
