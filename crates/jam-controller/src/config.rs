//! Jam Controller configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_HTTP_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default Prometheus metrics bind address.
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:9090";

/// Default upper bound for one session store call, in seconds.
pub const DEFAULT_STORE_TIMEOUT_SECONDS: u64 = 5;

/// Default timeout for one HTTP request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Default database connection pool size.
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;

/// Default JC instance ID prefix.
pub const DEFAULT_JC_ID_PREFIX: &str = "jc";

/// Jam Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
/// Sensitive fields are redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Postgres connection URL (for the session store).
    /// Protected by `SecretString` to prevent accidental logging.
    pub database_url: SecretString,

    /// HTTP and WebSocket bind address (default: "0.0.0.0:8080").
    pub http_bind_address: String,

    /// Prometheus metrics bind address (default: "0.0.0.0:9090").
    pub metrics_bind_address: String,

    /// Unique identifier for this JC instance.
    pub jc_id: String,

    /// Upper bound for one session store call, in seconds.
    pub store_timeout_seconds: u64,

    /// Timeout for one HTTP request, in seconds.
    pub request_timeout_seconds: u64,

    /// Database connection pool size.
    pub db_max_connections: u32,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("http_bind_address", &self.http_bind_address)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("jc_id", &self.jc_id)
            .field("store_timeout_seconds", &self.store_timeout_seconds)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("db_max_connections", &self.db_max_connections)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = SecretString::from(
            vars.get("DATABASE_URL")
                .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?
                .clone(),
        );

        let http_bind_address = vars
            .get("JC_HTTP_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HTTP_BIND_ADDRESS.to_string());

        let metrics_bind_address = vars
            .get("JC_METRICS_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_METRICS_BIND_ADDRESS.to_string());

        let store_timeout_seconds = vars
            .get("JC_STORE_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STORE_TIMEOUT_SECONDS);
        if store_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "JC_STORE_TIMEOUT_SECONDS must be positive".to_string(),
            ));
        }

        let request_timeout_seconds = vars
            .get("JC_REQUEST_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS);

        let db_max_connections = vars
            .get("JC_DB_MAX_CONNECTIONS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

        // Generate JC instance ID
        let jc_id = vars.get("JC_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_JC_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            database_url,
            http_bind_address,
            metrics_bind_address,
            jc_id,
            store_timeout_seconds,
            request_timeout_seconds,
            db_max_connections,
        })
    }

    /// Store timeout as a [`Duration`].
    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_seconds)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// A configuration for unit tests; no database behind it.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/unused".to_string()),
            http_bind_address: "127.0.0.1:0".to_string(),
            metrics_bind_address: "127.0.0.1:0".to_string(),
            jc_id: "jc-test".to_string(),
            store_timeout_seconds: DEFAULT_STORE_TIMEOUT_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            db_max_connections: 1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgres://localhost:5432/jam".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let vars = base_vars();

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(
            config.database_url.expose_secret(),
            "postgres://localhost:5432/jam"
        );
        assert_eq!(config.http_bind_address, DEFAULT_HTTP_BIND_ADDRESS);
        assert_eq!(config.metrics_bind_address, DEFAULT_METRICS_BIND_ADDRESS);
        assert_eq!(config.store_timeout_seconds, DEFAULT_STORE_TIMEOUT_SECONDS);
        assert_eq!(
            config.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT_SECONDS
        );
        assert_eq!(config.db_max_connections, DEFAULT_DB_MAX_CONNECTIONS);
        // JC ID should be auto-generated
        assert!(config.jc_id.starts_with("jc-"));
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let mut vars = base_vars();
        vars.insert(
            "JC_HTTP_BIND_ADDRESS".to_string(),
            "127.0.0.1:8088".to_string(),
        );
        vars.insert(
            "JC_METRICS_BIND_ADDRESS".to_string(),
            "127.0.0.1:9091".to_string(),
        );
        vars.insert("JC_STORE_TIMEOUT_SECONDS".to_string(), "2".to_string());
        vars.insert("JC_REQUEST_TIMEOUT_SECONDS".to_string(), "10".to_string());
        vars.insert("JC_DB_MAX_CONNECTIONS".to_string(), "20".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.http_bind_address, "127.0.0.1:8088");
        assert_eq!(config.metrics_bind_address, "127.0.0.1:9091");
        assert_eq!(config.store_timeout_seconds, 2);
        assert_eq!(config.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.request_timeout_seconds, 10);
        assert_eq!(config.db_max_connections, 20);
    }

    #[test]
    fn test_jc_id_custom_value() {
        let mut vars = base_vars();
        vars.insert("JC_ID".to_string(), "jc-custom-001".to_string());

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert_eq!(config.jc_id, "jc-custom-001");
    }

    #[test]
    fn test_from_vars_missing_database_url() {
        let vars = HashMap::new();

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_URL"));
    }

    #[test]
    fn test_from_vars_rejects_zero_store_timeout() {
        let mut vars = base_vars();
        vars.insert("JC_STORE_TIMEOUT_SECONDS".to_string(), "0".to_string());

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let vars = base_vars();
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("postgres://"));
    }
}
