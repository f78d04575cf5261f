//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Maximum processor retries before a message is treated as terminal
    pub max_retries: i32,

    /// Distributed lock TTL
    pub lock_ttl_seconds: i64,

    /// Queue visibility timeout; must be >= lock_ttl_seconds
    pub visibility_timeout_seconds: i64,

    /// Intake fast-path poll budget
    pub fast_path_poll_seconds: u64,

    /// Intake fast-path poll interval
    pub fast_path_poll_interval_ms: u64,

    /// Idempotency key lifetime
    pub idempotency_ttl_hours: i64,

    /// Outbox dispatcher batch size per tick
    pub outbox_batch_size: i64,

    /// Outbox dispatcher poll interval
    pub outbox_poll_interval_ms: u64,

    /// Queue consumer long-poll wait time
    pub queue_wait_time_seconds: i64,

    /// Per-processor call timeout
    pub processor_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let max_retries = env::var("MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("MAX_RETRIES"))?;

        let lock_ttl_seconds = env::var("LOCK_TTL_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("LOCK_TTL_SECONDS"))?;

        let visibility_timeout_seconds = env::var("VISIBILITY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| lock_ttl_seconds.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("VISIBILITY_TIMEOUT_SECONDS"))?;

        let fast_path_poll_seconds = env::var("FAST_PATH_POLL_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FAST_PATH_POLL_SECONDS"))?;

        let fast_path_poll_interval_ms = env::var("FAST_PATH_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FAST_PATH_POLL_INTERVAL_MS"))?;

        let idempotency_ttl_hours = env::var("IDEMPOTENCY_TTL_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("IDEMPOTENCY_TTL_HOURS"))?;

        let outbox_batch_size = env::var("OUTBOX_BATCH_SIZE")
            .unwrap_or_else(|_| "50".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_BATCH_SIZE"))?;

        let outbox_poll_interval_ms = env::var("OUTBOX_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("OUTBOX_POLL_INTERVAL_MS"))?;

        let queue_wait_time_seconds = env::var("QUEUE_WAIT_TIME_SECONDS")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("QUEUE_WAIT_TIME_SECONDS"))?;

        let processor_timeout_ms = env::var("PROCESSOR_TIMEOUT_MS")
            .unwrap_or_else(|_| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PROCESSOR_TIMEOUT_MS"))?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            max_retries,
            lock_ttl_seconds,
            visibility_timeout_seconds,
            fast_path_poll_seconds,
            fast_path_poll_interval_ms,
            idempotency_ttl_hours,
            outbox_batch_size,
            outbox_poll_interval_ms,
            queue_wait_time_seconds,
            processor_timeout_ms,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn fast_path_poll_budget(&self) -> Duration {
        Duration::from_secs(self.fast_path_poll_seconds)
    }

    pub fn fast_path_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fast_path_poll_interval_ms)
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_production() {
        let mut config = make_config();
        config.environment = "production".to_string();
        assert!(config.is_production());

        config.environment = "development".to_string();
        assert!(!config.is_production());
    }

    fn make_config() -> Config {
        Config {
            database_url: "postgres://localhost/test".to_string(),
            database_max_connections: 10,
            host: "127.0.0.1".to_string(),
            port: 3000,
            environment: "development".to_string(),
            max_retries: 5,
            lock_ttl_seconds: 30,
            visibility_timeout_seconds: 30,
            fast_path_poll_seconds: 5,
            fast_path_poll_interval_ms: 100,
            idempotency_ttl_hours: 24,
            outbox_batch_size: 50,
            outbox_poll_interval_ms: 1000,
            queue_wait_time_seconds: 20,
            processor_timeout_ms: 5000,
        }
    }
}
