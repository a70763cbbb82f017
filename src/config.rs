//! Runtime configuration, loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Which storage backend the system runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Postgres,
}

impl StoreBackend {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::InvalidValue {
                key: "ORDER_STORE_BACKEND".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: StoreBackend,
    /// Required for [`StoreBackend::Postgres`].
    pub database_url: Option<String>,
    /// Store actor mailbox size.
    pub mailbox_size: usize,
    /// How long an in-memory transaction may sit idle before it is rolled back.
    pub transaction_timeout: Duration,
    pub max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            mailbox_size: 64,
            transaction_timeout: Duration::from_millis(5000),
            max_connections: 10,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a value does not parse, or if the postgres
    /// backend is selected without `DATABASE_URL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match lookup("ORDER_STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.backend,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
        }

        let mailbox_size = parse_or(&lookup, "ORDER_STORE_MAILBOX", defaults.mailbox_size)?;
        if mailbox_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ORDER_STORE_MAILBOX".to_string(),
                value: "0".to_string(),
            });
        }

        let transaction_timeout = parse_or::<u64>(&lookup, "ORDER_STORE_TX_TIMEOUT_MS", 5000)
            .map(Duration::from_millis)?;

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?;

        Ok(Self {
            backend,
            database_url,
            mailbox_size,
            transaction_timeout,
            max_connections,
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
