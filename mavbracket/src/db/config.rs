//! Database connection settings.

use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Fallback URL used by [`DatabaseConfig::development`]
pub const DEVELOPMENT_DATABASE_URL: &str = "postgres://postgres@localhost/mavbracket";

/// Errors reading database settings from the environment
#[derive(Debug, Error)]
pub enum DatabaseConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, DatabaseConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| DatabaseConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

impl DatabaseConfig {
    /// Read configuration from the environment.
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string (required)
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
    /// - `DB_MIN_CONNECTIONS`: Minimum pool size (default: 1)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    /// - `DB_IDLE_TIMEOUT`: Idle timeout in seconds (default: 600)
    /// - `DB_MAX_LIFETIME`: Max lifetime in seconds (default: 1800)
    ///
    /// # Errors
    ///
    /// `DatabaseConfigError::Missing` when `DATABASE_URL` is unset, and
    /// `DatabaseConfigError::Invalid` when a numeric variable doesn't parse.
    pub fn from_env() -> Result<Self, DatabaseConfigError> {
        let defaults = Self::development();
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| DatabaseConfigError::Missing("DATABASE_URL"))?,
            max_connections: env_or("DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: env_or("DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: env_or(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs)?,
            max_lifetime_secs: env_or("DB_MAX_LIFETIME", defaults.max_lifetime_secs)?,
        })
    }

    /// Local development settings against [`DEVELOPMENT_DATABASE_URL`]
    pub fn development() -> Self {
        Self {
            database_url: DEVELOPMENT_DATABASE_URL.to_string(),
            max_connections: 10,
            min_connections: 1,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }

    /// Same settings against another database
    pub fn with_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}
