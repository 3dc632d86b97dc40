//! Admin tool configuration.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use mavbracket::bracket::{DEFAULT_TEAM_SIZE, SeedMethod};
use mavbracket::db::{DatabaseConfig, DatabaseConfigError};

/// Complete admin configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Seeding used when a command doesn't name one
    pub seed_method: SeedMethod,
    /// Roster size for demo teams
    pub team_size: usize,
    /// Fixed seed for RANDOM seeding, for reproducible brackets
    pub rng_seed: Option<u64>,
}

impl AdminConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `seed_override` - Optional RNG seed override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but invalid
    pub fn from_env(
        database_url_override: Option<String>,
        seed_override: Option<u64>,
    ) -> Result<Self, ConfigError> {
        // Database configuration
        let mut database = if std::env::var("DATABASE_URL").is_ok() {
            DatabaseConfig::from_env()?
        } else {
            DatabaseConfig::development()
        };
        if let Some(url) = database_url_override {
            database = database.with_url(url);
        }

        let seed_method = match std::env::var("DEFAULT_SEED_METHOD") {
            Ok(value) => value.parse().map_err(|reason| ConfigError::Invalid {
                var: "DEFAULT_SEED_METHOD".to_string(),
                reason,
            })?,
            Err(_) => SeedMethod::default(),
        };

        let rng_seed = match seed_override {
            Some(seed) => Some(seed),
            None => parse_env_opt("BRACKET_RNG_SEED")?,
        };

        Ok(AdminConfig {
            database,
            seed_method,
            team_size: parse_env_or("DEFAULT_TEAM_SIZE", DEFAULT_TEAM_SIZE),
            rng_seed,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.team_size == 0 {
            return Err(ConfigError::Invalid {
                var: "DEFAULT_TEAM_SIZE".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },

    #[error(transparent)]
    Database(#[from] DatabaseConfigError),
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Optional variable that must parse when present
fn parse_env_opt<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(v) => v.trim().parse().map(Some).map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Not a valid value: {v}"),
        }),
        Err(_) => Ok(None),
    }
}
