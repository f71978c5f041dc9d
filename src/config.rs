//! Application configuration loaded from environment variables.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Postgres connection string; absent runs the in-memory store
    pub database_url: Option<String>,
    /// Fraction of total capacity at or below which an occurrence reads
    /// `low` (0.0..=1.0)
    pub low_water_fraction: f64,
    /// How long a reservation waits on a contended occurrence before
    /// failing retryably, in milliseconds
    pub lock_timeout_ms: u64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            low_water_fraction: 0.2,
            lock_timeout_ms: 2_000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let low_water_fraction = match env::var("LOW_WATER_FRACTION") {
            Ok(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|f| (0.0..=1.0).contains(f))
                .ok_or(ConfigError::Invalid("LOW_WATER_FRACTION"))?,
            Err(_) => 0.2,
        };

        Ok(Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_url: env::var("DATABASE_URL").ok(),
            low_water_fraction,
            lock_timeout_ms: env::var("LOCK_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .map_err(|_| ConfigError::Invalid("LOCK_TIMEOUT_MS"))?,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
