//! Query cache configuration.
//!
//! Values can be set via environment variables:
//! - `LOGCHEFQL_CACHE_CAPACITY`: maximum number of cached queries (default: 100)
//! - `LOGCHEFQL_CACHE_TTL_SECS`: sliding time-to-live in seconds (default: 300)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Environment variable holding the cache capacity.
pub const CAPACITY_ENV: &str = "LOGCHEFQL_CACHE_CAPACITY";

/// Environment variable holding the cache TTL in seconds.
pub const TTL_ENV: &str = "LOGCHEFQL_CACHE_TTL_SECS";

const DEFAULT_CAPACITY: usize = 100;
const DEFAULT_TTL_SECS: u64 = 300;

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is set but is not a valid number.
    #[error("Invalid value for {name}: '{value}'")]
    InvalidNumber {
        /// The variable name.
        name: &'static str,
        /// The raw value.
        value: String,
    },

    /// The configuration is out of range.
    #[error("Invalid cache configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Capacity and TTL of the query cache.
///
/// # Examples
///
/// ```
/// use logchefql::config::CacheConfig;
///
/// let config = CacheConfig::default();
/// assert_eq!(config.capacity, 100);
/// assert_eq!(config.ttl().as_secs(), 300);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CacheConfig {
    /// Maximum number of cached queries.
    #[validate(range(min = 1, max = 1_000_000, message = "Capacity must be between 1 and 1000000"))]
    pub capacity: usize,

    /// Sliding time-to-live in seconds.
    #[validate(range(min = 1, message = "TTL must be greater than zero"))]
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// Creates a new cache configuration.
    #[must_use]
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self { capacity, ttl_secs }
    }

    /// Loads the configuration from environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the resulting
    /// configuration is out of range.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration through `lookup`, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let capacity = parse_var(&lookup, CAPACITY_ENV)?.unwrap_or(DEFAULT_CAPACITY);
        let ttl_secs = parse_var(&lookup, TTL_ENV)?.unwrap_or(DEFAULT_TTL_SECS);

        let config = Self::new(capacity, ttl_secs);
        config.validate()?;
        Ok(config)
    }

    /// Returns the TTL as a `Duration`.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL_SECS)
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = CacheConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_values_from_lookup() {
        let config =
            CacheConfig::from_lookup(lookup(&[(CAPACITY_ENV, "250"), (TTL_ENV, " 60 ")])).unwrap();
        assert_eq!(config.capacity, 250);
        assert_eq!(config.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_invalid_number() {
        let result = CacheConfig::from_lookup(lookup(&[(CAPACITY_ENV, "lots")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidNumber { name: CAPACITY_ENV, .. })
        ));
    }

    #[test]
    fn test_zero_values_rejected() {
        let result = CacheConfig::from_lookup(lookup(&[(TTL_ENV, "0")]));
        assert!(matches!(result, Err(ConfigError::Validation(_))));

        assert!(CacheConfig::new(0, 10).validate().is_err());
        assert!(CacheConfig::new(10, 10).validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = CacheConfig::new(10, 30);
        let json = serde_json::to_string(&config).unwrap();
        let parsed: CacheConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
