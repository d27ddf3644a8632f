//! Configuration Module
//!
//! Handles loading cache configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{ConfigError, Result};

/// Default capacity when none (or zero) is configured.
pub const DEFAULT_MAX_SIZE: usize = 500;

/// Environment variable holding the maximum number of entries.
pub const MAX_SIZE_VAR: &str = "CACHE_MAX_SIZE";

/// Environment variable holding the TTL in milliseconds.
pub const EXPIRES_AFTER_MS_VAR: &str = "CACHE_EXPIRES_AFTER_MS";

/// Cache configuration parameters.
///
/// Values are taken as given; zero values are clamped when the cache is
/// built, see [`Cache::from_config`](crate::cache::Cache::from_config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_size: Option<usize>,
    /// Lifetime of an entry after its latest put, None = never expires
    pub expires_after: Option<Duration>,
}

impl Config {
    /// Loads configuration from environment variables, failing on the first
    /// variable that is set but malformed.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 500)
    /// - `CACHE_EXPIRES_AFTER_MS` - Entry TTL in milliseconds (default: none)
    pub fn try_from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            max_size: parse_var::<usize>(MAX_SIZE_VAR)?.or(defaults.max_size),
            expires_after: parse_var::<u64>(EXPIRES_AFTER_MS_VAR)?
                .map(Duration::from_millis)
                .or(defaults.expires_after),
        })
    }

    /// Loads configuration from environment variables.
    ///
    /// Malformed values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_size = match parse_var::<usize>(MAX_SIZE_VAR) {
            Ok(value) => value.or(defaults.max_size),
            Err(err) => {
                warn!("{}, using default {}", err, DEFAULT_MAX_SIZE);
                defaults.max_size
            }
        };

        let expires_after = match parse_var::<u64>(EXPIRES_AFTER_MS_VAR) {
            Ok(value) => value.map(Duration::from_millis).or(defaults.expires_after),
            Err(err) => {
                warn!("{}, entries will not expire", err);
                defaults.expires_after
            }
        };

        Self {
            max_size,
            expires_after,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: Some(DEFAULT_MAX_SIZE),
            expires_after: None,
        }
    }
}

/// Reads and parses a variable. Unset yields `Ok(None)`.
fn parse_var<T: FromStr>(var: &'static str) -> Result<Option<T>> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(None),
    }
}
