use crate::core::db::connection::Credentials;
use crate::core::{Result, SqlgateError};
use crate::retry::RetryPolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: Credentials,
    pub retry: Option<RetryConfig>,
}

/// Retry tuning; missing fields fall back to the session defaults.
#[derive(Debug, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_delay_secs: Option<u64>,
    pub backoff_multiplier: Option<u32>,
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
            initial_delay: self
                .initial_delay_secs
                .map_or(defaults.initial_delay, Duration::from_secs),
            backoff_multiplier: self
                .backoff_multiplier
                .unwrap_or(defaults.backoff_multiplier),
        }
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path).map_err(|e| SqlgateError::Config(e.to_string()))?;
    toml::from_str(&content).map_err(|e| SqlgateError::Config(e.to_string()))
}
