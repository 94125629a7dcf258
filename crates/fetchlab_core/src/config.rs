//! Runtime configuration for the lab harness.
//!
//! # Responsibility
//! - Describe where the store lives, how logging starts and which cache
//!   regions are active.
//! - Load overrides from `FETCHLAB_*` environment variables.
//!
//! # Invariants
//! - Every field has a usable default; an empty environment yields
//!   `LabConfig::default()`.
//! - Unparsable values are rejected, never silently ignored.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_LOG_LEVEL: &str = "FETCHLAB_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "FETCHLAB_LOG_DIR";
pub const ENV_DB_PATH: &str = "FETCHLAB_DB_PATH";
pub const ENV_ENTITY_CACHE: &str = "FETCHLAB_ENTITY_CACHE";
pub const ENV_QUERY_CACHE: &str = "FETCHLAB_QUERY_CACHE";
pub const ENV_ITERATIONS: &str = "FETCHLAB_ITERATIONS";

/// Lookup count used by the with/without cache comparison.
pub const DEFAULT_COMPARISON_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {key}; expected {expected}"),
        }
    }
}

impl Error for ConfigError {}

/// Where the relational store keeps its data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Private in-memory database, gone when the store is dropped.
    #[default]
    Memory,
    File(PathBuf),
}

/// Which second-level cache regions are active.
///
/// A disabled region is bypassed entirely: no hit/miss is recorded and every
/// lookup reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub entity_cache: bool,
    pub query_cache: bool,
}

impl CacheConfig {
    pub fn enabled() -> Self {
        Self {
            entity_cache: true,
            query_cache: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            entity_cache: false,
            query_cache: false,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::enabled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabConfig {
    pub log_level: String,
    /// `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    pub database: DatabaseLocation,
    pub cache: CacheConfig,
    pub comparison_iterations: u32,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            database: DatabaseLocation::Memory,
            cache: CacheConfig::default(),
            comparison_iterations: DEFAULT_COMPARISON_ITERATIONS,
        }
    }
}

impl LabConfig {
    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            config.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = read(ENV_DB_PATH) {
            config.database = if path == ":memory:" {
                DatabaseLocation::Memory
            } else {
                DatabaseLocation::File(PathBuf::from(path))
            };
        }
        if let Some(value) = read(ENV_ENTITY_CACHE) {
            config.cache.entity_cache = parse_flag(ENV_ENTITY_CACHE, &value)?;
        }
        if let Some(value) = read(ENV_QUERY_CACHE) {
            config.cache.query_cache = parse_flag(ENV_QUERY_CACHE, &value)?;
        }
        if let Some(value) = read(ENV_ITERATIONS) {
            config.comparison_iterations =
                value
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: ENV_ITERATIONS,
                        value: value.clone(),
                        expected: "a non-negative integer",
                    })?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "on|off",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DatabaseLocation, LabConfig, ENV_ITERATIONS};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config_from(pairs: &[(&str, &str)]) -> Result<LabConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        LabConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(config_from(&[]).unwrap(), LabConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("FETCHLAB_DB_PATH", "/tmp/lab.sqlite3"),
            ("FETCHLAB_QUERY_CACHE", "off"),
            ("FETCHLAB_ITERATIONS", " 12 "),
        ])
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/tmp/lab.sqlite3"))
        );
        assert!(config.cache.entity_cache);
        assert!(!config.cache.query_cache);
        assert_eq!(config.comparison_iterations, 12);
    }

    #[test]
    fn invalid_iterations_are_rejected() {
        let err = config_from(&[("FETCHLAB_ITERATIONS", "many")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: ENV_ITERATIONS,
                ..
            }
        ));
    }
}
