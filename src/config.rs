use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::event::Level;
use crate::router::DEFAULT_MAX_MESSAGE_BYTES;

/// Default per-file roll threshold (about 10 MB). Tracked, never enforced.
pub const DEFAULT_ROLL_SIZE: u64 = 0xA0_0000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the domain log router.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory that receives `domain_<domain>.log` files.
    pub log_dir: PathBuf,
    /// Maximum number of domains with an open file at once.
    pub cache_capacity: usize,
    /// Per-file roll threshold in bytes.
    pub roll_size: u64,
    /// Cap on a rendered message, in bytes.
    pub max_message_bytes: usize,
    /// Least severe level the router subscribes to.
    pub min_level: Level,
    /// Whether to drop a marker file in the log directory at load.
    pub write_marker: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            roll_size: DEFAULT_ROLL_SIZE,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            min_level: Level::Debug,
            write_marker: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cache_capacity = parse_optional("DOMAINLOG_CACHE_CAPACITY")?
            .unwrap_or(defaults.cache_capacity);
        if cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "DOMAINLOG_CACHE_CAPACITY".to_string(),
            ));
        }

        Ok(Self {
            log_dir: load_env_optional("DOMAINLOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            cache_capacity,
            roll_size: parse_optional("DOMAINLOG_ROLL_SIZE")?.unwrap_or(defaults.roll_size),
            max_message_bytes: parse_optional("DOMAINLOG_MAX_MESSAGE_BYTES")?
                .unwrap_or(defaults.max_message_bytes),
            min_level: load_env_optional("DOMAINLOG_MIN_LEVEL")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("DOMAINLOG_MIN_LEVEL".into()))
                })
                .transpose()?
                .unwrap_or(defaults.min_level),
            write_marker: load_env_optional("DOMAINLOG_WRITE_MARKER")
                .map(|value| {
                    parse_bool(&value)
                        .ok_or_else(|| ConfigError::InvalidValue("DOMAINLOG_WRITE_MARKER".into()))
                })
                .transpose()?
                .unwrap_or(defaults.write_marker),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load configuration, honouring a `.env` file when present.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        log_dir = %config.log_dir.display(),
        cache_capacity = config.cache_capacity,
        roll_size = config.roll_size,
        min_level = %config.min_level,
        "Loaded configuration"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 6] = [
        "DOMAINLOG_DIR",
        "DOMAINLOG_CACHE_CAPACITY",
        "DOMAINLOG_ROLL_SIZE",
        "DOMAINLOG_MAX_MESSAGE_BYTES",
        "DOMAINLOG_MIN_LEVEL",
        "DOMAINLOG_WRITE_MARKER",
    ];

    fn set_env(key: &str, value: &str) {
        // SAFETY: Only the single test below touches these variables.
        unsafe { env::set_var(key, value) }
    }

    fn clear_env() {
        for key in KEYS {
            // SAFETY: Only the single test below touches these variables.
            unsafe { env::remove_var(key) }
        }
    }

    // One test owns the DOMAINLOG_* variables so parallel tests never race on them.
    #[test]
    fn reads_environment_with_defaults_and_validation() {
        clear_env();
        let config = Config::from_env().unwrap();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.cache_capacity, 256);
        assert_eq!(config.roll_size, 0xA0_0000);
        assert_eq!(config.max_message_bytes, 1023);
        assert_eq!(config.min_level, Level::Debug);
        assert!(config.write_marker);

        set_env("DOMAINLOG_DIR", "/var/log/tenants");
        set_env("DOMAINLOG_CACHE_CAPACITY", "8");
        set_env("DOMAINLOG_ROLL_SIZE", "   ");
        set_env("DOMAINLOG_MIN_LEVEL", "warn");
        set_env("DOMAINLOG_WRITE_MARKER", "off");
        let config = Config::from_env().unwrap();
        assert_eq!(config.log_dir, PathBuf::from("/var/log/tenants"));
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.roll_size, DEFAULT_ROLL_SIZE);
        assert_eq!(config.min_level, Level::Warning);
        assert!(!config.write_marker);

        set_env("DOMAINLOG_CACHE_CAPACITY", "0");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "DOMAINLOG_CACHE_CAPACITY"
        ));

        set_env("DOMAINLOG_CACHE_CAPACITY", "4");
        set_env("DOMAINLOG_MIN_LEVEL", "loud");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "DOMAINLOG_MIN_LEVEL"
        ));

        clear_env();
    }

    #[test]
    fn parses_boolean_flags() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" 0 "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
