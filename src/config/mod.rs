//! Application configuration loading, validation, and management.
//!
//! This module provides the top-level `Config` structure that aggregates
//! logging, agent, and plugin configurations. It handles locating the TOML
//! file, parsing, and validation. The configuration is loaded early in the
//! application lifecycle and is intended to remain immutable thereafter.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::{agent::AgentConfig, logger::LoggerConfig, plugins::PluginsConfig};

pub mod agent;
pub mod logger;
pub mod plugins;

/// Environment variable that points at the configuration file.
pub const CONFIG_ENV: &str = "HIVEMON_CONFIG";

/// Location used when neither the CLI nor the environment names a file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hivemon/config.toml";

/// Simple macros for printing timestamped messages before the tracing subscriber
/// is initialized. These are used during early configuration loading.
#[macro_export]
macro_rules! print_info {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("INFO").green(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_warn {
    ($($arg:tt)*) => {
        println!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("WARN").yellow(),
            format_args!($($arg)*)
        );
    };
}

#[macro_export]
macro_rules! print_error {
    ($($arg:tt)*) => {
        eprintln!("{}  {} {}",
            console::style(
                time::OffsetDateTime::now_utc()
                    .format(&time::format_description::parse(
                        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
                    ).unwrap())
                    .unwrap()
            ).dim(),
            console::style("ERROR").red(),
            format_args!($($arg)*)
        );
    };
}

/// Errors that can occur during configuration loading, parsing, or validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The named configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// IO error while accessing configuration files.
    #[error("IO error while reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// Failure to parse the TOML configuration file.
    #[error("Parse error while reading configuration: {0}")]
    ParseError(String),

    /// Validation failure after successful parsing.
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Top-level application configuration.
#[derive(Serialize, Deserialize, Debug, Validate, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Logging subsystem configuration.
    #[validate(nested)]
    pub logger: LoggerConfig,

    /// Collection cadence and probe locations.
    #[validate(nested)]
    pub agent: AgentConfig,

    /// Plugins executed every cycle.
    #[validate(nested)]
    pub plugins: PluginsConfig,
}

impl Config {
    /// Locates and loads the configuration.
    ///
    /// Priority:
    /// 1. `explicit` (the `--config` flag)
    /// 2. `HIVEMON_CONFIG` environment variable
    /// 3. `/etc/hivemon/config.toml`
    ///
    /// A file named by 1 or 2 must exist. When the default path is absent the
    /// built-in defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a named file is missing, unreadable,
    /// malformed, or fails validation.
    pub fn new(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match Self::get_config_path(explicit)? {
            Some(path) => Self::load(&path),
            None => {
                print_warn!(
                    "No configuration file found at {}, using defaults",
                    DEFAULT_CONFIG_PATH
                );
                Ok(Config::default())
            }
        }
    }

    fn get_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = explicit {
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(config_path);
            print_info!("Using config from {}: {}", CONFIG_ENV, path.display());
            return Ok(Some(path));
        }

        let fallback = Path::new(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            print_info!("Using default config path: {}", fallback.display());
            return Ok(Some(fallback.to_path_buf()));
        }

        Ok(None)
    }

    /// Loads and validates configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Propagates IO, parsing, and validation errors as `ConfigError`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        print_info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let config_str = fs::read_to_string(path)?;
        let config = Self::from_toml(&config_str)?;

        print_info!("Successfully loaded config from: {}", path.display());
        Ok(config)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(raw: &str) -> Result<Config, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE: &str = r#"
        [logger]
        level = "debug"

        [agent]
        collection_interval = 30
        plugin_timeout = 10
        server_key = "abc123"

        [[plugins.enabled]]
        name = "telegraf"
        [plugins.enabled.config]
        config = "/etc/telegraf/telegraf.conf"

        [[plugins.enabled]]
        name = "checks"
        [plugins.enabled.config]
        commands = ["true"]
    "#;

    #[test]
    fn parses_full_document() {
        let cfg = Config::from_toml(SAMPLE).unwrap();

        assert_eq!(cfg.logger.level, "debug");
        assert_eq!(cfg.agent.collection_interval, 30);
        assert_eq!(cfg.agent.plugin_timeout, Some(10));
        assert_eq!(cfg.agent.server_key, "abc123");
        assert_eq!(cfg.plugins.enabled_names(), vec!["telegraf", "checks"]);
    }

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = Config::from_toml("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let err = Config::from_toml("[agent\ncollection_interval = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = Config::from_toml("[agent]\ncollection_interval = 0").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));

        let err = Config::from_toml("[logger]\nlevel = \"loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.agent.collection_interval, 30);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = Config::new(Some(&missing)).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(p) if p == missing));
    }
}
