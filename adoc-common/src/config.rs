//! Configuration loading and value resolution
//!
//! Values are resolved with a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing config file is never fatal: the tools warn and continue with
//! defaults. A config file named explicitly on the command line must exist.

use crate::{Error, Result};
use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Directory name used under the platform config directories
pub const CONFIG_DIR_NAME: &str = "adoc";

/// Default config file name
pub const CONFIG_FILE_NAME: &str = "adoc.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ADOC_CONFIG";

/// Prefix of the timestamped default output directory
pub const OUTPUT_ROOT_PREFIX: &str = "adoc-migration-toolkit";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where a config file path came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Named by the user (flag or env var) rather than found by search
    pub explicit: bool,
}

/// Locate the config file
///
/// **Priority:** CLI flag → `ADOC_CONFIG` → user config dir → `/etc/adoc`
///
/// Returns `None` when nothing was named and no default location exists.
pub fn locate_config_file(cli_arg: Option<&Path>) -> Option<ConfigSource> {
    if let Some(path) = cli_arg {
        return Some(ConfigSource {
            path: path.to_path_buf(),
            explicit: true,
        });
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(ConfigSource {
                path: PathBuf::from(path),
                explicit: true,
            });
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(ConfigSource {
                path,
                explicit: false,
            });
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc").join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(ConfigSource {
                path: system_config,
                explicit: false,
            });
        }
    }

    None
}

/// Load a TOML config, falling back to defaults when no file is available
///
/// An explicit source that does not exist is a configuration error; a parse
/// error is always an error.
pub fn load_toml_config<T>(source: Option<&ConfigSource>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(source) = source else {
        debug!("No config file found, using built-in defaults");
        return Ok(T::default());
    };

    if !source.path.exists() {
        if source.explicit {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                source.path.display()
            )));
        }
        warn!(
            "Config file {} disappeared, using built-in defaults",
            source.path.display()
        );
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(&source.path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", source.path.display(), e)))?;
    parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", source.path.display(), e)))
}

/// Parse TOML text into a config type
pub fn parse_toml_config<T: DeserializeOwned>(content: &str) -> std::result::Result<T, toml::de::Error> {
    toml::from_str(content)
}

/// Resolve a single value by priority: CLI → ENV → TOML → default
///
/// Environment values that fail to parse are ignored with a warning.
pub fn resolve_value<T>(
    cli_arg: Option<T>,
    env_var_name: &str,
    toml_value: Option<T>,
    default: impl FnOnce() -> T,
) -> T
where
    T: FromStr,
    T::Err: Display,
{
    if let Some(value) = cli_arg {
        return value;
    }

    if let Ok(raw) = std::env::var(env_var_name) {
        match raw.trim().parse::<T>() {
            Ok(value) => return value,
            Err(e) => warn!("Ignoring {}={:?}: {}", env_var_name, raw, e),
        }
    }

    if let Some(value) = toml_value {
        return value;
    }

    default()
}

/// Default output root: `<cwd>/adoc-migration-toolkit-YYYYMMDDHHMM`
pub fn default_output_root(now: DateTime<Local>) -> PathBuf {
    let base = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    base.join(format!("{}-{}", OUTPUT_ROOT_PREFIX, now.format("%Y%m%d%H%M")))
}
