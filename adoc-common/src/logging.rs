//! Tracing subscriber bootstrap
//!
//! `RUST_LOG` always wins. Otherwise the filter comes from the verbosity
//! flags, then from the configured level.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Console verbosity requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Warnings and errors only
    Quiet,
    #[default]
    Normal,
    /// Debug output
    Verbose,
}

/// Filter directive used when `RUST_LOG` is not set
pub fn filter_directive(config: &LoggingConfig, verbosity: Verbosity) -> String {
    match verbosity {
        Verbosity::Quiet => "warn".to_string(),
        Verbosity::Verbose => "debug".to_string(),
        Verbosity::Normal => {
            let level = config.level.trim().to_lowercase();
            match level.as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => level,
                // Accept the python-style WARNING spelling used by older configs
                "warning" => "warn".to_string(),
                _ => "info".to_string(),
            }
        }
    }
}

/// Install the global tracing subscriber
///
/// Logs go to stderr; when `config.file` is set a second, non-ANSI layer
/// appends to that file.
pub fn init_logging(config: &LoggingConfig, verbosity: Verbosity) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config, verbosity)));

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {}", e)))
}
