//! Subscriber setup for applications embedding paraselect
//!
//! The library only emits `tracing` events: `debug!` per partition and per
//! dispatch, a `fit_partition` span on each worker thread, and one `info!`
//! when a coordinated fit completes. Nothing is printed until the
//! application installs a subscriber, either its own or the one built by
//! [`init_logging`].
//!
//! Worker threads are named `paraselect-worker-{i}`, so the default
//! configuration prints thread names to tell partition fits apart.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::Error;

/// `EnvFilter` directives, e.g. `paraselect=debug`
pub const LOG_ENV: &str = "PARASELECT_LOG";
/// Output format, one of `pretty`, `compact`, `json`
pub const LOG_FORMAT_ENV: &str = "PARASELECT_LOG_FORMAT";

/// Output format of the fmt subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human-readable
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidInput(format!(
                "unknown log format `{other}` (expected pretty, compact or json)"
            ))),
        }
    }
}

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives
    pub filter: String,
    /// Output format
    pub format: LogFormat,
    /// Print the emitting thread's name (`paraselect-worker-{i}` inside the pool)
    pub thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "paraselect=info".to_string(),
            format: LogFormat::default(),
            thread_names: true,
        }
    }
}

impl LoggingConfig {
    /// Defaults overridden by `PARASELECT_LOG` and `PARASELECT_LOG_FORMAT`
    ///
    /// Blank filters and unknown formats keep the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(filter) = lookup(LOG_ENV) {
            let filter = filter.trim();
            if !filter.is_empty() {
                config.filter = filter.to_string();
            }
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV).and_then(|raw| raw.parse().ok()) {
            config.format = format;
        }

        config
    }
}

/// Logging initialization error
#[derive(Debug, Error)]
pub enum LoggingInitError {
    /// The filter directives do not parse
    #[error("invalid log filter `{filter}`: {source}")]
    InvalidFilter {
        /// Offending directives
        filter: String,
        /// Parser error
        source: tracing_subscriber::filter::ParseError,
    },

    /// A global subscriber is already installed
    #[error("logging already initialized: {0}")]
    AlreadyInitialized(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global fmt subscriber built from `config`
///
/// # Errors
///
/// Returns error if the filter does not parse or a global subscriber is
/// already installed
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingInitError> {
    let filter =
        EnvFilter::try_new(&config.filter).map_err(|source| LoggingInitError::InvalidFilter {
            filter: config.filter.clone(),
            source,
        })?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(config.thread_names)
        .with_ansi(config.format != LogFormat::Json);

    match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish())?,
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }

    Ok(())
}
