//! Configuration loading and typed config structures for logrelay.
//!
//! The configuration lives in `logrelay-config.yaml` next to the binary.
//! Every section and field has a default, so an absent file or a
//! partial one is always valid.
//!
//! ```yaml
//! buffers:
//!   event_capacity: 1000
//!   debug_capacity: 1000
//! broadcast:
//!   interval_ms: 1000
//! observer:
//!   host: "0.0.0.0"
//!   port: 8080
//!   admin_token: "change-me"
//! logging:
//!   level: "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Environment variable overriding `observer.port`.
pub const ENV_OBSERVER_PORT: &str = "LOGRELAY_OBSERVER_PORT";

/// Environment variable overriding `observer.admin_token`.
pub const ENV_ADMIN_TOKEN: &str = "LOGRELAY_ADMIN_TOKEN";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held a value of the wrong type.
    #[error("invalid value {value:?} for {variable}")]
    InvalidOverride {
        /// The environment variable name.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    /// Ring buffer capacities.
    #[serde(default)]
    pub buffers: BufferConfig,

    /// Broadcast loop timing.
    #[serde(default)]
    pub broadcast: BroadcastConfig,

    /// Observer server settings.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for a malformed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to an empty map.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a variable is set to a
    /// value of the wrong type.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a variable is set to a
    /// value of the wrong type.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_OBSERVER_PORT) {
            match value.parse() {
                Ok(port) => self.observer.port = port,
                Err(_) => {
                    return Err(ConfigError::InvalidOverride {
                        variable: ENV_OBSERVER_PORT,
                        value,
                    });
                }
            }
        }
        if let Some(value) = lookup(ENV_ADMIN_TOKEN) {
            self.observer.admin_token = value;
        }
        Ok(())
    }
}

/// Ring buffer capacities.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BufferConfig {
    /// Maximum entries retained in the event buffer.
    #[serde(default = "default_capacity")]
    pub event_capacity: usize,

    /// Maximum entries retained in the debug buffer.
    #[serde(default = "default_capacity")]
    pub debug_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_capacity(),
            debug_capacity: default_capacity(),
        }
    }
}

/// Broadcast loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BroadcastConfig {
    /// Milliseconds to sleep between flush passes.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl BroadcastConfig {
    /// Interval as a [`Duration`].
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Observer server settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_observer_port")]
    pub port: u16,

    /// Shared secret observers present to authenticate.
    ///
    /// Empty means every connection may authenticate without a token.
    #[serde(default)]
    pub admin_token: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_observer_port(),
            admin_token: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_capacity() -> usize {
    1000
}

const fn default_interval_ms() -> u64 {
    1000
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_owned()
}
