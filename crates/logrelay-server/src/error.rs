//! Error types for the logrelay binary.

/// Top-level error for the binary.
///
/// Each variant wraps a specific subsystem error so `main` can
/// propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: logrelay_core::ConfigError,
    },

    /// The broadcast loop could not be started.
    #[error("broadcast error: {source}")]
    Broadcast {
        /// The underlying broadcast error.
        #[from]
        source: logrelay_core::BroadcastError,
    },

    /// The observer server failed to start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: logrelay_observer::StartupError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
