//! logrelay binary.
//!
//! Wires the communication hub, the message accumulator, and the
//! observer server together, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `logrelay-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the communication hub, the `WebSocket` hub, and the
//!    accumulator; register the console sink
//! 4. Start the broadcast loop
//! 5. Spawn the observer server
//! 6. Wait for `Ctrl-C`, then stop the loop and the server

mod error;

use std::path::Path;
use std::sync::Arc;

use logrelay_core::config::LoggingConfig;
use logrelay_core::{Communication, MessageAccumulator, PushTransport, RelayConfig, TracingSink};
use logrelay_observer::{AppState, ServerConfig, WsHub};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::RelayError;

/// Configuration file read from the working directory.
const CONFIG_PATH: &str = "logrelay-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the broadcast loop, or the
/// observer server fails to start.
#[tokio::main]
async fn main() -> Result<(), RelayError> {
    // 1. Load configuration.
    let config_path = Path::new(CONFIG_PATH);
    let config = load_config(config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        path = CONFIG_PATH,
        found = config_path.exists(),
        event_capacity = config.buffers.event_capacity,
        debug_capacity = config.buffers.debug_capacity,
        interval_ms = config.broadcast.interval_ms,
        "Configuration loaded"
    );

    // 3. Build the relay.
    let communication = Arc::new(Communication::new());
    let hub = Arc::new(WsHub::new());
    let accumulator = Arc::new(MessageAccumulator::new(
        &config.buffers,
        &config.broadcast,
        &communication,
        Arc::clone(&hub) as Arc<dyn PushTransport>,
    ));
    communication.subscribe(Arc::new(TracingSink));

    communication.send_debug_message("*** Starting Up ***");

    // 4. Start the broadcast loop.
    accumulator.start()?;

    // 5. Spawn the observer server.
    if config.observer.admin_token.is_empty() {
        tracing::warn!("observer.admin_token is empty; every connection may authenticate");
    }
    let state = Arc::new(AppState::new(
        Arc::clone(&accumulator),
        hub,
        Arc::clone(&communication),
        config.observer.admin_token.clone(),
    ));
    let observer = logrelay_observer::spawn_observer(&ServerConfig::from(&config.observer), state).await?;

    // 6. Run until interrupted.
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    communication.send_debug_message("*** Shutting Down ***");

    accumulator.stop().await;
    observer.abort();

    info!("logrelay stopped");
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level)),
        )
        .with_target(true)
        .init();
}

/// Load configuration from `path`, falling back to defaults (plus
/// environment overrides) when the file does not exist.
fn load_config(path: &Path) -> Result<RelayConfig, RelayError> {
    if path.exists() {
        Ok(RelayConfig::from_file(path)?)
    } else {
        let mut config = RelayConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
