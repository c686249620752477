//! Background startup of the observer server.
//!
//! [`spawn_observer`] binds eagerly, so a taken port is reported to the
//! caller before anything runs in the background, then serves on a
//! spawned Tokio task. The binary aborts the returned handle on
//! shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// Bind the observer and serve it on a background task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the listener cannot bind.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<JoinHandle<()>, StartupError> {
    let listener = server::bind(config).await?;

    let handle = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(host = %config.host, port = config.port, "Observer server spawned on background task");

    Ok(handle)
}
