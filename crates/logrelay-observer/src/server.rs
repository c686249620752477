//! Observer HTTP server: bind and serve.

use std::net::SocketAddr;
use std::sync::Arc;

use logrelay_core::config::ObserverConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Address the observer listens on.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&ObserverConfig> for ServerConfig {
    fn from(config: &ObserverConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

impl ServerConfig {
    /// Parse `host:port` into a socket address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the pair is not a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))
    }
}

/// Bind the listener for `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or taken.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.socket_addr()?;
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve the observer router on an already bound listener until the
/// task is aborted or the listener fails.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Observer server listening");
    }

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Errors that can occur when starting or running the observer server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn observer_config_converts() {
        let config = ObserverConfig {
            host: "127.0.0.1".to_owned(),
            port: 9100,
            admin_token: String::new(),
        };
        let server = ServerConfig::from(&config);
        assert_eq!(server.socket_addr().unwrap().port(), 9100);
    }

    #[test]
    fn bad_host_is_a_bind_error() {
        let config = ServerConfig {
            host: "not an address".to_owned(),
            port: 80,
        };
        assert!(matches!(config.socket_addr(), Err(ServerError::Bind(_))));
    }
}
