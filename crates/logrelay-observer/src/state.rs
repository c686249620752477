//! Shared application state for the observer server.
//!
//! [`AppState`] bundles the accumulator (snapshots and session
//! lifecycle), the hub (live connections), and the communication hub
//! (message injection). It is wrapped in [`Arc`] and injected through
//! Axum's `State` extractor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use logrelay_core::{Communication, MessageAccumulator};
use subtle::ConstantTimeEq;

use crate::hub::WsHub;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Buffers, subscribers, and the broadcast loop.
    pub accumulator: Arc<MessageAccumulator>,
    /// Live `WebSocket` connections.
    pub hub: Arc<WsHub>,
    /// Producer-facing notification hub.
    pub communication: Arc<Communication>,
    /// Shared secret for observers and the admin API. Empty disables
    /// the check.
    admin_token: String,
    /// When the server state was created.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Bundle the relay components for the server.
    pub fn new(
        accumulator: Arc<MessageAccumulator>,
        hub: Arc<WsHub>,
        communication: Arc<Communication>,
        admin_token: impl Into<String>,
    ) -> Self {
        Self {
            accumulator,
            hub,
            communication,
            admin_token: admin_token.into(),
            started_at: Utc::now(),
        }
    }

    /// Whether `token` grants access.
    ///
    /// The comparison takes the same time wherever the first differing
    /// byte is.
    pub fn authorizes(&self, token: &str) -> bool {
        self.admin_token.is_empty()
            || bool::from(self.admin_token.as_bytes().ct_eq(token.as_bytes()))
    }

    /// Seconds since the state was created.
    pub fn uptime_seconds(&self) -> u64 {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        u64::try_from(elapsed.num_seconds()).unwrap_or(0)
    }
}
