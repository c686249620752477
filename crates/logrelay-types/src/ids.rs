//! Type-safe identifier wrapper around [`Uuid`].
//!
//! Observer connections are addressed by an opaque [`ConnectionId`]. The
//! transport assigns one per `WebSocket` upgrade; the subscriber registry
//! and the broadcast groups only ever see this wrapper, never the socket.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an observer connection.
///
/// Uses UUID v7 so identifiers sort by connection time, which keeps
/// registry dumps and logs in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<ConnectionId> for Uuid {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = ConnectionId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{}\"", id.into_inner())));
    }

    #[test]
    fn id_display_matches_uuid() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }
}
