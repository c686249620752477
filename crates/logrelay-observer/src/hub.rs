//! Connection table and broadcast groups for the monitor `WebSocket`.
//!
//! [`WsHub`] is the concrete [`PushTransport`]. Each connection owns a
//! bounded queue of encoded text frames; the socket task drains it.
//! Queuing never blocks, so the broadcast loop can call into the hub
//! synchronously. When a connection's queue is full the frame is
//! dropped for that connection only; other members still receive it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use logrelay_core::transport::{PushError, PushTransport};
use logrelay_types::{ConnectionId, MessageBlock, PushEvent, SimpleMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::frames::ServerFrame;

/// Frames a connection may have queued before new ones are dropped.
///
/// A client that falls this far behind misses frames until its socket
/// catches up; it can resynchronize with a `request_snapshot`.
pub const FRAME_QUEUE_CAPACITY: usize = 256;

/// Receiving half of a connection's outbound queue.
pub type FrameReceiver = mpsc::Receiver<String>;

#[derive(Debug, Default)]
struct HubInner {
    connections: BTreeMap<ConnectionId, mpsc::Sender<String>>,
    groups: BTreeMap<String, BTreeSet<ConnectionId>>,
}

/// Live `WebSocket` connections and their group memberships.
#[derive(Debug)]
pub struct WsHub {
    inner: RwLock<HubInner>,
    queue_capacity: usize,
}

impl Default for WsHub {
    fn default() -> Self {
        Self::new()
    }
}

impl WsHub {
    /// Create an empty hub with [`FRAME_QUEUE_CAPACITY`] frames per
    /// connection.
    pub fn new() -> Self {
        Self::with_queue_capacity(FRAME_QUEUE_CAPACITY)
    }

    /// Create an empty hub with a custom per-connection queue size
    /// (at least one frame).
    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(HubInner::default()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new connection and return its id and outbound queue.
    pub fn register(&self) -> (ConnectionId, FrameReceiver) {
        let id = ConnectionId::new();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.connections.insert(id, tx);
        debug!(connection = %id, connections = inner.connections.len(), "Connection registered");
        (id, rx)
    }

    /// Drop a connection and remove it from every group.
    pub fn unregister(&self, connection: ConnectionId) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.connections.remove(&connection);
        for members in inner.groups.values_mut() {
            members.remove(&connection);
        }
        inner.groups.retain(|_, members| !members.is_empty());
        debug!(%connection, connections = inner.connections.len(), "Connection unregistered");
    }

    /// Queue one frame for a single connection.
    ///
    /// # Errors
    ///
    /// [`PushError::UnknownConnection`] if the connection is not
    /// registered or its socket task has gone, [`PushError::QueueFull`]
    /// if the connection is too far behind, [`PushError::Encode`] if the
    /// frame cannot be serialized.
    pub fn send_to(&self, connection: ConnectionId, frame: &ServerFrame<'_>) -> Result<(), PushError> {
        let text = frame.encode().map_err(|e| PushError::Encode(e.to_string()))?;
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let tx = inner
            .connections
            .get(&connection)
            .ok_or(PushError::UnknownConnection(connection))?;
        match tx.try_send(text) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PushError::QueueFull(connection)),
            Err(TrySendError::Closed(_)) => Err(PushError::UnknownConnection(connection)),
        }
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .connections
            .len()
    }

    /// Number of connections in a group.
    pub fn group_size(&self, group: &str) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .groups
            .get(group)
            .map_or(0, BTreeSet::len)
    }
}

impl PushTransport for WsHub {
    fn broadcast(
        &self,
        group: &str,
        event: PushEvent,
        block: &MessageBlock<SimpleMessage>,
    ) -> Result<usize, PushError> {
        let text = ServerFrame::increment(event, &block.messages)
            .encode()
            .map_err(|e| PushError::Encode(e.to_string()))?;

        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let Some(members) = inner.groups.get(group) else {
            return Ok(0);
        };

        let mut delivered: usize = 0;
        for connection in members {
            let Some(tx) = inner.connections.get(connection) else {
                continue;
            };
            match tx.try_send(text.clone()) {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    warn!(%connection, %event, "Connection lagging, dropping increment");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(%connection, %event, "Skipping closed connection");
                }
            }
        }
        Ok(delivered)
    }

    fn join_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.connections.contains_key(&connection) {
            return Err(PushError::UnknownConnection(connection));
        }
        inner
            .groups
            .entry(group.to_owned())
            .or_default()
            .insert(connection);
        Ok(())
    }

    fn leave_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.connections.contains_key(&connection) {
            return Err(PushError::UnknownConnection(connection));
        }
        if let Some(members) = inner.groups.get_mut(group) {
            members.remove(&connection);
            if members.is_empty() {
                inner.groups.remove(group);
            }
        }
        Ok(())
    }
}
