//! Outbound push transport boundary.
//!
//! The core never owns sockets. It talks to whatever delivers frames to
//! observers through [`PushTransport`]: named broadcast groups that
//! connections join and leave, and a broadcast primitive that sends one
//! event to every member of a group. Delivery is best-effort.

use logrelay_types::{ConnectionId, MessageBlock, PushEvent, SimpleMessage};

/// Group that authenticated observers belong to.
pub const AUTHENTICATED_GROUP: &str = "authenticated";

/// Errors reported by a push transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The transport has no connection with this identifier.
    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// The payload could not be encoded for the wire.
    #[error("failed to encode push payload: {0}")]
    Encode(String),

    /// The connection's outbound queue is full; the frame was dropped.
    #[error("outbound queue full for connection {0}")]
    QueueFull(ConnectionId),

    /// The transport is shut down and accepts no more frames.
    #[error("transport closed")]
    Closed,
}

/// Delivery channel from the core to observer connections.
///
/// Implementations must not block for long; the broadcast loop calls
/// [`broadcast`](Self::broadcast) inline and a slow transport delays
/// the next increment.
pub trait PushTransport: Send + Sync {
    /// Send `block` under `event` to every member of `group`.
    ///
    /// Returns the number of connections the frame was handed to.
    fn broadcast(
        &self,
        group: &str,
        event: PushEvent,
        block: &MessageBlock<SimpleMessage>,
    ) -> Result<usize, PushError>;

    /// Add a connection to a group.
    fn join_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError>;

    /// Remove a connection from a group.
    fn leave_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! In-memory transport that records every delivery.

    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;

    use super::*;

    /// One frame handed to one connection.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Delivery {
        pub connection: ConnectionId,
        pub event: PushEvent,
        pub messages: Vec<String>,
    }

    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        groups: Mutex<BTreeMap<String, BTreeSet<ConnectionId>>>,
        deliveries: Mutex<Vec<Delivery>>,
        broadcasts: Mutex<usize>,
        fail_broadcast: Mutex<bool>,
        gone: Mutex<BTreeSet<ConnectionId>>,
    }

    impl RecordingTransport {
        pub fn deliveries(&self) -> Vec<Delivery> {
            self.deliveries.lock().unwrap().clone()
        }

        pub fn broadcast_calls(&self) -> usize {
            *self.broadcasts.lock().unwrap()
        }

        pub fn members(&self, group: &str) -> BTreeSet<ConnectionId> {
            self.groups
                .lock()
                .unwrap()
                .get(group)
                .cloned()
                .unwrap_or_default()
        }

        pub fn set_fail_broadcast(&self, fail: bool) {
            *self.fail_broadcast.lock().unwrap() = fail;
        }

        /// Drop a connection from every group as if its socket closed.
        pub fn disconnect(&self, connection: ConnectionId) {
            for members in self.groups.lock().unwrap().values_mut() {
                members.remove(&connection);
            }
            self.gone.lock().unwrap().insert(connection);
        }
    }

    impl PushTransport for RecordingTransport {
        fn broadcast(
            &self,
            group: &str,
            event: PushEvent,
            block: &MessageBlock<SimpleMessage>,
        ) -> Result<usize, PushError> {
            *self.broadcasts.lock().unwrap() += 1;
            if *self.fail_broadcast.lock().unwrap() {
                return Err(PushError::Closed);
            }
            let members = self.members(group);
            let messages: Vec<String> = block.messages.iter().map(|m| m.message.clone()).collect();
            let mut deliveries = self.deliveries.lock().unwrap();
            for connection in &members {
                deliveries.push(Delivery {
                    connection: *connection,
                    event,
                    messages: messages.clone(),
                });
            }
            Ok(members.len())
        }

        fn join_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError> {
            self.groups
                .lock()
                .unwrap()
                .entry(group.to_owned())
                .or_default()
                .insert(connection);
            Ok(())
        }

        fn leave_group(&self, connection: ConnectionId, group: &str) -> Result<(), PushError> {
            if self.gone.lock().unwrap().contains(&connection) {
                return Err(PushError::UnknownConnection(connection));
            }
            if let Some(members) = self.groups.lock().unwrap().get_mut(group) {
                members.remove(&connection);
            }
            Ok(())
        }
    }
}
