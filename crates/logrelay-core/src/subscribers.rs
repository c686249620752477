//! Registry of authenticated observer connections.
//!
//! Membership here is what entitles a connection to broadcast
//! increments. The registry keeps the transport's
//! [`AUTHENTICATED_GROUP`] in step with its own set: joining on first
//! add, leaving on bulk clear. It never owns the connections themselves.

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use logrelay_types::ConnectionId;
use tracing::{debug, info, warn};

use crate::transport::{PushError, PushTransport, AUTHENTICATED_GROUP};

/// Set of connections currently entitled to receive increments.
pub struct SubscriberRegistry {
    members: RwLock<BTreeSet<ConnectionId>>,
    transport: Arc<dyn PushTransport>,
}

impl SubscriberRegistry {
    /// Create an empty registry bound to a transport.
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            members: RwLock::new(BTreeSet::new()),
            transport,
        }
    }

    /// Add a connection. Adding an existing member is a no-op.
    ///
    /// Returns `Ok(true)` if the connection was newly added.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if it refuses the group join; the
    /// connection is not added in that case.
    pub fn add(&self, connection: ConnectionId) -> Result<bool, PushError> {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        if members.contains(&connection) {
            return Ok(false);
        }

        self.transport.join_group(connection, AUTHENTICATED_GROUP)?;
        members.insert(connection);
        debug!(%connection, subscribers = members.len(), "Subscriber added");
        Ok(true)
    }

    /// Whether the connection is a member.
    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&connection)
    }

    /// Remove one connection, detaching it from the broadcast group.
    ///
    /// Called when a connection closes. Returns `true` if it was a
    /// member. A transport that already forgot the connection is not an
    /// error here.
    pub fn remove(&self, connection: ConnectionId) -> bool {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        if !members.remove(&connection) {
            return false;
        }

        if let Err(e) = self.transport.leave_group(connection, AUTHENTICATED_GROUP) {
            debug!(%connection, error = %e, "Subscriber already detached from broadcast group");
        }
        debug!(%connection, subscribers = members.len(), "Subscriber removed");
        true
    }

    /// Remove every member, detaching each from the broadcast group.
    ///
    /// A connection the transport fails to detach is logged and the
    /// clear carries on with the rest. Returns the number of members
    /// that were removed.
    pub fn clear_all(&self) -> usize {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        let removed = members.len();

        for connection in members.iter() {
            if let Err(e) = self.transport.leave_group(*connection, AUTHENTICATED_GROUP) {
                warn!(%connection, error = %e, "Failed to detach subscriber from broadcast group");
            }
        }
        members.clear();

        info!(removed, "Authenticated subscribers cleared");
        removed
    }

    /// Current members in identifier order.
    pub fn members(&self) -> Vec<ConnectionId> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the registry has no members.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("members", &self.len())
            .finish_non_exhaustive()
    }
}
