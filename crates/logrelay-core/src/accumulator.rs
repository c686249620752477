//! The message accumulator: one object tying the relay together.
//!
//! [`MessageAccumulator`] owns the event and debug ring buffers, the
//! router that fills them, the subscriber registry, and the broadcast
//! loop that drains them. It is built once by the composition root and
//! shared as an `Arc` with the observer server; producers only ever see
//! the [`Communication`] hub it registered its router with.
//!
//! # Surfaces
//!
//! - **Snapshot**: [`all_events`](MessageAccumulator::all_events),
//!   [`all_debugs`](MessageAccumulator::all_debugs)
//! - **Session lifecycle**: [`mark_authenticated`](MessageAccumulator::mark_authenticated),
//!   [`is_authenticated`](MessageAccumulator::is_authenticated),
//!   [`forget_connection`](MessageAccumulator::forget_connection),
//!   [`clear_authenticated`](MessageAccumulator::clear_authenticated)
//! - **Lifecycle**: [`start`](MessageAccumulator::start),
//!   [`stop`](MessageAccumulator::stop)

use std::sync::Arc;
use std::time::Duration;

use logrelay_types::{ConnectionId, MessageBlock, PushEvent, SimpleMessage};
use serde::Serialize;

use crate::broadcast::{BroadcastChannel, BroadcastError, BroadcastLoop, LoopState};
use crate::buffer::SharedBuffer;
use crate::communication::{Communication, MessageSink};
use crate::config::{BroadcastConfig, BufferConfig};
use crate::router::MessageRouter;
use crate::subscribers::SubscriberRegistry;
use crate::transport::{PushError, PushTransport};

/// Point-in-time counters for the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccumulatorStats {
    /// Live entries in the event buffer.
    pub events: usize,
    /// Live entries in the debug buffer.
    pub debugs: usize,
    /// Event keys not yet drained.
    pub pending_events: u64,
    /// Debug keys not yet drained.
    pub pending_debugs: u64,
    /// Authenticated subscribers.
    pub subscribers: usize,
    /// Broadcast loop state.
    pub loop_state: LoopState,
}

/// Buffers, routing, subscribers, and the broadcast loop.
#[derive(Debug)]
pub struct MessageAccumulator {
    events: Arc<SharedBuffer<SimpleMessage>>,
    debugs: Arc<SharedBuffer<SimpleMessage>>,
    subscribers: SubscriberRegistry,
    broadcast: BroadcastLoop,
}

impl MessageAccumulator {
    /// Build the accumulator and register its router with `communication`.
    pub fn new(
        buffers: &BufferConfig,
        broadcast: &BroadcastConfig,
        communication: &Communication,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        Self::with_interval(
            buffers,
            broadcast.interval(),
            communication,
            transport,
        )
    }

    /// Build the accumulator with an explicit broadcast interval.
    pub fn with_interval(
        buffers: &BufferConfig,
        interval: Duration,
        communication: &Communication,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let events = Arc::new(SharedBuffer::new(buffers.event_capacity));
        let debugs = Arc::new(SharedBuffer::new(buffers.debug_capacity));

        let router = MessageRouter::new(Arc::clone(&events), Arc::clone(&debugs));
        communication.subscribe(Arc::new(router) as Arc<dyn MessageSink>);

        let broadcast = BroadcastLoop::new(
            vec![
                BroadcastChannel::new(PushEvent::NewEvents, Arc::clone(&events)),
                BroadcastChannel::new(PushEvent::NewDebugs, Arc::clone(&debugs)),
            ],
            Arc::clone(&transport),
            interval,
        );

        Self {
            events,
            debugs,
            subscribers: SubscriberRegistry::new(transport),
            broadcast,
        }
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Every live entry of the event buffer.
    pub fn all_events(&self) -> MessageBlock<SimpleMessage> {
        self.events.snapshot()
    }

    /// Every live entry of the debug buffer.
    pub fn all_debugs(&self) -> MessageBlock<SimpleMessage> {
        self.debugs.snapshot()
    }

    /// Retract the oldest event whose text equals `message`.
    pub fn retract_event(&self, message: &str) -> bool {
        self.events.remove_first(|m| m.message == message)
    }

    /// Empty both buffers and reset their cursors.
    pub fn clear_buffers(&self) {
        self.events.clear();
        self.debugs.clear();
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Entitle a connection to broadcast increments.
    ///
    /// Returns `Ok(true)` on first authentication, `Ok(false)` if the
    /// connection was already authenticated.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if it refuses the group join.
    pub fn mark_authenticated(&self, connection: ConnectionId) -> Result<bool, PushError> {
        self.subscribers.add(connection)
    }

    /// Whether the connection is currently authenticated.
    pub fn is_authenticated(&self, connection: ConnectionId) -> bool {
        self.subscribers.contains(connection)
    }

    /// Drop a closed connection from the subscribers.
    ///
    /// Returns `true` if it was authenticated.
    pub fn forget_connection(&self, connection: ConnectionId) -> bool {
        self.subscribers.remove(connection)
    }

    /// Revoke every authentication. Returns how many were revoked.
    pub fn clear_authenticated(&self) -> usize {
        self.subscribers.clear_all()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start the broadcast loop.
    ///
    /// # Errors
    ///
    /// See [`BroadcastLoop::start`].
    pub fn start(&self) -> Result<(), BroadcastError> {
        self.broadcast.start()
    }

    /// Stop the broadcast loop and wait for it to exit. Idempotent.
    pub async fn stop(&self) {
        self.broadcast.stop().await;
    }

    /// Broadcast loop state.
    pub fn loop_state(&self) -> LoopState {
        self.broadcast.state()
    }

    /// Current counters.
    pub fn stats(&self) -> AccumulatorStats {
        AccumulatorStats {
            events: self.events.len(),
            debugs: self.debugs.len(),
            pending_events: self.events.pending_count(),
            pending_debugs: self.debugs.pending_count(),
            subscribers: self.subscribers.len(),
            loop_state: self.broadcast.state(),
        }
    }
}
