//! Periodic delta broadcast loop.
//!
//! [`BroadcastLoop`] owns one background Tokio task. Every interval it
//! walks its channels, drains each buffer's pending increment, and
//! pushes non-empty increments to the [`AUTHENTICATED_GROUP`]. It is the
//! only caller of [`SharedBuffer::drain_pending`], which makes each
//! buffer multiple-producer / single-consumer.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start()--> Running --stop()--> Cancelling --(task joined)--> Stopped
//!   \________________________stop()______________________________/
//! ```
//!
//! The sleep between iterations is the only cancellation point, so a
//! push that has started always completes. [`BroadcastLoop::stop`]
//! returns only after the task has exited, which guarantees nothing is
//! still reading the buffers when dependent resources are torn down.
//! A stopped loop cannot be restarted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use logrelay_types::{PushEvent, SimpleMessage};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::buffer::SharedBuffer;
use crate::transport::{PushTransport, AUTHENTICATED_GROUP};

/// Errors returned by [`BroadcastLoop::start`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The loop is already running.
    #[error("broadcast loop already started")]
    AlreadyStarted,

    /// The loop has been stopped and cannot be restarted.
    #[error("broadcast loop already stopped")]
    AlreadyStopped,

    /// `start` was called outside a Tokio runtime.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}

/// Lifecycle state of the broadcast loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Constructed, not yet started.
    Idle,
    /// Background task is running.
    Running,
    /// Cancellation signalled, waiting for the task to exit.
    Cancelling,
    /// Task has exited; terminal.
    Stopped,
}

/// A buffer paired with the event name its increments are pushed under.
#[derive(Debug, Clone)]
pub struct BroadcastChannel {
    /// Event name observers receive the increment as.
    pub event: PushEvent,
    /// Buffer drained each iteration.
    pub buffer: Arc<SharedBuffer<SimpleMessage>>,
}

impl BroadcastChannel {
    /// Pair a buffer with its push event.
    pub const fn new(event: PushEvent, buffer: Arc<SharedBuffer<SimpleMessage>>) -> Self {
        Self { event, buffer }
    }
}

/// Background task that pushes buffer increments to subscribers.
pub struct BroadcastLoop {
    channels: Arc<[BroadcastChannel]>,
    transport: Arc<dyn PushTransport>,
    interval: Duration,
    state: Mutex<LoopState>,
    cancel: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastLoop {
    /// Create an idle loop over the given channels.
    ///
    /// Channels are flushed in the order given on every iteration.
    pub fn new(
        channels: Vec<BroadcastChannel>,
        transport: Arc<dyn PushTransport>,
        interval: Duration,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            channels: channels.into(),
            transport,
            interval,
            state: Mutex::new(LoopState::Idle),
            cancel,
            handle: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LoopState {
        *self.lock_state()
    }

    /// Interval between iterations.
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the background task on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::AlreadyStarted`] if running,
    /// [`BroadcastError::AlreadyStopped`] once stopped, and
    /// [`BroadcastError::NoRuntime`] outside a runtime.
    pub fn start(&self) -> Result<(), BroadcastError> {
        let mut state = self.lock_state();
        match *state {
            LoopState::Idle => {}
            LoopState::Running => return Err(BroadcastError::AlreadyStarted),
            LoopState::Cancelling | LoopState::Stopped => {
                return Err(BroadcastError::AlreadyStopped);
            }
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BroadcastError::NoRuntime(e.to_string()))?;

        let channels = Arc::clone(&self.channels);
        let transport = Arc::clone(&self.transport);
        let interval = self.interval;
        let cancel = self.cancel.subscribe();

        let handle = runtime.spawn(run(channels, transport, interval, cancel));
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        *state = LoopState::Running;

        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            channels = self.channels.len(),
            "Broadcast loop started"
        );
        Ok(())
    }

    /// Cancel the loop and wait for its task to exit.
    ///
    /// Safe to call more than once; only the first call does anything.
    /// Stopping a loop that was never started moves it straight to
    /// [`LoopState::Stopped`].
    pub async fn stop(&self) {
        let handle = {
            let mut state = self.lock_state();
            match *state {
                LoopState::Idle => {
                    *state = LoopState::Stopped;
                    return;
                }
                LoopState::Running => *state = LoopState::Cancelling,
                LoopState::Cancelling | LoopState::Stopped => return,
            }
            self.cancel.send_replace(true);
            self.handle
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Broadcast loop task ended abnormally");
            }
        }

        *self.lock_state() = LoopState::Stopped;
        info!("Broadcast loop stopped");
    }

    /// Run one flush pass over every channel without waiting.
    ///
    /// Returns the number of frames handed to connections.
    #[cfg(test)]
    pub(crate) fn flush(&self) -> usize {
        flush_channels(&self.channels, self.transport.as_ref())
    }
}

impl Drop for BroadcastLoop {
    fn drop(&mut self) {
        // The task holds no reference back to the loop.
        self.cancel.send_replace(true);
    }
}

impl core::fmt::Debug for BroadcastLoop {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BroadcastLoop")
            .field("channels", &self.channels)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Body of the background task.
async fn run(
    channels: Arc<[BroadcastChannel]>,
    transport: Arc<dyn PushTransport>,
    interval: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            break;
        }

        flush_channels(&channels, transport.as_ref());

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            changed = cancel.changed() => {
                // A dropped sender means the owner is gone; exit either way.
                if changed.is_err() || *cancel.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Broadcast loop task exiting");
}

/// Drain and push every channel once, in order.
fn flush_channels(channels: &[BroadcastChannel], transport: &dyn PushTransport) -> usize {
    let mut delivered: usize = 0;

    for channel in channels {
        if channel.buffer.pending_count() == 0 {
            continue;
        }

        let block = channel.buffer.drain_pending();
        if block.is_empty() {
            // Everything pending was evicted before we got here.
            continue;
        }

        match transport.broadcast(AUTHENTICATED_GROUP, channel.event, &block) {
            Ok(receivers) => {
                debug!(
                    event = %channel.event,
                    messages = block.len(),
                    receivers,
                    "Increment pushed"
                );
                delivered = delivered.saturating_add(receivers);
            }
            Err(e) => {
                warn!(
                    event = %channel.event,
                    messages = block.len(),
                    error = %e,
                    "Increment push failed, dropping it"
                );
            }
        }
    }

    delivered
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use logrelay_types::ConnectionId;

    use super::*;
    use crate::subscribers::SubscriberRegistry;
    use crate::transport::testing::RecordingTransport;

    struct Fixture {
        events: Arc<SharedBuffer<SimpleMessage>>,
        debugs: Arc<SharedBuffer<SimpleMessage>>,
        transport: Arc<RecordingTransport>,
        registry: SubscriberRegistry,
        broadcast: BroadcastLoop,
    }

    fn fixture(capacity: usize) -> Fixture {
        let events = Arc::new(SharedBuffer::new(capacity));
        let debugs = Arc::new(SharedBuffer::new(capacity));
        let transport = Arc::new(RecordingTransport::default());
        let dyn_transport: Arc<dyn PushTransport> = Arc::clone(&transport) as Arc<dyn PushTransport>;
        let registry = SubscriberRegistry::new(Arc::clone(&dyn_transport));
        let broadcast = BroadcastLoop::new(
            vec![
                BroadcastChannel::new(PushEvent::NewEvents, Arc::clone(&events)),
                BroadcastChannel::new(PushEvent::NewDebugs, Arc::clone(&debugs)),
            ],
            dyn_transport,
            Duration::from_secs(1),
        );
        Fixture {
            events,
            debugs,
            transport,
            registry,
            broadcast,
        }
    }

    fn push(buffer: &SharedBuffer<SimpleMessage>, items: &[&str]) {
        for item in items {
            buffer.append(SimpleMessage::new(*item));
        }
    }

    #[test]
    fn flush_pushes_each_buffer_under_its_event() {
        let fx = fixture(10);
        let observer = ConnectionId::new();
        fx.registry.add(observer).unwrap();

        push(&fx.events, &["followed"]);
        push(&fx.debugs, &["booted", "ready"]);

        assert_eq!(fx.broadcast.flush(), 2);
        let deliveries = fx.transport.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].event, PushEvent::NewEvents);
        assert_eq!(deliveries[0].messages, vec!["followed"]);
        assert_eq!(deliveries[1].event, PushEvent::NewDebugs);
        assert_eq!(deliveries[1].messages, vec!["booted", "ready"]);
        assert!(deliveries.iter().all(|d| d.connection == observer));
    }

    #[test]
    fn empty_buffers_are_not_pushed() {
        let fx = fixture(10);
        fx.registry.add(ConnectionId::new()).unwrap();

        assert_eq!(fx.broadcast.flush(), 0);
        assert_eq!(fx.transport.broadcast_calls(), 0);
    }

    #[test]
    fn fully_evicted_increment_is_skipped() {
        let fx = fixture(0);
        fx.registry.add(ConnectionId::new()).unwrap();
        push(&fx.debugs, &["gone"]);

        assert_eq!(fx.broadcast.flush(), 0);
        assert_eq!(fx.transport.broadcast_calls(), 0);
        assert_eq!(fx.debugs.pending_count(), 0);
    }

    #[test]
    fn unauthenticated_connections_receive_nothing() {
        let fx = fixture(10);
        let member = ConnectionId::new();
        let stranger = ConnectionId::new();
        fx.registry.add(member).unwrap();

        push(&fx.events, &["hello"]);
        fx.broadcast.flush();

        let deliveries = fx.transport.deliveries();
        assert!(deliveries.iter().all(|d| d.connection != stranger));
        assert_eq!(deliveries.len(), 1);
    }

    #[test]
    fn cleared_registry_reaches_zero_recipients() {
        let fx = fixture(10);
        fx.registry.add(ConnectionId::new()).unwrap();
        fx.registry.add(ConnectionId::new()).unwrap();
        fx.registry.clear_all();

        push(&fx.debugs, &["after logout"]);
        assert_eq!(fx.broadcast.flush(), 0);

        // The increment was still computed and handed to the transport.
        assert_eq!(fx.transport.broadcast_calls(), 1);
        assert!(fx.transport.deliveries().is_empty());
        assert_eq!(fx.debugs.pending_count(), 0);
    }

    #[test]
    fn transport_failure_drops_increment_and_continues() {
        let fx = fixture(10);
        fx.registry.add(ConnectionId::new()).unwrap();
        fx.transport.set_fail_broadcast(true);

        push(&fx.events, &["lost"]);
        push(&fx.debugs, &["also lost"]);
        assert_eq!(fx.broadcast.flush(), 0);
        assert_eq!(fx.transport.broadcast_calls(), 2);

        fx.transport.set_fail_broadcast(false);
        push(&fx.events, &["delivered"]);
        assert_eq!(fx.broadcast.flush(), 1);
        assert_eq!(fx.transport.deliveries()[0].messages, vec!["delivered"]);
    }

    #[tokio::test(start_paused = true)]
    async fn running_loop_delivers_increments_in_order() {
        let fx = fixture(100);
        fx.registry.add(ConnectionId::new()).unwrap();
        fx.broadcast.start().unwrap();
        assert_eq!(fx.broadcast.state(), LoopState::Running);

        for round in 0..3 {
            push(&fx.debugs, &[&format!("line {round}")]);
            tokio::time::sleep(Duration::from_millis(1100)).await;
        }

        fx.broadcast.stop().await;
        assert_eq!(fx.broadcast.state(), LoopState::Stopped);

        let lines: Vec<String> = fx
            .transport
            .deliveries()
            .into_iter()
            .flat_map(|d| d.messages)
            .collect();
        assert_eq!(lines, vec!["line 0", "line 1", "line 2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_the_sleep_and_joins() {
        let fx = fixture(10);
        let slow = BroadcastLoop::new(
            vec![BroadcastChannel::new(PushEvent::NewEvents, Arc::clone(&fx.events))],
            Arc::clone(&fx.transport) as Arc<dyn PushTransport>,
            Duration::from_secs(3600),
        );
        slow.start().unwrap();
        tokio::task::yield_now().await;

        // Returns without the hour-long sleep elapsing.
        let before = tokio::time::Instant::now();
        slow.stop().await;
        assert!(before.elapsed() < Duration::from_secs(3600));
        assert_eq!(slow.state(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_not_restartable() {
        let fx = fixture(10);
        fx.broadcast.start().unwrap();
        assert_eq!(fx.broadcast.start(), Err(BroadcastError::AlreadyStarted));

        fx.broadcast.stop().await;
        fx.broadcast.stop().await;
        assert_eq!(fx.broadcast.state(), LoopState::Stopped);
        assert_eq!(fx.broadcast.start(), Err(BroadcastError::AlreadyStopped));
    }

    #[tokio::test]
    async fn stopping_an_idle_loop_is_terminal() {
        let fx = fixture(10);
        fx.broadcast.stop().await;
        assert_eq!(fx.broadcast.state(), LoopState::Stopped);
        assert_eq!(fx.broadcast.start(), Err(BroadcastError::AlreadyStopped));
    }

    #[test]
    fn start_outside_runtime_fails() {
        let fx = fixture(10);
        assert!(matches!(
            fx.broadcast.start(),
            Err(BroadcastError::NoRuntime(_))
        ));
        assert_eq!(fx.broadcast.state(), LoopState::Idle);
    }
}
