//! Message accumulation and delta broadcast for logrelay.
//!
//! Producers publish through a [`Communication`] hub. The
//! [`MessageRouter`] classifies each message into one of two
//! [`SharedBuffer`] ring buffers, and the [`BroadcastLoop`] wakes on a
//! fixed interval to push only the unseen suffix of each buffer to the
//! connections in the [`SubscriberRegistry`].
//!
//! # Modules
//!
//! - [`buffer`] -- Sequenced ring buffer with delta tracking
//! - [`communication`] -- Inbound notification hub and sinks
//! - [`router`] -- Severity formatting and buffer routing
//! - [`subscribers`] -- Authenticated connection registry
//! - [`transport`] -- Outbound push boundary
//! - [`broadcast`] -- Periodic delta broadcast loop
//! - [`accumulator`] -- Composition of all of the above
//! - [`config`] -- YAML configuration

pub mod accumulator;
pub mod broadcast;
pub mod buffer;
pub mod communication;
pub mod config;
pub mod router;
pub mod subscribers;
pub mod transport;

pub use accumulator::{AccumulatorStats, MessageAccumulator};
pub use broadcast::{BroadcastChannel, BroadcastError, BroadcastLoop, LoopState};
pub use buffer::{MessageBuffer, SharedBuffer};
pub use communication::{Communication, MessageSink, TracingSink};
pub use config::{ConfigError, RelayConfig};
pub use router::MessageRouter;
pub use subscribers::SubscriberRegistry;
pub use transport::{PushError, PushTransport, AUTHENTICATED_GROUP};
