//! Inbound notification interface.
//!
//! Producers anywhere in the host process hold an `Arc<Communication>`
//! and fire messages at it. The hub fans each call out to every
//! registered [`MessageSink`]; the [`MessageRouter`](crate::router::MessageRouter)
//! is one sink, [`TracingSink`] mirrors the stream into the process log.
//!
//! Calls are fire-and-forget. Sinks must not block and must not call
//! back into the hub.

use std::sync::{Arc, PoisonError, RwLock};

use logrelay_types::Severity;

/// Receiver of messages published through [`Communication`].
pub trait MessageSink: Send + Sync {
    /// Handle a debug-channel message of the given severity.
    fn on_debug(&self, message: &str, severity: Severity);

    /// Handle a domain event notification.
    fn on_event(&self, message: &str);
}

/// Fan-out hub from producers to registered sinks.
#[derive(Default)]
pub struct Communication {
    sinks: RwLock<Vec<Arc<dyn MessageSink>>>,
}

impl Communication {
    /// Create a hub with no sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink. Every subsequent message reaches it.
    pub fn subscribe(&self, sink: Arc<dyn MessageSink>) {
        self.sinks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Publish a debug message.
    pub fn send_debug_message(&self, message: &str) {
        self.send_message(message, Severity::Debug);
    }

    /// Publish a warning message.
    pub fn send_warning_message(&self, message: &str) {
        self.send_message(message, Severity::Warning);
    }

    /// Publish an error message.
    pub fn send_error_message(&self, message: &str) {
        self.send_message(message, Severity::Error);
    }

    /// Publish a debug-channel message with an explicit severity.
    pub fn send_message(&self, message: &str, severity: Severity) {
        for sink in self.sinks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            sink.on_debug(message, severity);
        }
    }

    /// Publish a domain event notification.
    pub fn notify_event(&self, message: &str) {
        for sink in self.sinks.read().unwrap_or_else(PoisonError::into_inner).iter() {
            sink.on_event(message);
        }
    }
}

impl core::fmt::Debug for Communication {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Communication")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

/// Sink that writes every message to the `tracing` log.
///
/// Used as the console view of the relay. It never touches the ring
/// buffers, so logging a failure cannot feed back into the stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn on_debug(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Debug => tracing::info!(target: "logrelay::debug", "{message}"),
            Severity::Warning => tracing::warn!(target: "logrelay::debug", "{message}"),
            Severity::Error => tracing::error!(target: "logrelay::debug", "{message}"),
        }
    }

    fn on_event(&self, message: &str) {
        tracing::info!(target: "logrelay::event", "{message}");
    }
}
