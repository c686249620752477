//! Classification and formatting of incoming messages.
//!
//! The router turns raw producer text into [`SimpleMessage`] records and
//! appends them to the right ring buffer:
//!
//! | Input | Buffer | Stored text |
//! |-------|--------|-------------|
//! | event | events | verbatim |
//! | debug | debugs | HTML-escaped |
//! | warning | debugs | escaped, wrapped in a yellow `<span>` |
//! | error | debugs | escaped, wrapped in a red `<span>` |
//!
//! Every [`Severity`] variant has an explicit arm, so adding a new
//! classification without teaching the router about it fails to compile
//! instead of silently landing in the wrong style.

use std::sync::Arc;

use logrelay_types::{Severity, SimpleMessage};

use crate::buffer::SharedBuffer;
use crate::communication::MessageSink;

/// Colour used to tag warning lines.
pub const WARNING_COLOR: &str = "#FFFF00";

/// Colour used to tag error lines.
pub const ERROR_COLOR: &str = "#FF0000";

/// Routes producer messages into the event and debug buffers.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    events: Arc<SharedBuffer<SimpleMessage>>,
    debugs: Arc<SharedBuffer<SimpleMessage>>,
}

impl MessageRouter {
    /// Create a router writing into the given buffers.
    pub const fn new(
        events: Arc<SharedBuffer<SimpleMessage>>,
        debugs: Arc<SharedBuffer<SimpleMessage>>,
    ) -> Self {
        Self { events, debugs }
    }

    /// Format a debug-channel message and append it to the debug buffer.
    pub fn route_debug(&self, message: &str, severity: Severity) {
        self.debugs.append(SimpleMessage::new(format_debug(message, severity)));
    }

    /// Append an event notification to the event buffer unmodified.
    pub fn route_event(&self, message: &str) {
        self.events.append(SimpleMessage::new(message));
    }
}

impl MessageSink for MessageRouter {
    fn on_debug(&self, message: &str, severity: Severity) {
        self.route_debug(message, severity);
    }

    fn on_event(&self, message: &str) {
        self.route_event(message);
    }
}

/// Render a debug-channel line for the dashboard.
pub fn format_debug(message: &str, severity: Severity) -> String {
    let escaped = escape_html(message);
    match severity {
        Severity::Debug => escaped,
        Severity::Warning => color_span(WARNING_COLOR, &escaped),
        Severity::Error => color_span(ERROR_COLOR, &escaped),
    }
}

fn color_span(color: &str, body: &str) -> String {
    format!("<span style=\"color: {color}\">{body}</span>")
}

/// Escape the characters that would let message text inject markup.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
