//! Message records and the block container used for delivery.
//!
//! Messages are created once by the router and never mutated. A
//! [`MessageBlock`] is built fresh for every snapshot or drain and owns
//! its copies, so nothing handed to a transport aliases buffer storage.

use serde::{Deserialize, Serialize};

/// A single line of text destined for an observer panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleMessage {
    /// Rendered text (may contain severity markup for debug lines).
    pub message: String,
}

impl SimpleMessage {
    /// Wrap a string as a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// An event notification that carries a producer-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Producer-assigned notification identifier.
    pub id: i64,
    /// Notification text.
    pub message: String,
}

impl NotificationMessage {
    /// Create a notification with the given identifier.
    pub fn new(id: i64, message: impl Into<String>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

/// Ordered sequence of messages; the unit of snapshot and delta transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBlock<T> {
    /// Messages in buffer key order.
    pub messages: Vec<T>,
}

impl<T> MessageBlock<T> {
    /// Build a block from already-ordered messages.
    pub const fn new(messages: Vec<T>) -> Self {
        Self { messages }
    }

    /// Number of messages in the block.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the block carries no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<T> Default for MessageBlock<T> {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
        }
    }
}

impl<T> FromIterator<T> for MessageBlock<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_serializes_with_messages_field() {
        let block: MessageBlock<SimpleMessage> =
            ["one", "two"].into_iter().map(SimpleMessage::new).collect();
        let json = serde_json::to_value(&block).ok();
        assert_eq!(
            json,
            Some(serde_json::json!({
                "messages": [{"message": "one"}, {"message": "two"}]
            }))
        );
    }

    #[test]
    fn empty_block() {
        let block = MessageBlock::<NotificationMessage>::default();
        assert!(block.is_empty());
        assert_eq!(block.len(), 0);
    }
}
