//! Shared type definitions for the logrelay message relay.
//!
//! Everything that crosses a crate boundary lives here: the message
//! records stored in the ring buffers, the [`MessageBlock`] transfer unit,
//! the severity classification used by producers, and the opaque
//! connection identifiers handed out by the observer transport.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for observer connections
//! - [`enums`] -- Severity classification and push event names
//! - [`messages`] -- Message records and the [`MessageBlock`] container

pub mod enums;
pub mod ids;
pub mod messages;

// Re-export all public types at crate root for convenience.
pub use enums::{PushEvent, Severity, UnknownSeverity};
pub use ids::ConnectionId;
pub use messages::{MessageBlock, NotificationMessage, SimpleMessage};
