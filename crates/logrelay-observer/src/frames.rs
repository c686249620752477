//! JSON frames exchanged over the monitor `WebSocket`.
//!
//! Every frame is an object tagged by `type`:
//!
//! ```json
//! {"type":"new_debugs","messages":[{"message":"tick"}]}
//! {"type":"authenticate","token":"change-me"}
//! ```

use logrelay_types::{ConnectionId, PushEvent, SimpleMessage};
use serde::{Deserialize, Serialize};

/// Frame sent from the server to an observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame<'a> {
    /// Event increment pushed by the broadcast loop.
    NewEvents {
        /// Messages in key order.
        messages: &'a [SimpleMessage],
    },
    /// Debug increment pushed by the broadcast loop.
    NewDebugs {
        /// Messages in key order.
        messages: &'a [SimpleMessage],
    },
    /// Full event backlog.
    AllEvents {
        /// Messages in key order.
        messages: &'a [SimpleMessage],
    },
    /// Full debug backlog.
    AllDebugs {
        /// Messages in key order.
        messages: &'a [SimpleMessage],
    },
    /// Authentication succeeded.
    Authenticated {
        /// The connection's identifier.
        connection_id: ConnectionId,
    },
    /// A client frame was rejected.
    Error {
        /// What went wrong.
        message: &'a str,
    },
}

impl<'a> ServerFrame<'a> {
    /// Frame carrying a broadcast increment.
    pub const fn increment(event: PushEvent, messages: &'a [SimpleMessage]) -> Self {
        match event {
            PushEvent::NewEvents => Self::NewEvents { messages },
            PushEvent::NewDebugs => Self::NewDebugs { messages },
        }
    }

    /// Encode as JSON text.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; none of the frame payloads can fail
    /// to serialize in practice.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frame sent from an observer to the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Present the admin token.
    Authenticate {
        /// The token to check.
        #[serde(default)]
        token: String,
    },
    /// Invalidate every authenticated session.
    Logout,
    /// Resend both backlogs.
    RequestSnapshot,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn increment_frames_are_tagged_by_event() {
        let messages = vec![SimpleMessage::new("a")];
        let json = ServerFrame::increment(PushEvent::NewDebugs, &messages)
            .encode()
            .unwrap();
        assert_eq!(json, r#"{"type":"new_debugs","messages":[{"message":"a"}]}"#);
    }

    #[test]
    fn client_frames_parse() {
        let auth: ClientFrame =
            serde_json::from_str(r#"{"type":"authenticate","token":"t"}"#).unwrap();
        assert_eq!(auth, ClientFrame::Authenticate { token: "t".to_owned() });

        let logout: ClientFrame = serde_json::from_str(r#"{"type":"logout"}"#).unwrap();
        assert_eq!(logout, ClientFrame::Logout);

        let snapshot: ClientFrame =
            serde_json::from_str(r#"{"type":"request_snapshot"}"#).unwrap();
        assert_eq!(snapshot, ClientFrame::RequestSnapshot);
    }

    #[test]
    fn unknown_client_frame_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shutdown"}"#).is_err());
    }
}
