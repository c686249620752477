//! Enumeration types for the relay.
//!
//! [`Severity`] classifies text sent through the debug channel and
//! [`PushEvent`] names the increments the broadcast loop pushes to
//! observers.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity classification of a debug-channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Plain diagnostic output.
    Debug,
    /// Something unexpected that did not stop the caller.
    Warning,
    /// A failure the operator should look at.
    Error,
}

impl Severity {
    /// Lowercase wire name of the severity.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl core::fmt::Display for Severity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A severity string that matches none of the known classifications.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected message severity: {0:?}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            _ => Err(UnknownSeverity(s.to_owned())),
        }
    }
}

/// Name under which an increment is pushed to observers.
///
/// Observers route the payload to the matching panel by this name, so
/// each ring buffer owns exactly one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushEvent {
    /// New entries from the event buffer.
    NewEvents,
    /// New entries from the debug buffer.
    NewDebugs,
}

impl PushEvent {
    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewEvents => "new_events",
            Self::NewDebugs => "new_debugs",
        }
    }
}

impl core::fmt::Display for PushEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_parses_known_names() {
        assert_eq!("debug".parse::<Severity>(), Ok(Severity::Debug));
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!(" warn ".parse::<Severity>(), Ok(Severity::Warning));
        assert_eq!("ERROR".parse::<Severity>(), Ok(Severity::Error));
    }

    #[test]
    fn severity_rejects_unknown_names() {
        let err = "fatal".parse::<Severity>();
        assert_eq!(err, Err(UnknownSeverity(String::from("fatal"))));
    }

    #[test]
    fn push_event_wire_names() {
        assert_eq!(PushEvent::NewEvents.as_str(), "new_events");
        assert_eq!(PushEvent::NewDebugs.to_string(), "new_debugs");
        let json = serde_json::to_string(&PushEvent::NewDebugs).ok();
        assert_eq!(json.as_deref(), Some("\"new_debugs\""));
    }
}
