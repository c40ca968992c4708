//! JSON wire protocol for buffer and cursor synchronization.
//!
//! Every frame is an envelope naming the event and carrying its payload:
//! ```text
//! {"event": "code-change", "data": "fn main() {}"}
//! {"event": "cursor-position", "data": {"line": 4, "column": 10}}
//! {"event": "stats", "data": {"connectedUsers": 2, "activeSessions": 1}}
//! ```
//!
//! Inbound (participant → hub) and outbound (hub → participant) events are
//! separate enums so a participant can never inject a hub-only event.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque participant identifier, stable for the lifetime of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cursor location inside the shared buffer.
///
/// Browser editors report `lineNumber`, which is accepted as `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    #[serde(alias = "lineNumber")]
    pub line: u32,
    pub column: u32,
}

impl CursorPosition {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A cursor move tagged with the participant that made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorUpdate {
    pub participant_id: ParticipantId,
    pub position: CursorPosition,
}

/// Participant count notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub connected_users: usize,
    /// One hub serves one document.
    pub active_sessions: u32,
}

impl Stats {
    pub fn connected(connected_users: usize) -> Self {
        Self {
            connected_users,
            active_sessions: 1,
        }
    }
}

/// Events sent by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Whole-buffer replacement
    CodeChange(String),
    /// Ephemeral cursor report
    CursorPosition(CursorPosition),
}

/// Events sent by the hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Current buffer, sent once right after connect
    InitialCode(String),
    /// Another participant replaced the buffer
    CodeUpdate(String),
    /// Another participant moved their cursor
    CursorUpdate(CursorUpdate),
    /// Participant count changed
    Stats(Stats),
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Deserialization)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialization)
    }
}

impl ServerEvent {
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Deserialization)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Serialization)
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialCode(_) => "initial-code",
            Self::CodeUpdate(_) => "code-update",
            Self::CursorUpdate(_) => "cursor-update",
            Self::Stats(_) => "stats",
        }
    }
}

/// Protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("deserialization error: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("binary frame is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("connection closed")]
    ConnectionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_code_change_wire_shape() {
        let event = ClientEvent::CodeChange("let x = 1;".into());
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(value, json!({"event": "code-change", "data": "let x = 1;"}));
    }

    #[test]
    fn test_cursor_position_decode() {
        let event = ClientEvent::decode(r#"{"event":"cursor-position","data":{"line":4,"column":10}}"#)
            .unwrap();
        assert_eq!(event, ClientEvent::CursorPosition(CursorPosition::new(4, 10)));
    }

    #[test]
    fn test_cursor_position_accepts_line_number_alias() {
        let event =
            ClientEvent::decode(r#"{"event":"cursor-position","data":{"lineNumber":7,"column":2}}"#)
                .unwrap();
        assert_eq!(event, ClientEvent::CursorPosition(CursorPosition::new(7, 2)));
    }

    #[test]
    fn test_cursor_update_wire_shape() {
        let event = ServerEvent::CursorUpdate(CursorUpdate {
            participant_id: ParticipantId::new("p-1"),
            position: CursorPosition::new(4, 10),
        });
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "cursor-update",
                "data": {"participantId": "p-1", "position": {"line": 4, "column": 10}}
            })
        );
    }

    #[test]
    fn test_stats_wire_shape() {
        let event = ServerEvent::Stats(Stats::connected(3));
        let value: serde_json::Value = serde_json::from_str(&event.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"event": "stats", "data": {"connectedUsers": 3, "activeSessions": 1}})
        );
    }

    #[test]
    fn test_initial_code_keeps_content_verbatim() {
        let code = "line one\n\t\"quoted\" \u{1F980}\n";
        let encoded = ServerEvent::InitialCode(code.into()).encode().unwrap();
        assert_eq!(ServerEvent::decode(&encoded).unwrap(), ServerEvent::InitialCode(code.into()));
    }

    #[test]
    fn test_hub_only_event_rejected_from_client() {
        let err = ClientEvent::decode(r#"{"event":"code-update","data":"x"}"#);
        assert!(matches!(err, Err(ProtocolError::Deserialization(_))));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(ClientEvent::decode("not json").is_err());
        assert!(ClientEvent::decode(r#"{"event":"code-change","data":42}"#).is_err());
        assert!(ClientEvent::decode(r#"{"event":"cursor-position","data":{"line":-1,"column":0}}"#).is_err());
        assert!(ClientEvent::decode(r#"{"data":"x"}"#).is_err());
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ServerEvent::InitialCode(String::new()).name(), "initial-code");
        assert_eq!(ServerEvent::CodeUpdate(String::new()).name(), "code-update");
        assert_eq!(ServerEvent::Stats(Stats::connected(0)).name(), "stats");
    }
}
