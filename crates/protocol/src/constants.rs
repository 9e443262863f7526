use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Sender identity stamped on system-originated events.
pub const SERVER_SENDER: &str = "server";

/// Identity used when neither the event nor the connection carries one.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Default cap on the stroke history kept per room.
pub const DEFAULT_MAX_STROKES_PER_ROOM: usize = 10_000;

/// Request path prefix for the WebSocket upgrade; the remainder is the room key.
pub const WS_PATH_PREFIX: &str = "/ws/";

/// How often the server pings each client.
pub const WS_PING_PERIOD: Duration = Duration::from_secs(30);

/// Maximum message size in bytes (16 MB).
///
/// Stroke batches carry point arrays, so a generous limit keeps a busy
/// pen from tripping the transport.
pub const WS_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Event type identifier carried in the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "join")]
    Join,
    #[serde(rename = "stroke_batch")]
    StrokeBatch,
    #[serde(rename = "cursor_move")]
    CursorMove,
    #[serde(rename = "clear_canvas")]
    ClearCanvas,
    #[serde(rename = "undo")]
    Undo,
    #[serde(rename = "redo")]
    Redo,
    #[serde(rename = "leave")]
    Leave,

    // Outbound only
    #[serde(rename = "presence_snapshot")]
    PresenceSnapshot,
    #[serde(rename = "error")]
    Error,
}

impl EventType {
    /// Returns the wire name of this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::StrokeBatch => "stroke_batch",
            Self::CursorMove => "cursor_move",
            Self::ClearCanvas => "clear_canvas",
            Self::Undo => "undo",
            Self::Redo => "redo",
            Self::Leave => "leave",
            Self::PresenceSnapshot => "presence_snapshot",
            Self::Error => "error",
        }
    }

    /// Looks up an event type by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        let ty = match name {
            "join" => Self::Join,
            "stroke_batch" => Self::StrokeBatch,
            "cursor_move" => Self::CursorMove,
            "clear_canvas" => Self::ClearCanvas,
            "undo" => Self::Undo,
            "redo" => Self::Redo,
            "leave" => Self::Leave,
            "presence_snapshot" => Self::PresenceSnapshot,
            "error" => Self::Error,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns `true` for types a client may send.
    pub fn is_inbound(self) -> bool {
        !matches!(self, Self::PresenceSnapshot | Self::Error)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_serde() {
        let all = [
            EventType::Join,
            EventType::StrokeBatch,
            EventType::CursorMove,
            EventType::ClearCanvas,
            EventType::Undo,
            EventType::Redo,
            EventType::Leave,
            EventType::PresenceSnapshot,
            EventType::Error,
        ];
        for ty in all {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
            assert_eq!(EventType::from_wire(ty.as_str()), Some(ty));
        }
    }

    #[test]
    fn unknown_wire_name() {
        assert_eq!(EventType::from_wire("paint"), None);
        assert_eq!(EventType::from_wire("JOIN"), None);
    }

    #[test]
    fn outbound_only_types() {
        assert!(EventType::Join.is_inbound());
        assert!(EventType::StrokeBatch.is_inbound());
        assert!(!EventType::PresenceSnapshot.is_inbound());
        assert!(!EventType::Error.is_inbound());
    }
}
