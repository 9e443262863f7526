//! Wire protocol for the SynCanvas relay.
//!
//! Clients and server exchange flat JSON objects over WebSocket text
//! frames. Every outbound event carries `from_user` and `server_timestamp`
//! in addition to its payload fields.

pub mod constants;
pub mod event;
pub mod messages;

// Re-export primary types for convenience.
pub use constants::EventType;
pub use event::{Event, OutboundEvent, Record, decode, encode, encode_at, encode_payload};
pub use messages::{CursorRecord, Payload, Stroke};

/// Errors produced by the event codec.
///
/// The `Display` text doubles as the `message` of the `error` event sent
/// back to the client.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid_event: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("invalid_event: event must be an object")]
    NotAnObject,

    #[error("unknown_event_type: {0}")]
    UnknownEventType(String),

    #[error("payload serialization failed: {0}")]
    Serialize(serde_json::Error),

    #[error("payload must serialize to an object")]
    NotARecordPayload,
}
