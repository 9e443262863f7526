use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::EventType;

/// A typed outbound payload.
///
/// [`crate::encode_payload`] adds the `type` field from [`Payload::TYPE`].
pub trait Payload: Serialize {
    const TYPE: EventType;
}

/// An opaque stroke record. Only its `id` field is interpreted.
pub type Stroke = Value;

/// Returns the caller-assigned identifier of a stroke.
pub fn stroke_id(stroke: &Stroke) -> Option<&Value> {
    stroke.get("id")
}

// ---------------------------------------------------------------------------
// Snapshots (server → joining client)
// ---------------------------------------------------------------------------

/// Stroke history replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeHistory {
    pub strokes: Vec<Stroke>,
}

impl Payload for StrokeHistory {
    const TYPE: EventType = EventType::StrokeBatch;
}

/// Presence roster: user_id → display_name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub presence: BTreeMap<String, String>,
}

impl Payload for PresenceSnapshot {
    const TYPE: EventType = EventType::PresenceSnapshot;
}

// ---------------------------------------------------------------------------
// Live events
// ---------------------------------------------------------------------------

/// Announces a user joining the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinNotice {
    pub user_id: String,
    pub display_name: String,
}

impl Payload for JoinNotice {
    const TYPE: EventType = EventType::Join;
}

/// Strokes drawn by a peer, echoed with the client's own timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeBatch {
    pub strokes: Vec<Stroke>,
    pub timestamp: Value,
    pub display_name: String,
    pub user_id: String,
}

impl Payload for StrokeBatch {
    const TYPE: EventType = EventType::StrokeBatch;
}

/// Latest pointer state of one user.
///
/// Position and tool are relayed verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorRecord {
    pub user_id: String,
    pub x: Value,
    pub y: Value,
    pub display_name: String,
    pub tool: Value,
}

impl Payload for CursorRecord {
    const TYPE: EventType = EventType::CursorMove;
}

/// The board was wiped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearCanvas {}

impl Payload for ClearCanvas {
    const TYPE: EventType = EventType::ClearCanvas;
}

/// Result of an undo request; `removed` is the authoritative outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UndoNotice {
    pub stroke_id: Value,
    pub removed: bool,
    pub user_id: String,
}

impl Payload for UndoNotice {
    const TYPE: EventType = EventType::Undo;
}

/// A stroke restored by redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedoNotice {
    pub stroke: Value,
    pub user_id: String,
}

impl Payload for RedoNotice {
    const TYPE: EventType = EventType::Redo;
}

/// Announces a user leaving the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveNotice {
    pub user_id: String,
}

impl Payload for LeaveNotice {
    const TYPE: EventType = EventType::Leave;
}

/// Error report sent to a single client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
}

impl Payload for ErrorNotice {
    const TYPE: EventType = EventType::Error;
}
