//! Event router: the protocol state machine.
//!
//! Each inbound frame is decoded, the matching room-state mutation is
//! applied, and the resulting events are fanned out through the
//! [`ConnectionRegistry`]. Mutations always happen before delivery, and
//! delivery failures are logged here and never abort a dispatch.
//!
//! | type           | recipients             | from_user |
//! |----------------|------------------------|-----------|
//! | `join`         | snapshot to sender, notice to others | user  |
//! | `stroke_batch` | others                 | user      |
//! | `cursor_move`  | others                 | user      |
//! | `clear_canvas` | everyone, sender too   | server    |
//! | `undo`         | others                 | server    |
//! | `redo`         | others                 | server    |
//! | `leave`        | others                 | user      |

use std::sync::Arc;

use syncanvas_protocol::constants::{SERVER_SENDER, UNKNOWN_IDENTITY};
use syncanvas_protocol::messages::{
    ClearCanvas, CursorRecord, ErrorNotice, JoinNotice, LeaveNotice, PresenceSnapshot, RedoNotice,
    StrokeBatch, StrokeHistory, UndoNotice,
};
use syncanvas_protocol::{Event, EventType, Payload, ProtocolError, decode, encode_payload};
use syncanvas_room_state::RoomStateBuffer;
use serde_json::Value;

use crate::connection::ConnectionId;
use crate::registry::{ConnectionMeta, ConnectionRegistry};

/// Who sent an event, as best we can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    user_id: String,
    display_name: String,
}

impl Identity {
    /// Prefers the event's own fields, then the connection's metadata,
    /// then [`UNKNOWN_IDENTITY`].
    fn resolve(event: &Event, meta: Option<&ConnectionMeta>) -> Self {
        let pick = |field: &str, from_meta: Option<&String>| {
            event
                .identity_field(field)
                .map(str::to_owned)
                .or_else(|| from_meta.filter(|s| !s.is_empty()).cloned())
                .unwrap_or_else(|| UNKNOWN_IDENTITY.to_owned())
        };
        Self {
            user_id: pick("user_id", meta.and_then(|m| m.user_id.as_ref())),
            display_name: pick("display_name", meta.and_then(|m| m.display_name.as_ref())),
        }
    }
}

/// Interprets inbound events and decides fan-out.
///
/// Holds no state of its own; everything lives in the registry and the
/// room buffer.
pub struct EventRouter {
    registry: Arc<ConnectionRegistry>,
    buffer: Arc<RoomStateBuffer>,
}

impl EventRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, buffer: Arc<RoomStateBuffer>) -> Self {
        Self { registry, buffer }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn buffer(&self) -> &Arc<RoomStateBuffer> {
        &self.buffer
    }

    /// Handles one inbound text frame from `conn` in `room_id`.
    pub async fn route(&self, room_id: &str, conn: ConnectionId, raw_text: &str) {
        let event = match decode(raw_text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(connection = %conn, room = %room_id, "invalid event: {e}");
                self.send_error(conn, &e).await;
                return;
            }
        };

        let meta = self.registry.meta(conn).await;
        let who = Identity::resolve(&event, meta.as_ref());

        let Some(event_type) = event.event_type().filter(|t| t.is_inbound()) else {
            let err = ProtocolError::UnknownEventType(event.type_name());
            tracing::warn!(connection = %conn, room = %room_id, "{err}");
            self.send_error(conn, &err).await;
            return;
        };

        tracing::debug!(
            connection = %conn,
            room = %room_id,
            user = %who.user_id,
            event = %event_type,
            "routing event"
        );

        match event_type {
            EventType::Join => self.on_join(room_id, conn, who).await,
            EventType::StrokeBatch => self.on_stroke_batch(room_id, conn, &event, who).await,
            EventType::CursorMove => self.on_cursor_move(room_id, conn, &event, who).await,
            EventType::ClearCanvas => self.on_clear_canvas(room_id, who).await,
            EventType::Undo => self.on_undo(room_id, conn, &event, who).await,
            EventType::Redo => self.on_redo(room_id, conn, &event, who).await,
            EventType::Leave => self.on_leave(room_id, conn, who).await,
            EventType::PresenceSnapshot | EventType::Error => {}
        }
    }

    /// Sends the room's stroke history, then its presence roster, to `conn`.
    ///
    /// Failures are logged and swallowed.
    pub async fn send_snapshot(&self, room_id: &str, conn: ConnectionId) {
        let history = StrokeHistory {
            strokes: self.buffer.recent_strokes(room_id).await,
        };
        if !self.send_personal(conn, &history, SERVER_SENDER).await {
            tracing::warn!(connection = %conn, room = %room_id, "failed to send stroke history");
        }

        let presence = PresenceSnapshot {
            presence: self.buffer.presence_snapshot(room_id).await,
        };
        if !self.send_personal(conn, &presence, SERVER_SENDER).await {
            tracing::warn!(connection = %conn, room = %room_id, "failed to send presence snapshot");
        }
    }

    async fn on_join(&self, room_id: &str, conn: ConnectionId, who: Identity) {
        self.registry
            .set_identity(conn, &who.user_id, &who.display_name)
            .await;
        self.buffer
            .add_presence(room_id, &who.user_id, &who.display_name)
            .await;
        tracing::info!(room = %room_id, user = %who.user_id, name = %who.display_name, "user joined");

        self.send_snapshot(room_id, conn).await;

        let notice = JoinNotice {
            user_id: who.user_id.clone(),
            display_name: who.display_name,
        };
        self.broadcast(room_id, &notice, &who.user_id, Some(conn)).await;
    }

    async fn on_stroke_batch(&self, room_id: &str, conn: ConnectionId, event: &Event, who: Identity) {
        let strokes = event.strokes();
        if !strokes.is_empty() {
            self.buffer.add_strokes(room_id, strokes).await;
        }

        let batch = StrokeBatch {
            strokes: strokes.to_vec(),
            timestamp: event.get("timestamp").cloned().unwrap_or(Value::Null),
            display_name: who.display_name,
            user_id: who.user_id.clone(),
        };
        self.broadcast(room_id, &batch, &who.user_id, Some(conn)).await;
    }

    async fn on_cursor_move(&self, room_id: &str, conn: ConnectionId, event: &Event, who: Identity) {
        let field = |key: &str| event.get(key).cloned().unwrap_or(Value::Null);
        let cursor = CursorRecord {
            user_id: who.user_id.clone(),
            x: field("x"),
            y: field("y"),
            display_name: who.display_name,
            tool: field("tool"),
        };
        self.buffer
            .set_cursor(room_id, &who.user_id, cursor.clone())
            .await;
        self.broadcast(room_id, &cursor, &who.user_id, Some(conn)).await;
    }

    async fn on_clear_canvas(&self, room_id: &str, who: Identity) {
        tracing::info!(room = %room_id, user = %who.user_id, "canvas clear requested");
        self.buffer.clear(room_id).await;
        self.broadcast(room_id, &ClearCanvas {}, SERVER_SENDER, None).await;
    }

    async fn on_undo(&self, room_id: &str, conn: ConnectionId, event: &Event, who: Identity) {
        let stroke_id = event.non_empty("stroke_id").cloned();
        let removed = match &stroke_id {
            Some(id) => self.buffer.remove_stroke(room_id, id).await,
            None => false,
        };

        let notice = UndoNotice {
            stroke_id: event.get("stroke_id").cloned().unwrap_or(Value::Null),
            removed,
            user_id: who.user_id,
        };
        self.broadcast(room_id, &notice, SERVER_SENDER, Some(conn)).await;
    }

    async fn on_redo(&self, room_id: &str, conn: ConnectionId, event: &Event, who: Identity) {
        if let Some(stroke) = event.non_empty("stroke") {
            self.buffer.add_stroke(room_id, stroke.clone()).await;
        }

        let notice = RedoNotice {
            stroke: event.get("stroke").cloned().unwrap_or(Value::Null),
            user_id: who.user_id,
        };
        self.broadcast(room_id, &notice, SERVER_SENDER, Some(conn)).await;
    }

    async fn on_leave(&self, room_id: &str, conn: ConnectionId, who: Identity) {
        self.buffer.remove_presence(room_id, &who.user_id).await;
        self.registry.clear_identity(conn).await;
        tracing::info!(room = %room_id, user = %who.user_id, "user left");

        let notice = LeaveNotice {
            user_id: who.user_id.clone(),
        };
        self.broadcast(room_id, &notice, &who.user_id, Some(conn)).await;
    }

    async fn send_error(&self, conn: ConnectionId, err: &ProtocolError) {
        let notice = ErrorNotice {
            message: err.to_string(),
        };
        self.send_personal(conn, &notice, SERVER_SENDER).await;
    }

    /// Encodes and delivers a payload to one connection. Returns `false` on failure.
    async fn send_personal<P: Payload>(&self, conn: ConnectionId, payload: &P, from_user: &str) -> bool {
        let Some(text) = frame(payload, from_user) else {
            return false;
        };
        match self.registry.send_personal(conn, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("personal send failed: {e}");
                false
            }
        }
    }

    /// Encodes and fans out a payload to the room, optionally skipping one connection.
    async fn broadcast<P: Payload>(
        &self,
        room_id: &str,
        payload: &P,
        from_user: &str,
        exclude: Option<ConnectionId>,
    ) {
        let Some(text) = frame(payload, from_user) else {
            return;
        };
        let report = self
            .registry
            .broadcast(room_id, &text, exclude.as_slice())
            .await;
        if report.failed > 0 {
            tracing::warn!(
                room = %room_id,
                event = %P::TYPE,
                delivered = report.delivered,
                failed = report.failed,
                "broadcast partially failed"
            );
        }
    }
}

/// Stamps and serializes a payload into a text frame.
fn frame<P: Payload>(payload: &P, from_user: &str) -> Option<String> {
    let event = match encode_payload(payload, from_user) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(event = %P::TYPE, "failed to encode payload: {e}");
            return None;
        }
    };
    match event.to_text() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(event = %P::TYPE, "failed to serialize event: {e}");
            None
        }
    }
}
