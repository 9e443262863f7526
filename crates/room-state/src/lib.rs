//! Authoritative per-room canvas state.
//!
//! Each room holds a bounded, ordered stroke history, the latest cursor
//! record per user and a presence roster. Rooms spring into existence on
//! first access and live as long as the process.
//!
//! Every operation takes the same process-wide lock, so snapshots never
//! observe a half-applied batch.

use std::collections::{BTreeMap, HashMap, VecDeque};

use serde_json::Value;
use syncanvas_protocol::constants::DEFAULT_MAX_STROKES_PER_ROOM;
use syncanvas_protocol::messages::stroke_id;
use syncanvas_protocol::{CursorRecord, Stroke};
use tokio::sync::Mutex;

/// State of a single room.
#[derive(Debug, Default)]
struct RoomState {
    strokes: VecDeque<Stroke>,
    cursors: BTreeMap<String, CursorRecord>,
    presence: BTreeMap<String, String>,
}

/// In-memory store of every room's canvas state.
#[derive(Debug)]
pub struct RoomStateBuffer {
    rooms: Mutex<HashMap<String, RoomState>>,
    max_strokes_per_room: usize,
}

impl Default for RoomStateBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STROKES_PER_ROOM)
    }
}

impl RoomStateBuffer {
    /// Creates an empty buffer keeping at most `max_strokes_per_room`
    /// strokes in each room.
    pub fn new(max_strokes_per_room: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            max_strokes_per_room,
        }
    }

    /// Returns the per-room stroke cap.
    pub fn max_strokes_per_room(&self) -> usize {
        self.max_strokes_per_room
    }

    /// Appends strokes in order, evicting the oldest past the cap.
    pub async fn add_strokes(&self, room_id: &str, strokes: &[Stroke]) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.strokes.extend(strokes.iter().cloned());

        let overflow = room.strokes.len().saturating_sub(self.max_strokes_per_room);
        if overflow > 0 {
            room.strokes.drain(..overflow);
            tracing::debug!(room = %room_id, evicted = overflow, "stroke history trimmed");
        }
    }

    /// Appends a single stroke.
    pub async fn add_stroke(&self, room_id: &str, stroke: Stroke) {
        self.add_strokes(room_id, std::slice::from_ref(&stroke)).await;
    }

    /// Removes every stroke whose `id` equals `id`.
    ///
    /// Returns `true` if at least one stroke was removed.
    pub async fn remove_stroke(&self, room_id: &str, id: &Value) -> bool {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        let before = room.strokes.len();
        room.strokes.retain(|s| stroke_id(s) != Some(id));
        room.strokes.len() != before
    }

    /// Returns a copy of the room's stroke history, oldest first.
    pub async fn recent_strokes(&self, room_id: &str) -> Vec<Stroke> {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.strokes.iter().cloned().collect()
    }

    /// Records the latest cursor for `user_id`, replacing any previous one.
    pub async fn set_cursor(&self, room_id: &str, user_id: &str, cursor: CursorRecord) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.cursors.insert(user_id.to_owned(), cursor);
    }

    /// Returns a copy of the room's cursor records.
    pub async fn cursors(&self, room_id: &str) -> BTreeMap<String, CursorRecord> {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id.to_owned()).or_default().cursors.clone()
    }

    /// Marks `user_id` as present under `display_name`.
    pub async fn add_presence(&self, room_id: &str, user_id: &str, display_name: &str) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.presence.insert(user_id.to_owned(), display_name.to_owned());
    }

    /// Drops `user_id` from the roster. No-op if absent.
    pub async fn remove_presence(&self, room_id: &str, user_id: &str) {
        let mut rooms = self.rooms.lock().await;
        let room = rooms.entry(room_id.to_owned()).or_default();
        room.presence.remove(user_id);
    }

    /// Returns a copy of the roster: user_id → display_name.
    pub async fn presence_snapshot(&self, room_id: &str) -> BTreeMap<String, String> {
        let mut rooms = self.rooms.lock().await;
        rooms.entry(room_id.to_owned()).or_default().presence.clone()
    }

    /// Resets strokes, cursors and presence for the room.
    pub async fn clear(&self, room_id: &str) {
        let mut rooms = self.rooms.lock().await;
        rooms.insert(room_id.to_owned(), RoomState::default());
    }

    /// Returns the number of rooms materialized so far.
    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }
}
