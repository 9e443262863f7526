//! Connection registry: which connections are live in which room.
//!
//! Identity metadata (`user_id`, `display_name`) is self-declared by the
//! client through `join` and is not authenticated in any way.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use crate::connection::{Connection, ConnectionId, SendError, Sender};

/// Mutable metadata attached to a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionMeta {
    pub room_id: String,
    pub user_id: Option<String>,
    pub display_name: Option<String>,
}

/// Error returned by [`ConnectionRegistry::send_personal`].
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection {0} is not registered")]
    NotRegistered(ConnectionId),

    #[error("delivery to connection {connection} failed: {source}")]
    Failed {
        connection: ConnectionId,
        #[source]
        source: SendError,
    },
}

/// Outcome of a fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

struct Entry {
    connection: Connection,
    meta: ConnectionMeta,
}

#[derive(Default)]
struct RegistryState {
    /// room_id → live connections.
    rooms: HashMap<String, HashSet<ConnectionId>>,
    connections: HashMap<ConnectionId, Entry>,
}

/// Tracks live connections per room and delivers frames to them.
///
/// A failed delivery is terminal for that connection: it is unregistered
/// and its tasks are cancelled. Failures never propagate to other
/// recipients.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an open connection to `room_id` with no identity yet.
    pub async fn register(&self, room_id: &str, connection: Connection) {
        let id = connection.id();
        let mut state = self.inner.write().await;
        state.rooms.entry(room_id.to_owned()).or_default().insert(id);
        state.connections.insert(
            id,
            Entry {
                connection,
                meta: ConnectionMeta {
                    room_id: room_id.to_owned(),
                    ..ConnectionMeta::default()
                },
            },
        );
        tracing::info!(connection = %id, room = %room_id, "connection registered");
    }

    /// Removes a connection and cancels its tasks.
    ///
    /// Idempotent; returns `false` if the connection was not registered.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut state = self.inner.write().await;
        let Some(entry) = state.connections.remove(&id) else {
            return false;
        };

        let room_id = entry.meta.room_id;
        if let Some(members) = state.rooms.get_mut(&room_id) {
            members.remove(&id);
            if members.is_empty() {
                state.rooms.remove(&room_id);
            }
        }
        drop(state);

        entry.connection.close();
        tracing::info!(connection = %id, room = %room_id, "connection unregistered");
        true
    }

    /// Records the identity a client declared on `join`.
    pub async fn set_identity(&self, id: ConnectionId, user_id: &str, display_name: &str) {
        let mut state = self.inner.write().await;
        if let Some(entry) = state.connections.get_mut(&id) {
            entry.meta.user_id = Some(user_id.to_owned());
            entry.meta.display_name = Some(display_name.to_owned());
        }
    }

    /// Forgets the identity declared by a client; the connection stays in its room.
    pub async fn clear_identity(&self, id: ConnectionId) {
        let mut state = self.inner.write().await;
        if let Some(entry) = state.connections.get_mut(&id) {
            entry.meta.user_id = None;
            entry.meta.display_name = None;
        }
    }

    /// Returns a copy of the connection's metadata.
    pub async fn meta(&self, id: ConnectionId) -> Option<ConnectionMeta> {
        self.inner
            .read()
            .await
            .connections
            .get(&id)
            .map(|e| e.meta.clone())
    }

    /// Delivers a text frame to exactly one connection.
    ///
    /// On failure the connection is unregistered before the error is returned.
    pub async fn send_personal(&self, id: ConnectionId, text: &str) -> Result<(), DeliveryError> {
        let sender = {
            let state = self.inner.read().await;
            match state.connections.get(&id) {
                Some(entry) => entry.connection.sender(),
                None => return Err(DeliveryError::NotRegistered(id)),
            }
        };

        if let Err(source) = sender.send_text(text) {
            self.unregister(id).await;
            return Err(DeliveryError::Failed {
                connection: id,
                source,
            });
        }
        Ok(())
    }

    /// Delivers a text frame to every connection in `room_id` not in `exclude`.
    ///
    /// Iterates a snapshot of the membership taken before the first send.
    pub async fn broadcast(
        &self,
        room_id: &str,
        text: &str,
        exclude: &[ConnectionId],
    ) -> BroadcastReport {
        let targets: Vec<(ConnectionId, Sender)> = {
            let state = self.inner.read().await;
            let Some(members) = state.rooms.get(room_id) else {
                return BroadcastReport::default();
            };
            members
                .iter()
                .filter(|id| !exclude.contains(id))
                .filter_map(|id| {
                    state
                        .connections
                        .get(id)
                        .map(|e| (*id, e.connection.sender()))
                })
                .collect()
        };

        let mut report = BroadcastReport::default();
        for (id, sender) in targets {
            match sender.send_text(text) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(connection = %id, room = %room_id, "broadcast delivery failed: {e}");
                    self.unregister(id).await;
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Returns the connections currently registered in `room_id`.
    pub async fn room_members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.inner
            .read()
            .await
            .rooms
            .get(room_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the connection is registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.inner.read().await.connections.contains_key(&id)
    }

    /// Returns the number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    /// Returns the number of rooms with at least one live connection.
    pub async fn room_count(&self) -> usize {
        self.inner.read().await.rooms.len()
    }
}
