//! WebSocket relay for SynCanvas rooms.
//!
//! Accepts browser clients on `/ws/{room_id}`, keeps track of which
//! connection sits in which room, and routes every inbound event through
//! the [`EventRouter`], which updates the shared room buffer and fans the
//! result out to the room.

mod connection;
mod registry;
mod router;
mod server;
mod session;

pub use connection::{Connection, ConnectionId, SendError, Sender};
pub use registry::{BroadcastReport, ConnectionMeta, ConnectionRegistry, DeliveryError};
pub use router::EventRouter;
pub use server::{RelayServer, ServerConfig};

/// Send buffer capacity per connection.
///
/// Cursor updates arrive many times per second per user; a peer that falls
/// this far behind is treated as gone.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the relay server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("upgrade path does not name a room")]
    InvalidPath,
}
