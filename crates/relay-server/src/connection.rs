//! Client connection handles and the write pump.

use std::time::Duration;

use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Opaque identifier of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Handle for queueing frames to one client.
///
/// Cloneable and cheap; wraps an `mpsc::Sender` drained by the write pump.
#[derive(Debug, Clone)]
pub struct Sender {
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Queues an already-encoded text frame.
    ///
    /// Never blocks. Fails if the queue is full or the write pump is gone.
    pub fn send_text(&self, text: &str) -> Result<(), SendError> {
        self.tx
            .try_send(WsMessage::Text(text.to_owned().into()))
            .map_err(|e| match e {
                TrySendError::Full(_) => SendError::Full,
                TrySendError::Closed(_) => SendError::Closed,
            })
    }

    /// Queues a control frame, dropping it if the queue is unavailable.
    pub(crate) fn send_control(&self, frame: WsMessage) {
        let _ = self.tx.try_send(frame);
    }

    /// Returns `true` if the write pump is still draining the queue.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when a frame cannot be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("send failed: buffer full")]
    Full,

    #[error("send failed: connection closed")]
    Closed,
}

/// An open client connection.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    sender: Sender,
    cancel: CancellationToken,
}

impl Connection {
    /// Creates a connection with a queue of `capacity` frames.
    ///
    /// Returns the receiving end, which the write pump drains.
    pub fn new(capacity: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<WsMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let conn = Self {
            id: ConnectionId::new(),
            sender: Sender { tx },
            cancel,
        };
        (conn, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns a cloneable [`Sender`] for this connection.
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    /// Returns the token that stops this connection's tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signals the connection's tasks to stop.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// How long the write pump waits for the close frame to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Write pump: drains the send queue and pings the client.
///
/// Cancellation is honoured while a write is in flight, so a peer that
/// stopped reading cannot pin the pump.
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<WsMessage>,
    cancel: CancellationToken,
    ping_period: Duration,
) where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(ping_period);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ping_interval.tick().await;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,

            msg = rx.recv() => match msg {
                Some(ws_msg) => ws_msg,
                None => break,
            },

            _ = ping_interval.tick() => WsMessage::Ping(Vec::new().into()),
        };

        tokio::select! {
            _ = cancel.cancelled() => break,

            result = sink.send(frame) => {
                if let Err(e) = result {
                    tracing::warn!("write pump send error: {e}");
                    break;
                }
            }
        }
    }

    // Closing the receiver makes further sends fail fast.
    rx.close();
    cancel.cancel();
    // Best-effort close frame; a stalled peer never takes it.
    if tokio::time::timeout(CLOSE_GRACE, sink.close()).await.is_err() {
        tracing::debug!("close frame not flushed, dropping socket");
    }
}
