//! Relay WebSocket server.
//!
//! Listens on a TCP port and upgrades `GET /ws/{room_id}` to WebSocket.
//! Every accepted connection gets its own session task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use syncanvas_protocol::constants::{
    DEFAULT_MAX_STROKES_PER_ROOM, WS_MAX_MESSAGE_SIZE, WS_PATH_PREFIX, WS_PING_PERIOD,
};
use syncanvas_room_state::RoomStateBuffer;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::registry::ConnectionRegistry;
use crate::router::EventRouter;
use crate::session::{SessionParams, run_session};
use crate::{SEND_BUFFER_SIZE, ServerError};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub host: String,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Stroke history cap per room.
    pub max_strokes_per_room: usize,
    /// Outbound frames queued per connection before it counts as stalled.
    pub send_buffer_size: usize,
    /// Keepalive ping period.
    pub ping_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 0,
            max_strokes_per_room: DEFAULT_MAX_STROKES_PER_ROOM,
            send_buffer_size: SEND_BUFFER_SIZE,
            ping_interval: WS_PING_PERIOD,
        }
    }
}

/// The relay server.
///
/// Owns the connection registry and room buffer shared by every session.
pub struct RelayServer {
    config: ServerConfig,
    router: Arc<EventRouter>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl RelayServer {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let registry = Arc::new(ConnectionRegistry::new());
        let buffer = Arc::new(RoomStateBuffer::new(config.max_strokes_per_room));
        Arc::new(Self {
            config,
            router: Arc::new(EventRouter::new(registry, buffer)),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.router.registry()
    }

    pub fn buffer(&self) -> &Arc<RoomStateBuffer> {
        self.router.buffer()
    }

    /// Gracefully shuts down the server and every session.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the accept loop until [`shutdown`](Self::shutdown).
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("relay server listening on {local_addr}");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::warn!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        }
    }

    /// Upgrades one TCP connection and runs its session.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut room_id = None;
        let on_request = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            match room_from_path(req.uri().path()) {
                Some(room) => {
                    room_id = Some(room.to_owned());
                    Ok(resp)
                }
                None => {
                    tracing::warn!(%peer_addr, path = %req.uri().path(), "rejecting upgrade: unknown path");
                    let mut err = ErrorResponse::new(Some("not found".into()));
                    *err.status_mut() = StatusCode::NOT_FOUND;
                    Err(err)
                }
            }
        };

        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        let ws_stream = accept_hdr_async_with_config(stream, on_request, Some(ws_config)).await?;

        let Some(room_id) = room_id else {
            return Err(ServerError::InvalidPath);
        };

        let params = SessionParams {
            send_buffer_size: self.config.send_buffer_size,
            ping_period: self.config.ping_interval,
            max_message_size: WS_MAX_MESSAGE_SIZE,
        };
        run_session(
            ws_stream,
            room_id,
            peer_addr,
            Arc::clone(&self.router),
            &self.cancel,
            params,
        )
        .await;
        Ok(())
    }
}

/// Extracts the room key from an upgrade path of the form `/ws/{room_id}`.
fn room_from_path(path: &str) -> Option<&str> {
    path.strip_prefix(WS_PATH_PREFIX)
        .filter(|room| !room.is_empty() && !room.contains('/'))
}
