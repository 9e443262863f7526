//! One client session: register, replay room state, route frames, clean up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::connection::{self, Connection, ConnectionId, Sender};
use crate::router::EventRouter;

/// Per-session tuning taken from the server config.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SessionParams {
    pub send_buffer_size: usize,
    pub ping_period: Duration,
    pub max_message_size: usize,
}

/// Drives a WebSocket session until the client goes away or the server
/// shuts down.
///
/// The connection is unregistered exactly once on exit, however the
/// session ended.
pub(crate) async fn run_session<S>(
    ws_stream: S,
    room_id: String,
    peer_addr: SocketAddr,
    router: Arc<EventRouter>,
    server_cancel: &CancellationToken,
    params: SessionParams,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
{
    let (conn, rx) = Connection::new(params.send_buffer_size, server_cancel.child_token());
    let id = conn.id();
    let sender = conn.sender();
    let cancel = conn.cancel_token();

    let (ws_sink, ws_stream) = ws_stream.split();
    let writer = tokio::spawn(connection::write_pump(
        ws_sink,
        rx,
        cancel.clone(),
        params.ping_period,
    ));

    router.registry().register(&room_id, conn).await;
    tracing::info!(%peer_addr, connection = %id, room = %room_id, "session started");

    // Late joiners see the board before any live event.
    router.send_snapshot(&room_id, id).await;

    read_loop(ws_stream, &room_id, id, &sender, &router, &cancel, params.max_message_size).await;

    router.registry().unregister(id).await;
    cancel.cancel();
    if let Err(e) = writer.await {
        tracing::error!(connection = %id, "write pump task failed: {e}");
    }
    tracing::info!(%peer_addr, connection = %id, room = %room_id, "session ended");
}

/// Reads frames and routes them one at a time, in arrival order.
async fn read_loop<S>(
    mut stream: S,
    room_id: &str,
    id: ConnectionId,
    sender: &Sender,
    router: &EventRouter,
    cancel: &CancellationToken,
    max_message_size: usize,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if text.len() > max_message_size {
                            tracing::warn!(connection = %id, "message exceeds max size ({} > {max_message_size})", text.len());
                            continue;
                        }
                        router.route(room_id, id, text.as_str()).await;
                    }
                    Some(Ok(WsMessage::Binary(data))) => {
                        tracing::warn!(connection = %id, len = data.len(), "ignoring binary frame");
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        sender.send_control(WsMessage::Pong(data));
                    }
                    Some(Ok(WsMessage::Pong(_))) | Some(Ok(WsMessage::Frame(_))) => {}
                    Some(Ok(WsMessage::Close(_))) => {
                        tracing::debug!(connection = %id, "received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection = %id, "read error: {e}");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
}
