//! Wires the relay server to process signals.

use std::sync::Arc;

use syncanvas_relay_server::RelayServer;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Runs the relay until Ctrl-C or a fatal server error.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let server = RelayServer::new(config.server_config());
    let server_run = Arc::clone(&server);
    let server_cancel = cancel.clone();
    let server_task = tokio::spawn(async move {
        let result = server_run.run().await;
        // A failed bind ends the process instead of idling.
        server_cancel.cancel();
        result
    });

    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("server stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received, shutting down");
        }
    }

    server.shutdown();
    server_task.await??;
    Ok(())
}
