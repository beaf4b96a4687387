//! Arena Server - authoritative multiplayer shrinking-arena shooter
//!
//! Each arena runs as an independent room task that owns its entity store,
//! applies client intents, advances the simulation on a fixed tick and
//! streams full snapshots to every connected client over WebSocket.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;

use std::future::Future;

use tokio::net::TcpListener;
use tracing::info;

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;

/// Serve the game on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::new(config);
    let router = build_router(state);

    let addr = listener.local_addr()?;
    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
