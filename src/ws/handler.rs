//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::registry::OutboundRx;
use crate::game::RoomHandle;
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (room, connection) = match state.rooms.join().await {
        Ok(joined) => joined,
        Err(e) => {
            error!(error = %e, "Failed to place connection in a room");
            return;
        }
    };
    let player_id = connection.player_id;
    info!(player_id = %player_id, room_id = %room.id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    run_session(player_id, &room, ws_sink, ws_stream, connection.outbound).await;

    // Cleanup on disconnect
    if room.leave(player_id).await.is_err() {
        debug!(player_id = %player_id, room_id = %room.id, "Room already closed");
    }

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    room: &RoomHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut outbound: OutboundRx,
) {
    // Spawn writer task: room outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(payload) = outbound.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(payload.to_string())).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    // Reader loop: WebSocket -> room
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let intent = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg.into_intent(),
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };
                let Some(intent) = intent else {
                    warn!(player_id = %player_id, "Dropping malformed client message");
                    continue;
                };

                if room.submit(player_id, intent).await.is_err() {
                    debug!(player_id = %player_id, "Room closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}
