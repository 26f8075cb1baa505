//! Live-connection upgrade handler.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};

use crate::{
    presence::{
        connection::{PresenceConnection, DEFAULT_OUTBOUND_BUFFER},
        handler::PresenceConnectionHandler,
    },
    state::AppState,
};

/// GET /live — upgrades to a live connection.
///
/// The connection is anonymous until the client sends an `authenticate`
/// frame carrying a session token.
pub async fn live(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_live_connection(state, socket))
}

/// Pumps frames between the socket and the connection's handler.
async fn handle_live_connection(state: AppState, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (connection, mut outbound_rx) = PresenceConnection::channel(DEFAULT_OUTBOUND_BUFFER);
    let conn_id = connection.id();

    tracing::info!(conn_id = %conn_id, "🔌 Live connection established");

    let writer_connection = connection.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                frame = outbound_rx.recv() => {
                    let Some(frame) = frame else { break };
                    let text = match frame.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!(conn_id = %conn_id, "❌ {}", e);
                            continue;
                        }
                    };
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        writer_connection.close();
                        break;
                    }
                }
                _ = writer_connection.closed() => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut handler = PresenceConnectionHandler::new(
        connection.clone(),
        state.presence.clone(),
        state.resolver.clone(),
        state.users.clone(),
    );

    loop {
        tokio::select! {
            _ = connection.closed() => break,
            message = ws_rx.next() => match message {
                Some(Ok(Message::Text(text))) => handler.on_frame(text.as_str()).await,
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(conn_id = %conn_id, error = %e, "Live connection error");
                    break;
                }
            },
        }
    }

    handler.finish().await;
    connection.close();
    if let Err(e) = writer.await {
        tracing::warn!(conn_id = %conn_id, "Live writer task failed: {}", e);
    }

    tracing::info!(conn_id = %conn_id, "👋 Live connection closed");
}
