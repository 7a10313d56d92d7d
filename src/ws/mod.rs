pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut outbound_rx) = state.connect().await;

    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    loop {
        tokio::select! {
            // Events routed to this connection
            outbound = outbound_rx.recv() => {
                let Some(msg) = outbound else {
                    // Removed from the registry (server draining)
                    tracing::debug!(conn_id = %conn_id, "Outbound queue closed");
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                match serde_json::to_string(msg.as_ref()) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            tracing::debug!(conn_id = %conn_id, "Failed to write to socket");
                            break;
                        }
                    }
                    Err(e) => tracing::error!(conn_id = %conn_id, "Failed to serialize event: {}", e),
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        handlers::handle_frame(&state, &conn_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(conn_id = %conn_id, "WebSocket closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(conn_id = %conn_id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&conn_id).await;
    tracing::info!(conn_id = %conn_id, "WebSocket connection closed");
}
