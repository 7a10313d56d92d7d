//! Inbound frame handling
//!
//! Decodes a text frame and hands the event to the hub. Malformed frames are
//! logged and dropped; the connection stays open.

use crate::protocol::decode_client_message;
use crate::state::AppState;
use std::sync::Arc;

/// Handle one text frame from `conn_id`. Returns false if it was dropped as malformed.
pub async fn handle_frame(state: &Arc<AppState>, conn_id: &str, text: &str) -> bool {
    tracing::debug!(conn_id, "Received message: {}", text);

    match decode_client_message(text) {
        Ok(msg) => {
            let kind = msg.kind();
            let sent = state.handle(conn_id, msg).await;
            tracing::debug!(conn_id, kind, sent, "Event handled");
            true
        }
        Err(e) => {
            tracing::warn!(conn_id, "Failed to parse client message: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ServerMessage;

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let state = Arc::new(AppState::new());
        let (conn_id, mut rx) = state.connect().await;

        assert!(!handle_frame(&state, &conn_id, "{not json").await);
        assert!(!handle_frame(&state, &conn_id, r#"{"type":"JOIN_STREAM"}"#).await);
        assert_eq!(state.health().await.connections, 1);

        // Still usable afterwards
        assert!(
            handle_frame(
                &state,
                &conn_id,
                r#"{"type":"VIEWER_COUNT","streamId":"s1"}"#
            )
            .await
        );
        assert_eq!(
            *rx.recv().await.unwrap(),
            ServerMessage::ViewerCount {
                stream_id: "s1".to_string(),
                count: 0
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_type_is_accepted_and_ignored() {
        let state = Arc::new(AppState::new());
        let (conn_id, mut rx) = state.connect().await;

        assert!(handle_frame(&state, &conn_id, r#"{"type":"PING_ME"}"#).await);
        assert!(rx.try_recv().is_err());
    }
}
