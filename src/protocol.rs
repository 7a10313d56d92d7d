use crate::error::HubResult;
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Inbound events, as sent by clients over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    #[serde(rename = "JOIN_STREAM")]
    Join {
        stream_id: ChannelId,
        user_id: ViewerId,
    },
    #[serde(rename = "LEAVE_STREAM")]
    Leave {
        stream_id: ChannelId,
        user_id: ViewerId,
    },
    #[serde(rename = "CHAT_MESSAGE")]
    Chat {
        stream_id: ChannelId,
        user_id: ViewerId,
        username: String,
        message: String,
    },
    #[serde(rename = "STREAM_START")]
    StartStream {
        stream_id: ChannelId,
        tournament_id: TournamentId,
        streamer_id: PublisherId,
        title: String,
        #[serde(default)]
        description: String,
    },
    #[serde(rename = "STREAM_END")]
    EndStream { stream_id: ChannelId },
    #[serde(rename = "VIEWER_COUNT")]
    QueryViewerCount { stream_id: ChannelId },
    #[serde(rename = "STREAM_STATS")]
    QueryStats { stream_id: ChannelId },
    /// Any well-formed frame whose `type` we don't know
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join { .. } => "join",
            ClientMessage::Leave { .. } => "leave",
            ClientMessage::Chat { .. } => "chat",
            ClientMessage::StartStream { .. } => "start_stream",
            ClientMessage::EndStream { .. } => "end_stream",
            ClientMessage::QueryViewerCount { .. } => "query_viewer_count",
            ClientMessage::QueryStats { .. } => "query_stats",
            ClientMessage::Unknown => "unknown",
        }
    }
}

/// Outbound events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Unicast confirmation to the joiner
    #[serde(rename = "STREAM_JOINED")]
    Joined {
        stream_id: ChannelId,
        viewer_count: usize,
    },
    #[serde(rename = "VIEWER_JOINED")]
    ViewerJoined {
        user_id: ViewerId,
        viewer_count: usize,
    },
    #[serde(rename = "VIEWER_LEFT")]
    ViewerLeft {
        user_id: ViewerId,
        viewer_count: usize,
    },
    #[serde(rename = "CHAT_MESSAGE")]
    Chat {
        user_id: ViewerId,
        username: String,
        message: String,
        #[serde(with = "chrono::serde::ts_milliseconds")]
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "STREAM_STARTED")]
    StreamStarted {
        stream_id: ChannelId,
        tournament_id: TournamentId,
        title: String,
        streamer_id: PublisherId,
    },
    #[serde(rename = "STREAM_ENDED")]
    StreamEnded { stream_id: ChannelId },
    #[serde(rename = "VIEWER_COUNT")]
    ViewerCount { stream_id: ChannelId, count: usize },
    #[serde(rename = "STREAM_STATS")]
    Stats {
        stream_id: ChannelId,
        stats: ChannelStats,
    },
}

/// Who an outbound event is addressed to
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Connection(ConnectionId),
    Channel(ChannelId),
    All,
}

/// An outbound event with its recipients resolved at emission time.
///
/// `recipients` is snapshotted inside the same critical section as the
/// mutation that produced the event.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub scope: Scope,
    pub recipients: Vec<ConnectionId>,
    pub message: Arc<ServerMessage>,
}

/// Parse a text frame into a client message
pub fn decode_client_message(text: &str) -> HubResult<ClientMessage> {
    Ok(serde_json::from_str(text)?)
}
