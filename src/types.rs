use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Opaque ID types, all externally supplied except `ConnectionId`
pub type ChannelId = String;
pub type ViewerId = String;
pub type PublisherId = String;
pub type TournamentId = String;
pub type ConnectionId = String;

/// Parameters of a stream start, as supplied by the publisher
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub id: ChannelId,
    pub tournament_id: TournamentId,
    pub owner_id: PublisherId,
    pub title: String,
    pub description: String,
}

/// One broadcast session
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: ChannelId,
    pub tournament_id: TournamentId,
    pub owner_id: PublisherId,
    pub title: String,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_live: bool,
    /// Highest viewer count seen during the current session
    pub peak_viewers: usize,
    /// Logical membership. Always empty once the channel has ended.
    pub viewer_ids: HashSet<ViewerId>,
}

impl Channel {
    pub fn viewer_count(&self) -> usize {
        self.viewer_ids.len()
    }

    /// Stats as of `now`. Duration keeps counting from the start even after end.
    pub fn stats_at(&self, now: DateTime<Utc>) -> ChannelStats {
        ChannelStats {
            viewer_count: self.viewer_count(),
            start_time: self.started_at,
            duration: (now - self.started_at).num_milliseconds().max(0),
            is_live: self.is_live,
        }
    }
}

/// Stats payload shared by the `STREAM_STATS` event and the HTTP stats route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStats {
    pub viewer_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    /// Milliseconds since `start_time`
    pub duration: i64,
    pub is_live: bool,
}

/// Channel metadata plus current viewer count (HTTP snapshots)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub tournament_id: TournamentId,
    pub streamer_id: PublisherId,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option", default)]
    pub end_time: Option<DateTime<Utc>>,
    pub is_live: bool,
    pub viewer_count: usize,
    pub peak_viewers: usize,
}

impl From<&Channel> for ChannelInfo {
    fn from(c: &Channel) -> Self {
        Self {
            id: c.id.clone(),
            tournament_id: c.tournament_id.clone(),
            streamer_id: c.owner_id.clone(),
            title: c.title.clone(),
            description: c.description.clone(),
            start_time: c.started_at,
            end_time: c.ended_at,
            is_live: c.is_live,
            viewer_count: c.viewer_count(),
            peak_viewers: c.peak_viewers,
        }
    }
}

/// Process-wide counters for the health route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub status: String,
    /// Every channel record the directory retains, live or ended
    pub active_streams: usize,
    pub total_viewers: usize,
    pub connections: usize,
}
