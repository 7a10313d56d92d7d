use super::AppState;
use crate::types::*;

impl AppState {
    /// Live channels with their current viewer counts
    pub async fn live_channels(&self) -> Vec<ChannelInfo> {
        let hub = self.hub.lock().await;
        let mut channels: Vec<ChannelInfo> =
            hub.channels.live_channels().map(ChannelInfo::from).collect();
        channels.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        channels
    }

    /// Metadata and viewer count for one channel, live or ended
    pub async fn channel_info(&self, channel_id: &str) -> Option<ChannelInfo> {
        self.hub
            .lock()
            .await
            .channels
            .get(channel_id)
            .map(ChannelInfo::from)
    }

    pub async fn channel_stats(&self, channel_id: &str) -> Option<ChannelStats> {
        self.hub.lock().await.channels.stats(channel_id)
    }

    pub async fn health(&self) -> HealthSnapshot {
        let hub = self.hub.lock().await;
        HealthSnapshot {
            status: "OK".to_string(),
            active_streams: hub.channels.len(),
            total_viewers: hub.channels.total_viewers(),
            connections: hub.connections.len(),
        }
    }
}
