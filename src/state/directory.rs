//! Channel directory: lifecycle, metadata and viewer identity sets

use crate::types::*;
use chrono::Utc;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or fully reset a channel and mark it live.
    ///
    /// Each call is a fresh start: a reused id loses all prior metadata and
    /// viewers, even if it was still live.
    pub fn start_channel(&mut self, new: NewChannel) -> Channel {
        let channel = Channel {
            id: new.id.clone(),
            tournament_id: new.tournament_id,
            owner_id: new.owner_id,
            title: new.title,
            description: new.description,
            started_at: Utc::now(),
            ended_at: None,
            is_live: true,
            peak_viewers: 0,
            viewer_ids: HashSet::new(),
        };

        if let Some(previous) = self.channels.insert(new.id, channel.clone()) {
            tracing::debug!(
                channel_id = %channel.id,
                was_live = previous.is_live,
                stale_viewers = previous.viewer_count(),
                "Channel id reused, prior session discarded"
            );
        }

        channel
    }

    /// Mark a channel ended and evict its viewers. Returns true only if the
    /// channel was live; unknown or already ended channels are left untouched.
    pub fn end_channel(&mut self, channel_id: &str) -> bool {
        match self.channels.get_mut(channel_id) {
            Some(channel) if channel.is_live => {
                channel.is_live = false;
                channel.ended_at = Some(Utc::now());
                channel.viewer_ids.clear();
                true
            }
            _ => false,
        }
    }

    /// Add a viewer identity and return the resulting count.
    ///
    /// Only live channels track viewers: for an unknown or ended channel the
    /// join is tolerated but nothing is recorded and the count is 0.
    pub fn add_viewer(&mut self, channel_id: &str, viewer_id: ViewerId) -> usize {
        match self.channels.get_mut(channel_id) {
            Some(channel) if channel.is_live => {
                channel.viewer_ids.insert(viewer_id);
                let count = channel.viewer_count();
                channel.peak_viewers = channel.peak_viewers.max(count);
                count
            }
            _ => 0,
        }
    }

    /// Remove a viewer identity (absent is fine) and return the resulting count
    pub fn remove_viewer(&mut self, channel_id: &str, viewer_id: &str) -> usize {
        match self.channels.get_mut(channel_id) {
            Some(channel) => {
                channel.viewer_ids.remove(viewer_id);
                channel.viewer_count()
            }
            None => 0,
        }
    }

    /// Current viewer count, 0 for unknown channels
    pub fn viewer_count(&self, channel_id: &str) -> usize {
        self.channels
            .get(channel_id)
            .map(Channel::viewer_count)
            .unwrap_or(0)
    }

    pub fn stats(&self, channel_id: &str) -> Option<ChannelStats> {
        self.channels
            .get(channel_id)
            .map(|c| c.stats_at(Utc::now()))
    }

    pub fn is_live(&self, channel_id: &str) -> bool {
        self.channels
            .get(channel_id)
            .map(|c| c.is_live)
            .unwrap_or(false)
    }

    pub fn get(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.get(channel_id)
    }

    pub fn live_channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values().filter(|c| c.is_live)
    }

    /// Number of channel records, ended ones included
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn total_viewers(&self) -> usize {
        self.channels.values().map(Channel::viewer_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_channel(id: &str) -> NewChannel {
        NewChannel {
            id: id.to_string(),
            tournament_id: "t1".to_string(),
            owner_id: "pub1".to_string(),
            title: "Finals".to_string(),
            description: "desc".to_string(),
        }
    }

    #[test]
    fn test_start_channel_is_live_and_empty() {
        let mut directory = ChannelDirectory::new();
        let channel = directory.start_channel(new_channel("s1"));

        assert!(channel.is_live);
        assert_eq!(channel.viewer_count(), 0);
        assert!(channel.ended_at.is_none());
        assert!(directory.is_live("s1"));
    }

    #[test]
    fn test_add_viewer_is_idempotent() {
        let mut directory = ChannelDirectory::new();
        directory.start_channel(new_channel("s1"));

        assert_eq!(directory.add_viewer("s1", "v1".into()), 1);
        assert_eq!(directory.add_viewer("s1", "v1".into()), 1);
        assert_eq!(directory.add_viewer("s1", "v2".into()), 2);
        assert_eq!(directory.remove_viewer("s1", "v1"), 1);
        assert_eq!(directory.remove_viewer("s1", "v1"), 1);
        assert_eq!(directory.viewer_count("s1"), 1);
    }

    #[test]
    fn test_unknown_channel_tolerates_viewers_without_record() {
        let mut directory = ChannelDirectory::new();

        assert_eq!(directory.add_viewer("ghost", "v1".into()), 0);
        assert_eq!(directory.remove_viewer("ghost", "v1"), 0);
        assert!(directory.get("ghost").is_none());
        assert!(directory.stats("ghost").is_none());
    }

    #[test]
    fn test_end_channel_evicts_viewers_and_keeps_metadata() {
        let mut directory = ChannelDirectory::new();
        let started = directory.start_channel(new_channel("s1"));
        directory.add_viewer("s1", "v1".into());

        assert!(directory.end_channel("s1"));
        assert!(!directory.end_channel("s1"));
        assert!(!directory.end_channel("ghost"));

        let channel = directory.get("s1").unwrap();
        assert!(!channel.is_live);
        assert!(channel.ended_at.is_some());
        assert_eq!(channel.started_at, started.started_at);
        assert_eq!(channel.title, "Finals");
        assert_eq!(channel.viewer_count(), 0);
        assert_eq!(channel.peak_viewers, 1);

        // No presence tracking after end
        assert_eq!(directory.add_viewer("s1", "v2".into()), 0);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut directory = ChannelDirectory::new();
        directory.start_channel(new_channel("s1"));
        directory.add_viewer("s1", "v1".into());
        directory.add_viewer("s1", "v2".into());

        // Restart while still live: latest start wins
        let mut second = new_channel("s1");
        second.title = "Rematch".to_string();
        directory.start_channel(second);

        let channel = directory.get("s1").unwrap();
        assert_eq!(channel.title, "Rematch");
        assert_eq!(channel.viewer_count(), 0);
        assert_eq!(channel.peak_viewers, 0);

        // Restart after end
        directory.add_viewer("s1", "v3".into());
        directory.end_channel("s1");
        directory.start_channel(new_channel("s1"));
        assert!(directory.is_live("s1"));
        assert_eq!(directory.viewer_count("s1"), 0);
        assert!(directory.get("s1").unwrap().ended_at.is_none());
    }

    #[test]
    fn test_stats_and_totals() {
        let mut directory = ChannelDirectory::new();
        directory.start_channel(new_channel("s1"));
        directory.start_channel(new_channel("s2"));
        directory.add_viewer("s1", "v1".into());
        directory.add_viewer("s2", "v1".into());
        directory.add_viewer("s2", "v2".into());
        directory.end_channel("s2");

        let stats = directory.stats("s1").unwrap();
        assert_eq!(stats.viewer_count, 1);
        assert!(stats.is_live);
        assert!(stats.duration >= 0);

        let ended = directory.stats("s2").unwrap();
        assert!(!ended.is_live);
        assert_eq!(ended.viewer_count, 0);

        assert_eq!(directory.len(), 2);
        assert_eq!(directory.total_viewers(), 1);
        assert_eq!(directory.live_channels().count(), 1);
    }
}
