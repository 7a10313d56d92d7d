//! Live connection registry
//!
//! Owns one record per connection id. Callers never get a mutable alias to a
//! record; all mutation goes through the methods below.

use crate::protocol::ServerMessage;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sender half of a connection's outbound queue. The transport task owns the
/// receiving half; the registry only uses this to address sends.
pub type ConnectionHandle = mpsc::Sender<Arc<ServerMessage>>;

#[derive(Debug)]
struct Connection {
    handle: ConnectionHandle,
    channel_id: Option<ChannelId>,
    viewer_id: Option<ViewerId>,
    /// Channel this connection started and owns, if any
    publishing: Option<ChannelId>,
}

impl Connection {
    fn subscribes_to(&self, channel_id: &str) -> bool {
        self.channel_id.as_deref() == Some(channel_id)
            || self.publishing.as_deref() == Some(channel_id)
    }
}

/// Last known state of a connection, returned on unregister
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionSnapshot {
    pub channel_id: Option<ChannelId>,
    pub viewer_id: Option<ViewerId>,
    pub published_channel: Option<ChannelId>,
}

impl ConnectionSnapshot {
    pub fn is_publisher(&self) -> bool {
        self.published_channel.is_some()
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new connection with no channel and no role
    pub fn register(&mut self, handle: ConnectionHandle) -> ConnectionId {
        let id = ulid::Ulid::new().to_string();
        self.connections.insert(
            id.clone(),
            Connection {
                handle,
                channel_id: None,
                viewer_id: None,
                publishing: None,
            },
        );
        id
    }

    /// Overwrite the connection's viewer membership. Does not leave the
    /// previous channel; that is the router's job.
    pub fn set_membership(&mut self, id: &str, channel_id: ChannelId, viewer_id: ViewerId) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.channel_id = Some(channel_id);
            conn.viewer_id = Some(viewer_id);
        }
    }

    /// Clear viewer membership, but only if it still matches `(channel_id, viewer_id)`.
    /// Returns whether anything was cleared.
    pub fn clear_membership(&mut self, id: &str, channel_id: &str, viewer_id: &str) -> bool {
        match self.connections.get_mut(id) {
            Some(conn)
                if conn.channel_id.as_deref() == Some(channel_id)
                    && conn.viewer_id.as_deref() == Some(viewer_id) =>
            {
                conn.channel_id = None;
                conn.viewer_id = None;
                true
            }
            _ => false,
        }
    }

    /// Current `(channel, viewer)` membership of a connection
    pub fn membership(&self, id: &str) -> Option<(ChannelId, ViewerId)> {
        let conn = self.connections.get(id)?;
        Some((conn.channel_id.clone()?, conn.viewer_id.clone()?))
    }

    /// Flag the connection as the owning publisher of `channel_id`
    pub fn mark_publisher(&mut self, id: &str, channel_id: ChannelId) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.publishing = Some(channel_id);
        }
    }

    /// Drop every publisher claim on `channel_id`. Returns how many were cleared.
    pub fn release_publishers(&mut self, channel_id: &str) -> usize {
        let mut released = 0;
        for conn in self.connections.values_mut() {
            if conn.publishing.as_deref() == Some(channel_id) {
                conn.publishing = None;
                released += 1;
            }
        }
        released
    }

    /// Detach every viewer membership pointing at `channel_id`, so nothing
    /// routes to it by membership anymore. Returns how many were detached.
    pub fn detach_viewers(&mut self, channel_id: &str) -> usize {
        let mut detached = 0;
        for conn in self.connections.values_mut() {
            if conn.channel_id.as_deref() == Some(channel_id) {
                conn.channel_id = None;
                conn.viewer_id = None;
                detached += 1;
            }
        }
        detached
    }

    /// Viewer ids of every connection whose membership points at `channel_id`
    pub fn viewers_in_channel(&self, channel_id: &str) -> Vec<ViewerId> {
        self.connections
            .values()
            .filter(|c| c.channel_id.as_deref() == Some(channel_id))
            .filter_map(|c| c.viewer_id.clone())
            .collect()
    }

    /// Remove the connection and return its last known state.
    /// After this the connection is no longer addressable.
    pub fn unregister(&mut self, id: &str) -> Option<ConnectionSnapshot> {
        let conn = self.connections.remove(id)?;
        Some(ConnectionSnapshot {
            channel_id: conn.channel_id,
            viewer_id: conn.viewer_id,
            published_channel: conn.publishing,
        })
    }

    /// Connections subscribed to `channel_id`, as viewer or as its publisher
    pub fn connections_in_channel(&self, channel_id: &str) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, c)| c.subscribes_to(channel_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn all_connections(&self) -> Vec<ConnectionId> {
        self.connections.keys().cloned().collect()
    }

    pub fn handle(&self, id: &str) -> Option<&ConnectionHandle> {
        self.connections.get(id).map(|c| &c.handle)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Remove every connection, dropping their handles. Returns how many were removed.
    pub fn drain(&mut self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> ConnectionHandle {
        mpsc::channel(4).0
    }

    #[test]
    fn test_register_starts_unjoined() {
        let mut registry = ConnectionRegistry::new();
        let id = registry.register(handle());

        assert!(registry.contains(&id));
        assert_eq!(registry.membership(&id), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_membership_overwrites() {
        let mut registry = ConnectionRegistry::new();
        let id = registry.register(handle());

        registry.set_membership(&id, "s1".into(), "v1".into());
        registry.set_membership(&id, "s2".into(), "v1".into());

        assert_eq!(registry.membership(&id), Some(("s2".into(), "v1".into())));
        assert!(registry.connections_in_channel("s1").is_empty());
        assert_eq!(registry.connections_in_channel("s2"), vec![id]);
    }

    #[test]
    fn test_clear_membership_only_on_match() {
        let mut registry = ConnectionRegistry::new();
        let id = registry.register(handle());
        registry.set_membership(&id, "s1".into(), "v1".into());

        assert!(!registry.clear_membership(&id, "s2", "v1"));
        assert!(!registry.clear_membership(&id, "s1", "v2"));
        assert!(registry.clear_membership(&id, "s1", "v1"));
        assert_eq!(registry.membership(&id), None);
    }

    #[test]
    fn test_publisher_is_subscribed_to_its_channel() {
        let mut registry = ConnectionRegistry::new();
        let publisher = registry.register(handle());
        let viewer = registry.register(handle());

        registry.mark_publisher(&publisher, "s1".into());
        registry.set_membership(&viewer, "s1".into(), "v1".into());

        let mut members = registry.connections_in_channel("s1");
        members.sort();
        let mut expected = vec![publisher.clone(), viewer];
        expected.sort();
        assert_eq!(members, expected);

        // Publishing does not make it a viewer
        assert_eq!(registry.membership(&publisher), None);
    }

    #[test]
    fn test_unregister_returns_snapshot() {
        let mut registry = ConnectionRegistry::new();
        let id = registry.register(handle());
        registry.set_membership(&id, "s1".into(), "v1".into());
        registry.mark_publisher(&id, "s2".into());

        let snapshot = registry.unregister(&id).unwrap();
        assert_eq!(snapshot.channel_id.as_deref(), Some("s1"));
        assert_eq!(snapshot.viewer_id.as_deref(), Some("v1"));
        assert_eq!(snapshot.published_channel.as_deref(), Some("s2"));
        assert!(snapshot.is_publisher());

        assert!(registry.handle(&id).is_none());
        assert!(registry.unregister(&id).is_none());
    }

    #[test]
    fn test_detach_and_release() {
        let mut registry = ConnectionRegistry::new();
        let a = registry.register(handle());
        let b = registry.register(handle());
        let c = registry.register(handle());
        registry.set_membership(&a, "s1".into(), "v1".into());
        registry.set_membership(&b, "s1".into(), "v2".into());
        registry.set_membership(&c, "s2".into(), "v3".into());
        registry.mark_publisher(&c, "s1".into());

        assert_eq!(registry.detach_viewers("s1"), 2);
        assert_eq!(registry.connections_in_channel("s1"), vec![c.clone()]);
        assert_eq!(registry.release_publishers("s1"), 1);
        assert!(registry.connections_in_channel("s1").is_empty());
        assert_eq!(registry.membership(&c), Some(("s2".into(), "v3".into())));
    }

    #[test]
    fn test_viewers_in_channel_ignores_publishers() {
        let mut registry = ConnectionRegistry::new();
        let a = registry.register(handle());
        let b = registry.register(handle());
        let publisher = registry.register(handle());
        registry.set_membership(&a, "s1".into(), "v1".into());
        registry.set_membership(&b, "s2".into(), "v2".into());
        registry.mark_publisher(&publisher, "s1".into());

        assert_eq!(registry.viewers_in_channel("s1"), vec!["v1".to_string()]);
        assert!(registry.viewers_in_channel("s3").is_empty());
    }

    #[test]
    fn test_drain_removes_everything() {
        let mut registry = ConnectionRegistry::new();
        registry.register(handle());
        registry.register(handle());

        assert_eq!(registry.drain(), 2);
        assert!(registry.is_empty());
    }
}
