//! Event router: the per-connection protocol state machine.
//!
//! Every entry point takes `&mut Hub`, so the caller holds the hub lock for the
//! whole event. Recipients are resolved at the moment each event is emitted,
//! which matters when one inbound event produces several outbound ones (a
//! disconnect's leave must reach the channel before its end detaches everyone).

use crate::protocol::{ClientMessage, Outbound, Scope, ServerMessage};
use crate::state::Hub;
use crate::types::*;
use chrono::Utc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct EventRouter {
    max_chat_chars: usize,
}

impl EventRouter {
    pub fn new(max_chat_chars: usize) -> Self {
        Self { max_chat_chars }
    }

    /// Apply one inbound event from `from` and return what to send
    pub fn route(&self, hub: &mut Hub, from: &str, msg: ClientMessage) -> Vec<Outbound> {
        let mut out = Vec::new();

        if !hub.connections.contains(from) {
            tracing::warn!(
                conn_id = from,
                kind = msg.kind(),
                "Event from unregistered connection dropped"
            );
            return out;
        }

        match msg {
            ClientMessage::Join { stream_id, user_id } => {
                self.join(hub, &mut out, from, stream_id, user_id)
            }

            ClientMessage::Leave { stream_id, user_id } => {
                hub.connections.clear_membership(from, &stream_id, &user_id);
                self.leave(hub, &mut out, stream_id, user_id)
            }

            ClientMessage::Chat {
                stream_id,
                user_id,
                username,
                message,
            } => self.chat(hub, &mut out, stream_id, user_id, username, message),

            ClientMessage::StartStream {
                stream_id,
                tournament_id,
                streamer_id,
                title,
                description,
            } => self.start(
                hub,
                &mut out,
                from,
                NewChannel {
                    id: stream_id,
                    tournament_id,
                    owner_id: streamer_id,
                    title,
                    description,
                },
            ),

            ClientMessage::EndStream { stream_id } => self.end(hub, &mut out, &stream_id),

            ClientMessage::QueryViewerCount { stream_id } => {
                let count = hub.channels.viewer_count(&stream_id);
                unicast(&mut out, from, ServerMessage::ViewerCount { stream_id, count });
            }

            ClientMessage::QueryStats { stream_id } => match hub.channels.stats(&stream_id) {
                Some(stats) => unicast(&mut out, from, ServerMessage::Stats { stream_id, stats }),
                None => tracing::debug!(channel_id = %stream_id, "Stats requested for unknown channel"),
            },

            ClientMessage::Unknown => {
                tracing::warn!(conn_id = from, "Unrecognized event type dropped");
            }
        }

        out
    }

    /// Remove a closed connection and synthesize the leave and end it can no
    /// longer send. Runs both independently: a publisher may also be a viewer.
    pub fn disconnect(&self, hub: &mut Hub, conn_id: &str) -> Vec<Outbound> {
        let mut out = Vec::new();

        let Some(snapshot) = hub.connections.unregister(conn_id) else {
            return out;
        };

        tracing::info!(
            conn_id,
            channel_id = ?snapshot.channel_id,
            viewer_id = ?snapshot.viewer_id,
            published = ?snapshot.published_channel,
            "Reconciling disconnect"
        );

        if let (Some(channel_id), Some(viewer_id)) = (snapshot.channel_id, snapshot.viewer_id) {
            self.leave(hub, &mut out, channel_id, viewer_id);
        }

        if let Some(channel_id) = snapshot.published_channel {
            if hub.channels.is_live(&channel_id) {
                self.end(hub, &mut out, &channel_id);
            }
        }

        out
    }

    fn join(
        &self,
        hub: &mut Hub,
        out: &mut Vec<Outbound>,
        from: &str,
        channel_id: ChannelId,
        viewer_id: ViewerId,
    ) {
        // One membership per connection: leave the old one first so it doesn't leak
        if let Some((prev_channel, prev_viewer)) = hub.connections.membership(from) {
            if prev_channel != channel_id || prev_viewer != viewer_id {
                hub.connections.clear_membership(from, &prev_channel, &prev_viewer);
                self.leave(hub, out, prev_channel, prev_viewer);
            }
        }

        hub.connections.set_membership(from, channel_id.clone(), viewer_id.clone());
        let viewer_count = hub.channels.add_viewer(&channel_id, viewer_id.clone());

        tracing::info!(
            conn_id = from,
            channel_id = %channel_id,
            viewer_id = %viewer_id,
            viewer_count,
            "Viewer joined"
        );

        unicast(
            out,
            from,
            ServerMessage::Joined {
                stream_id: channel_id.clone(),
                viewer_count,
            },
        );
        // The joiner is already a member here, so it sees its own join too
        to_channel(
            out,
            hub,
            &channel_id,
            ServerMessage::ViewerJoined {
                user_id: viewer_id,
                viewer_count,
            },
        );
    }

    fn leave(
        &self,
        hub: &mut Hub,
        out: &mut Vec<Outbound>,
        channel_id: ChannelId,
        viewer_id: ViewerId,
    ) {
        let viewer_count = hub.channels.remove_viewer(&channel_id, &viewer_id);

        tracing::info!(
            channel_id = %channel_id,
            viewer_id = %viewer_id,
            viewer_count,
            "Viewer left"
        );

        to_channel(
            out,
            hub,
            &channel_id,
            ServerMessage::ViewerLeft {
                user_id: viewer_id,
                viewer_count,
            },
        );
    }

    fn chat(
        &self,
        hub: &Hub,
        out: &mut Vec<Outbound>,
        channel_id: ChannelId,
        user_id: ViewerId,
        username: String,
        message: String,
    ) {
        let chars = message.chars().count();
        if chars > self.max_chat_chars {
            tracing::warn!(
                channel_id = %channel_id,
                user_id = %user_id,
                chars,
                max = self.max_chat_chars,
                "Chat message too long, dropped"
            );
            return;
        }

        tracing::debug!(channel_id = %channel_id, username = %username, "Chat message");

        to_channel(
            out,
            hub,
            &channel_id,
            ServerMessage::Chat {
                user_id,
                username,
                message,
                timestamp: Utc::now(),
            },
        );
    }

    fn start(&self, hub: &mut Hub, out: &mut Vec<Outbound>, from: &str, new: NewChannel) {
        // Restarting a live session drops its members. Viewers who joined while
        // the id was unknown or ended stay subscribed and seed the new session.
        let was_live = hub.channels.is_live(&new.id);
        let detached = if was_live {
            hub.connections.detach_viewers(&new.id)
        } else {
            0
        };
        let released = hub.connections.release_publishers(&new.id);

        let channel = hub.channels.start_channel(new);
        hub.connections.mark_publisher(from, channel.id.clone());

        let mut viewer_count = 0;
        for viewer_id in hub.connections.viewers_in_channel(&channel.id) {
            viewer_count = hub.channels.add_viewer(&channel.id, viewer_id);
        }

        tracing::info!(
            conn_id = from,
            channel_id = %channel.id,
            tournament_id = %channel.tournament_id,
            owner_id = %channel.owner_id,
            detached,
            released,
            viewer_count,
            "Stream started"
        );

        to_all(
            out,
            hub,
            ServerMessage::StreamStarted {
                stream_id: channel.id,
                tournament_id: channel.tournament_id,
                title: channel.title,
                streamer_id: channel.owner_id,
            },
        );
    }

    fn end(&self, hub: &mut Hub, out: &mut Vec<Outbound>, channel_id: &str) {
        if !hub.channels.end_channel(channel_id) {
            tracing::debug!(channel_id, "End requested for channel that is not live");
            return;
        }

        to_channel(
            out,
            hub,
            channel_id,
            ServerMessage::StreamEnded {
                stream_id: channel_id.to_string(),
            },
        );

        let detached = hub.connections.detach_viewers(channel_id);
        hub.connections.release_publishers(channel_id);

        tracing::info!(channel_id, detached, "Stream ended");
    }
}

fn unicast(out: &mut Vec<Outbound>, to: &str, message: ServerMessage) {
    out.push(Outbound {
        scope: Scope::Connection(to.to_string()),
        recipients: vec![to.to_string()],
        message: Arc::new(message),
    });
}

fn to_channel(out: &mut Vec<Outbound>, hub: &Hub, channel_id: &str, message: ServerMessage) {
    out.push(Outbound {
        scope: Scope::Channel(channel_id.to_string()),
        recipients: hub.connections.connections_in_channel(channel_id),
        message: Arc::new(message),
    });
}

fn to_all(out: &mut Vec<Outbound>, hub: &Hub, message: ServerMessage) {
    out.push(Outbound {
        scope: Scope::All,
        recipients: hub.connections.all_connections(),
        message: Arc::new(message),
    });
}
