pub mod directory;
mod query;
pub mod registry;

pub use directory::ChannelDirectory;
pub use registry::{ConnectionHandle, ConnectionRegistry, ConnectionSnapshot};

use crate::config::HubConfig;
use crate::protocol::{ClientMessage, Outbound, ServerMessage};
use crate::router::EventRouter;
use crate::types::ConnectionId;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

/// Registry and directory, mutated together under one lock
#[derive(Debug, Default)]
pub struct Hub {
    pub connections: ConnectionRegistry,
    pub channels: ChannelDirectory,
}

/// Shared application state: the one hub instance for this server's lifetime
pub struct AppState {
    hub: Mutex<Hub>,
    router: EventRouter,
    config: HubConfig,
}

/// A resolved send, taken out of the critical section
struct Delivery {
    conn_id: ConnectionId,
    handle: ConnectionHandle,
    message: Arc<ServerMessage>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(HubConfig::default())
    }

    pub fn with_config(config: HubConfig) -> Self {
        Self {
            hub: Mutex::new(Hub::default()),
            router: EventRouter::new(config.max_chat_chars),
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Admit a new connection. The returned receiver yields every event
    /// addressed to it; it closes when the connection is removed or drained.
    pub async fn connect(&self) -> (ConnectionId, mpsc::Receiver<Arc<ServerMessage>>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer);
        let conn_id = self.hub.lock().await.connections.register(tx);
        tracing::info!(conn_id = %conn_id, "Connection registered");
        (conn_id, rx)
    }

    /// Route one inbound event and deliver its effects. Returns the number of
    /// sends that made it into a recipient's queue.
    pub async fn handle(&self, conn_id: &str, msg: ClientMessage) -> usize {
        let deliveries = {
            let mut hub = self.hub.lock().await;
            let outbound = self.router.route(&mut hub, conn_id, msg);
            resolve(&hub, outbound)
        };
        deliver(deliveries)
    }

    /// Reconcile a closed connection: synthesized leave/end, then removal
    pub async fn disconnect(&self, conn_id: &str) -> usize {
        let deliveries = {
            let mut hub = self.hub.lock().await;
            let outbound = self.router.disconnect(&mut hub, conn_id);
            resolve(&hub, outbound)
        };
        deliver(deliveries)
    }

    /// Drop every connection handle at shutdown. Each connection task sees its
    /// queue close and exits. Channel records are kept.
    pub async fn drain(&self) -> usize {
        let drained = self.hub.lock().await.connections.drain();
        tracing::info!(drained, "Connection registry drained");
        drained
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up recipient handles while still holding the hub lock
fn resolve(hub: &Hub, outbound: Vec<Outbound>) -> Vec<Delivery> {
    let mut deliveries = Vec::new();
    for out in outbound {
        tracing::debug!(
            scope = ?out.scope,
            recipients = out.recipients.len(),
            "Dispatching event"
        );
        for conn_id in out.recipients {
            if let Some(handle) = hub.connections.handle(&conn_id) {
                deliveries.push(Delivery {
                    conn_id,
                    handle: handle.clone(),
                    message: Arc::clone(&out.message),
                });
            }
        }
    }
    deliveries
}

/// Best-effort, non-blocking sends. A full or closed queue skips only that
/// recipient; its own disconnect handling cleans it up.
fn deliver(deliveries: Vec<Delivery>) -> usize {
    let mut sent = 0;
    for d in deliveries {
        match d.handle.try_send(d.message) {
            Ok(()) => sent += 1,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %d.conn_id, "Outbound queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(conn_id = %d.conn_id, "Outbound queue closed, event dropped");
            }
        }
    }
    sent
}
