//! Environment-driven server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_STATIC_DIR: &str = "public";
const DEFAULT_OUTBOUND_BUFFER: usize = 64;
const DEFAULT_MAX_CHAT_CHARS: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub bind_addr: SocketAddr,
    /// Directory served as the static fallback
    pub static_dir: PathBuf,
    /// Capacity of each connection's outbound queue. A recipient whose queue is
    /// full misses the event instead of stalling the broadcast.
    pub outbound_buffer: usize,
    /// Chat messages longer than this (in chars) are dropped. Unlimited unless set.
    pub max_chat_chars: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_chat_chars: DEFAULT_MAX_CHAT_CHARS,
        }
    }
}

impl HubConfig {
    /// Load config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host: IpAddr = env_or("HUB_HOST", defaults.bind_addr.ip());
        let port: u16 = env_or("HUB_PORT", defaults.bind_addr.port());

        let static_dir = std::env::var("HUB_STATIC_DIR")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        let outbound_buffer = env_or("HUB_OUTBOUND_BUFFER", defaults.outbound_buffer).max(1);
        let max_chat_chars = env_or("HUB_MAX_CHAT_CHARS", defaults.max_chat_chars);

        let config = Self {
            bind_addr: SocketAddr::new(host, port),
            static_dir,
            outbound_buffer,
            max_chat_chars,
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            static_dir = %config.static_dir.display(),
            outbound_buffer = config.outbound_buffer,
            max_chat_chars = config.max_chat_chars,
            "Hub config loaded"
        );

        config
    }
}

/// Parse `key` from the environment, warning and using `default` on bad input
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Ignoring unparseable config value");
                default
            }
        },
        Err(_) => default,
    }
}
