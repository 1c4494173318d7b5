//! Runtime configuration of the relay.
//!
//! [`RelayConfig`] is the merged result of built-in defaults, the optional
//! TOML file (see `infrastructure::storage::config`) and the command line.
//! Everything downstream reads only this struct.

use std::net::SocketAddr;
use std::time::Duration;

/// Default TCP port for display client connections.
pub const DEFAULT_LISTEN_PORT: u16 = 4823;

/// Default wait between checks for remote updates.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Default keymap name.
pub const DEFAULT_KEYMAP: &str = "en-us-qwerty";

/// Number of slots negotiated for each cache kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheCapacities {
    pub cursors: u32,
    pub bitmaps: u32,
    pub glyphs: u32,
}

impl Default for CacheCapacities {
    fn default() -> Self {
        Self {
            cursors: 32,
            bitmaps: 4096,
            glyphs: 2560,
        }
    }
}

/// Top-level configuration of the relay process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Address the display-client listener binds to.
    pub bind_addr: SocketAddr,
    /// Longest time the update thread waits for the remote side before
    /// re-checking for shutdown.
    pub poll_interval: Duration,
    /// Cache slot capacities offered to the remote server.
    pub capacities: CacheCapacities,
    /// Whether bitmap caching (and with it memory-blit orders) is offered.
    pub bitmap_cache: bool,
    /// Name of the keymap used for every session.
    pub keymap: String,
    /// Whether the display client can hide its cursor natively.  When
    /// `false`, hiding uploads a transparent 1×1 image instead.
    pub native_cursor_hide: bool,
    /// Echo pointer positions back to the client from the input thread.
    pub pointer_echo: bool,
    /// Fallback log filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LISTEN_PORT)),
            poll_interval: DEFAULT_POLL_INTERVAL,
            capacities: CacheCapacities::default(),
            bitmap_cache: true,
            keymap: DEFAULT_KEYMAP.to_string(),
            native_cursor_hide: true,
            pointer_echo: true,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listens_on_all_interfaces() {
        let config = RelayConfig::default();

        assert_eq!(config.bind_addr.port(), DEFAULT_LISTEN_PORT);
        assert!(config.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_capacities() {
        let caps = CacheCapacities::default();

        assert_eq!((caps.cursors, caps.bitmaps, caps.glyphs), (32, 4096, 2560));
    }
}
