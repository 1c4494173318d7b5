//! TOML-based configuration file for the relay.
//!
//! The file is optional.  When it is given (`--config` / `RELAY_CONFIG`) its
//! values override the built-in defaults; command-line flags override both.
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 4823
//! poll_interval_ms = 250
//! log_level = "info"
//!
//! [session]
//! keymap = "en-us-qwerty"
//! bitmap_cache = true
//! native_cursor_hide = true
//! pointer_echo = true
//!
//! [cache]
//! cursors = 32
//! bitmaps = 4096
//! glyphs = 2560
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "…")]`, so a file only needs the
//! keys it wants to change.  An empty file is a valid file.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    CacheCapacities, RelayConfig, DEFAULT_KEYMAP, DEFAULT_LISTEN_PORT, DEFAULT_POLL_INTERVAL,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidAddress(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk form of [`RelayConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub session: SessionSection,
    #[serde(default)]
    pub cache: CacheSection,
}

/// Listener and process settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to listen on.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Longest wait for remote updates before re-checking for shutdown.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Per-session behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSection {
    #[serde(default = "default_keymap")]
    pub keymap: String,
    #[serde(default = "default_true")]
    pub bitmap_cache: bool,
    #[serde(default = "default_true")]
    pub native_cursor_hide: bool,
    #[serde(default = "default_true")]
    pub pointer_echo: bool,
}

/// Number of slots offered for each cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheSection {
    #[serde(default = "default_cursor_slots")]
    pub cursors: u32,
    #[serde(default = "default_bitmap_slots")]
    pub bitmaps: u32,
    #[serde(default = "default_glyph_slots")]
    pub glyphs: u32,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_LISTEN_PORT
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_keymap() -> String {
    DEFAULT_KEYMAP.to_string()
}
fn default_true() -> bool {
    true
}
fn default_cursor_slots() -> u32 {
    CacheCapacities::default().cursors
}
fn default_bitmap_slots() -> u32 {
    CacheCapacities::default().bitmaps
}
fn default_glyph_slots() -> u32 {
    CacheCapacities::default().glyphs
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            poll_interval_ms: default_poll_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            keymap: default_keymap(),
            bitmap_cache: default_true(),
            native_cursor_hide: default_true(),
            pointer_echo: default_true(),
        }
    }
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            cursors: default_cursor_slots(),
            bitmaps: default_bitmap_slots(),
            glyphs: default_glyph_slots(),
        }
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

impl FileConfig {
    /// Resolves the file values into the runtime configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidAddress`] if `bind_address` does not parse.
    pub fn into_relay_config(self) -> Result<RelayConfig, ConfigError> {
        let ip: IpAddr = self
            .server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(self.server.bind_address.clone()))?;
        Ok(RelayConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            poll_interval: Duration::from_millis(self.server.poll_interval_ms),
            capacities: CacheCapacities {
                cursors: self.cache.cursors,
                bitmaps: self.cache.bitmaps,
                glyphs: self.cache.glyphs,
            },
            bitmap_cache: self.session.bitmap_cache,
            keymap: self.session.keymap,
            native_cursor_hide: self.session.native_cursor_hide,
            pointer_echo: self.session.pointer_echo,
            log_level: self.server.log_level,
        })
    }
}

impl From<&RelayConfig> for FileConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            server: ServerSection {
                bind_address: config.bind_addr.ip().to_string(),
                port: config.bind_addr.port(),
                poll_interval_ms: config.poll_interval.as_millis() as u64,
                log_level: config.log_level.clone(),
            },
            session: SessionSection {
                keymap: config.keymap.clone(),
                bitmap_cache: config.bitmap_cache,
                native_cursor_hide: config.native_cursor_hide,
                pointer_echo: config.pointer_echo,
            },
            cache: CacheSection {
                cursors: config.capacities.cursors,
                bitmaps: config.capacities.bitmaps,
                glyphs: config.capacities.glyphs,
            },
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("rdp-relay-test-{}", Uuid::new_v4()))
            .join("relay.toml")
    }

    #[test]
    fn test_empty_file_resolves_to_runtime_defaults() {
        // Arrange
        let file: FileConfig = toml::from_str("").unwrap();

        // Act
        let config = file.into_relay_config().unwrap();

        // Assert
        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_given_keys() {
        // Arrange
        let toml_str = r#"
            [server]
            port = 5000

            [session]
            pointer_echo = false
        "#;

        // Act
        let config = toml::from_str::<FileConfig>(toml_str)
            .unwrap()
            .into_relay_config()
            .unwrap();

        // Assert
        assert_eq!(config.bind_addr.port(), 5000);
        assert!(!config.pointer_echo);
        assert!(config.native_cursor_hide);
        assert_eq!(config.capacities, CacheCapacities::default());
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut file = FileConfig::default();
        file.server.bind_address = "not-an-ip".into();

        let result = file.into_relay_config();

        assert!(matches!(result, Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        // Arrange
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[server\nport = ").unwrap();

        // Act
        let result = load_config(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let result = load_config(&scratch_path()).unwrap();

        assert_eq!(result, FileConfig::default());
    }

    #[test]
    fn test_saved_config_loads_back_unchanged() {
        // Arrange
        let path = scratch_path();
        let relay = RelayConfig {
            keymap: "en-us-qwerty".into(),
            poll_interval: Duration::from_millis(40),
            pointer_echo: false,
            ..RelayConfig::default()
        };

        // Act
        save_config(&path, &FileConfig::from(&relay)).unwrap();
        let loaded = load_config(&path).unwrap().into_relay_config().unwrap();

        // Assert
        assert_eq!(loaded, relay);
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
