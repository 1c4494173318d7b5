//! rdp-relay binary entry point.
//!
//! Listens for display clients, runs the handshake, and bridges each one to
//! a remote desktop session.  The binary ships with the built-in demo
//! engine, which paints a synthetic desktop; linking a real engine means
//! providing another [`rdp_relay::EngineFactory`].
//!
//! # Usage
//!
//! ```text
//! rdp-relay [OPTIONS]
//!
//! Options:
//!   --config <PATH>             TOML configuration file
//!   --bind <IP>                 Listener address [default: 0.0.0.0]
//!   --port <PORT>               Listener port [default: 4823]
//!   --poll-interval-ms <MS>     Update wait interval [default: 250]
//!   --keymap <NAME>             Keyboard layout [default: en-us-qwerty]
//!   --no-pointer-echo           Do not echo pointer positions to the client
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                 | Flag                 |
//! |--------------------------|----------------------|
//! | `RELAY_CONFIG`           | `--config`           |
//! | `RELAY_BIND`             | `--bind`             |
//! | `RELAY_PORT`             | `--port`             |
//! | `RELAY_POLL_INTERVAL_MS` | `--poll-interval-ms` |
//! | `RELAY_KEYMAP`           | `--keymap`           |
//!
//! Precedence, lowest first: built-in defaults, the config file, then flags
//! and environment variables.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rdp_relay::infrastructure::demo_engine::DemoEngineFactory;
use rdp_relay::infrastructure::server::run_server;
use rdp_relay::infrastructure::storage::config::{load_config, FileConfig};
use rdp_relay::{RelayConfig, RelayRuntime};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Remote desktop relay for thin display clients.
#[derive(Debug, Parser)]
#[command(
    name = "rdp-relay",
    about = "Relays remote desktop sessions to thin display clients",
    version
)]
struct Cli {
    /// TOML configuration file.  Missing keys keep their defaults.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to listen on.
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// TCP port to listen on.
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Longest wait for remote updates before re-checking for shutdown.
    #[arg(long, env = "RELAY_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<u64>,

    /// Keyboard layout used for every session.
    #[arg(long, env = "RELAY_KEYMAP")]
    keymap: Option<String>,

    /// Do not echo pointer positions back to the client.
    #[arg(long)]
    no_pointer_echo: bool,
}

impl Cli {
    /// Merges defaults, the config file and the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the resulting bind address is invalid.
    fn into_relay_config(self) -> anyhow::Result<RelayConfig> {
        let mut file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("loading config file {}", path.display()))?,
            None => FileConfig::default(),
        };

        if let Some(bind) = self.bind {
            file.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            file.server.port = port;
        }
        if let Some(ms) = self.poll_interval_ms {
            file.server.poll_interval_ms = ms;
        }
        if let Some(keymap) = self.keymap {
            file.session.keymap = keymap;
        }
        if self.no_pointer_echo {
            file.session.pointer_echo = false;
        }

        file.into_relay_config().context("invalid configuration")
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_relay_config()?;

    // `RUST_LOG` wins; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        "rdp-relay starting: listen={}, keymap={}",
        config.bind_addr, config.keymap
    );

    let runtime = RelayRuntime::new(Arc::new(DemoEngineFactory::new()), config)
        .context("initialising relay runtime")?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(Arc::new(runtime), running).await?;

    info!("rdp-relay stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn bare() -> Cli {
        Cli {
            config: None,
            bind: None,
            port: None,
            poll_interval_ms: None,
            keymap: None,
            no_pointer_echo: false,
        }
    }

    #[test]
    fn test_no_options_yield_defaults() {
        let config = bare().into_relay_config().unwrap();

        assert_eq!(config, RelayConfig::default());
    }

    #[test]
    fn test_port_and_bind_override() {
        // Arrange
        let cli = Cli {
            bind: Some("127.0.0.1".into()),
            port: Some(9000),
            ..bare()
        };

        // Act
        let config = cli.into_relay_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
    }

    #[test]
    fn test_poll_interval_and_echo_flags() {
        let cli = Cli::parse_from(["rdp-relay", "--poll-interval-ms", "40", "--no-pointer-echo"]);

        let config = cli.into_relay_config().unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(40));
        assert!(!config.pointer_echo);
    }

    #[test]
    fn test_invalid_bind_is_error() {
        let cli = Cli {
            bind: Some("not.an.ip".into()),
            ..bare()
        };

        assert!(cli.into_relay_config().is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("rdp-relay-cli-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("relay.toml");
        std::fs::write(&path, "[server]\nport = 5000\npoll_interval_ms = 90\n").unwrap();
        let cli = Cli {
            config: Some(path),
            port: Some(6000),
            ..bare()
        };

        // Act
        let config = cli.into_relay_config().unwrap();

        // Assert
        assert_eq!(config.bind_addr.port(), 6000);
        assert_eq!(config.poll_interval, Duration::from_millis(90));
        let _ = std::fs::remove_dir_all(dir);
    }
}
