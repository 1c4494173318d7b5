//! rdp-relay library crate.
//!
//! Bridges a remote desktop session onto a thin display client speaking a
//! text drawing protocol.  The remote engine pushes updates (cursors, cached
//! bitmaps, glyph runs, drawing orders); the relay replays them, in order,
//! as drawing instructions, and forwards the client's mouse, keyboard and
//! clipboard input back into the engine.
//!
//! # Architecture
//!
//! ```text
//! remote desktop server
//!         ↕  (RemoteEngine boundary)
//! [rdp-relay]
//!   ├── domain/           config, session settings, engine events, errors
//!   ├── application/      session bridge, dispatch table, update handlers
//!   └── infrastructure/
//!         ├── server      TCP accept loop + handshake (tokio)
//!         ├── socket      buffered instruction writer
//!         ├── reader      incremental instruction reader
//!         ├── demo_engine synthetic desktop for the binary
//!         ├── mock        test doubles
//!         └── storage     TOML configuration file
//!         ↕
//! display client (text protocol over TCP)
//! ```
//!
//! # Layer rules
//!
//! - `domain` holds plain types and no I/O.
//! - `application` depends on `domain` and `rdp-relay-core` only; the engine
//!   and the client socket are reached through the [`RemoteEngine`] and
//!   [`DisplaySink`] traits.
//! - `infrastructure` implements those traits and owns all networking.

/// Domain layer: configuration, settings, events and errors.
pub mod domain;

/// Application layer: the session bridge and its handlers.
pub mod application;

/// Infrastructure layer: server, socket codec, engines and storage.
pub mod infrastructure;

pub use application::engine::{EngineFactory, EngineWaiter, RemoteEngine};
pub use application::runtime::RelayRuntime;
pub use application::session::Session;
pub use application::sink::DisplaySink;
pub use domain::config::RelayConfig;
pub use domain::error::{EngineError, ReadError, RelayError, SinkError};
pub use domain::events::{EngineEvent, EventKind, ImagePayload};
