//! Infrastructure layer: sockets, the accept loop, engines and storage.
//!
//! - [`socket`] / [`reader`] – the display protocol on a byte stream
//! - [`server`] – TCP accept loop, handshake and per-connection threads
//! - [`demo_engine`] – a synthetic remote desktop for the binary
//! - [`mock`] – recording sink and scripted engine for tests
//! - [`storage`] – TOML configuration file
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `rdp_relay_core`, but MUST NOT be imported by the `application` or
//! `domain` layers outside of tests.

pub mod demo_engine;
pub mod mock;
pub mod reader;
pub mod server;
pub mod socket;
pub mod storage;
