//! Application layer: the session bridge and everything it drives.
//!
//! - [`engine`] / [`sink`] – the two boundaries (remote engine, display client)
//! - [`session`] – the bridge, its two locks and the session lifecycle
//! - [`dispatch`] – the event-tag → handler table
//! - [`update`] – state guarded by the update lock
//! - [`pointer`], [`bitmap`], [`glyph`], [`gdi`] – update handlers
//! - [`input`] – client input forwarded into the engine
//! - [`audio`] – sound format selection
//! - [`runtime`] – process-wide engine initialisation and shared keymap

pub mod audio;
pub mod bitmap;
pub mod dispatch;
pub mod engine;
pub mod gdi;
pub mod glyph;
pub mod input;
pub mod pointer;
pub mod runtime;
pub mod session;
pub mod sink;
pub mod update;
