//! Boundary to the remote desktop engine.
//!
//! The engine (negotiation, encryption, channel multiplexing, bitmap
//! decompression) is an external collaborator.  The relay only needs the
//! narrow surface below.
//!
//! # Waiting versus processing (for beginners)
//!
//! The update thread spends nearly all of its time waiting for the remote
//! server to send something.  If it held the engine lock while waiting, the
//! input thread could never forward a key press.  The boundary is therefore
//! split in two:
//!
//! 1. [`EngineWaiter::wait`] blocks on transport readiness and needs no lock.
//! 2. [`RemoteEngine::check_events`] reads whatever arrived and returns the
//!    decoded updates.  It runs under the engine lock and never blocks for
//!    long.
//!
//! Closing the transport makes both return an error, which is how a session
//! is torn down.

use std::time::Duration;

use crate::domain::error::EngineError;
use crate::domain::events::{EngineEvent, EventKind};
use crate::domain::settings::SessionSettings;

// ── Pointer flags ──────────────────────────────────────────────────────────

pub const PTR_FLAGS_WHEEL_NEGATIVE: u16 = 0x0100;
pub const PTR_FLAGS_WHEEL: u16 = 0x0200;
pub const PTR_FLAGS_MOVE: u16 = 0x0800;
/// Left button.
pub const PTR_FLAGS_BUTTON1: u16 = 0x1000;
/// Right button.
pub const PTR_FLAGS_BUTTON2: u16 = 0x2000;
/// Middle button.
pub const PTR_FLAGS_BUTTON3: u16 = 0x4000;
pub const PTR_FLAGS_DOWN: u16 = 0x8000;

// ── Keyboard flags ─────────────────────────────────────────────────────────

pub const KBD_FLAGS_EXTENDED: u16 = 0x0100;
pub const KBD_FLAGS_DOWN: u16 = 0x4000;
pub const KBD_FLAGS_RELEASE: u16 = 0x8000;

/// Blocks until the engine's transport has data, without borrowing the
/// engine itself.
pub trait EngineWaiter: Send {
    /// Returns `Ok(true)` when data is ready, `Ok(false)` on timeout.
    ///
    /// # Errors
    ///
    /// [`EngineError::Closed`] once the transport is gone.
    fn wait(&self, timeout: Duration) -> Result<bool, EngineError>;
}

/// One connection to a remote desktop server.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteEngine: Send {
    /// Announces which callbacks the session handles.  Updates of other
    /// kinds are not produced.
    fn register_callbacks(&mut self, kinds: &[EventKind]);

    /// Loads an optional virtual channel plugin (`cliprdr`, `guacsnd`).
    fn load_channel(&mut self, name: &str) -> Result<(), EngineError>;

    /// Connects and negotiates with the server described by `settings`.
    fn connect(&mut self, settings: &SessionSettings) -> Result<(), EngineError>;

    /// Reads pending transport data and returns the updates it produced, in
    /// arrival order.
    fn check_events(&mut self) -> Result<Vec<EngineEvent>, EngineError>;

    /// Returns a handle for waiting on the transport outside the engine
    /// lock.
    fn waiter(&self) -> Box<dyn EngineWaiter>;

    fn send_pointer(&mut self, flags: u16, x: u16, y: u16) -> Result<(), EngineError>;

    fn send_scancode(&mut self, flags: u16, scancode: u8) -> Result<(), EngineError>;

    fn send_unicode(&mut self, flags: u16, codepoint: u16) -> Result<(), EngineError>;

    fn send_clipboard(&mut self, text: &str) -> Result<(), EngineError>;

    /// Closes the transport.  Any waiter returns [`EngineError::Closed`]
    /// afterwards.
    fn disconnect(&mut self);
}

/// Creates engines and performs process-wide engine setup.
///
/// The factory is the capability object for the engine library: build one
/// per process and share it by `Arc`.
pub trait EngineFactory: Send + Sync {
    /// One-time library setup.  Must be idempotent: implementations keep
    /// their own once-guard (usually a `OnceLock<()>` field) so repeated
    /// calls on the same factory do nothing.
    fn global_init(&self);

    fn create(&self) -> Box<dyn RemoteEngine>;
}
