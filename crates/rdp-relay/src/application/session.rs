//! The session bridge.
//!
//! A [`Session`] ties one remote engine to one display client.  It owns the
//! two locks of the relay:
//!
//! - the **engine lock** (`Mutex<Box<dyn RemoteEngine>>`) guards the engine
//!   handle;
//! - the **update lock** (`Mutex<UpdateContext>`) guards the outbound sink
//!   and all cache, pointer and drawing state.
//!
//! Two threads use a session concurrently:
//!
//! - the **update thread** ([`Session::run_updates`]) waits on the engine's
//!   transport *without* any lock, then takes the engine lock to read the
//!   pending updates, releases it, and replays the updates under the update
//!   lock;
//! - the **input thread** ([`Session::handle_instruction`]) takes the engine
//!   lock to forward mouse, key and clipboard events, and the update lock
//!   whenever it writes to the client or touches the key state.
//!
//! Whenever both locks are needed they are taken engine first, then
//! update.  Neither lock is re-entered: handlers get `&mut UpdateContext`
//! and never lock.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! start ──► parse args ──► pre-connect ──► connect ──► post-connect
//!   │            │ BadArgument                │ ConnectionFailure
//!   │            ▼                            ▼
//!   │       `error` 0x300               `error` 0x202
//!   ▼
//! run_updates / handle_instruction  (until disconnect or fatal error)
//!   ▼
//! close ──► release caches ──► disconnect engine ──► `disconnect`
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rdp_relay_core::{Instruction, LayerId, StatusCode};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::application::audio::{self, AUDIO_CHANNEL};
use crate::application::dispatch::CallbackTable;
use crate::application::engine::RemoteEngine;
use crate::application::input::{self, InputState};
use crate::application::pointer;
use crate::application::runtime::RelayRuntime;
use crate::application::sink::DisplaySink;
use crate::application::update::UpdateContext;
use crate::domain::error::{EngineError, RelayError};
use crate::domain::settings::{ClientInfo, SessionSettings};

/// Name of the clipboard channel plugin.
pub const CLIPBOARD_CHANNEL: &str = "cliprdr";

/// Message sent to the client when the remote server cannot be reached.
pub const CONNECT_ERROR_MESSAGE: &str = "Error connecting to RDP server";

fn disconnected(err: EngineError) -> RelayError {
    RelayError::Disconnected(err.to_string())
}

/// Reports a fatal start-up error to the client before giving up.
fn report(sink: &mut dyn DisplaySink, message: &str, status: StatusCode) {
    let sent = sink
        .send(&Instruction::Error {
            message: message.to_string(),
            status,
        })
        .and_then(|()| sink.flush());
    if let Err(err) = sent {
        warn!(error = %err, "could not report error to display client");
    }
}

/// One bridged remote desktop connection.
pub struct Session {
    id: Uuid,
    runtime: Arc<RelayRuntime>,
    settings: SessionSettings,
    engine: Mutex<Box<dyn RemoteEngine>>,
    update: Mutex<UpdateContext>,
    callbacks: CallbackTable,
    input: Mutex<InputState>,
    audio_mimetype: Option<&'static str>,
    clipboard_enabled: bool,
    running: AtomicBool,
}

impl Session {
    /// Parses the connection arguments and connects.
    ///
    /// On `BadArgument` or `ConnectionFailure` an `error` instruction has
    /// already been sent to the client when this returns.
    pub fn start(
        runtime: Arc<RelayRuntime>,
        mut engine: Box<dyn RemoteEngine>,
        mut sink: Box<dyn DisplaySink>,
        args: &[String],
        client: &ClientInfo,
    ) -> Result<Self, RelayError> {
        let id = Uuid::new_v4();
        let config = runtime.config().clone();

        let settings = match SessionSettings::from_args(
            args,
            client,
            &config,
            runtime.keymap().layout(),
        ) {
            Ok(settings) => settings,
            Err(err) => {
                error!(session = %id, error = %err, "rejecting session");
                let message = match &err {
                    RelayError::BadArgument(message) => message.clone(),
                    other => other.to_string(),
                };
                report(sink.as_mut(), &message, StatusCode::ClientBadRequest);
                return Err(err);
            }
        };
        info!(session = %id, host = %settings.hostname, port = settings.port, "starting session");

        // Pre-connect
        let callbacks = CallbackTable::standard();
        engine.register_callbacks(&callbacks.kinds());
        let clipboard_enabled = load_optional_channel(engine.as_mut(), CLIPBOARD_CHANNEL);
        let audio_mimetype = if settings.audio_enabled {
            audio::select_mimetype(&client.audio_mimetypes)
                .filter(|_| load_optional_channel(engine.as_mut(), AUDIO_CHANNEL))
        } else {
            None
        };

        // Connect
        if let Err(err) = engine.connect(&settings) {
            error!(session = %id, error = %err, "connection failed");
            report(sink.as_mut(), CONNECT_ERROR_MESSAGE, StatusCode::UpstreamError);
            return Err(RelayError::ConnectionFailure(err.to_string()));
        }

        let update = UpdateContext::new(
            sink,
            settings.capacities,
            settings.color_depth,
            config.native_cursor_hide,
        )
        .with_desktop(settings.width, settings.height);
        let session = Self {
            id,
            runtime,
            settings,
            engine: Mutex::new(engine),
            update: Mutex::new(update),
            callbacks,
            input: Mutex::new(InputState::new()),
            audio_mimetype,
            clipboard_enabled,
            running: AtomicBool::new(true),
        };
        session.post_connect()?;
        Ok(session)
    }

    /// Sends the connection name, display size and default cursor.
    fn post_connect(&self) -> Result<(), RelayError> {
        let mut ctx = self.update.lock();
        ctx.send(Instruction::Name(self.settings.window_title.clone()))?;
        ctx.send(Instruction::Size {
            layer: LayerId::DEFAULT,
            width: self.settings.width,
            height: self.settings.height,
        })?;
        pointer::set_default(&mut *ctx)?;
        info!(
            session = %self.id,
            width = self.settings.width,
            height = self.settings.height,
            "session connected"
        );
        Ok(())
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn audio_mimetype(&self) -> Option<&'static str> {
        self.audio_mimetype
    }

    pub fn clipboard_enabled(&self) -> bool {
        self.clipboard_enabled
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs `f` with the update lock held.
    pub fn with_update<T>(&self, f: impl FnOnce(&mut UpdateContext) -> T) -> T {
        f(&mut *self.update.lock())
    }

    // ── Update thread ─────────────────────────────────────────────────────

    /// Reads pending updates and replays them, in order, onto the client.
    ///
    /// # Errors
    ///
    /// [`RelayError::Disconnected`] when the engine's transport is gone, or
    /// any other fatal error raised by a handler.
    pub fn handle_messages(&self) -> Result<(), RelayError> {
        let events = self.engine.lock().check_events().map_err(disconnected)?;
        if events.is_empty() {
            return Ok(());
        }
        let mut ctx = self.update.lock();
        self.callbacks.dispatch_all(&mut *ctx, events)
    }

    /// The update thread body.  Returns when the session is stopped or the
    /// transport fails.
    pub fn run_updates(&self) -> Result<(), RelayError> {
        let waiter = self.engine.lock().waiter();
        let poll = self.runtime.config().poll_interval;
        while self.is_running() {
            match waiter.wait(poll) {
                Ok(false) => continue,
                Ok(true) => self.handle_messages()?,
                Err(err) => {
                    if !self.is_running() {
                        break;
                    }
                    return Err(disconnected(err));
                }
            }
        }
        debug!(session = %self.id, "update loop finished");
        Ok(())
    }

    // ── Input thread ──────────────────────────────────────────────────────

    pub fn handle_mouse(&self, x: i32, y: i32, mask: u32) -> Result<(), RelayError> {
        {
            let mut engine = self.engine.lock();
            let mut state = self.input.lock();
            input::send_mouse(&mut **engine, &mut state, x, y, mask).map_err(disconnected)?;
        }
        if self.runtime.config().pointer_echo {
            let mut ctx = self.update.lock();
            ctx.send(Instruction::Mouse { x, y, mask })?;
            ctx.flush()?;
        }
        Ok(())
    }

    pub fn handle_key(&self, keysym: u32, pressed: bool) -> Result<(), RelayError> {
        let mut engine = self.engine.lock();
        let mut ctx = self.update.lock();
        input::send_key(
            &mut **engine,
            self.runtime.keymap(),
            ctx.keysyms_mut(),
            keysym,
            pressed,
        )
        .map_err(disconnected)
    }

    /// Forwards clipboard text.  Without a clipboard channel the text is
    /// dropped.
    pub fn handle_clipboard(&self, text: &str) -> Result<(), RelayError> {
        if !self.clipboard_enabled {
            debug!(session = %self.id, "clipboard channel not loaded, update dropped");
            return Ok(());
        }
        let mut engine = self.engine.lock();
        input::send_clipboard(&mut **engine, text).map_err(disconnected)
    }

    /// Routes one instruction from the client.  Returns `false` once the
    /// client asked to disconnect.
    pub fn handle_instruction(&self, instruction: Instruction) -> Result<bool, RelayError> {
        match instruction {
            Instruction::Mouse { x, y, mask } => self.handle_mouse(x, y, mask)?,
            Instruction::Key { keysym, pressed } => self.handle_key(keysym, pressed)?,
            Instruction::Clipboard(text) => self.handle_clipboard(&text)?,
            Instruction::Sync { timestamp } => self.with_update(|ctx| ctx.acknowledge(timestamp)),
            Instruction::Disconnect => {
                info!(session = %self.id, "client requested disconnect");
                self.stop();
                return Ok(false);
            }
            other => debug!(session = %self.id, opcode = other.opcode(), "instruction ignored"),
        }
        Ok(true)
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Stops the update loop and closes the engine's transport, which wakes
    /// a blocked waiter.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            self.engine.lock().disconnect();
        }
    }

    /// Releases every cached resource, closes the engine and tells the
    /// client the session is over.
    pub fn close(&self) {
        self.stop();
        let mut ctx = self.update.lock();
        let result = ctx
            .release_all()
            .and_then(|()| ctx.send(Instruction::Disconnect))
            .and_then(|()| ctx.flush());
        if let Err(err) = result {
            debug!(session = %self.id, error = %err, "client gone before disconnect");
        }
        info!(session = %self.id, "session closed");
    }
}

/// Loads an optional channel; failure is logged and disables the feature.
fn load_optional_channel(engine: &mut dyn RemoteEngine, name: &str) -> bool {
    match engine.load_channel(name) {
        Ok(()) => {
            debug!(channel = name, "channel loaded");
            true
        }
        Err(err) => {
            let err = RelayError::ChannelLoadFailure {
                channel: name.to_string(),
                reason: err.to_string(),
            };
            warn!(error = %err, "continuing without channel");
            false
        }
    }
}
