//! In-memory test doubles for the two session boundaries.
//!
//! - [`RecordingSink`] records every instruction sent to the display client
//!   and counts flushes.  Clones share one recording, so a test keeps a
//!   clone while the session owns the boxed original.
//! - [`ScriptedEngine`] replays updates pushed through its
//!   [`ScriptedEngineHandle`] and records everything the session forwards
//!   into it.  Its waiter really blocks, so the update thread can be run
//!   exactly as in production.
//!
//! Both are compiled into the library (not only under `cfg(test)`) so that
//! integration tests in `tests/` can drive a full session.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rdp_relay_core::Instruction;

use crate::application::engine::{EngineFactory, EngineWaiter, RemoteEngine};
use crate::application::sink::DisplaySink;
use crate::domain::error::{EngineError, SinkError};
use crate::domain::events::{EngineEvent, EventKind};
use crate::domain::settings::SessionSettings;

// ── Recording sink ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Recording {
    sent: Vec<Instruction>,
    /// Number of entries of `sent` that were covered by a flush.
    flushed: usize,
    flushes: usize,
    closed: bool,
}

/// A [`DisplaySink`] that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every instruction sent so far, flushed or not.
    pub fn instructions(&self) -> Vec<Instruction> {
        self.inner.lock().sent.clone()
    }

    /// Only the instructions a real client would have received by now.
    pub fn flushed_instructions(&self) -> Vec<Instruction> {
        let recording = self.inner.lock();
        recording.sent[..recording.flushed].to_vec()
    }

    pub fn flush_count(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        let mut recording = self.inner.lock();
        recording.sent.clear();
        recording.flushed = 0;
        recording.flushes = 0;
    }

    /// Makes every later `send` and `flush` fail, as if the client hung up.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }
}

impl DisplaySink for RecordingSink {
    fn send(&mut self, instruction: &Instruction) -> Result<(), SinkError> {
        let mut recording = self.inner.lock();
        if recording.closed {
            return Err(SinkError::Closed);
        }
        recording.sent.push(instruction.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let mut recording = self.inner.lock();
        if recording.closed {
            return Err(SinkError::Closed);
        }
        recording.flushed = recording.sent.len();
        recording.flushes += 1;
        Ok(())
    }
}

// ── Scripted engine ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Script {
    pending: VecDeque<EngineEvent>,
    closed: bool,
    connect_failure: Option<String>,
    refused_channels: Vec<String>,
    registered: Vec<EventKind>,
    loaded_channels: Vec<String>,
    settings: Option<SessionSettings>,
    pointer: Vec<(u16, u16, u16)>,
    scancodes: Vec<(u16, u8)>,
    unicode: Vec<(u16, u16)>,
    clipboard: Vec<String>,
}

#[derive(Debug, Default)]
struct Shared {
    script: Mutex<Script>,
    ready: Condvar,
}

/// Remote engine driven by a test through a [`ScriptedEngineHandle`].
pub struct ScriptedEngine {
    shared: Arc<Shared>,
}

/// Test-side control of a [`ScriptedEngine`].
#[derive(Clone)]
pub struct ScriptedEngineHandle {
    shared: Arc<Shared>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
        }
    }

    pub fn handle(&self) -> ScriptedEngineHandle {
        ScriptedEngineHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngineHandle {
    /// Queues updates; the waiter wakes up and the next `check_events`
    /// returns them in this order.
    pub fn push(&self, events: impl IntoIterator<Item = EngineEvent>) {
        self.shared.script.lock().pending.extend(events);
        self.shared.ready.notify_all();
    }

    /// Simulates the server dropping the connection.
    pub fn close(&self) {
        self.shared.script.lock().closed = true;
        self.shared.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.script.lock().closed
    }

    /// Makes `connect` fail with `reason`.
    pub fn fail_connect(&self, reason: &str) {
        self.shared.script.lock().connect_failure = Some(reason.to_string());
    }

    /// Makes loading channel `name` fail.
    pub fn refuse_channel(&self, name: &str) {
        self.shared.script.lock().refused_channels.push(name.to_string());
    }

    pub fn registered_kinds(&self) -> Vec<EventKind> {
        self.shared.script.lock().registered.clone()
    }

    pub fn loaded_channels(&self) -> Vec<String> {
        self.shared.script.lock().loaded_channels.clone()
    }

    /// Settings the engine was connected with, if `connect` succeeded.
    pub fn settings(&self) -> Option<SessionSettings> {
        self.shared.script.lock().settings.clone()
    }

    /// Pointer events forwarded so far, as `(flags, x, y)`.
    pub fn pointer_events(&self) -> Vec<(u16, u16, u16)> {
        self.shared.script.lock().pointer.clone()
    }

    /// Scancode events forwarded so far, as `(flags, scancode)`.
    pub fn scancodes(&self) -> Vec<(u16, u8)> {
        self.shared.script.lock().scancodes.clone()
    }

    pub fn unicode_events(&self) -> Vec<(u16, u16)> {
        self.shared.script.lock().unicode.clone()
    }

    pub fn clipboard(&self) -> Vec<String> {
        self.shared.script.lock().clipboard.clone()
    }

    /// Number of updates not yet picked up by the session.
    pub fn pending(&self) -> usize {
        self.shared.script.lock().pending.len()
    }
}

impl RemoteEngine for ScriptedEngine {
    fn register_callbacks(&mut self, kinds: &[EventKind]) {
        self.shared.script.lock().registered = kinds.to_vec();
    }

    fn load_channel(&mut self, name: &str) -> Result<(), EngineError> {
        let mut script = self.shared.script.lock();
        if script.refused_channels.iter().any(|refused| refused == name) {
            return Err(EngineError::ChannelUnavailable(name.to_string()));
        }
        script.loaded_channels.push(name.to_string());
        Ok(())
    }

    fn connect(&mut self, settings: &SessionSettings) -> Result<(), EngineError> {
        let mut script = self.shared.script.lock();
        if let Some(reason) = script.connect_failure.clone() {
            return Err(EngineError::Connect(reason));
        }
        script.settings = Some(settings.clone());
        Ok(())
    }

    fn check_events(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        let mut script = self.shared.script.lock();
        if script.closed {
            return Err(EngineError::Closed);
        }
        let registered = script.registered.clone();
        Ok(script
            .pending
            .drain(..)
            .filter(|event| registered.contains(&event.kind()))
            .collect())
    }

    fn waiter(&self) -> Box<dyn EngineWaiter> {
        Box::new(ScriptedWaiter {
            shared: Arc::clone(&self.shared),
        })
    }

    fn send_pointer(&mut self, flags: u16, x: u16, y: u16) -> Result<(), EngineError> {
        self.record(|script| script.pointer.push((flags, x, y)))
    }

    fn send_scancode(&mut self, flags: u16, scancode: u8) -> Result<(), EngineError> {
        self.record(|script| script.scancodes.push((flags, scancode)))
    }

    fn send_unicode(&mut self, flags: u16, codepoint: u16) -> Result<(), EngineError> {
        self.record(|script| script.unicode.push((flags, codepoint)))
    }

    fn send_clipboard(&mut self, text: &str) -> Result<(), EngineError> {
        self.record(|script| script.clipboard.push(text.to_string()))
    }

    fn disconnect(&mut self) {
        self.shared.script.lock().closed = true;
        self.shared.ready.notify_all();
    }
}

impl ScriptedEngine {
    fn record(&self, f: impl FnOnce(&mut Script)) -> Result<(), EngineError> {
        let mut script = self.shared.script.lock();
        if script.closed {
            return Err(EngineError::Closed);
        }
        f(&mut script);
        Ok(())
    }
}

struct ScriptedWaiter {
    shared: Arc<Shared>,
}

impl EngineWaiter for ScriptedWaiter {
    fn wait(&self, timeout: Duration) -> Result<bool, EngineError> {
        let deadline = Instant::now() + timeout;
        let mut script = self.shared.script.lock();
        loop {
            if script.closed {
                return Err(EngineError::Closed);
            }
            if !script.pending.is_empty() {
                return Ok(true);
            }
            if self.shared.ready.wait_until(&mut script, deadline).timed_out() {
                return Ok(!script.pending.is_empty());
            }
        }
    }
}

// ── Factory ────────────────────────────────────────────────────────────────

/// Factory handing out [`ScriptedEngine`]s and counting global setup calls.
#[derive(Default)]
pub struct ScriptedEngineFactory {
    initialised: OnceLock<()>,
    init_count: AtomicUsize,
    created: Mutex<Vec<ScriptedEngineHandle>>,
}

impl ScriptedEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    /// Handles of every engine created so far, oldest first.
    pub fn handles(&self) -> Vec<ScriptedEngineHandle> {
        self.created.lock().clone()
    }
}

impl EngineFactory for ScriptedEngineFactory {
    fn global_init(&self) {
        self.initialised.get_or_init(|| {
            self.init_count.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn create(&self) -> Box<dyn RemoteEngine> {
        let engine = ScriptedEngine::new();
        self.created.lock().push(engine.handle());
        Box::new(engine)
    }
}
