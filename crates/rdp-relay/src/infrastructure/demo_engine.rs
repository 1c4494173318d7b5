//! Built-in demo engine.
//!
//! The binary needs *some* [`RemoteEngine`] to be useful without linking a
//! real remote desktop library.  The demo engine fakes a server: on connect
//! it paints a background, caches a gradient tile and a crosshair cursor,
//! and then moves the tile across the screen once per tick.  Clicking
//! paints a white dot under the pointer, so input visibly round-trips.
//!
//! Everything a real engine would produce goes through the same boundary:
//! updates come out of [`RemoteEngine::check_events`] in order, and the
//! waiter blocks on a condition variable instead of a socket.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rdp_relay_core::{ImageGeometry, PixelFormat, Rect};
use tracing::{debug, info};

use crate::application::engine::{
    EngineFactory, EngineWaiter, RemoteEngine, PTR_FLAGS_DOWN, PTR_FLAGS_MOVE,
};
use crate::domain::error::EngineError;
use crate::domain::events::{EngineEvent, EventKind, ImagePayload};
use crate::domain::settings::SessionSettings;

/// Time between animation frames.
pub const DEMO_FRAME_INTERVAL: Duration = Duration::from_millis(500);

const TILE_SLOT: u32 = 1;
const TILE_SIZE: i32 = 64;
const CURSOR_SLOT: u32 = 1;
const CURSOR_SIZE: i32 = 15;
const DOT_SIZE: i32 = 4;
/// Horizontal distance the tile moves per frame.
const TILE_STEP: i32 = 16;

const ROP_WHITENESS: u8 = 0xFF;
const ROP_SRCCOPY: u8 = 0xCC;

// ── Pixel helpers ──────────────────────────────────────────────────────────

/// Packs an RGB colour the way orders carry it at `depth` bits per pixel.
fn order_color(r: u8, g: u8, b: u8, depth: u32) -> u32 {
    let (r, g, b) = (u32::from(r), u32::from(g), u32::from(b));
    match depth {
        15 => ((r >> 3) << 10) | ((g >> 3) << 5) | (b >> 3),
        16 => ((r >> 3) << 11) | ((g >> 2) << 5) | (b >> 3),
        // 8-bit sessions use the default palette, whose low entries are dark.
        8 => 0,
        _ => (b << 16) | (g << 8) | r,
    }
}

/// BGRA gradient tile, blue along X and green along Y.
fn gradient_tile() -> ImagePayload {
    let size = TILE_SIZE as usize;
    let mut data = vec![0u8; size * size * 4];
    for y in 0..size {
        for x in 0..size {
            let idx = (y * size + x) * 4;
            data[idx] = ((x * 255) / size) as u8;
            data[idx + 1] = ((y * 255) / size) as u8;
            data[idx + 2] = 128;
            data[idx + 3] = 255;
        }
    }
    ImagePayload::new(data, ImageGeometry::packed(TILE_SIZE, TILE_SIZE, PixelFormat::Rgb24))
}

/// Black crosshair with a white outline, transparent elsewhere.
fn crosshair_cursor() -> ImagePayload {
    let size = CURSOR_SIZE as usize;
    let mid = size / 2;
    let mut data = vec![0u8; size * size * 4];
    for y in 0..size {
        for x in 0..size {
            let on_line = x == mid || y == mid;
            let beside_line = x.abs_diff(mid) == 1 || y.abs_diff(mid) == 1;
            let idx = (y * size + x) * 4;
            if on_line {
                data[idx + 3] = 255;
            } else if beside_line {
                data[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
    }
    ImagePayload::new(
        data,
        ImageGeometry::packed(CURSOR_SIZE, CURSOR_SIZE, PixelFormat::Argb32),
    )
}

// ── Shared state ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Clock {
    closed: bool,
    connected: bool,
    next_frame: Instant,
    /// Updates produced by input, delivered before the next frame.
    pending: Vec<EngineEvent>,
}

#[derive(Debug)]
struct Shared {
    clock: Mutex<Clock>,
    wake: Condvar,
}

impl Shared {
    fn notify(&self) {
        self.wake.notify_all();
    }
}

/// A fake remote desktop producing a small animated scene.
pub struct DemoEngine {
    shared: Arc<Shared>,
    registered: Vec<EventKind>,
    width: i32,
    height: i32,
    depth: u32,
    frame: i32,
    buttons: u16,
}

impl DemoEngine {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                clock: Mutex::new(Clock {
                    closed: false,
                    connected: false,
                    next_frame: Instant::now(),
                    pending: Vec::new(),
                }),
                wake: Condvar::new(),
            }),
            registered: Vec::new(),
            width: 0,
            height: 0,
            depth: 32,
            frame: 0,
            buttons: 0,
        }
    }

    fn background(&self, rect: Rect) -> EngineEvent {
        EngineEvent::OpaqueRect {
            rect,
            color: order_color(0x20, 0x40, 0x60, self.depth),
        }
    }

    fn tile_position(&self, frame: i32) -> (i32, i32) {
        let span = (self.width - TILE_SIZE).max(1);
        let x = (frame * TILE_STEP) % span;
        let y = (self.height - TILE_SIZE).max(0) / 2;
        (x, y)
    }

    /// Background, cached tile and cursor.
    fn first_frame(&self) -> Vec<EngineEvent> {
        let (x, y) = self.tile_position(0);
        vec![
            EngineEvent::BoundsUpdate { bounds: None },
            self.background(Rect::new(0, 0, self.width, self.height)),
            EngineEvent::BitmapNew {
                index: TILE_SLOT,
                image: gradient_tile(),
                offscreen: false,
            },
            EngineEvent::MemBlt {
                index: TILE_SLOT,
                rect: Rect::new(x, y, TILE_SIZE, TILE_SIZE),
                src_x: 0,
                src_y: 0,
                rop: ROP_SRCCOPY,
            },
            EngineEvent::CursorNew {
                index: CURSOR_SLOT,
                image: crosshair_cursor(),
                hotspot_x: CURSOR_SIZE / 2,
                hotspot_y: CURSOR_SIZE / 2,
            },
            EngineEvent::CursorSet { index: CURSOR_SLOT },
            EngineEvent::EndPaint,
        ]
    }

    /// Erases the tile at its old position and draws it one step further.
    fn next_frame(&mut self) -> Vec<EngineEvent> {
        let (old_x, old_y) = self.tile_position(self.frame);
        self.frame += 1;
        let (x, y) = self.tile_position(self.frame);
        vec![
            self.background(Rect::new(old_x, old_y, TILE_SIZE, TILE_SIZE)),
            EngineEvent::MemBlt {
                index: TILE_SLOT,
                rect: Rect::new(x, y, TILE_SIZE, TILE_SIZE),
                src_x: 0,
                src_y: 0,
                rop: ROP_SRCCOPY,
            },
            EngineEvent::EndPaint,
        ]
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        if self.shared.clock.lock().closed {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }
}

impl Default for DemoEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteEngine for DemoEngine {
    fn register_callbacks(&mut self, kinds: &[EventKind]) {
        self.registered = kinds.to_vec();
    }

    fn load_channel(&mut self, name: &str) -> Result<(), EngineError> {
        debug!(channel = name, "demo engine accepts channel");
        Ok(())
    }

    fn connect(&mut self, settings: &SessionSettings) -> Result<(), EngineError> {
        self.width = settings.width;
        self.height = settings.height;
        self.depth = settings.color_depth;
        info!(
            host = %settings.hostname,
            width = self.width,
            height = self.height,
            depth = self.depth,
            "demo engine connected"
        );

        let first = self.first_frame();
        let mut clock = self.shared.clock.lock();
        clock.connected = true;
        clock.pending.extend(first);
        clock.next_frame = Instant::now() + DEMO_FRAME_INTERVAL;
        drop(clock);
        self.shared.notify();
        Ok(())
    }

    fn check_events(&mut self) -> Result<Vec<EngineEvent>, EngineError> {
        let mut events = {
            let mut clock = self.shared.clock.lock();
            if clock.closed {
                return Err(EngineError::Closed);
            }
            std::mem::take(&mut clock.pending)
        };

        let frame_due = {
            let mut clock = self.shared.clock.lock();
            let now = Instant::now();
            let due = clock.connected && now >= clock.next_frame;
            if due {
                clock.next_frame = now + DEMO_FRAME_INTERVAL;
            }
            due
        };
        if frame_due {
            events.extend(self.next_frame());
        }

        events.retain(|event| self.registered.contains(&event.kind()));
        Ok(events)
    }

    fn waiter(&self) -> Box<dyn EngineWaiter> {
        Box::new(DemoWaiter {
            shared: Arc::clone(&self.shared),
        })
    }

    fn send_pointer(&mut self, flags: u16, x: u16, y: u16) -> Result<(), EngineError> {
        self.ensure_open()?;
        if flags & PTR_FLAGS_MOVE != 0 {
            return Ok(());
        }
        let pressed = flags & PTR_FLAGS_DOWN != 0;
        let button = flags & !PTR_FLAGS_DOWN;
        if pressed && self.buttons & button == 0 {
            let dot = Rect::new(
                i32::from(x) - DOT_SIZE / 2,
                i32::from(y) - DOT_SIZE / 2,
                DOT_SIZE,
                DOT_SIZE,
            );
            let mut clock = self.shared.clock.lock();
            clock.pending.push(EngineEvent::DstBlt {
                rect: dot,
                rop: ROP_WHITENESS,
            });
            clock.pending.push(EngineEvent::EndPaint);
            drop(clock);
            self.shared.notify();
        }
        if pressed {
            self.buttons |= button;
        } else {
            self.buttons &= !button;
        }
        Ok(())
    }

    fn send_scancode(&mut self, flags: u16, scancode: u8) -> Result<(), EngineError> {
        self.ensure_open()?;
        debug!(flags, scancode, "demo engine received scancode");
        Ok(())
    }

    fn send_unicode(&mut self, flags: u16, codepoint: u16) -> Result<(), EngineError> {
        self.ensure_open()?;
        debug!(flags, codepoint, "demo engine received unicode key");
        Ok(())
    }

    fn send_clipboard(&mut self, text: &str) -> Result<(), EngineError> {
        self.ensure_open()?;
        debug!(chars = text.chars().count(), "demo engine received clipboard");
        Ok(())
    }

    fn disconnect(&mut self) {
        self.shared.clock.lock().closed = true;
        self.shared.notify();
        debug!("demo engine disconnected");
    }
}

struct DemoWaiter {
    shared: Arc<Shared>,
}

impl EngineWaiter for DemoWaiter {
    fn wait(&self, timeout: Duration) -> Result<bool, EngineError> {
        let deadline = Instant::now() + timeout;
        let mut clock = self.shared.clock.lock();
        loop {
            if clock.closed {
                return Err(EngineError::Closed);
            }
            let now = Instant::now();
            if !clock.pending.is_empty() || (clock.connected && now >= clock.next_frame) {
                return Ok(true);
            }
            if now >= deadline {
                return Ok(false);
            }
            let until = if clock.connected {
                deadline.min(clock.next_frame)
            } else {
                deadline
            };
            self.shared.wake.wait_until(&mut clock, until);
        }
    }
}

/// Factory for [`DemoEngine`]s.
#[derive(Debug, Default)]
pub struct DemoEngineFactory {
    initialised: OnceLock<()>,
}

impl DemoEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineFactory for DemoEngineFactory {
    fn global_init(&self) {
        self.initialised.get_or_init(|| {
            info!("demo engine ready; sessions will show a synthetic desktop");
        });
    }

    fn create(&self) -> Box<dyn RemoteEngine> {
        Box::new(DemoEngine::new())
    }
}
