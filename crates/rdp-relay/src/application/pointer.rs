//! Pointer state machine.
//!
//! The display shows exactly one of three cursors:
//!
//! ```text
//!                 set(i)                    set_null()
//!   ┌─────────┐ ─────────► ┌───────────┐ ───────────► ┌────────┐
//!   │ Default │            │ Custom(i) │              │ Hidden │
//!   └─────────┘ ◄───────── └───────────┘ ◄─────────── └────────┘
//!        ▲      set_default()            set(i)            │
//!        │            free(i) of the active slot           │
//!        └──────────────────────────────────────────────────┘
//!                           set_default()
//! ```
//!
//! `new` and `free` manage the cursor cache without changing the displayed
//! cursor, except that freeing the slot of the active custom cursor reverts
//! to the built-in default so the state never names a dead slot.
//!
//! Every transition sends its `cursor` instruction and flushes before
//! returning, so the client sees cursor changes in engine order.

use rdp_relay_core::{ImageGeometry, Instruction, LayerId, PixelBuffer, PixelFormat, Rgba};
use tracing::{debug, warn};

use crate::application::update::{CursorResource, UpdateContext};
use crate::domain::error::RelayError;
use crate::domain::events::ImagePayload;

/// Cursor currently shown by the display client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerState {
    Hidden,
    Default,
    Custom(u32),
}

// ── Built-in default cursor ────────────────────────────────────────────────

pub const DEFAULT_POINTER_WIDTH: i32 = 11;
pub const DEFAULT_POINTER_HEIGHT: i32 = 16;
pub const DEFAULT_POINTER_FORMAT: PixelFormat = PixelFormat::Argb32;
pub const DEFAULT_POINTER_STRIDE: i32 = DEFAULT_POINTER_WIDTH * 4;

/// Classic arrow: `X` black outline, `o` white fill, `.` transparent.
/// The hotspot is the top-left pixel.
const DEFAULT_POINTER_ART: [&str; DEFAULT_POINTER_HEIGHT as usize] = [
    "X..........",
    "XX.........",
    "XoX........",
    "XooX.......",
    "XoooX......",
    "XooooX.....",
    "XoooooX....",
    "XooooooX...",
    "XoooooooX..",
    "XooooooooX.",
    "XoooooXXXXX",
    "XooXooX....",
    "XoX.XooX...",
    "XX..XooX...",
    "X....XooX..",
    ".....XXXX..",
];

/// Raw pixels of the built-in cursor in [`DEFAULT_POINTER_FORMAT`].
pub fn default_pointer_pixels() -> Vec<u8> {
    let mut data = Vec::with_capacity((DEFAULT_POINTER_STRIDE * DEFAULT_POINTER_HEIGHT) as usize);
    for row in DEFAULT_POINTER_ART {
        for cell in row.bytes() {
            let color = match cell {
                b'X' => Rgba::BLACK,
                b'o' => Rgba::WHITE,
                _ => Rgba::TRANSPARENT,
            };
            data.extend_from_slice(&[color.b, color.g, color.r, color.a]);
        }
    }
    data
}

fn default_pointer() -> Result<PixelBuffer, RelayError> {
    let geometry = ImageGeometry {
        width: DEFAULT_POINTER_WIDTH,
        height: DEFAULT_POINTER_HEIGHT,
        stride: DEFAULT_POINTER_STRIDE,
        format: DEFAULT_POINTER_FORMAT,
    };
    Ok(PixelBuffer::new(default_pointer_pixels(), geometry)?)
}

/// Uploads a one-off cursor image, points the cursor at it and frees the
/// temporary layer again.  The client copies the image on `cursor`, so the
/// layer is not needed afterwards.
fn send_transient_cursor(
    ctx: &mut UpdateContext,
    pixels: &PixelBuffer,
    hotspot_x: i32,
    hotspot_y: i32,
) -> Result<(), RelayError> {
    let layer = ctx.upload(pixels)?;
    ctx.send(Instruction::Cursor {
        hotspot_x,
        hotspot_y,
        src: layer,
        src_x: 0,
        src_y: 0,
        width: pixels.width(),
        height: pixels.height(),
    })?;
    ctx.dispose_layer(layer)?;
    Ok(())
}

// ── Transitions ────────────────────────────────────────────────────────────

/// Caches a server cursor in slot `index` and uploads it to a buffer layer.
/// The displayed cursor does not change.
pub fn new(
    ctx: &mut UpdateContext,
    index: u32,
    image: ImagePayload,
    hotspot_x: i32,
    hotspot_y: i32,
) -> Result<(), RelayError> {
    if let Some(evicted) = ctx.cursors.allocate(index)? {
        debug!(index, "cursor slot reused, disposing previous image");
        ctx.dispose_layer(evicted.layer)?;
    }
    let pixels = ctx.cursors.populate(index, image.data, image.geometry)?.pixels.clone();
    // A slot without an uploaded image must not be `set` later.
    let layer = match ctx.upload(&pixels) {
        Ok(layer) => layer,
        Err(err) => {
            ctx.cursors.release(index);
            return Err(err);
        }
    };
    let slot = ctx.cursors.get_mut(index)?;
    *slot.resource = CursorResource {
        layer,
        hotspot_x,
        hotspot_y,
    };
    Ok(())
}

/// Shows the cursor cached in slot `index`.
pub fn set(ctx: &mut UpdateContext, index: u32) -> Result<(), RelayError> {
    let (resource, width, height) = {
        let slot = ctx.cursors.get(index)?;
        (*slot.resource, slot.pixels.width(), slot.pixels.height())
    };
    ctx.send(Instruction::Cursor {
        hotspot_x: resource.hotspot_x,
        hotspot_y: resource.hotspot_y,
        src: resource.layer,
        src_x: 0,
        src_y: 0,
        width,
        height,
    })?;
    ctx.pointer = PointerState::Custom(index);
    ctx.flush()?;
    Ok(())
}

/// Hides the cursor.
pub fn set_null(ctx: &mut UpdateContext) -> Result<(), RelayError> {
    if ctx.native_cursor_hide {
        ctx.send(Instruction::Cursor {
            hotspot_x: 0,
            hotspot_y: 0,
            src: LayerId::DEFAULT,
            src_x: 0,
            src_y: 0,
            width: 0,
            height: 0,
        })?;
    } else {
        let transparent = PixelBuffer::blank(1, 1, PixelFormat::Argb32)?;
        send_transient_cursor(ctx, &transparent, 0, 0)?;
    }
    ctx.pointer = PointerState::Hidden;
    ctx.flush()?;
    Ok(())
}

/// Shows the built-in default cursor.
pub fn set_default(ctx: &mut UpdateContext) -> Result<(), RelayError> {
    let pixels = default_pointer()?;
    send_transient_cursor(ctx, &pixels, 0, 0)?;
    ctx.pointer = PointerState::Default;
    ctx.flush()?;
    Ok(())
}

/// Releases slot `index`.  Freeing a free slot does nothing.
///
/// If the slot holds the cursor being displayed, the default cursor is
/// shown instead.
pub fn free(ctx: &mut UpdateContext, index: u32) -> Result<(), RelayError> {
    let Some(resource) = ctx.cursors.release(index) else {
        return Ok(());
    };
    ctx.dispose_layer(resource.layer)?;
    if ctx.pointer == PointerState::Custom(index) {
        warn!(index, "active cursor freed, reverting to default cursor");
        return set_default(ctx);
    }
    ctx.flush()?;
    Ok(())
}
