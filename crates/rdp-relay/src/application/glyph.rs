//! Glyph cache and text runs.
//!
//! Glyphs arrive as alpha masks and are cached by slot index.  The engine
//! draws text as a *run*: `begin_draw` opens a canvas over the run bounds
//! (optionally filled with an opaque background), each `draw` composites one
//! cached mask in the foreground colour, and `end_draw` sends the finished
//! canvas as a single image on the current surface.

use rdp_relay_core::{CompositeMode, PixelBuffer, PixelFormat, Rect, Rgba};
use tracing::warn;

use crate::application::update::UpdateContext;
use crate::domain::error::RelayError;
use crate::domain::events::ImagePayload;

/// A text run being composited locally.
#[derive(Debug)]
pub struct GlyphRun {
    bounds: Rect,
    foreground: Rgba,
    canvas: PixelBuffer,
}

impl GlyphRun {
    pub fn bounds(&self) -> Rect {
        self.bounds
    }
}

pub fn new(ctx: &mut UpdateContext, index: u32, mask: ImagePayload) -> Result<(), RelayError> {
    ctx.glyphs.allocate(index)?;
    ctx.glyphs.populate(index, mask.data, mask.geometry)?;
    Ok(())
}

pub fn begin_draw(
    ctx: &mut UpdateContext,
    bounds: Rect,
    foreground: u32,
    background: u32,
    opaque: bool,
) -> Result<(), RelayError> {
    if ctx.glyph_run.is_some() {
        warn!("glyph run started before the previous one ended, discarding it");
    }
    ctx.glyph_run = None;
    // Engine bounds may reach far past the desktop; only the visible part
    // is composited.
    let Some(bounds) = bounds.intersection(&ctx.desktop) else {
        return Ok(());
    };
    let mut canvas = PixelBuffer::blank(bounds.width, bounds.height, PixelFormat::Argb32)?;
    if opaque {
        let fill = ctx.order_color(background);
        canvas.fill_rect(canvas.geometry().bounds(), fill);
    }
    ctx.glyph_run = Some(GlyphRun {
        bounds,
        foreground: ctx.order_color(foreground),
        canvas,
    });
    Ok(())
}

/// Composites glyph `index` at (`x`, `y`).  Outside a run the glyph is
/// drawn on its own in white.
pub fn draw(ctx: &mut UpdateContext, index: u32, x: i32, y: i32) -> Result<(), RelayError> {
    let slot = ctx.glyphs.get(index)?;
    if let Some(run) = ctx.glyph_run.as_mut() {
        run.canvas
            .blend_mask(slot.pixels, x - run.bounds.x, y - run.bounds.y, run.foreground);
        return Ok(());
    }
    let mut canvas =
        PixelBuffer::blank(slot.pixels.width(), slot.pixels.height(), PixelFormat::Argb32)?;
    canvas.blend_mask(slot.pixels, 0, 0, Rgba::WHITE);
    let surface = ctx.surface;
    ctx.send_png(CompositeMode::Over, surface, x, y, &canvas)
}

pub fn end_draw(ctx: &mut UpdateContext, _bounds: Rect) -> Result<(), RelayError> {
    let Some(run) = ctx.glyph_run.take() else {
        return Ok(());
    };
    let surface = ctx.surface;
    ctx.send_png(CompositeMode::Over, surface, run.bounds.x, run.bounds.y, &run.canvas)
}

pub fn free(ctx: &mut UpdateContext, index: u32) -> Result<(), RelayError> {
    ctx.glyphs.release(index);
    Ok(())
}
