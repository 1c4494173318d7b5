//! Event-tag → handler table.
//!
//! The engine invokes callbacks; the relay turns each callback into an
//! [`EngineEvent`] and looks its handler up here.  The table is built once
//! per session during pre-connect and its keys are exactly the callback
//! kinds registered with the engine.
//!
//! Handlers are plain functions of `(&mut UpdateContext, EngineEvent)`.
//! The caller holds the update lock for the whole call; a handler never
//! takes a lock itself.
//!
//! # Error isolation
//!
//! [`CallbackTable::dispatch_all`] replays a batch in arrival order.  An
//! error that [`RelayError::is_fatal`] rejects (unknown slot, bad geometry,
//! image encoding) is logged and only the offending update is skipped.
//! A fatal error stops the batch and is returned.

use std::collections::HashMap;

use tracing::{trace, warn};

use crate::application::update::UpdateContext;
use crate::application::{bitmap, gdi, glyph, pointer};
use crate::domain::error::RelayError;
use crate::domain::events::{EngineEvent, EventKind};

/// Signature shared by every update handler.
pub type Handler = fn(&mut UpdateContext, EngineEvent) -> Result<(), RelayError>;

/// Maps event kinds to their handlers.
pub struct CallbackTable {
    handlers: HashMap<EventKind, Handler>,
}

impl CallbackTable {
    /// An empty table; useful for tests that register a subset.
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The full table with a handler for every [`EventKind`].
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(EventKind::CursorNew, on_cursor_new);
        table.register(EventKind::CursorSet, on_cursor_set);
        table.register(EventKind::CursorSetNull, on_cursor_set_null);
        table.register(EventKind::CursorSetDefault, on_cursor_set_default);
        table.register(EventKind::CursorFree, on_cursor_free);
        table.register(EventKind::BitmapNew, on_bitmap_new);
        table.register(EventKind::BitmapPaint, on_bitmap_paint);
        table.register(EventKind::BitmapDecompress, on_bitmap_decompress);
        table.register(EventKind::BitmapSetSurface, on_bitmap_set_surface);
        table.register(EventKind::BitmapFree, on_bitmap_free);
        table.register(EventKind::GlyphNew, on_glyph_new);
        table.register(EventKind::GlyphDraw, on_glyph_draw);
        table.register(EventKind::GlyphBeginDraw, on_glyph_begin_draw);
        table.register(EventKind::GlyphEndDraw, on_glyph_end_draw);
        table.register(EventKind::GlyphFree, on_glyph_free);
        table.register(EventKind::DstBlt, on_dstblt);
        table.register(EventKind::PatBlt, on_patblt);
        table.register(EventKind::ScrBlt, on_scrblt);
        table.register(EventKind::MemBlt, on_memblt);
        table.register(EventKind::OpaqueRect, on_opaque_rect);
        table.register(EventKind::PaletteUpdate, on_palette_update);
        table.register(EventKind::BoundsUpdate, on_bounds_update);
        table.register(EventKind::EndPaint, on_end_paint);
        table
    }

    /// Installs (or replaces) the handler for `kind`.
    pub fn register(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.insert(kind, handler);
    }

    /// Kinds with a handler, in [`EventKind::ALL`] order.
    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.handlers.contains_key(kind))
            .collect()
    }

    /// Runs the handler for one event.  Events without a handler are
    /// dropped.
    pub fn dispatch(&self, ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
        let kind = event.kind();
        match self.handlers.get(&kind) {
            Some(handler) => {
                trace!(callback = kind.callback_name(), "dispatch");
                handler(ctx, event)
            }
            None => {
                trace!(callback = kind.callback_name(), "no handler registered, update dropped");
                Ok(())
            }
        }
    }

    /// Replays `events` in order, skipping updates that fail with an
    /// isolated error.
    ///
    /// # Errors
    ///
    /// The first fatal error; later events are not processed.
    pub fn dispatch_all(
        &self,
        ctx: &mut UpdateContext,
        events: impl IntoIterator<Item = EngineEvent>,
    ) -> Result<(), RelayError> {
        for event in events {
            let callback = event.kind().callback_name();
            if let Err(err) = self.dispatch(ctx, event) {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!(callback, error = %err, "update skipped");
            }
        }
        Ok(())
    }
}

impl Default for CallbackTable {
    fn default() -> Self {
        Self::standard()
    }
}

// ── Handlers ───────────────────────────────────────────────────────────────
//
// Each handler is registered under the kind of the variant it destructures,
// so the `else` branches are unreachable through the table.

fn on_cursor_new(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::CursorNew {
        index,
        image,
        hotspot_x,
        hotspot_y,
    } = event
    else {
        return Ok(());
    };
    pointer::new(ctx, index, image, hotspot_x, hotspot_y)
}

fn on_cursor_set(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::CursorSet { index } = event else {
        return Ok(());
    };
    pointer::set(ctx, index)
}

fn on_cursor_set_null(ctx: &mut UpdateContext, _event: EngineEvent) -> Result<(), RelayError> {
    pointer::set_null(ctx)
}

fn on_cursor_set_default(ctx: &mut UpdateContext, _event: EngineEvent) -> Result<(), RelayError> {
    pointer::set_default(ctx)
}

fn on_cursor_free(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::CursorFree { index } = event else {
        return Ok(());
    };
    pointer::free(ctx, index)
}

fn on_bitmap_new(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BitmapNew {
        index,
        image,
        offscreen,
    } = event
    else {
        return Ok(());
    };
    bitmap::new(ctx, index, image, offscreen)
}

fn on_bitmap_paint(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BitmapPaint { index, x, y } = event else {
        return Ok(());
    };
    bitmap::paint(ctx, index, x, y)
}

fn on_bitmap_decompress(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BitmapDecompress { index, image } = event else {
        return Ok(());
    };
    bitmap::decompress(ctx, index, image)
}

fn on_bitmap_set_surface(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BitmapSetSurface { index } = event else {
        return Ok(());
    };
    bitmap::set_surface(ctx, index)
}

fn on_bitmap_free(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BitmapFree { index } = event else {
        return Ok(());
    };
    bitmap::free(ctx, index)
}

fn on_glyph_new(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::GlyphNew { index, mask } = event else {
        return Ok(());
    };
    glyph::new(ctx, index, mask)
}

fn on_glyph_draw(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::GlyphDraw { index, x, y } = event else {
        return Ok(());
    };
    glyph::draw(ctx, index, x, y)
}

fn on_glyph_begin_draw(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::GlyphBeginDraw {
        bounds,
        foreground,
        background,
        opaque,
    } = event
    else {
        return Ok(());
    };
    glyph::begin_draw(ctx, bounds, foreground, background, opaque)
}

fn on_glyph_end_draw(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::GlyphEndDraw { bounds } = event else {
        return Ok(());
    };
    glyph::end_draw(ctx, bounds)
}

fn on_glyph_free(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::GlyphFree { index } = event else {
        return Ok(());
    };
    glyph::free(ctx, index)
}

fn on_dstblt(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::DstBlt { rect, rop } = event else {
        return Ok(());
    };
    gdi::dstblt(ctx, rect, rop)
}

fn on_patblt(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::PatBlt {
        rect,
        rop,
        foreground,
        background,
        brush,
    } = event
    else {
        return Ok(());
    };
    gdi::patblt(ctx, rect, rop, foreground, background, brush)
}

fn on_scrblt(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::ScrBlt {
        rect,
        src_x,
        src_y,
        rop,
    } = event
    else {
        return Ok(());
    };
    gdi::scrblt(ctx, rect, src_x, src_y, rop)
}

fn on_memblt(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::MemBlt {
        index,
        rect,
        src_x,
        src_y,
        rop,
    } = event
    else {
        return Ok(());
    };
    gdi::memblt(ctx, index, rect, src_x, src_y, rop)
}

fn on_opaque_rect(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::OpaqueRect { rect, color } = event else {
        return Ok(());
    };
    gdi::opaque_rect(ctx, rect, color)
}

fn on_palette_update(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::PaletteUpdate { colors } = event else {
        return Ok(());
    };
    gdi::palette_update(ctx, &colors)
}

fn on_bounds_update(ctx: &mut UpdateContext, event: EngineEvent) -> Result<(), RelayError> {
    let EngineEvent::BoundsUpdate { bounds } = event else {
        return Ok(());
    };
    gdi::bounds_update(ctx, bounds)
}

fn on_end_paint(ctx: &mut UpdateContext, _event: EngineEvent) -> Result<(), RelayError> {
    gdi::end_paint(ctx)
}
