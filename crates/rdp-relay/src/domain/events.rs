//! Updates delivered by the remote engine.
//!
//! Every callback the remote desktop engine can invoke on the update thread
//! is represented as one [`EngineEvent`] variant carrying its payload.  The
//! dispatcher looks up a handler by the event's [`EventKind`] tag; the set of
//! kinds a session registers for is announced to the engine during
//! pre-connect.
//!
//! Pixel payloads arrive already converted to the declared
//! [`rdp_relay_core::PixelFormat`]; decompression is the engine's job.

use rdp_relay_core::{ImageGeometry, Rect, Rgba};

/// Raw pixels plus their declared shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub data: Vec<u8>,
    pub geometry: ImageGeometry,
}

impl ImagePayload {
    pub fn new(data: Vec<u8>, geometry: ImageGeometry) -> Self {
        Self { data, geometry }
    }
}

/// Brush of a pattern blit.  Only solid brushes are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Brush {
    Solid,
    Hatched,
    Pattern,
}

/// One update from the remote engine.
///
/// Colours in drawing orders are raw order colours in the session colour
/// depth; handlers convert them with the session palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    // ── Pointer ───────────────────────────────────────────────────────────
    CursorNew {
        index: u32,
        image: ImagePayload,
        hotspot_x: i32,
        hotspot_y: i32,
    },
    CursorSet {
        index: u32,
    },
    CursorSetNull,
    CursorSetDefault,
    CursorFree {
        index: u32,
    },

    // ── Bitmap cache ──────────────────────────────────────────────────────
    /// Allocates and fills a bitmap slot.  `offscreen` marks surfaces the
    /// server draws into later; those need a buffer layer right away.
    BitmapNew {
        index: u32,
        image: ImagePayload,
        offscreen: bool,
    },
    BitmapPaint {
        index: u32,
        x: i32,
        y: i32,
    },
    /// Replaces the pixels of an allocated bitmap slot.
    BitmapDecompress {
        index: u32,
        image: ImagePayload,
    },
    /// Selects the drawing surface: `None` is the primary display.
    BitmapSetSurface {
        index: Option<u32>,
    },
    BitmapFree {
        index: u32,
    },

    // ── Glyph cache ───────────────────────────────────────────────────────
    GlyphNew {
        index: u32,
        mask: ImagePayload,
    },
    GlyphDraw {
        index: u32,
        x: i32,
        y: i32,
    },
    GlyphBeginDraw {
        bounds: Rect,
        foreground: u32,
        background: u32,
        opaque: bool,
    },
    GlyphEndDraw {
        bounds: Rect,
    },
    GlyphFree {
        index: u32,
    },

    // ── Drawing orders ────────────────────────────────────────────────────
    DstBlt {
        rect: Rect,
        rop: u8,
    },
    PatBlt {
        rect: Rect,
        rop: u8,
        foreground: u32,
        background: u32,
        brush: Brush,
    },
    ScrBlt {
        rect: Rect,
        src_x: i32,
        src_y: i32,
        rop: u8,
    },
    MemBlt {
        index: u32,
        rect: Rect,
        src_x: i32,
        src_y: i32,
        rop: u8,
    },
    OpaqueRect {
        rect: Rect,
        color: u32,
    },
    PaletteUpdate {
        colors: Vec<Rgba>,
    },
    /// Sets (`Some`) or clears (`None`) the clipping rectangle.
    BoundsUpdate {
        bounds: Option<Rect>,
    },
    EndPaint,
}

/// Tag of an [`EngineEvent`], used as the dispatch-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CursorNew,
    CursorSet,
    CursorSetNull,
    CursorSetDefault,
    CursorFree,
    BitmapNew,
    BitmapPaint,
    BitmapDecompress,
    BitmapSetSurface,
    BitmapFree,
    GlyphNew,
    GlyphDraw,
    GlyphBeginDraw,
    GlyphEndDraw,
    GlyphFree,
    DstBlt,
    PatBlt,
    ScrBlt,
    MemBlt,
    OpaqueRect,
    PaletteUpdate,
    BoundsUpdate,
    EndPaint,
}

impl EventKind {
    /// Every kind, in registration order.
    pub const ALL: [EventKind; 23] = [
        EventKind::CursorNew,
        EventKind::CursorSet,
        EventKind::CursorSetNull,
        EventKind::CursorSetDefault,
        EventKind::CursorFree,
        EventKind::BitmapNew,
        EventKind::BitmapPaint,
        EventKind::BitmapDecompress,
        EventKind::BitmapSetSurface,
        EventKind::BitmapFree,
        EventKind::GlyphNew,
        EventKind::GlyphDraw,
        EventKind::GlyphBeginDraw,
        EventKind::GlyphEndDraw,
        EventKind::GlyphFree,
        EventKind::DstBlt,
        EventKind::PatBlt,
        EventKind::ScrBlt,
        EventKind::MemBlt,
        EventKind::OpaqueRect,
        EventKind::PaletteUpdate,
        EventKind::BoundsUpdate,
        EventKind::EndPaint,
    ];

    /// Name of the engine callback this kind stands for.
    pub fn callback_name(self) -> &'static str {
        match self {
            EventKind::CursorNew => "on_cursor_new",
            EventKind::CursorSet => "on_cursor_set",
            EventKind::CursorSetNull => "on_cursor_set_null",
            EventKind::CursorSetDefault => "on_cursor_set_default",
            EventKind::CursorFree => "on_cursor_free",
            EventKind::BitmapNew => "on_bitmap_new",
            EventKind::BitmapPaint => "on_bitmap_paint",
            EventKind::BitmapDecompress => "on_bitmap_decompress",
            EventKind::BitmapSetSurface => "on_bitmap_set_surface",
            EventKind::BitmapFree => "on_bitmap_free",
            EventKind::GlyphNew => "on_glyph_new",
            EventKind::GlyphDraw => "on_glyph_draw",
            EventKind::GlyphBeginDraw => "on_glyph_begin_draw",
            EventKind::GlyphEndDraw => "on_glyph_end_draw",
            EventKind::GlyphFree => "on_glyph_free",
            EventKind::DstBlt => "on_order_dstblt",
            EventKind::PatBlt => "on_order_patblt",
            EventKind::ScrBlt => "on_order_scrblt",
            EventKind::MemBlt => "on_order_memblt",
            EventKind::OpaqueRect => "on_order_opaquerect",
            EventKind::PaletteUpdate => "on_palette_update",
            EventKind::BoundsUpdate => "on_bounds_update",
            EventKind::EndPaint => "on_end_paint",
        }
    }
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::CursorNew { .. } => EventKind::CursorNew,
            EngineEvent::CursorSet { .. } => EventKind::CursorSet,
            EngineEvent::CursorSetNull => EventKind::CursorSetNull,
            EngineEvent::CursorSetDefault => EventKind::CursorSetDefault,
            EngineEvent::CursorFree { .. } => EventKind::CursorFree,
            EngineEvent::BitmapNew { .. } => EventKind::BitmapNew,
            EngineEvent::BitmapPaint { .. } => EventKind::BitmapPaint,
            EngineEvent::BitmapDecompress { .. } => EventKind::BitmapDecompress,
            EngineEvent::BitmapSetSurface { .. } => EventKind::BitmapSetSurface,
            EngineEvent::BitmapFree { .. } => EventKind::BitmapFree,
            EngineEvent::GlyphNew { .. } => EventKind::GlyphNew,
            EngineEvent::GlyphDraw { .. } => EventKind::GlyphDraw,
            EngineEvent::GlyphBeginDraw { .. } => EventKind::GlyphBeginDraw,
            EngineEvent::GlyphEndDraw { .. } => EventKind::GlyphEndDraw,
            EngineEvent::GlyphFree { .. } => EventKind::GlyphFree,
            EngineEvent::DstBlt { .. } => EventKind::DstBlt,
            EngineEvent::PatBlt { .. } => EventKind::PatBlt,
            EngineEvent::ScrBlt { .. } => EventKind::ScrBlt,
            EngineEvent::MemBlt { .. } => EventKind::MemBlt,
            EngineEvent::OpaqueRect { .. } => EventKind::OpaqueRect,
            EngineEvent::PaletteUpdate { .. } => EventKind::PaletteUpdate,
            EngineEvent::BoundsUpdate { .. } => EventKind::BoundsUpdate,
            EngineEvent::EndPaint => EventKind::EndPaint,
        }
    }
}
