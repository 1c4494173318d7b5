//! State guarded by the update lock.
//!
//! [`UpdateContext`] owns everything the update thread touches while
//! replaying engine callbacks: the outbound sink, the three cache stores,
//! the pointer state, the layer pool and the drawing state (current surface,
//! clip, palette, glyph run).  The session wraps it in one
//! `parking_lot::Mutex`; holding that guard *is* holding the update lock.
//!
//! Handlers receive `&mut UpdateContext` and never lock anything
//! themselves, so no code path can re-enter the update lock.  Resources
//! evicted from a cache are handed back by the store and disposed here by
//! the caller that already holds the context.

use std::time::{SystemTime, UNIX_EPOCH};

use rdp_relay_core::domain::color::convert_order_color;
use rdp_relay_core::{
    CompositeMode, Instruction, KeysymState, LayerId, LayerPool, Palette, PixelBuffer, Rect, Rgba, SlotStore,
};
use tracing::trace;

use crate::application::glyph::GlyphRun;
use crate::application::pointer::PointerState;
use crate::application::sink::DisplaySink;
use crate::domain::config::CacheCapacities;
use crate::domain::error::{RelayError, SinkError};
use crate::domain::settings::{RDP_DEFAULT_HEIGHT, RDP_DEFAULT_WIDTH};

/// Per-slot resource of the cursor cache: the buffer layer holding the
/// uploaded image and the hotspot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorResource {
    /// Buffer layer, or the default layer while nothing is uploaded.
    pub layer: LayerId,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
}

/// Per-slot resource of the bitmap cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapResource {
    /// Buffer layer once the bitmap has been promoted; `None` while it
    /// is only held locally.
    pub layer: Option<LayerId>,
    /// How often the bitmap was drawn.
    pub used: u32,
}

/// Glyphs are composited locally and need no display resource.
pub type GlyphResource = ();

/// Everything behind the update lock.
pub struct UpdateContext {
    sink: Box<dyn DisplaySink>,
    pub(crate) layers: LayerPool,
    pub(crate) cursors: SlotStore<CursorResource>,
    pub(crate) bitmaps: SlotStore<BitmapResource>,
    pub(crate) glyphs: SlotStore<GlyphResource>,
    pub(crate) pointer: PointerState,
    /// Layer that drawing orders currently target.
    pub(crate) surface: LayerId,
    pub(crate) palette: Palette,
    pub(crate) clip: Option<Rect>,
    pub(crate) glyph_run: Option<GlyphRun>,
    /// Remote desktop area; glyph runs never extend past it.
    pub(crate) desktop: Rect,
    /// Keys the remote side sees as held.
    pub(crate) keysyms: KeysymState,
    pub(crate) color_depth: u32,
    /// Whether the client understands a zero-size cursor as "hidden".
    pub(crate) native_cursor_hide: bool,
    last_sync: Option<u64>,
    last_ack: Option<u64>,
}

impl UpdateContext {
    pub fn new(
        sink: Box<dyn DisplaySink>,
        capacities: CacheCapacities,
        color_depth: u32,
        native_cursor_hide: bool,
    ) -> Self {
        Self {
            sink,
            layers: LayerPool::new(),
            cursors: SlotStore::new("cursor", capacities.cursors),
            bitmaps: SlotStore::new("bitmap", capacities.bitmaps),
            glyphs: SlotStore::new("glyph", capacities.glyphs),
            pointer: PointerState::Default,
            surface: LayerId::DEFAULT,
            palette: Palette::default(),
            clip: None,
            glyph_run: None,
            desktop: Rect::new(0, 0, RDP_DEFAULT_WIDTH, RDP_DEFAULT_HEIGHT),
            keysyms: KeysymState::new(),
            color_depth,
            native_cursor_hide,
            last_sync: None,
            last_ack: None,
        }
    }

    /// Sets the negotiated desktop size.
    pub fn with_desktop(mut self, width: i32, height: i32) -> Self {
        self.desktop = Rect::new(0, 0, width, height);
        self
    }

    // ── Outbound ──────────────────────────────────────────────────────────

    pub fn send(&mut self, instruction: Instruction) -> Result<(), SinkError> {
        trace!(opcode = instruction.opcode(), "send");
        self.sink.send(&instruction)
    }

    pub fn flush(&mut self) -> Result<(), SinkError> {
        self.sink.flush()
    }

    /// Sends `pixels` as a PNG at (`x`, `y`) on `layer`.
    pub(crate) fn send_png(
        &mut self,
        mode: CompositeMode,
        layer: LayerId,
        x: i32,
        y: i32,
        pixels: &PixelBuffer,
    ) -> Result<(), RelayError> {
        let data = pixels.encode_png()?;
        self.send(Instruction::Png {
            mode,
            layer,
            x,
            y,
            data,
        })?;
        Ok(())
    }

    /// Uploads `pixels` into a fresh buffer layer and returns it.
    pub(crate) fn upload(&mut self, pixels: &PixelBuffer) -> Result<LayerId, RelayError> {
        let layer = self.layers.allocate();
        let sent = self
            .send(Instruction::Size {
                layer,
                width: pixels.width(),
                height: pixels.height(),
            })
            .map_err(RelayError::from)
            .and_then(|()| self.send_png(CompositeMode::Src, layer, 0, 0, pixels));
        if let Err(err) = sent {
            self.layers.release(layer);
            return Err(err);
        }
        Ok(layer)
    }

    /// Deletes a buffer layer on the client and returns its index to the
    /// pool.  The default layer is never disposed.
    pub(crate) fn dispose_layer(&mut self, layer: LayerId) -> Result<(), SinkError> {
        if !layer.is_buffer() {
            return Ok(());
        }
        if self.surface == layer {
            self.surface = LayerId::DEFAULT;
        }
        self.layers.release(layer);
        self.send(Instruction::Dispose { layer })
    }

    // ── Drawing state ─────────────────────────────────────────────────────

    /// Converts a raw order colour using the session depth and palette.
    pub(crate) fn order_color(&self, color: u32) -> Rgba {
        convert_order_color(color, self.color_depth, &self.palette)
    }

    pub fn pointer(&self) -> PointerState {
        self.pointer
    }

    pub fn surface(&self) -> LayerId {
        self.surface
    }

    pub fn clip(&self) -> Option<Rect> {
        self.clip
    }

    pub fn keysyms(&self) -> &KeysymState {
        &self.keysyms
    }

    pub(crate) fn keysyms_mut(&mut self) -> &mut KeysymState {
        &mut self.keysyms
    }

    /// Number of buffer layers currently allocated on the client.
    pub fn layers_in_use(&self) -> usize {
        self.layers.in_use()
    }

    // ── Frames ────────────────────────────────────────────────────────────

    /// Ends a frame: sends `sync` with the current time and flushes.
    pub fn end_frame(&mut self) -> Result<(), SinkError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_sync = Some(now);
        self.send(Instruction::Sync { timestamp: now })?;
        self.flush()
    }

    /// Records a frame acknowledgement from the client.
    pub fn acknowledge(&mut self, timestamp: u64) {
        self.last_ack = Some(timestamp);
    }

    pub fn last_sync(&self) -> Option<u64> {
        self.last_sync
    }

    pub fn last_ack(&self) -> Option<u64> {
        self.last_ack
    }

    // ── Teardown ──────────────────────────────────────────────────────────

    /// Empties every cache and disposes their layers, glyphs first, then
    /// bitmaps, then cursors.
    pub fn release_all(&mut self) -> Result<(), SinkError> {
        self.glyph_run = None;
        self.glyphs.drain();
        for bitmap in self.bitmaps.drain() {
            if let Some(layer) = bitmap.layer {
                self.dispose_layer(layer)?;
            }
        }
        for cursor in self.cursors.drain() {
            self.dispose_layer(cursor.layer)?;
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::RecordingSink;
    use rdp_relay_core::PixelFormat;

    fn context() -> (UpdateContext, RecordingSink) {
        let sink = RecordingSink::new();
        let ctx = UpdateContext::new(Box::new(sink.clone()), CacheCapacities::default(), 32, true);
        (ctx, sink)
    }

    #[test]
    fn test_upload_sizes_then_draws_into_buffer_layer() {
        // Arrange
        let (mut ctx, sink) = context();
        let pixels = PixelBuffer::blank(4, 2, PixelFormat::Argb32).unwrap();

        // Act
        let layer = ctx.upload(&pixels).unwrap();

        // Assert
        assert!(layer.is_buffer());
        let sent = sink.instructions();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[0],
            Instruction::Size {
                layer,
                width: 4,
                height: 2
            }
        );
        assert!(matches!(sent[1], Instruction::Png { layer: l, .. } if l == layer));
    }

    #[test]
    fn test_dispose_ignores_default_layer() {
        let (mut ctx, sink) = context();

        ctx.dispose_layer(LayerId::DEFAULT).unwrap();

        assert!(sink.instructions().is_empty());
    }

    #[test]
    fn test_disposing_current_surface_falls_back_to_default() {
        // Arrange
        let (mut ctx, _sink) = context();
        let layer = ctx.layers.allocate();
        ctx.surface = layer;

        // Act
        ctx.dispose_layer(layer).unwrap();

        // Assert
        assert_eq!(ctx.surface(), LayerId::DEFAULT);
        assert_eq!(ctx.layers_in_use(), 0);
    }

    #[test]
    fn test_end_frame_sends_sync_and_flushes_once() {
        let (mut ctx, sink) = context();

        ctx.end_frame().unwrap();

        assert!(matches!(sink.instructions()[..], [Instruction::Sync { .. }]));
        assert_eq!(sink.flush_count(), 1);
        assert!(ctx.last_sync().is_some());
    }

    #[test]
    fn test_acknowledge_records_timestamp() {
        let (mut ctx, _sink) = context();

        ctx.acknowledge(1234);

        assert_eq!(ctx.last_ack(), Some(1234));
    }

    #[test]
    fn test_release_all_disposes_every_layer() {
        // Arrange
        let (mut ctx, sink) = context();
        let a = ctx.layers.allocate();
        let b = ctx.layers.allocate();
        ctx.cursors.allocate(1).unwrap();
        ctx.cursors.populate(1, vec![0; 4], rdp_relay_core::ImageGeometry::packed(1, 1, PixelFormat::Argb32))
            .unwrap()
            .resource
            .layer = a;
        ctx.bitmaps.allocate(2).unwrap();
        ctx.bitmaps
            .populate(2, vec![0; 4], rdp_relay_core::ImageGeometry::packed(1, 1, PixelFormat::Rgb24))
            .unwrap()
            .resource
            .layer = Some(b);

        // Act
        ctx.release_all().unwrap();

        // Assert
        let disposed: Vec<LayerId> = sink
            .instructions()
            .into_iter()
            .filter_map(|i| match i {
                Instruction::Dispose { layer } => Some(layer),
                _ => None,
            })
            .collect();
        assert_eq!(disposed, vec![b, a]);
        assert_eq!(ctx.layers_in_use(), 0);
        assert!(ctx.cursors.is_empty() && ctx.bitmaps.is_empty());
    }
}
