//! Bitmap cache.
//!
//! Bitmaps are kept locally first.  The first time one is drawn its pixels
//! are sent inline as a PNG; from the second use on it is uploaded once into
//! a buffer layer and every further draw is a cheap `copy` from that layer.
//! Most bitmaps are drawn once, so this avoids filling the client with
//! layers nobody reuses.
//!
//! Off-screen surfaces (`offscreen` on `new`) get their layer immediately
//! because the server will select them as a drawing target.

use rdp_relay_core::{CompositeMode, Instruction, LayerId, Rect};
use tracing::debug;

use crate::application::update::{BitmapResource, UpdateContext};
use crate::domain::error::RelayError;
use crate::domain::events::ImagePayload;

pub fn new(
    ctx: &mut UpdateContext,
    index: u32,
    image: ImagePayload,
    offscreen: bool,
) -> Result<(), RelayError> {
    if let Some(BitmapResource {
        layer: Some(layer), ..
    }) = ctx.bitmaps.allocate(index)?
    {
        debug!(index, "bitmap slot reused, disposing previous layer");
        ctx.dispose_layer(layer)?;
    }
    ctx.bitmaps.populate(index, image.data, image.geometry)?;
    if offscreen {
        ensure_layer(ctx, index)?;
    }
    Ok(())
}

/// Returns the buffer layer of bitmap `index`, uploading it first if it is
/// still held only locally.
pub fn ensure_layer(ctx: &mut UpdateContext, index: u32) -> Result<LayerId, RelayError> {
    let pixels = {
        let slot = ctx.bitmaps.get(index)?;
        if let Some(layer) = slot.resource.layer {
            return Ok(layer);
        }
        slot.pixels.clone()
    };
    let layer = ctx.upload(&pixels)?;
    ctx.bitmaps.get_mut(index)?.resource.layer = Some(layer);
    Ok(layer)
}

/// Draws `area` of bitmap `index` at (`dst_x`, `dst_y`) on the current
/// surface, promoting the bitmap to a layer on its second use.
pub fn draw_region(
    ctx: &mut UpdateContext,
    index: u32,
    area: Rect,
    dst_x: i32,
    dst_y: i32,
) -> Result<(), RelayError> {
    let (resource, bounds) = {
        let slot = ctx.bitmaps.get(index)?;
        (*slot.resource, slot.pixels.geometry().bounds())
    };
    let Some(clipped) = area.intersection(&bounds) else {
        debug!(index, ?area, "bitmap region outside image, nothing to draw");
        return Ok(());
    };
    let dst_x = dst_x + (clipped.x - area.x);
    let dst_y = dst_y + (clipped.y - area.y);
    let surface = ctx.surface;

    let layer = match resource.layer {
        Some(layer) => Some(layer),
        None if resource.used > 0 => Some(ensure_layer(ctx, index)?),
        None => None,
    };

    match layer {
        Some(src) => ctx.send(Instruction::Copy {
            src,
            src_x: clipped.x,
            src_y: clipped.y,
            width: clipped.width,
            height: clipped.height,
            mode: CompositeMode::Src,
            dst: surface,
            dst_x,
            dst_y,
        })?,
        None => {
            let data = ctx.bitmaps.get(index)?.pixels.encode_png_region(clipped)?;
            ctx.send(Instruction::Png {
                mode: CompositeMode::Src,
                layer: surface,
                x: dst_x,
                y: dst_y,
                data,
            })?;
        }
    }

    ctx.bitmaps.get_mut(index)?.resource.used += 1;
    Ok(())
}

/// Draws the whole of bitmap `index` with its top-left corner at
/// (`x`, `y`).
pub fn paint(ctx: &mut UpdateContext, index: u32, x: i32, y: i32) -> Result<(), RelayError> {
    let bounds = ctx.bitmaps.get(index)?.pixels.geometry().bounds();
    draw_region(ctx, index, bounds, x, y)
}

/// Replaces the pixels of bitmap `index`.  A bitmap that already has a
/// layer gets the new pixels uploaded into it.
pub fn decompress(ctx: &mut UpdateContext, index: u32, image: ImagePayload) -> Result<(), RelayError> {
    let (pixels, layer) = {
        let slot = ctx.bitmaps.populate(index, image.data, image.geometry)?;
        (slot.pixels.clone(), slot.resource.layer)
    };
    if let Some(layer) = layer {
        ctx.send(Instruction::Size {
            layer,
            width: pixels.width(),
            height: pixels.height(),
        })?;
        ctx.send_png(CompositeMode::Src, layer, 0, 0, &pixels)?;
    }
    Ok(())
}

/// Selects where drawing orders go: the primary display for `None`,
/// otherwise the layer of bitmap `index`.
pub fn set_surface(ctx: &mut UpdateContext, index: Option<u32>) -> Result<(), RelayError> {
    ctx.surface = match index {
        None => LayerId::DEFAULT,
        Some(index) => ensure_layer(ctx, index)?,
    };
    Ok(())
}

pub fn free(ctx: &mut UpdateContext, index: u32) -> Result<(), RelayError> {
    if let Some(BitmapResource {
        layer: Some(layer), ..
    }) = ctx.bitmaps.release(index)
    {
        ctx.dispose_layer(layer)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CacheCapacities;
    use crate::infrastructure::mock::RecordingSink;
    use rdp_relay_core::{ImageGeometry, PixelFormat};

    fn context() -> (UpdateContext, RecordingSink) {
        let sink = RecordingSink::new();
        let ctx = UpdateContext::new(Box::new(sink.clone()), CacheCapacities::default(), 32, true);
        (ctx, sink)
    }

    fn image(width: i32, height: i32) -> ImagePayload {
        ImagePayload::new(
            vec![0x80; (width * height * 4) as usize],
            ImageGeometry::packed(width, height, PixelFormat::Rgb24),
        )
    }

    #[test]
    fn test_first_paint_is_inline_second_is_copy() {
        // Arrange
        let (mut ctx, sink) = context();
        new(&mut ctx, 7, image(8, 8), false).unwrap();

        // Act
        paint(&mut ctx, 7, 0, 0).unwrap();
        paint(&mut ctx, 7, 16, 16).unwrap();

        // Assert
        let sent = sink.instructions();
        assert!(matches!(sent[0], Instruction::Png { layer: LayerId::DEFAULT, .. }));
        assert!(matches!(sent[1], Instruction::Size { width: 8, height: 8, .. }));
        assert!(matches!(sent[2], Instruction::Png { .. }));
        assert!(matches!(
            sent[3],
            Instruction::Copy {
                dst: LayerId::DEFAULT,
                dst_x: 16,
                dst_y: 16,
                width: 8,
                height: 8,
                ..
            }
        ));
        assert_eq!(sent.len(), 4);
    }

    #[test]
    fn test_paint_unknown_bitmap_is_reported() {
        let (mut ctx, sink) = context();

        let result = paint(&mut ctx, 3, 0, 0);

        assert!(matches!(result, Err(RelayError::UnknownSlot { kind: "bitmap", index: 3 })));
        assert!(sink.instructions().is_empty());
    }

    #[test]
    fn test_offscreen_bitmap_gets_layer_immediately() {
        let (mut ctx, _sink) = context();

        new(&mut ctx, 1, image(4, 4), true).unwrap();

        assert!(ctx.bitmaps.get(1).unwrap().resource.layer.is_some());
    }

    #[test]
    fn test_set_surface_targets_bitmap_layer_then_primary() {
        // Arrange
        let (mut ctx, _sink) = context();
        new(&mut ctx, 1, image(4, 4), true).unwrap();
        let layer = ctx.bitmaps.get(1).unwrap().resource.layer.unwrap();

        // Act / Assert
        set_surface(&mut ctx, Some(1)).unwrap();
        assert_eq!(ctx.surface(), layer);
        set_surface(&mut ctx, None).unwrap();
        assert_eq!(ctx.surface(), LayerId::DEFAULT);
    }

    #[test]
    fn test_free_disposes_layer_and_forgets_slot() {
        // Arrange
        let (mut ctx, sink) = context();
        new(&mut ctx, 1, image(4, 4), true).unwrap();
        let layer = ctx.bitmaps.get(1).unwrap().resource.layer.unwrap();

        // Act
        free(&mut ctx, 1).unwrap();

        // Assert
        assert!(sink.instructions().contains(&Instruction::Dispose { layer }));
        assert!(matches!(paint(&mut ctx, 1, 0, 0), Err(RelayError::UnknownSlot { .. })));
        assert_eq!(ctx.layers_in_use(), 0);
    }

    #[test]
    fn test_reallocating_slot_never_draws_stale_pixels() {
        // Arrange
        let (mut ctx, _sink) = context();
        new(&mut ctx, 1, image(4, 4), false).unwrap();

        // Act: allocate without populating, as a failed payload would leave it
        ctx.bitmaps.allocate(1).unwrap();

        // Assert
        assert!(matches!(paint(&mut ctx, 1, 0, 0), Err(RelayError::UnknownSlot { .. })));
    }

    #[test]
    fn test_decompress_reuploads_into_existing_layer() {
        // Arrange
        let (mut ctx, sink) = context();
        new(&mut ctx, 1, image(4, 4), true).unwrap();
        let layer = ctx.bitmaps.get(1).unwrap().resource.layer.unwrap();
        sink.clear();

        // Act
        decompress(&mut ctx, 1, image(6, 2)).unwrap();

        // Assert
        let sent = sink.instructions();
        assert_eq!(
            sent[0],
            Instruction::Size {
                layer,
                width: 6,
                height: 2
            }
        );
        assert!(matches!(sent[1], Instruction::Png { layer: l, .. } if l == layer));
    }

    #[test]
    fn test_region_is_clipped_to_bitmap() {
        let (mut ctx, sink) = context();
        new(&mut ctx, 1, image(4, 4), true).unwrap();
        sink.clear();

        draw_region(&mut ctx, 1, Rect::new(2, 2, 10, 10), 100, 100).unwrap();

        assert!(matches!(
            sink.instructions()[..],
            [Instruction::Copy {
                src_x: 2,
                src_y: 2,
                width: 2,
                height: 2,
                dst_x: 100,
                dst_y: 100,
                ..
            }]
        ));
    }
}
