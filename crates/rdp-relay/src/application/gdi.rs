//! Primitive drawing orders.
//!
//! Each order is replayed on the current surface as soon as it arrives.
//! Only the raster operations the display protocol can express directly are
//! rendered; anything else is logged and skipped.  Nothing here flushes
//! except [`end_paint`], which closes the frame.

use rdp_relay_core::{CompositeMode, Instruction, Rect, Rgba};
use tracing::{debug, warn};

use crate::application::bitmap;
use crate::application::update::UpdateContext;
use crate::domain::error::RelayError;
use crate::domain::events::Brush;

// Ternary raster operation codes.
pub const ROP_BLACKNESS: u8 = 0x00;
pub const ROP_DSTINVERT: u8 = 0x55;
pub const ROP_NOOP: u8 = 0xAA;
pub const ROP_SRCCOPY: u8 = 0xCC;
pub const ROP_PATCOPY: u8 = 0xF0;
pub const ROP_WHITENESS: u8 = 0xFF;

/// Fills `rect` on the current surface with `color`.
fn fill(ctx: &mut UpdateContext, rect: Rect, color: Rgba) -> Result<(), RelayError> {
    let layer = ctx.surface;
    ctx.send(Instruction::Rect {
        layer,
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    })?;
    ctx.send(Instruction::Cfill {
        mode: CompositeMode::Src,
        layer,
        color,
    })?;
    Ok(())
}

fn unsupported(order: &'static str, rop: u8) -> Result<(), RelayError> {
    warn!(order, rop = format_args!("{rop:#04x}"), "unsupported raster operation, order skipped");
    Ok(())
}

pub fn dstblt(ctx: &mut UpdateContext, rect: Rect, rop: u8) -> Result<(), RelayError> {
    match rop {
        ROP_BLACKNESS => fill(ctx, rect, Rgba::BLACK),
        ROP_WHITENESS => fill(ctx, rect, Rgba::WHITE),
        ROP_NOOP => Ok(()),
        _ => unsupported("dstblt", rop),
    }
}

pub fn patblt(
    ctx: &mut UpdateContext,
    rect: Rect,
    rop: u8,
    foreground: u32,
    _background: u32,
    brush: Brush,
) -> Result<(), RelayError> {
    match rop {
        ROP_BLACKNESS => fill(ctx, rect, Rgba::BLACK),
        ROP_WHITENESS => fill(ctx, rect, Rgba::WHITE),
        ROP_NOOP => Ok(()),
        ROP_PATCOPY if brush == Brush::Solid => {
            let color = ctx.order_color(foreground);
            fill(ctx, rect, color)
        }
        ROP_PATCOPY => {
            warn!(?brush, "only solid brushes are supported, patblt skipped");
            Ok(())
        }
        _ => unsupported("patblt", rop),
    }
}

/// Copies a block of the current surface onto itself.
pub fn scrblt(
    ctx: &mut UpdateContext,
    rect: Rect,
    src_x: i32,
    src_y: i32,
    rop: u8,
) -> Result<(), RelayError> {
    if rop != ROP_SRCCOPY {
        return unsupported("scrblt", rop);
    }
    let layer = ctx.surface;
    ctx.send(Instruction::Copy {
        src: layer,
        src_x,
        src_y,
        width: rect.width,
        height: rect.height,
        mode: CompositeMode::Src,
        dst: layer,
        dst_x: rect.x,
        dst_y: rect.y,
    })?;
    Ok(())
}

/// Copies part of a cached bitmap onto the current surface.
pub fn memblt(
    ctx: &mut UpdateContext,
    index: u32,
    rect: Rect,
    src_x: i32,
    src_y: i32,
    rop: u8,
) -> Result<(), RelayError> {
    match rop {
        ROP_SRCCOPY => {
            let area = Rect::new(src_x, src_y, rect.width, rect.height);
            bitmap::draw_region(ctx, index, area, rect.x, rect.y)
        }
        ROP_BLACKNESS => fill(ctx, rect, Rgba::BLACK),
        ROP_WHITENESS => fill(ctx, rect, Rgba::WHITE),
        ROP_NOOP => Ok(()),
        _ => unsupported("memblt", rop),
    }
}

pub fn opaque_rect(ctx: &mut UpdateContext, rect: Rect, color: u32) -> Result<(), RelayError> {
    let color = ctx.order_color(color);
    fill(ctx, rect, color)
}

pub fn palette_update(ctx: &mut UpdateContext, colors: &[Rgba]) -> Result<(), RelayError> {
    debug!(entries = colors.len(), "palette update");
    ctx.palette.update(colors);
    Ok(())
}

/// Restricts drawing on the current surface to `bounds`, or lifts the
/// restriction for `None`.
pub fn bounds_update(ctx: &mut UpdateContext, bounds: Option<Rect>) -> Result<(), RelayError> {
    let layer = ctx.surface;
    match bounds {
        Some(rect) => {
            ctx.send(Instruction::Rect {
                layer,
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
            })?;
            ctx.send(Instruction::Clip { layer })?;
        }
        None => ctx.send(Instruction::Reset { layer })?,
    }
    ctx.clip = bounds;
    Ok(())
}

/// Closes the frame: `sync` plus flush.
pub fn end_paint(ctx: &mut UpdateContext) -> Result<(), RelayError> {
    ctx.end_frame()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::CacheCapacities;
    use crate::domain::events::ImagePayload;
    use crate::infrastructure::mock::RecordingSink;
    use rdp_relay_core::{ImageGeometry, LayerId, PixelFormat};

    fn context(depth: u32) -> (UpdateContext, RecordingSink) {
        let sink = RecordingSink::new();
        let ctx = UpdateContext::new(Box::new(sink.clone()), CacheCapacities::default(), depth, true);
        (ctx, sink)
    }

    fn fill_color(sent: &[Instruction]) -> Option<Rgba> {
        sent.iter().find_map(|i| match i {
            Instruction::Cfill { color, .. } => Some(*color),
            _ => None,
        })
    }

    #[test]
    fn test_dstblt_blackness_fills_black() {
        // Arrange
        let (mut ctx, sink) = context(32);

        // Act
        dstblt(&mut ctx, Rect::new(1, 2, 3, 4), ROP_BLACKNESS).unwrap();

        // Assert
        let sent = sink.instructions();
        assert_eq!(
            sent[0],
            Instruction::Rect {
                layer: LayerId::DEFAULT,
                x: 1,
                y: 2,
                width: 3,
                height: 4
            }
        );
        assert_eq!(fill_color(&sent), Some(Rgba::BLACK));
    }

    #[test]
    fn test_dstblt_noop_and_unsupported_send_nothing() {
        let (mut ctx, sink) = context(32);

        dstblt(&mut ctx, Rect::new(0, 0, 1, 1), ROP_NOOP).unwrap();
        dstblt(&mut ctx, Rect::new(0, 0, 1, 1), ROP_DSTINVERT).unwrap();

        assert!(sink.instructions().is_empty());
    }

    #[test]
    fn test_patblt_solid_uses_converted_foreground() {
        let (mut ctx, sink) = context(16);

        patblt(&mut ctx, Rect::new(0, 0, 2, 2), ROP_PATCOPY, 0xF800, 0, Brush::Solid).unwrap();

        assert_eq!(fill_color(&sink.instructions()), Some(Rgba::opaque(0xFF, 0, 0)));
    }

    #[test]
    fn test_patblt_hatched_brush_is_skipped() {
        let (mut ctx, sink) = context(16);

        patblt(&mut ctx, Rect::new(0, 0, 2, 2), ROP_PATCOPY, 0xF800, 0, Brush::Hatched).unwrap();

        assert!(sink.instructions().is_empty());
    }

    #[test]
    fn test_scrblt_copies_within_surface() {
        let (mut ctx, sink) = context(32);

        scrblt(&mut ctx, Rect::new(10, 10, 5, 5), 0, 0, ROP_SRCCOPY).unwrap();

        assert_eq!(
            sink.instructions(),
            vec![Instruction::Copy {
                src: LayerId::DEFAULT,
                src_x: 0,
                src_y: 0,
                width: 5,
                height: 5,
                mode: CompositeMode::Src,
                dst: LayerId::DEFAULT,
                dst_x: 10,
                dst_y: 10,
            }]
        );
    }

    #[test]
    fn test_memblt_of_unknown_bitmap_fails_without_output() {
        let (mut ctx, sink) = context(32);

        let result = memblt(&mut ctx, 5, Rect::new(0, 0, 4, 4), 0, 0, ROP_SRCCOPY);

        assert!(matches!(result, Err(RelayError::UnknownSlot { kind: "bitmap", index: 5 })));
        assert!(sink.instructions().is_empty());
    }

    #[test]
    fn test_memblt_draws_cached_bitmap() {
        // Arrange
        let (mut ctx, sink) = context(32);
        let image = ImagePayload::new(vec![0; 64], ImageGeometry::packed(4, 4, PixelFormat::Argb32));
        bitmap::new(&mut ctx, 5, image, false).unwrap();

        // Act
        memblt(&mut ctx, 5, Rect::new(20, 30, 2, 2), 1, 1, ROP_SRCCOPY).unwrap();

        // Assert
        assert!(matches!(
            sink.instructions()[..],
            [Instruction::Png { x: 20, y: 30, .. }]
        ));
    }

    #[test]
    fn test_palette_update_changes_8bit_colours() {
        // Arrange
        let (mut ctx, sink) = context(8);
        palette_update(&mut ctx, &[Rgba::opaque(1, 2, 3)]).unwrap();

        // Act
        opaque_rect(&mut ctx, Rect::new(0, 0, 1, 1), 0).unwrap();

        // Assert
        assert_eq!(fill_color(&sink.instructions()), Some(Rgba::opaque(1, 2, 3)));
    }

    #[test]
    fn test_bounds_set_and_cleared() {
        // Arrange
        let (mut ctx, sink) = context(32);

        // Act
        bounds_update(&mut ctx, Some(Rect::new(0, 0, 10, 10))).unwrap();
        let clipped = ctx.clip();
        bounds_update(&mut ctx, None).unwrap();

        // Assert
        assert_eq!(clipped, Some(Rect::new(0, 0, 10, 10)));
        assert_eq!(ctx.clip(), None);
        let opcodes: Vec<&str> = sink.instructions().iter().map(|i| i.opcode()).collect();
        assert_eq!(opcodes, vec!["rect", "clip", "reset"]);
    }

    #[test]
    fn test_end_paint_is_the_only_flush() {
        let (mut ctx, sink) = context(32);

        opaque_rect(&mut ctx, Rect::new(0, 0, 1, 1), 0).unwrap();
        dstblt(&mut ctx, Rect::new(0, 0, 1, 1), ROP_WHITENESS).unwrap();
        assert_eq!(sink.flush_count(), 0);
        end_paint(&mut ctx).unwrap();

        assert_eq!(sink.flush_count(), 1);
        assert_eq!(sink.instructions().last().map(|i| i.opcode()), Some("sync"));
    }
}
