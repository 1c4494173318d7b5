//! Cache-slot stores for cursors, bitmaps and glyphs, and the pixel buffers
//! they own.

pub mod pixel;
pub mod slot;

pub use pixel::{ImageError, ImageGeometry, PixelBuffer, PixelFormat};
pub use slot::{CacheError, Slot, SlotMut, SlotStore};
