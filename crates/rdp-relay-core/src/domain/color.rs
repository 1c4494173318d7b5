//! Colour values and order-colour conversion.
//!
//! Drawing orders carry their colour as a raw integer whose meaning depends
//! on the session colour depth:
//!
//! | depth | encoding                                   |
//! |-------|--------------------------------------------|
//! | 8     | index into the session palette             |
//! | 15    | `0RRRRRGG GGGBBBBB` (RGB555)               |
//! | 16    | `RRRRRGGG GGGBBBBB` (RGB565)               |
//! | 24/32 | red in the low byte, then green, then blue |
//!
//! Whole-image pixel conversion is the engine's job; only single order
//! colours pass through here.

/// An 8-bit-per-channel colour with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0x00, 0x00, 0x00);
    pub const WHITE: Rgba = Rgba::opaque(0xFF, 0xFF, 0xFF);
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// A fully opaque colour.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Packs the colour as a native `0xAARRGGBB` word, the layout used by
    /// [`crate::PixelFormat::Argb32`] buffers.
    pub fn to_argb32(self) -> u32 {
        (u32::from(self.a) << 24)
            | (u32::from(self.r) << 16)
            | (u32::from(self.g) << 8)
            | u32::from(self.b)
    }
}

/// Number of entries in an 8-bit palette.
pub const PALETTE_SIZE: usize = 256;

/// The 256-entry colour table used by 8-bit sessions.
///
/// Starts out as a greyscale ramp so that orders arriving before the first
/// palette update still produce something visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [Rgba; PALETTE_SIZE],
}

impl Default for Palette {
    fn default() -> Self {
        let mut entries = [Rgba::BLACK; PALETTE_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let level = i as u8;
            *entry = Rgba::opaque(level, level, level);
        }
        Self { entries }
    }
}

impl Palette {
    /// Overwrites the first `colors.len()` entries.  Extra colours beyond
    /// the table size are ignored.
    pub fn update(&mut self, colors: &[Rgba]) {
        for (slot, color) in self.entries.iter_mut().zip(colors) {
            *slot = *color;
        }
    }

    /// Returns the colour stored at `index`.
    pub fn get(&self, index: u8) -> Rgba {
        self.entries[usize::from(index)]
    }
}

/// Converts a raw order colour into [`Rgba`] according to the session depth.
///
/// Unknown depths are treated like 32-bit colour.
pub fn convert_order_color(color: u32, depth: u32, palette: &Palette) -> Rgba {
    match depth {
        8 => palette.get((color & 0xFF) as u8),
        15 => {
            let r = ((color >> 10) & 0x1F) as u8;
            let g = ((color >> 5) & 0x1F) as u8;
            let b = (color & 0x1F) as u8;
            Rgba::opaque(expand5(r), expand5(g), expand5(b))
        }
        16 => {
            let r = ((color >> 11) & 0x1F) as u8;
            let g = ((color >> 5) & 0x3F) as u8;
            let b = (color & 0x1F) as u8;
            Rgba::opaque(expand5(r), expand6(g), expand5(b))
        }
        _ => Rgba::opaque(
            (color & 0xFF) as u8,
            ((color >> 8) & 0xFF) as u8,
            ((color >> 16) & 0xFF) as u8,
        ),
    }
}

/// Scales a 5-bit channel to 8 bits, replicating the high bits so that
/// full intensity maps to 0xFF.
fn expand5(v: u8) -> u8 {
    (v << 3) | (v >> 2)
}

fn expand6(v: u8) -> u8 {
    (v << 2) | (v >> 4)
}
