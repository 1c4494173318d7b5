//! Owned pixel buffers, their validation, and PNG encoding.
//!
//! The remote engine hands over pixel data already converted to one of the
//! formats below; this module only checks that the declared geometry matches
//! the bytes, and turns (regions of) buffers into PNG payloads for the
//! display client.
//!
//! Pixel layouts (little-endian words, straight alpha):
//!
//! | format   | bytes/pixel | byte order     |
//! |----------|-------------|----------------|
//! | `Argb32` | 4           | B, G, R, A     |
//! | `Rgb24`  | 4           | B, G, R, (pad) |
//! | `A8`     | 1           | coverage       |

use thiserror::Error;

use crate::cache::slot::CacheError;
use crate::domain::color::Rgba;
use crate::domain::geometry::Rect;

/// Tag describing how the bytes of a [`PixelBuffer`] are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 32-bit colour with alpha.
    Argb32,
    /// 32-bit colour, padding byte ignored (always opaque).
    Rgb24,
    /// 8-bit alpha mask, used for glyphs.
    A8,
}

impl PixelFormat {
    /// Number of bytes one pixel occupies.
    pub fn bytes_per_pixel(self) -> i32 {
        match self {
            PixelFormat::Argb32 | PixelFormat::Rgb24 => 4,
            PixelFormat::A8 => 1,
        }
    }
}

/// Declared shape of a pixel payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageGeometry {
    pub width: i32,
    pub height: i32,
    /// Bytes between the start of consecutive rows.
    pub stride: i32,
    pub format: PixelFormat,
}

impl ImageGeometry {
    /// Geometry with the tightest possible stride.
    pub fn packed(width: i32, height: i32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            stride: width * format.bytes_per_pixel(),
            format,
        }
    }

    /// Checks the geometry against the size of the backing data.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidDimensions`] if any dimension is non-positive,
    /// the stride cannot hold a row, or `data_len` cannot hold every row.
    pub fn validate(&self, data_len: usize) -> Result<(), CacheError> {
        let reject = |reason: &'static str| CacheError::InvalidDimensions {
            width: self.width,
            height: self.height,
            stride: self.stride,
            reason,
        };
        if self.width <= 0 || self.height <= 0 || self.stride <= 0 {
            return Err(reject("dimensions must be positive"));
        }
        let row_bytes = i64::from(self.width) * i64::from(self.format.bytes_per_pixel());
        if i64::from(self.stride) < row_bytes {
            return Err(reject("stride is shorter than one row"));
        }
        let needed = i64::from(self.stride) * i64::from(self.height - 1) + row_bytes;
        if (data_len as i64) < needed {
            return Err(reject("pixel data is shorter than declared"));
        }
        Ok(())
    }

    /// The full extent of the image at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }
}

/// Errors raised while producing PNG payloads.
#[derive(Debug, Error)]
pub enum ImageError {
    /// The requested region does not overlap the image.
    #[error("region {0:?} lies outside the image")]
    EmptyRegion(Rect),

    /// The PNG encoder failed.
    #[error("PNG encoding failed: {0}")]
    Encoding(#[from] png::EncodingError),
}

/// An immutable-by-contract pixel payload with validated geometry.
///
/// Cached buffers are never edited in place; a new payload replaces the old
/// one wholesale.  The only mutating helpers ([`PixelBuffer::fill_rect`],
/// [`PixelBuffer::blend_mask`]) are used on scratch canvases that are not
/// stored in a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    geometry: ImageGeometry,
}

impl PixelBuffer {
    /// Wraps `data` after checking it against `geometry`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidDimensions`] if the geometry is unusable.
    pub fn new(data: Vec<u8>, geometry: ImageGeometry) -> Result<Self, CacheError> {
        geometry.validate(data.len())?;
        Ok(Self { data, geometry })
    }

    /// A fully transparent (or zero-coverage) buffer.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidDimensions`] for non-positive sizes.
    pub fn blank(width: i32, height: i32, format: PixelFormat) -> Result<Self, CacheError> {
        let geometry = ImageGeometry::packed(width, height, format);
        let len = (width.max(0) as usize)
            * (height.max(0) as usize)
            * format.bytes_per_pixel() as usize;
        Self::new(vec![0; len], geometry)
    }

    pub fn geometry(&self) -> ImageGeometry {
        self.geometry
    }

    pub fn width(&self) -> i32 {
        self.geometry.width
    }

    pub fn height(&self) -> i32 {
        self.geometry.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.geometry.stride as usize)
            + (x as usize) * (self.geometry.format.bytes_per_pixel() as usize)
    }

    /// Reads one pixel as colour.  A8 pixels read as white with the stored
    /// coverage as alpha.
    pub fn pixel(&self, x: i32, y: i32) -> Rgba {
        let at = self.offset(x, y);
        match self.geometry.format {
            PixelFormat::Argb32 => Rgba {
                b: self.data[at],
                g: self.data[at + 1],
                r: self.data[at + 2],
                a: self.data[at + 3],
            },
            PixelFormat::Rgb24 => Rgba::opaque(self.data[at + 2], self.data[at + 1], self.data[at]),
            PixelFormat::A8 => Rgba {
                a: self.data[at],
                ..Rgba::WHITE
            },
        }
    }

    fn put_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        let at = self.offset(x, y);
        match self.geometry.format {
            PixelFormat::Argb32 | PixelFormat::Rgb24 => {
                self.data[at] = color.b;
                self.data[at + 1] = color.g;
                self.data[at + 2] = color.r;
                self.data[at + 3] = color.a;
            }
            PixelFormat::A8 => self.data[at] = color.a,
        }
    }

    /// Overwrites `rect` (clipped to the buffer) with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        let Some(area) = rect.intersection(&self.geometry.bounds()) else {
            return;
        };
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                self.put_pixel(x, y, color);
            }
        }
    }

    /// Paints `color` through an A8 `mask` placed at (`dst_x`, `dst_y`),
    /// compositing over the existing pixels.  Parts of the mask outside the
    /// buffer are dropped.
    pub fn blend_mask(&mut self, mask: &PixelBuffer, dst_x: i32, dst_y: i32, color: Rgba) {
        let placed = Rect::new(dst_x, dst_y, mask.width(), mask.height());
        let Some(area) = placed.intersection(&self.geometry.bounds()) else {
            return;
        };
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let coverage = mask.pixel(x - dst_x, y - dst_y).a;
                if coverage == 0 {
                    continue;
                }
                let src_alpha = (u32::from(color.a) * u32::from(coverage) / 255) as u8;
                let dst = self.pixel(x, y);
                self.put_pixel(x, y, composite_over(color, src_alpha, dst));
            }
        }
    }

    /// Returns the pixels of `region` (clipped to the buffer) as tightly
    /// packed RGBA bytes together with the clipped region.
    pub fn region_rgba8(&self, region: Rect) -> Option<(Rect, Vec<u8>)> {
        let area = region.intersection(&self.geometry.bounds())?;
        let mut out = Vec::with_capacity((area.width * area.height * 4) as usize);
        for y in area.y..area.bottom() {
            for x in area.x..area.right() {
                let p = self.pixel(x, y);
                out.extend_from_slice(&[p.r, p.g, p.b, p.a]);
            }
        }
        Some((area, out))
    }

    /// Encodes `region` of the buffer as an RGBA PNG.
    ///
    /// # Errors
    ///
    /// [`ImageError::EmptyRegion`] when the region misses the buffer, and
    /// [`ImageError::Encoding`] if the encoder fails.
    pub fn encode_png_region(&self, region: Rect) -> Result<Vec<u8>, ImageError> {
        let (area, rgba) = self
            .region_rgba8(region)
            .ok_or(ImageError::EmptyRegion(region))?;
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, area.width as u32, area.height as u32);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header()?;
            writer.write_image_data(&rgba)?;
            writer.finish()?;
        }
        Ok(out)
    }

    /// Encodes the whole buffer as an RGBA PNG.
    ///
    /// # Errors
    ///
    /// See [`PixelBuffer::encode_png_region`].
    pub fn encode_png(&self) -> Result<Vec<u8>, ImageError> {
        self.encode_png_region(self.geometry.bounds())
    }
}

/// Porter-Duff "over" for straight-alpha colours.
fn composite_over(src: Rgba, src_alpha: u8, dst: Rgba) -> Rgba {
    let sa = u32::from(src_alpha);
    let da = u32::from(dst.a) * (255 - sa) / 255;
    let out_a = sa + da;
    if out_a == 0 {
        return Rgba::TRANSPARENT;
    }
    let channel =
        |s: u8, d: u8| ((u32::from(s) * sa + u32::from(d) * da) / out_a).min(255) as u8;
    Rgba {
        r: channel(src.r, dst.r),
        g: channel(src.g, dst.g),
        b: channel(src.b, dst.b),
        a: out_a.min(255) as u8,
    }
}
