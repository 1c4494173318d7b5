//! Plain value types shared by the protocol and the drawing handlers.

pub mod color;
pub mod geometry;

pub use color::{Palette, Rgba};
pub use geometry::Rect;
