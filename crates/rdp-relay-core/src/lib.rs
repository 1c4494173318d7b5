//! # rdp-relay-core
//!
//! Shared library for the RDP relay containing the outbound display protocol
//! codec, keyboard translation tables, cache-slot stores and the small
//! geometry/colour vocabulary used by every drawing instruction.
//!
//! This crate has zero dependencies on sockets, threads or the remote
//! desktop engine.  Everything here is plain data plus pure functions, which
//! keeps it trivially testable and lets the session bridge in `rdp-relay`
//! focus on ordering and locking.
//!
//! # Architecture overview (for beginners)
//!
//! The relay sits between a remote desktop server and a thin display client
//! (typically a browser).  The remote side pushes *updates*: "here is a new
//! cursor image", "copy this rectangle", "draw these glyphs".  The relay turns
//! each update into one or more *instructions* on a simple text protocol that
//! the display client understands.
//!
//! This crate defines:
//!
//! - **`protocol`** – The outbound instruction set (`png`, `copy`, `cursor`,
//!   `sync`, …), its length-prefixed text encoding, and the pool that hands
//!   out off-screen layer indices.
//!
//! - **`keymap`** – Static keysym → scancode tables organised as a tree
//!   (a child layout inherits from its parent) plus the merge that flattens
//!   the tree into an O(1) lookup table, and the pressed-key bitmap.
//!
//! - **`cache`** – Slot stores for cursors, bitmaps and glyphs.  The remote
//!   side refers to cached images by index; the store guarantees that a
//!   stale or never-populated index is reported instead of drawing garbage.
//!
//! - **`domain`** – Rectangles, colours and palette conversion.

pub mod cache;
pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `rdp_relay_core::Instruction` instead of the full module path.
pub use cache::{CacheError, ImageError, ImageGeometry, PixelBuffer, PixelFormat, Slot, SlotMut, SlotStore};
pub use domain::color::{Palette, Rgba};
pub use domain::geometry::Rect;
pub use keymap::{Keymap, KeymapTable, KeysymDesc, KeysymState};
pub use protocol::codec::{decode_instruction, encode_instruction, ProtocolError};
pub use protocol::instruction::{CompositeMode, Instruction, LayerId, StatusCode};
pub use protocol::layer::LayerPool;
