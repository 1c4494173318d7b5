//! Allocator for off-screen buffer layer indices.
//!
//! # What is a buffer layer? (for beginners)
//!
//! The display client keeps every surface in a table keyed by an integer.
//! Layer `0` is the visible screen.  Negative indices are *buffers*: hidden
//! surfaces the relay uses to keep images the remote side will draw again
//! (cursor shapes, frequently reused bitmaps).  Uploading an image into a
//! buffer once and then issuing cheap `copy` instructions saves a great deal
//! of bandwidth compared to re-sending the PNG every time.
//!
//! The relay, not the client, decides which index a new buffer gets, so the
//! relay must never hand out an index that is still in use.  [`LayerPool`]
//! hands out `-1, -2, -3, …` and recycles indices returned by
//! [`LayerPool::release`], preferring the one closest to zero so the client
//! table stays compact.
//!
//! # Thread safety
//!
//! The pool is plain mutable state.  It lives inside the session's update
//! context and is only touched while the update lock is held, so it needs no
//! atomics of its own.

use std::collections::BTreeSet;

use crate::protocol::instruction::LayerId;

/// Hands out negative buffer layer indices and recycles released ones.
///
/// # Examples
///
/// ```rust
/// use rdp_relay_core::protocol::{LayerPool, LayerId};
///
/// let mut pool = LayerPool::new();
/// let a = pool.allocate();
/// let b = pool.allocate();
/// assert_eq!((a, b), (LayerId(-1), LayerId(-2)));
///
/// pool.release(a);
/// assert_eq!(pool.allocate(), LayerId(-1));
/// ```
#[derive(Debug)]
pub struct LayerPool {
    /// The next never-used index.  Always negative.
    next: i32,
    /// Released indices waiting to be reused.
    free: BTreeSet<i32>,
}

impl LayerPool {
    /// Creates an empty pool whose first allocation is `-1`.
    pub fn new() -> Self {
        Self {
            next: -1,
            free: BTreeSet::new(),
        }
    }

    /// Returns a buffer index that is not currently in use.
    pub fn allocate(&mut self) -> LayerId {
        // `pop_last` yields the largest free index, i.e. the one nearest zero.
        if let Some(index) = self.free.pop_last() {
            return LayerId(index);
        }
        let index = self.next;
        // Running out of i32 buffer indices would need two billion live
        // buffers; saturate rather than wrap into the visible layer range.
        self.next = self.next.saturating_sub(1);
        LayerId(index)
    }

    /// Returns `layer` to the pool.
    ///
    /// Releasing the default layer, an index that was never handed out, or an
    /// index that is already free is a no-op, so double releases cannot make
    /// two owners share one buffer.
    pub fn release(&mut self, layer: LayerId) {
        if !layer.is_buffer() || layer.0 <= self.next {
            return;
        }
        self.free.insert(layer.0);
    }

    /// Number of buffers currently handed out.
    pub fn in_use(&self) -> usize {
        let issued = (-1 - self.next) as usize;
        issued - self.free.len()
    }
}

impl Default for LayerPool {
    fn default() -> Self {
        Self::new()
    }
}
