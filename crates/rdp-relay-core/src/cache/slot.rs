//! Fixed-capacity, index-addressed stores for cached images.
//!
//! # Why a slot store? (for beginners)
//!
//! A remote desktop server avoids re-sending images it has sent before.
//! Instead it says "remember this cursor as #3" once, and later just "show
//! cursor #3".  The same happens for bitmaps and font glyphs.  The server
//! picks the index; the relay must keep the image under that index until the
//! server frees it or reuses the index for something else.
//!
//! The danger is *stale* data: if index 3 was freed (or never filled) and
//! the server still refers to it, drawing whatever happened to be there
//! would corrupt the display.  The store therefore tracks a validity state
//! per slot and answers every lookup of an invalid slot with
//! [`CacheError::UnknownSlot`] instead of a buffer.
//!
//! # Layout
//!
//! Slots live in a sparse `BTreeMap` keyed by index, bounded by the capacity
//! negotiated at session start.  Each slot owns its pixel buffer plus a
//! per-kind *resource* `R` (for example the off-screen layer a cursor was
//! uploaded into).  The store never touches the display itself; whenever a
//! slot is evicted or released, its resource is handed back to the caller so
//! the caller can dispose of it.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::cache::pixel::{ImageGeometry, PixelBuffer};

/// Errors returned by slot stores and pixel buffers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The slot was never allocated, has been released, or holds no valid
    /// image yet.
    #[error("unknown {kind} slot {index}")]
    UnknownSlot { kind: &'static str, index: u32 },

    /// Pixel geometry is unusable.
    #[error("invalid dimensions {width}x{height} (stride {stride}): {reason}")]
    InvalidDimensions {
        width: i32,
        height: i32,
        stride: i32,
        reason: &'static str,
    },

    /// The index exceeds the negotiated capacity of the store.
    #[error("{kind} slot {index} exceeds capacity {capacity}")]
    SlotOutOfRange {
        kind: &'static str,
        index: u32,
        capacity: u32,
    },
}

/// Read-only view of a valid slot.
#[derive(Debug)]
pub struct Slot<'a, R> {
    pub pixels: &'a PixelBuffer,
    pub resource: &'a R,
}

/// Mutable view of a valid slot.  The pixels stay read-only: a slot's image
/// is replaced wholesale through [`SlotStore::populate`], never edited.
#[derive(Debug)]
pub struct SlotMut<'a, R> {
    pub pixels: &'a PixelBuffer,
    pub resource: &'a mut R,
}

#[derive(Debug)]
struct Entry<R> {
    /// `Some` exactly when the slot is valid.
    pixels: Option<PixelBuffer>,
    resource: R,
}

/// An index → slot map for one resource kind.
#[derive(Debug)]
pub struct SlotStore<R> {
    kind: &'static str,
    capacity: u32,
    slots: BTreeMap<u32, Entry<R>>,
}

impl<R: Default> SlotStore<R> {
    /// Creates an empty store accepting indices `0..capacity`.
    ///
    /// `kind` is a short label (`"cursor"`, `"bitmap"`, `"glyph"`) used in
    /// error messages.
    pub fn new(kind: &'static str, capacity: u32) -> Self {
        Self {
            kind,
            capacity,
            slots: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of allocated slots, valid or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check_range(&self, index: u32) -> Result<(), CacheError> {
        if index < self.capacity {
            Ok(())
        } else {
            Err(CacheError::SlotOutOfRange {
                kind: self.kind,
                index,
                capacity: self.capacity,
            })
        }
    }

    fn unknown(&self, index: u32) -> CacheError {
        CacheError::UnknownSlot {
            kind: self.kind,
            index,
        }
    }

    /// Creates an empty, invalid slot at `index`.
    ///
    /// Any previous occupant is evicted immediately: its pixels are dropped
    /// and its resource is returned so the caller can release it.
    ///
    /// # Errors
    ///
    /// [`CacheError::SlotOutOfRange`] if `index >= capacity`.
    pub fn allocate(&mut self, index: u32) -> Result<Option<R>, CacheError> {
        self.check_range(index)?;
        let evicted = self.slots.insert(
            index,
            Entry {
                pixels: None,
                resource: R::default(),
            },
        );
        Ok(evicted.map(|entry| entry.resource))
    }

    /// Stores a pixel payload in an allocated slot and marks it valid.
    ///
    /// The previous payload of the slot, if any, is dropped.  On failure the
    /// slot is left invalid, never holding a half-written image.
    ///
    /// # Errors
    ///
    /// - [`CacheError::UnknownSlot`] if `index` was never allocated.
    /// - [`CacheError::InvalidDimensions`] if the geometry does not match.
    pub fn populate(
        &mut self,
        index: u32,
        data: Vec<u8>,
        geometry: ImageGeometry,
    ) -> Result<SlotMut<'_, R>, CacheError> {
        self.check_range(index)?;
        let unknown = self.unknown(index);
        let entry = self.slots.get_mut(&index).ok_or(unknown)?;
        entry.pixels = None;
        let buffer = PixelBuffer::new(data, geometry)?;
        let pixels = entry.pixels.insert(buffer);
        Ok(SlotMut {
            pixels,
            resource: &mut entry.resource,
        })
    }

    /// Looks up a valid slot.
    ///
    /// # Errors
    ///
    /// [`CacheError::UnknownSlot`] if the slot is missing or invalid.
    pub fn get(&self, index: u32) -> Result<Slot<'_, R>, CacheError> {
        match self.slots.get(&index) {
            Some(Entry {
                pixels: Some(pixels),
                resource,
            }) => Ok(Slot { pixels, resource }),
            _ => Err(self.unknown(index)),
        }
    }

    /// Mutable lookup of a valid slot.
    ///
    /// # Errors
    ///
    /// [`CacheError::UnknownSlot`] if the slot is missing or invalid.
    pub fn get_mut(&mut self, index: u32) -> Result<SlotMut<'_, R>, CacheError> {
        let unknown = self.unknown(index);
        match self.slots.get_mut(&index) {
            Some(Entry {
                pixels: Some(pixels),
                resource,
            }) => Ok(SlotMut {
                pixels: &*pixels,
                resource,
            }),
            _ => Err(unknown),
        }
    }

    /// Returns `true` if `index` is allocated, whether or not it is valid.
    pub fn is_allocated(&self, index: u32) -> bool {
        self.slots.contains_key(&index)
    }

    /// Frees a slot, returning its resource.  Releasing a free slot is a
    /// no-op returning `None`.
    pub fn release(&mut self, index: u32) -> Option<R> {
        self.slots.remove(&index).map(|entry| entry.resource)
    }

    /// Frees every slot, highest index first, returning the resources in
    /// that order.
    pub fn drain(&mut self) -> Vec<R> {
        let slots = std::mem::take(&mut self.slots);
        slots.into_values().rev().map(|entry| entry.resource).collect()
    }
}
