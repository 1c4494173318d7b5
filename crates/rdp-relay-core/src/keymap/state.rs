//! Pressed-key bookkeeping.
//!
//! The relay must know which keys the remote side currently sees as held,
//! so that it can temporarily release Shift for `a` or press it for `A` and
//! then restore the previous state.  [`KeysymState`] is a bitmap indexed the
//! same way as the keymap table (keysym modulo 65 536).

use super::KEYMAP_TABLE_SIZE;

const WORDS: usize = KEYMAP_TABLE_SIZE / 64;

/// Bitmap of keysyms currently pressed on the remote side.
#[derive(Debug, Clone)]
pub struct KeysymState {
    bits: Box<[u64; WORDS]>,
}

impl KeysymState {
    /// Creates a state with every key released.
    pub fn new() -> Self {
        Self {
            bits: Box::new([0; WORDS]),
        }
    }

    fn locate(keysym: u32) -> (usize, u64) {
        let index = keysym as usize % KEYMAP_TABLE_SIZE;
        (index / 64, 1 << (index % 64))
    }

    pub fn is_pressed(&self, keysym: u32) -> bool {
        let (word, mask) = Self::locate(keysym);
        self.bits[word] & mask != 0
    }

    pub fn set(&mut self, keysym: u32, pressed: bool) {
        let (word, mask) = Self::locate(keysym);
        if pressed {
            self.bits[word] |= mask;
        } else {
            self.bits[word] &= !mask;
        }
    }

    /// Number of keys currently recorded as pressed.
    pub fn pressed_count(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    /// Releases every key.
    pub fn clear(&mut self) {
        self.bits.fill(0);
    }
}

impl Default for KeysymState {
    fn default() -> Self {
        Self::new()
    }
}
