//! Keysym → scancode translation tables.
//!
//! The display client reports keys as X11 *keysyms* (`0x0061` for `a`,
//! `0xFF0D` for Return, …).  A remote desktop server wants keyboard
//! *scancodes*: the position of a physical key on a PC keyboard.  A keymap
//! bridges the two, and also says which modifier keys must be held or
//! released for the scancode to produce the requested symbol (`A` is the `a`
//! key with Shift held).
//!
//! # Keymap trees (for beginners)
//!
//! Layouts share most of their keys.  Rather than repeating Escape, the
//! arrows and F1–F12 in every layout, each [`Keymap`] names an optional
//! *parent* and only lists what it adds or changes.  [`load`] flattens a
//! keymap and all its ancestors into a single [`KeymapTable`]:
//!
//! ```text
//! base           Escape, arrows, F-keys, modifiers …
//!  └─ en-us      letters, digits, punctuation
//! ```
//!
//! Ancestors are applied first, so when the same keysym appears on several
//! levels the deepest definition wins.  The tree is static data compiled
//! into the binary, so it cannot contain cycles.

pub mod base;
pub mod en_us;
pub mod state;

use tracing::info;

pub use state::KeysymState;

/// Scancode must be sent with the extended-key prefix (right-hand Ctrl/Alt,
/// arrows, navigation cluster, …).
pub const KBD_FLAGS_EXTENDED: u16 = 0x0100;

/// Number of entries in a flattened [`KeymapTable`].
pub const KEYMAP_TABLE_SIZE: usize = 0x10000;

/// How to type one keysym on the remote keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeysymDesc {
    /// The keysym this entry translates.
    pub keysym: u32,
    /// Set-1 scancode of the physical key.
    pub scancode: u8,
    /// Extra keyboard flags, e.g. [`KBD_FLAGS_EXTENDED`].
    pub flags: u16,
    /// Keysyms that must be pressed while sending the scancode.
    pub set_keysyms: &'static [u32],
    /// Keysyms that must be released while sending the scancode.
    pub clear_keysyms: &'static [u32],
}

impl KeysymDesc {
    /// A plain key with no flags and no modifier requirements.
    pub const fn key(keysym: u32, scancode: u8) -> Self {
        Self {
            keysym,
            scancode,
            flags: 0,
            set_keysyms: &[],
            clear_keysyms: &[],
        }
    }

    /// The same key, sent with the extended prefix.
    pub const fn extended(self) -> Self {
        Self {
            flags: self.flags | KBD_FLAGS_EXTENDED,
            ..self
        }
    }

    /// The same key, with `keysyms` held down around it.
    pub const fn holding(self, keysyms: &'static [u32]) -> Self {
        Self {
            set_keysyms: keysyms,
            ..self
        }
    }

    /// The same key, with `keysyms` released around it.
    pub const fn releasing(self, keysyms: &'static [u32]) -> Self {
        Self {
            clear_keysyms: keysyms,
            ..self
        }
    }
}

/// One node of a keymap tree.
#[derive(Debug)]
pub struct Keymap {
    /// Name used to select the keymap in configuration.
    pub name: &'static str,
    /// Keymap whose entries are loaded before this one.
    pub parent: Option<&'static Keymap>,
    /// Entries defined (or overridden) at this level.
    pub mapping: &'static [KeysymDesc],
    /// RDP keyboard layout id advertised to the server; `0` inherits the
    /// parent's.
    pub layout: u32,
}

/// Every keymap compiled into the binary.
pub static KEYMAPS: &[&Keymap] = &[&base::BASE, &en_us::EN_US];

/// Finds a compiled-in keymap by name.
pub fn find(name: &str) -> Option<&'static Keymap> {
    KEYMAPS.iter().copied().find(|keymap| keymap.name == name)
}

/// A flattened keymap with O(1) lookup.
#[derive(Debug, Clone)]
pub struct KeymapTable {
    name: &'static str,
    layout: u32,
    entries: Box<[Option<KeysymDesc>]>,
}

impl KeymapTable {
    fn empty(name: &'static str) -> Self {
        Self {
            name,
            layout: 0,
            entries: vec![None; KEYMAP_TABLE_SIZE].into_boxed_slice(),
        }
    }

    /// Name of the leaf keymap this table was loaded from.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// RDP keyboard layout id of the deepest keymap that defines one.
    pub fn layout(&self) -> u32 {
        self.layout
    }

    /// Looks up the entry for `keysym`.
    ///
    /// The table is indexed by `keysym` modulo its size; a stored entry for
    /// a different keysym sharing the same index is not returned.
    pub fn lookup(&self, keysym: u32) -> Option<&KeysymDesc> {
        self.entries[table_index(keysym)]
            .as_ref()
            .filter(|desc| desc.keysym == keysym)
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn table_index(keysym: u32) -> usize {
    keysym as usize % KEYMAP_TABLE_SIZE
}

/// Flattens `keymap` and its ancestors into a lookup table, root first so
/// that descendants override.
///
/// # Examples
///
/// ```rust
/// use rdp_relay_core::keymap::{self, en_us};
///
/// let table = keymap::load(&en_us::EN_US);
/// assert_eq!(table.lookup(0x0061).map(|d| d.scancode), Some(0x1E)); // a
/// assert_eq!(table.lookup(0xFF1B).map(|d| d.scancode), Some(0x01)); // Escape, from base
/// ```
pub fn load(keymap: &Keymap) -> KeymapTable {
    let mut table = KeymapTable::empty(keymap.name);
    merge_into(&mut table, keymap);
    table
}

fn merge_into(table: &mut KeymapTable, keymap: &Keymap) {
    if let Some(parent) = keymap.parent {
        merge_into(table, parent);
    }

    info!("loading keymap \"{}\"", keymap.name);
    for desc in keymap.mapping {
        table.entries[table_index(desc.keysym)] = Some(*desc);
    }
    if keymap.layout != 0 {
        table.layout = keymap.layout;
    }
}
