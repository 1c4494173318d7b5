//! US English (QWERTY) keymap.
//!
//! Every printable keysym is tied to the key that produces it.  Symbols on
//! the upper half of a key (`A`, `!`, `{`, …) hold Shift; symbols on the
//! lower half release both Shift keys so that a client-side Shift does not
//! turn `a` into `A` on the remote end.

use super::base::{BASE, XK_SHIFT_L, XK_SHIFT_R};
use super::{Keymap, KeysymDesc};

/// RDP keyboard layout id for US English.
pub const LAYOUT_US: u32 = 0x0000_0409;

const SHIFT: &[u32] = &[XK_SHIFT_L];
const NO_SHIFT: &[u32] = &[XK_SHIFT_L, XK_SHIFT_R];

const fn lower(keysym: u32, scancode: u8) -> KeysymDesc {
    KeysymDesc::key(keysym, scancode).releasing(NO_SHIFT)
}

const fn upper(keysym: u32, scancode: u8) -> KeysymDesc {
    KeysymDesc::key(keysym, scancode).holding(SHIFT)
}

pub static EN_US: Keymap = Keymap {
    name: "en-us-qwerty",
    parent: Some(&BASE),
    layout: LAYOUT_US,
    mapping: &[
        // Top row
        lower(0x60, 0x29), // `
        upper(0x7E, 0x29), // ~
        lower(0x31, 0x02), // 1
        upper(0x21, 0x02), // !
        lower(0x32, 0x03), // 2
        upper(0x40, 0x03), // @
        lower(0x33, 0x04), // 3
        upper(0x23, 0x04), // #
        lower(0x34, 0x05), // 4
        upper(0x24, 0x05), // $
        lower(0x35, 0x06), // 5
        upper(0x25, 0x06), // %
        lower(0x36, 0x07), // 6
        upper(0x5E, 0x07), // ^
        lower(0x37, 0x08), // 7
        upper(0x26, 0x08), // &
        lower(0x38, 0x09), // 8
        upper(0x2A, 0x09), // *
        lower(0x39, 0x0A), // 9
        upper(0x28, 0x0A), // (
        lower(0x30, 0x0B), // 0
        upper(0x29, 0x0B), // )
        lower(0x2D, 0x0C), // -
        upper(0x5F, 0x0C), // _
        lower(0x3D, 0x0D), // =
        upper(0x2B, 0x0D), // +
        // QWERTY row
        lower(0x71, 0x10), // q
        upper(0x51, 0x10),
        lower(0x77, 0x11), // w
        upper(0x57, 0x11),
        lower(0x65, 0x12), // e
        upper(0x45, 0x12),
        lower(0x72, 0x13), // r
        upper(0x52, 0x13),
        lower(0x74, 0x14), // t
        upper(0x54, 0x14),
        lower(0x79, 0x15), // y
        upper(0x59, 0x15),
        lower(0x75, 0x16), // u
        upper(0x55, 0x16),
        lower(0x69, 0x17), // i
        upper(0x49, 0x17),
        lower(0x6F, 0x18), // o
        upper(0x4F, 0x18),
        lower(0x70, 0x19), // p
        upper(0x50, 0x19),
        lower(0x5B, 0x1A), // [
        upper(0x7B, 0x1A), // {
        lower(0x5D, 0x1B), // ]
        upper(0x7D, 0x1B), // }
        lower(0x5C, 0x2B), // backslash
        upper(0x7C, 0x2B), // |
        // Home row
        lower(0x61, 0x1E), // a
        upper(0x41, 0x1E),
        lower(0x73, 0x1F), // s
        upper(0x53, 0x1F),
        lower(0x64, 0x20), // d
        upper(0x44, 0x20),
        lower(0x66, 0x21), // f
        upper(0x46, 0x21),
        lower(0x67, 0x22), // g
        upper(0x47, 0x22),
        lower(0x68, 0x23), // h
        upper(0x48, 0x23),
        lower(0x6A, 0x24), // j
        upper(0x4A, 0x24),
        lower(0x6B, 0x25), // k
        upper(0x4B, 0x25),
        lower(0x6C, 0x26), // l
        upper(0x4C, 0x26),
        lower(0x3B, 0x27), // ;
        upper(0x3A, 0x27), // :
        lower(0x27, 0x28), // '
        upper(0x22, 0x28), // "
        // Bottom row
        lower(0x7A, 0x2C), // z
        upper(0x5A, 0x2C),
        lower(0x78, 0x2D), // x
        upper(0x58, 0x2D),
        lower(0x63, 0x2E), // c
        upper(0x43, 0x2E),
        lower(0x76, 0x2F), // v
        upper(0x56, 0x2F),
        lower(0x62, 0x30), // b
        upper(0x42, 0x30),
        lower(0x6E, 0x31), // n
        upper(0x4E, 0x31),
        lower(0x6D, 0x32), // m
        upper(0x4D, 0x32),
        lower(0x2C, 0x33), // ,
        upper(0x3C, 0x33), // <
        lower(0x2E, 0x34), // .
        upper(0x3E, 0x34), // >
        lower(0x2F, 0x35), // /
        upper(0x3F, 0x35), // ?
    ],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{load, KBD_FLAGS_EXTENDED};

    #[test]
    fn test_uppercase_letter_holds_shift() {
        // Arrange
        let table = load(&EN_US);

        // Act
        let desc = table.lookup(0x41).unwrap(); // A

        // Assert
        assert_eq!(desc.scancode, 0x1E);
        assert_eq!(desc.set_keysyms, &[XK_SHIFT_L]);
        assert!(desc.clear_keysyms.is_empty());
    }

    #[test]
    fn test_lowercase_letter_releases_both_shifts() {
        let table = load(&EN_US);

        let desc = table.lookup(0x61).unwrap(); // a

        assert_eq!(desc.clear_keysyms, &[XK_SHIFT_L, XK_SHIFT_R]);
    }

    #[test]
    fn test_every_letter_is_mapped_in_both_cases() {
        let table = load(&EN_US);

        for lower in 0x61..=0x7A_u32 {
            let upper = lower - 0x20;
            let l = table.lookup(lower).unwrap_or_else(|| panic!("missing {lower:#x}"));
            let u = table.lookup(upper).unwrap_or_else(|| panic!("missing {upper:#x}"));
            assert_eq!(l.scancode, u.scancode, "case pair {lower:#x} differs");
        }
    }

    #[test]
    fn test_scancodes_are_unique_per_shift_state() {
        let mut lower_codes: Vec<u8> = EN_US
            .mapping
            .iter()
            .filter(|d| d.set_keysyms.is_empty())
            .map(|d| d.scancode)
            .collect();
        let count = lower_codes.len();

        lower_codes.sort_unstable();
        lower_codes.dedup();

        assert_eq!(lower_codes.len(), count, "two unshifted symbols share a key");
    }

    #[test]
    fn test_navigation_keys_inherited_from_base_are_extended() {
        let table = load(&EN_US);

        let delete = table.lookup(0xFFFF).unwrap();

        assert_eq!(delete.flags & KBD_FLAGS_EXTENDED, KBD_FLAGS_EXTENDED);
    }

    #[test]
    fn test_layout_is_us() {
        assert_eq!(load(&EN_US).layout(), LAYOUT_US);
    }
}
