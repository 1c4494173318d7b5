//! Layout-independent keys shared by every keymap.
//!
//! Keysym values come from X11 `keysymdef.h`; scancodes are PC/AT set 1.
//! Keys of the navigation cluster and the right-hand modifiers carry the
//! extended flag, matching what a physical keyboard sends.

use super::{Keymap, KeysymDesc};

// ── Keysyms used by the tables and the input handlers ─────────────────────────

pub const XK_BACKSPACE: u32 = 0xFF08;
pub const XK_TAB: u32 = 0xFF09;
pub const XK_RETURN: u32 = 0xFF0D;
pub const XK_PAUSE: u32 = 0xFF13;
pub const XK_SCROLL_LOCK: u32 = 0xFF14;
pub const XK_ESCAPE: u32 = 0xFF1B;
pub const XK_HOME: u32 = 0xFF50;
pub const XK_LEFT: u32 = 0xFF51;
pub const XK_UP: u32 = 0xFF52;
pub const XK_RIGHT: u32 = 0xFF53;
pub const XK_DOWN: u32 = 0xFF54;
pub const XK_PAGE_UP: u32 = 0xFF55;
pub const XK_PAGE_DOWN: u32 = 0xFF56;
pub const XK_END: u32 = 0xFF57;
pub const XK_PRINT: u32 = 0xFF61;
pub const XK_INSERT: u32 = 0xFF63;
pub const XK_MENU: u32 = 0xFF67;
pub const XK_NUM_LOCK: u32 = 0xFF7F;
pub const XK_KP_ENTER: u32 = 0xFF8D;
pub const XK_KP_MULTIPLY: u32 = 0xFFAA;
pub const XK_KP_ADD: u32 = 0xFFAB;
pub const XK_KP_SUBTRACT: u32 = 0xFFAD;
pub const XK_KP_DECIMAL: u32 = 0xFFAE;
pub const XK_KP_DIVIDE: u32 = 0xFFAF;
pub const XK_KP_0: u32 = 0xFFB0;
pub const XK_F1: u32 = 0xFFBE;
pub const XK_F11: u32 = 0xFFC8;
pub const XK_F12: u32 = 0xFFC9;
pub const XK_SHIFT_L: u32 = 0xFFE1;
pub const XK_SHIFT_R: u32 = 0xFFE2;
pub const XK_CONTROL_L: u32 = 0xFFE3;
pub const XK_CONTROL_R: u32 = 0xFFE4;
pub const XK_CAPS_LOCK: u32 = 0xFFE5;
pub const XK_ALT_L: u32 = 0xFFE9;
pub const XK_ALT_R: u32 = 0xFFEA;
pub const XK_SUPER_L: u32 = 0xFFEB;
pub const XK_SUPER_R: u32 = 0xFFEC;
pub const XK_DELETE: u32 = 0xFFFF;
pub const XK_SPACE: u32 = 0x0020;

const fn key(keysym: u32, scancode: u8) -> KeysymDesc {
    KeysymDesc::key(keysym, scancode)
}

const fn ext(keysym: u32, scancode: u8) -> KeysymDesc {
    KeysymDesc::key(keysym, scancode).extended()
}

/// Root of every keymap tree.
pub static BASE: Keymap = Keymap {
    name: "base",
    parent: None,
    layout: 0,
    mapping: &[
        key(XK_BACKSPACE, 0x0E),
        key(XK_TAB, 0x0F),
        key(XK_RETURN, 0x1C),
        key(XK_PAUSE, 0x45),
        key(XK_SCROLL_LOCK, 0x46),
        key(XK_ESCAPE, 0x01),
        key(XK_SPACE, 0x39),
        // Navigation cluster
        ext(XK_HOME, 0x47),
        ext(XK_LEFT, 0x4B),
        ext(XK_UP, 0x48),
        ext(XK_RIGHT, 0x4D),
        ext(XK_DOWN, 0x50),
        ext(XK_PAGE_UP, 0x49),
        ext(XK_PAGE_DOWN, 0x51),
        ext(XK_END, 0x4F),
        ext(XK_PRINT, 0x37),
        ext(XK_INSERT, 0x52),
        ext(XK_DELETE, 0x53),
        ext(XK_MENU, 0x5D),
        // Keypad
        key(XK_NUM_LOCK, 0x45),
        ext(XK_KP_ENTER, 0x1C),
        key(XK_KP_MULTIPLY, 0x37),
        key(XK_KP_ADD, 0x4E),
        key(XK_KP_SUBTRACT, 0x4A),
        key(XK_KP_DECIMAL, 0x53),
        ext(XK_KP_DIVIDE, 0x35),
        key(XK_KP_0, 0x52),
        key(XK_KP_0 + 1, 0x4F),
        key(XK_KP_0 + 2, 0x50),
        key(XK_KP_0 + 3, 0x51),
        key(XK_KP_0 + 4, 0x4B),
        key(XK_KP_0 + 5, 0x4C),
        key(XK_KP_0 + 6, 0x4D),
        key(XK_KP_0 + 7, 0x47),
        key(XK_KP_0 + 8, 0x48),
        key(XK_KP_0 + 9, 0x49),
        // Function keys
        key(XK_F1, 0x3B),
        key(XK_F1 + 1, 0x3C),
        key(XK_F1 + 2, 0x3D),
        key(XK_F1 + 3, 0x3E),
        key(XK_F1 + 4, 0x3F),
        key(XK_F1 + 5, 0x40),
        key(XK_F1 + 6, 0x41),
        key(XK_F1 + 7, 0x42),
        key(XK_F1 + 8, 0x43),
        key(XK_F1 + 9, 0x44),
        key(XK_F11, 0x57),
        key(XK_F12, 0x58),
        // Modifiers
        key(XK_SHIFT_L, 0x2A),
        key(XK_SHIFT_R, 0x36),
        key(XK_CONTROL_L, 0x1D),
        ext(XK_CONTROL_R, 0x1D),
        key(XK_CAPS_LOCK, 0x3A),
        key(XK_ALT_L, 0x38),
        ext(XK_ALT_R, 0x38),
        ext(XK_SUPER_L, 0x5B),
        ext(XK_SUPER_R, 0x5C),
    ],
};
