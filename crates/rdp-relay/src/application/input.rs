//! Client input → remote engine.
//!
//! These functions run on the input thread.  The caller holds the engine
//! lock for the duration of each call; key handling additionally needs the
//! pressed-key state, which lives behind the update lock and is passed in
//! by the caller (locks are always taken engine first, then update).
//!
//! # Mouse buttons (for beginners)
//!
//! The display client reports the full button mask with every `mouse`
//! instruction.  RDP instead wants *changes*: "left button went down",
//! "wheel moved up".  [`InputState`] remembers the previous mask so that
//! each mouse event can be split into releases, presses and wheel ticks.
//!
//! | mask bit | meaning      | RDP flag   |
//! |----------|--------------|------------|
//! | `0x01`   | left         | `BUTTON1`  |
//! | `0x02`   | middle       | `BUTTON3`  |
//! | `0x04`   | right        | `BUTTON2`  |
//! | `0x08`   | wheel up     | `WHEEL`    |
//! | `0x10`   | wheel down   | `WHEEL` + `WHEEL_NEGATIVE` |

use rdp_relay_core::{KeymapTable, KeysymState};
use tracing::{debug, warn};

use crate::application::engine::{
    RemoteEngine, KBD_FLAGS_DOWN, KBD_FLAGS_RELEASE, PTR_FLAGS_BUTTON1, PTR_FLAGS_BUTTON2,
    PTR_FLAGS_BUTTON3, PTR_FLAGS_DOWN, PTR_FLAGS_MOVE, PTR_FLAGS_WHEEL, PTR_FLAGS_WHEEL_NEGATIVE,
};
use crate::domain::error::EngineError;

pub const MOUSE_LEFT: u32 = 0x01;
pub const MOUSE_MIDDLE: u32 = 0x02;
pub const MOUSE_RIGHT: u32 = 0x04;
pub const MOUSE_UP: u32 = 0x08;
pub const MOUSE_DOWN: u32 = 0x10;

const BUTTONS: u32 = MOUSE_LEFT | MOUSE_MIDDLE | MOUSE_RIGHT;
const WHEEL: u32 = MOUSE_UP | MOUSE_DOWN;

/// Wheel rotation sent per tick, already including the direction bits
/// RDP expects for upward (`0x78`) and downward (`0x88`) scrolling.
const WHEEL_UP_ROTATION: u16 = 0x0078;
const WHEEL_DOWN_ROTATION: u16 = 0x0088;

/// Input-thread state that survives between events.
#[derive(Debug, Default)]
pub struct InputState {
    mouse_mask: u32,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mouse_mask(&self) -> u32 {
        self.mouse_mask
    }
}

fn button_flags(mask: u32) -> u16 {
    let mut flags = 0;
    if mask & MOUSE_LEFT != 0 {
        flags |= PTR_FLAGS_BUTTON1;
    }
    if mask & MOUSE_RIGHT != 0 {
        flags |= PTR_FLAGS_BUTTON2;
    }
    if mask & MOUSE_MIDDLE != 0 {
        flags |= PTR_FLAGS_BUTTON3;
    }
    flags
}

fn clamp_coord(v: i32) -> u16 {
    v.clamp(0, i32::from(u16::MAX)) as u16
}

/// Forwards one client mouse event.
pub fn send_mouse(
    engine: &mut dyn RemoteEngine,
    state: &mut InputState,
    x: i32,
    y: i32,
    mask: u32,
) -> Result<(), EngineError> {
    let (x, y) = (clamp_coord(x), clamp_coord(y));

    if mask == state.mouse_mask {
        return engine.send_pointer(PTR_FLAGS_MOVE, x, y);
    }

    let released = state.mouse_mask & !mask;
    let pressed = mask & !state.mouse_mask;

    if released & BUTTONS != 0 {
        engine.send_pointer(button_flags(released), x, y)?;
    }
    if pressed & BUTTONS != 0 {
        engine.send_pointer(PTR_FLAGS_DOWN | button_flags(pressed), x, y)?;
    }
    if pressed & WHEEL != 0 {
        if pressed & MOUSE_UP != 0 {
            engine.send_pointer(PTR_FLAGS_WHEEL | WHEEL_UP_ROTATION, x, y)?;
        }
        if pressed & MOUSE_DOWN != 0 {
            engine.send_pointer(
                PTR_FLAGS_WHEEL | PTR_FLAGS_WHEEL_NEGATIVE | WHEEL_DOWN_ROTATION,
                x,
                y,
            )?;
        }
    }

    state.mouse_mask = mask;
    Ok(())
}

/// Sends `keysym` without touching the recorded key state.
fn send_keysym(
    engine: &mut dyn RemoteEngine,
    keymap: &KeymapTable,
    keysyms: &KeysymState,
    keysym: u32,
    pressed: bool,
) -> Result<(), EngineError> {
    if let Some(desc) = keymap.lookup(keysym).filter(|d| d.scancode != 0) {
        // Modifiers that must be up for this symbol, e.g. Shift for `a`.
        let to_release: Vec<u32> = desc
            .clear_keysyms
            .iter()
            .copied()
            .filter(|&k| keysyms.is_pressed(k))
            .collect();
        // Modifiers that must be down, e.g. Shift for `A`.
        let to_press: Vec<u32> = desc
            .set_keysyms
            .iter()
            .copied()
            .filter(|&k| !keysyms.is_pressed(k))
            .collect();

        for &k in &to_release {
            send_keysym(engine, keymap, keysyms, k, false)?;
        }
        for &k in &to_press {
            send_keysym(engine, keymap, keysyms, k, true)?;
        }

        let direction = if pressed { KBD_FLAGS_DOWN } else { KBD_FLAGS_RELEASE };
        engine.send_scancode(desc.flags | direction, desc.scancode)?;

        for &k in &to_press {
            send_keysym(engine, keymap, keysyms, k, false)?;
        }
        for &k in &to_release {
            send_keysym(engine, keymap, keysyms, k, true)?;
        }
        return Ok(());
    }

    if !pressed {
        return Ok(());
    }
    match unicode_codepoint(keysym) {
        Some(codepoint) => engine.send_unicode(0, codepoint),
        None => {
            debug!(keysym = format_args!("{keysym:#x}"), "unmapped keysym dropped");
            Ok(())
        }
    }
}

/// Code point of a Latin-1 or Unicode keysym, if it fits the 16-bit
/// Unicode keyboard event.
fn unicode_codepoint(keysym: u32) -> Option<u16> {
    let codepoint = match keysym {
        0x20..=0xFF => keysym,
        0x0100_0000..=0x0110_FFFF => keysym & 0x00FF_FFFF,
        _ => return None,
    };
    u16::try_from(codepoint).ok()
}

/// Forwards one client key event and records it in `keysyms`.
pub fn send_key(
    engine: &mut dyn RemoteEngine,
    keymap: &KeymapTable,
    keysyms: &mut KeysymState,
    keysym: u32,
    pressed: bool,
) -> Result<(), EngineError> {
    keysyms.set(keysym, pressed);
    send_keysym(engine, keymap, keysyms, keysym, pressed)
}

/// Forwards clipboard text.  Empty text is ignored.
pub fn send_clipboard(engine: &mut dyn RemoteEngine, text: &str) -> Result<(), EngineError> {
    if text.is_empty() {
        return Ok(());
    }
    engine.send_clipboard(text).inspect_err(|err| {
        warn!(error = %err, "clipboard update not forwarded");
    })
}
