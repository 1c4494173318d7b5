//! Instruction types for the outbound display protocol.
//!
//! # How the display protocol works (for beginners)
//!
//! The display client is deliberately dumb.  It knows how to keep a stack of
//! *layers* (rectangular pixel surfaces), how to draw PNG images and filled
//! rectangles onto them, how to copy pixels between them, and how to show a
//! cursor image.  It knows nothing about RDP.
//!
//! Every instruction is an opcode plus a list of string arguments:
//!
//! ```text
//! size,0,1024,768      → resize the default layer to 1024×768
//! copy,-1,0,0,64,64,12,0,100,100
//!                      → copy a 64×64 block from buffer -1 to (100,100)
//! sync,1700000000000   → end of frame
//! ```
//!
//! Layer `0` is the visible display.  Negative layer indices are off-screen
//! *buffers*: invisible surfaces used as a cache (a bitmap the remote side
//! reuses many times is uploaded once into a buffer and then copied).
//!
//! The same instruction model also covers what the client sends back
//! (`mouse`, `key`, `clipboard`, the connection handshake), so a single codec
//! serves both directions.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;

use crate::domain::color::Rgba;
use crate::protocol::codec::ProtocolError;

// ── Layers ────────────────────────────────────────────────────────────────────

/// Index of a drawing surface on the display client.
/// Defaults to [`LayerId::DEFAULT`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub i32);

impl LayerId {
    /// The visible display surface.
    pub const DEFAULT: LayerId = LayerId(0);

    /// Returns `true` for off-screen buffers (negative indices).
    pub fn is_buffer(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Enumerations ──────────────────────────────────────────────────────────────

/// Porter-Duff compositing mode applied when drawing onto a layer.
///
/// The numeric values are the channel-mask codes understood by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompositeMode {
    /// Replace destination pixels.
    Src = 0x0C,
    /// Blend source over destination using source alpha.
    Over = 0x0E,
}

impl CompositeMode {
    /// Converts a raw mask code to a [`CompositeMode`].
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x0C => Some(Self::Src),
            0x0E => Some(Self::Over),
            _ => None,
        }
    }
}

/// Status code attached to an `error` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum StatusCode {
    Success = 0x0000,
    /// Internal failure of the relay.
    ServerError = 0x0200,
    /// The remote desktop server failed or refused the connection.
    UpstreamError = 0x0202,
    /// The client supplied unusable connection parameters.
    ClientBadRequest = 0x0300,
}

impl StatusCode {
    /// Converts a raw status value to a [`StatusCode`].
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0000 => Some(Self::Success),
            0x0200 => Some(Self::ServerError),
            0x0202 => Some(Self::UpstreamError),
            0x0300 => Some(Self::ClientBadRequest),
            _ => None,
        }
    }
}

// ── Instruction ───────────────────────────────────────────────────────────────

/// One instruction of the display protocol, in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    // ── Relay → client ────────────────────────────────────────────────────
    /// Handshake: names of the connection parameters the relay accepts.
    Args(Vec<String>),
    /// Human-readable connection name (window title).
    Name(String),
    /// Resizes a layer.
    Size {
        layer: LayerId,
        width: i32,
        height: i32,
    },
    /// Reports a session error.
    Error { message: String, status: StatusCode },
    /// Draws a PNG image onto a layer.  `data` holds the raw PNG bytes and is
    /// base64-encoded on the wire.
    Png {
        mode: CompositeMode,
        layer: LayerId,
        x: i32,
        y: i32,
        data: Vec<u8>,
    },
    /// Copies a block of pixels between (or within) layers.
    Copy {
        src: LayerId,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
        mode: CompositeMode,
        dst: LayerId,
        dst_x: i32,
        dst_y: i32,
    },
    /// Sets the current path of a layer to a rectangle.
    Rect {
        layer: LayerId,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },
    /// Fills the current path of a layer with a solid colour.
    Cfill {
        mode: CompositeMode,
        layer: LayerId,
        color: Rgba,
    },
    /// Restricts future drawing on a layer to its current path.
    Clip { layer: LayerId },
    /// Removes any clipping from a layer.
    Reset { layer: LayerId },
    /// Sets the cursor image to a region of a layer, with its hotspot.
    Cursor {
        hotspot_x: i32,
        hotspot_y: i32,
        src: LayerId,
        src_x: i32,
        src_y: i32,
        width: i32,
        height: i32,
    },
    /// Frees an off-screen buffer.
    Dispose { layer: LayerId },
    /// End of frame; the client acknowledges with a `sync` of its own.
    Sync { timestamp: u64 },

    // ── Both directions ───────────────────────────────────────────────────
    /// Pointer position and button mask.
    Mouse { x: i32, y: i32, mask: u32 },
    /// Clipboard text.
    Clipboard(String),
    /// End of session.
    Disconnect,

    // ── Client → relay ────────────────────────────────────────────────────
    /// Handshake: protocol the client wants to speak.
    Select(String),
    /// Handshake: the client's optimal display size.
    ClientSize { width: i32, height: i32 },
    /// Handshake: audio mimetypes the client can play.
    Audio(Vec<String>),
    /// Handshake: connection parameter values, positional.
    Connect(Vec<String>),
    /// Key press or release, identified by X11 keysym.
    Key { keysym: u32, pressed: bool },
}

impl Instruction {
    /// Returns the wire opcode of this instruction.
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Args(_) => "args",
            Instruction::Name(_) => "name",
            Instruction::Size { .. } | Instruction::ClientSize { .. } => "size",
            Instruction::Error { .. } => "error",
            Instruction::Png { .. } => "png",
            Instruction::Copy { .. } => "copy",
            Instruction::Rect { .. } => "rect",
            Instruction::Cfill { .. } => "cfill",
            Instruction::Clip { .. } => "clip",
            Instruction::Reset { .. } => "reset",
            Instruction::Cursor { .. } => "cursor",
            Instruction::Dispose { .. } => "dispose",
            Instruction::Sync { .. } => "sync",
            Instruction::Mouse { .. } => "mouse",
            Instruction::Clipboard(_) => "clipboard",
            Instruction::Disconnect => "disconnect",
            Instruction::Select(_) => "select",
            Instruction::Audio(_) => "audio",
            Instruction::Connect(_) => "connect",
            Instruction::Key { .. } => "key",
        }
    }

    /// Flattens the instruction into its wire elements, opcode first.
    pub fn to_elements(&self) -> Vec<String> {
        let mut out = vec![self.opcode().to_string()];
        match self {
            Instruction::Args(values)
            | Instruction::Audio(values)
            | Instruction::Connect(values) => out.extend(values.iter().cloned()),
            Instruction::Name(text) | Instruction::Clipboard(text) | Instruction::Select(text) => {
                out.push(text.clone())
            }
            Instruction::Size {
                layer,
                width,
                height,
            } => push_all(&mut out, &[layer.0, *width, *height]),
            Instruction::ClientSize { width, height } => push_all(&mut out, &[*width, *height]),
            Instruction::Error { message, status } => {
                out.push(message.clone());
                out.push((*status as u16).to_string());
            }
            Instruction::Png {
                mode,
                layer,
                x,
                y,
                data,
            } => {
                push_all(&mut out, &[*mode as i32, layer.0, *x, *y]);
                out.push(BASE64_STANDARD.encode(data));
            }
            Instruction::Copy {
                src,
                src_x,
                src_y,
                width,
                height,
                mode,
                dst,
                dst_x,
                dst_y,
            } => push_all(
                &mut out,
                &[
                    src.0,
                    *src_x,
                    *src_y,
                    *width,
                    *height,
                    *mode as i32,
                    dst.0,
                    *dst_x,
                    *dst_y,
                ],
            ),
            Instruction::Rect {
                layer,
                x,
                y,
                width,
                height,
            } => push_all(&mut out, &[layer.0, *x, *y, *width, *height]),
            Instruction::Cfill { mode, layer, color } => push_all(
                &mut out,
                &[
                    *mode as i32,
                    layer.0,
                    i32::from(color.r),
                    i32::from(color.g),
                    i32::from(color.b),
                    i32::from(color.a),
                ],
            ),
            Instruction::Clip { layer }
            | Instruction::Reset { layer }
            | Instruction::Dispose { layer } => out.push(layer.0.to_string()),
            Instruction::Cursor {
                hotspot_x,
                hotspot_y,
                src,
                src_x,
                src_y,
                width,
                height,
            } => push_all(
                &mut out,
                &[*hotspot_x, *hotspot_y, src.0, *src_x, *src_y, *width, *height],
            ),
            Instruction::Sync { timestamp } => out.push(timestamp.to_string()),
            Instruction::Mouse { x, y, mask } => {
                push_all(&mut out, &[*x, *y]);
                out.push(mask.to_string());
            }
            Instruction::Key { keysym, pressed } => {
                out.push(keysym.to_string());
                out.push(if *pressed { "1" } else { "0" }.to_string());
            }
            Instruction::Disconnect => {}
        }
        out
    }

    /// Rebuilds an instruction from its wire elements (opcode first).
    ///
    /// `size` is ambiguous on the wire: three arguments resize a layer, two
    /// arguments are the client's optimal size during the handshake.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnknownOpcode`] for opcodes outside the instruction set.
    /// - [`ProtocolError::InvalidArgument`] for a wrong argument count or an
    ///   argument that does not parse.
    pub fn from_elements(elements: Vec<String>) -> Result<Self, ProtocolError> {
        let mut iter = elements.into_iter();
        let opcode = iter.next().ok_or_else(|| ProtocolError::MalformedElement(
            "instruction has no opcode".into(),
        ))?;
        let args: Vec<String> = iter.collect();
        let a = Args {
            opcode: &opcode,
            values: &args,
        };

        let instruction = match opcode.as_str() {
            "args" => Instruction::Args(args.clone()),
            "audio" => Instruction::Audio(args.clone()),
            "connect" => Instruction::Connect(args.clone()),
            "name" => {
                a.expect(1)?;
                Instruction::Name(args[0].clone())
            }
            "clipboard" => {
                a.expect(1)?;
                Instruction::Clipboard(args[0].clone())
            }
            "select" => {
                a.expect(1)?;
                Instruction::Select(args[0].clone())
            }
            "size" if args.len() == 2 => Instruction::ClientSize {
                width: a.int(0)?,
                height: a.int(1)?,
            },
            "size" => {
                a.expect(3)?;
                Instruction::Size {
                    layer: LayerId(a.int(0)?),
                    width: a.int(1)?,
                    height: a.int(2)?,
                }
            }
            "error" => {
                a.expect(2)?;
                let code: u16 = a.parse(1)?;
                let status = StatusCode::from_code(code)
                    .ok_or_else(|| a.invalid(1, "unknown status code"))?;
                Instruction::Error {
                    message: args[0].clone(),
                    status,
                }
            }
            "png" => {
                a.expect(5)?;
                let data = BASE64_STANDARD
                    .decode(args[4].as_bytes())
                    .map_err(|e| a.invalid(4, &e.to_string()))?;
                Instruction::Png {
                    mode: a.mode(0)?,
                    layer: LayerId(a.int(1)?),
                    x: a.int(2)?,
                    y: a.int(3)?,
                    data,
                }
            }
            "copy" => {
                a.expect(9)?;
                Instruction::Copy {
                    src: LayerId(a.int(0)?),
                    src_x: a.int(1)?,
                    src_y: a.int(2)?,
                    width: a.int(3)?,
                    height: a.int(4)?,
                    mode: a.mode(5)?,
                    dst: LayerId(a.int(6)?),
                    dst_x: a.int(7)?,
                    dst_y: a.int(8)?,
                }
            }
            "rect" => {
                a.expect(5)?;
                Instruction::Rect {
                    layer: LayerId(a.int(0)?),
                    x: a.int(1)?,
                    y: a.int(2)?,
                    width: a.int(3)?,
                    height: a.int(4)?,
                }
            }
            "cfill" => {
                a.expect(6)?;
                Instruction::Cfill {
                    mode: a.mode(0)?,
                    layer: LayerId(a.int(1)?),
                    color: Rgba {
                        r: a.parse(2)?,
                        g: a.parse(3)?,
                        b: a.parse(4)?,
                        a: a.parse(5)?,
                    },
                }
            }
            "clip" => {
                a.expect(1)?;
                Instruction::Clip {
                    layer: LayerId(a.int(0)?),
                }
            }
            "reset" => {
                a.expect(1)?;
                Instruction::Reset {
                    layer: LayerId(a.int(0)?),
                }
            }
            "dispose" => {
                a.expect(1)?;
                Instruction::Dispose {
                    layer: LayerId(a.int(0)?),
                }
            }
            "cursor" => {
                a.expect(7)?;
                Instruction::Cursor {
                    hotspot_x: a.int(0)?,
                    hotspot_y: a.int(1)?,
                    src: LayerId(a.int(2)?),
                    src_x: a.int(3)?,
                    src_y: a.int(4)?,
                    width: a.int(5)?,
                    height: a.int(6)?,
                }
            }
            "sync" => {
                a.expect(1)?;
                Instruction::Sync {
                    timestamp: a.parse(0)?,
                }
            }
            "mouse" => {
                a.expect(3)?;
                Instruction::Mouse {
                    x: a.int(0)?,
                    y: a.int(1)?,
                    mask: a.parse(2)?,
                }
            }
            "key" => {
                a.expect(2)?;
                Instruction::Key {
                    keysym: a.parse(0)?,
                    pressed: a.int(1)? != 0,
                }
            }
            "disconnect" => Instruction::Disconnect,
            _ => return Err(ProtocolError::UnknownOpcode(opcode)),
        };
        Ok(instruction)
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn push_all(out: &mut Vec<String>, values: &[i32]) {
    out.extend(values.iter().map(i32::to_string));
}

/// Borrowed view of an instruction's arguments with typed accessors.
struct Args<'a> {
    opcode: &'a str,
    values: &'a [String],
}

impl Args<'_> {
    fn expect(&self, count: usize) -> Result<(), ProtocolError> {
        if self.values.len() == count {
            Ok(())
        } else {
            Err(ProtocolError::InvalidArgument {
                opcode: self.opcode.to_string(),
                index: self.values.len(),
                reason: format!("expected {count} arguments, got {}", self.values.len()),
            })
        }
    }

    fn parse<T: std::str::FromStr>(&self, index: usize) -> Result<T, ProtocolError> {
        self.values[index]
            .parse()
            .map_err(|_| self.invalid(index, "not a valid number"))
    }

    fn int(&self, index: usize) -> Result<i32, ProtocolError> {
        self.parse(index)
    }

    fn mode(&self, index: usize) -> Result<CompositeMode, ProtocolError> {
        let code: u8 = self.parse(index)?;
        CompositeMode::from_code(code).ok_or_else(|| self.invalid(index, "unknown composite mode"))
    }

    fn invalid(&self, index: usize, reason: &str) -> ProtocolError {
        ProtocolError::InvalidArgument {
            opcode: self.opcode.to_string(),
            index,
            reason: reason.to_string(),
        }
    }
}
