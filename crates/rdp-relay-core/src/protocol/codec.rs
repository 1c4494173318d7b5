//! Text codec for the display protocol.
//!
//! Wire format:
//! ```text
//! LENGTH.VALUE,LENGTH.VALUE,...;
//! ```
//! Each element is prefixed by its length in **Unicode characters** (not
//! bytes), a dot, then the value.  Elements are separated by `,` and the
//! instruction ends with `;`.  The first element is the opcode.
//!
//! Counting characters instead of bytes lets a browser client parse the
//! stream with plain string indexing.  The decoder therefore walks UTF-8
//! sequences one character at a time.

use thiserror::Error;

use crate::protocol::instruction::Instruction;

/// Upper bound on the digits of a length prefix.  Anything longer is treated
/// as a corrupt stream rather than an enormous element.
const MAX_LENGTH_DIGITS: usize = 10;

/// Errors that can occur during instruction encoding or decoding.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice ends before the instruction terminator.  The caller
    /// should read more bytes and try again.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// A length prefix, separator or UTF-8 sequence is invalid.
    #[error("malformed element: {0}")]
    MalformedElement(String),

    /// The opcode is not part of the instruction set.
    #[error("unknown opcode: {0:?}")]
    UnknownOpcode(String),

    /// An argument is missing, surplus, or does not parse.
    #[error("invalid argument {index} for {opcode:?}: {reason}")]
    InvalidArgument {
        opcode: String,
        index: usize,
        reason: String,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Instruction`] into its wire bytes, terminator included.
///
/// # Examples
///
/// ```rust
/// use rdp_relay_core::protocol::{encode_instruction, Instruction, LayerId};
///
/// let bytes = encode_instruction(&Instruction::Dispose { layer: LayerId(-1) });
/// assert_eq!(bytes, b"7.dispose,2.-1;");
/// ```
pub fn encode_instruction(instruction: &Instruction) -> Vec<u8> {
    let elements = instruction.to_elements();
    let mut buf = Vec::with_capacity(elements.iter().map(|e| e.len() + 4).sum());
    encode_elements(&elements, &mut buf);
    buf
}

/// Appends raw elements (opcode first) to `out` in wire format.
pub fn encode_elements(elements: &[String], out: &mut Vec<u8>) {
    for (i, element) in elements.iter().enumerate() {
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(element.chars().count().to_string().as_bytes());
        out.push(b'.');
        out.extend_from_slice(element.as_bytes());
    }
    out.push(b';');
}

/// Decodes one [`Instruction`] from the beginning of `bytes`.
///
/// Returns the decoded instruction and the number of bytes consumed, so the
/// caller can advance their read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if `bytes` holds only part of
/// an instruction, and the other variants for corrupt or unknown input.
///
/// # Examples
///
/// ```rust
/// use rdp_relay_core::protocol::{decode_instruction, Instruction};
///
/// let (instruction, n) = decode_instruction(b"4.sync,3.100;").unwrap();
/// assert_eq!(instruction, Instruction::Sync { timestamp: 100 });
/// assert_eq!(n, 13);
/// ```
pub fn decode_instruction(bytes: &[u8]) -> Result<(Instruction, usize), ProtocolError> {
    let (elements, consumed) = decode_elements(bytes)?;
    Ok((Instruction::from_elements(elements)?, consumed))
}

/// Decodes the raw elements of one instruction without interpreting them.
///
/// # Errors
///
/// See [`decode_instruction`].
pub fn decode_elements(bytes: &[u8]) -> Result<(Vec<String>, usize), ProtocolError> {
    let mut elements = Vec::new();
    let mut pos = 0;

    loop {
        // Length prefix: decimal digits up to the dot.
        let digits_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
            if pos - digits_start > MAX_LENGTH_DIGITS {
                return Err(ProtocolError::MalformedElement(
                    "length prefix too long".into(),
                ));
            }
        }
        let Some(&after_digits) = bytes.get(pos) else {
            return Err(insufficient(pos + 1, bytes.len()));
        };
        if after_digits != b'.' || pos == digits_start {
            return Err(ProtocolError::MalformedElement(format!(
                "expected length prefix at byte {digits_start}"
            )));
        }
        let char_count: usize = std::str::from_utf8(&bytes[digits_start..pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ProtocolError::MalformedElement("bad length prefix".into()))?;
        pos += 1;

        // Value: exactly `char_count` UTF-8 characters.
        let value_start = pos;
        for _ in 0..char_count {
            let Some(&lead) = bytes.get(pos) else {
                return Err(insufficient(pos + 1, bytes.len()));
            };
            let width = utf8_width(lead).ok_or_else(|| {
                ProtocolError::MalformedElement(format!("invalid UTF-8 lead byte at {pos}"))
            })?;
            if pos + width > bytes.len() {
                return Err(insufficient(pos + width, bytes.len()));
            }
            pos += width;
        }
        let value = std::str::from_utf8(&bytes[value_start..pos])
            .map_err(|e| ProtocolError::MalformedElement(e.to_string()))?;
        elements.push(value.to_string());

        // Separator or terminator.
        match bytes.get(pos) {
            Some(b',') => pos += 1,
            Some(b';') => return Ok((elements, pos + 1)),
            Some(other) => {
                return Err(ProtocolError::MalformedElement(format!(
                    "unexpected byte 0x{other:02X} after element at {pos}"
                )))
            }
            None => return Err(insufficient(pos + 1, bytes.len())),
        }
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

fn insufficient(needed: usize, available: usize) -> ProtocolError {
    ProtocolError::InsufficientData { needed, available }
}

/// Byte width of a UTF-8 sequence from its lead byte.
fn utf8_width(lead: u8) -> Option<usize> {
    match lead {
        0x00..=0x7F => Some(1),
        0xC2..=0xDF => Some(2),
        0xE0..=0xEF => Some(3),
        0xF0..=0xF4 => Some(4),
        _ => None,
    }
}
