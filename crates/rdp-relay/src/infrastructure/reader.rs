//! Incremental instruction reader for the display client connection.

use std::io::{ErrorKind, Read};

use rdp_relay_core::{decode_instruction, Instruction, ProtocolError};

use crate::domain::error::ReadError;

const READ_CHUNK: usize = 4096;

/// Largest instruction accepted from a client.  Clipboard text is the only
/// thing that legitimately gets big.
pub const MAX_INSTRUCTION_SIZE: usize = 1024 * 1024;

/// Reads whole instructions from a byte stream, keeping any bytes of the
/// next instruction for the following call.
pub struct InstructionReader<R: Read> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: Read> InstructionReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Blocks until one complete instruction has arrived.
    ///
    /// # Errors
    ///
    /// - [`ReadError::Closed`] once the peer has closed the stream.
    /// - [`ReadError::Protocol`] for malformed or oversized input.
    /// - [`ReadError::Io`] for other transport failures.
    pub fn read_instruction(&mut self) -> Result<Instruction, ReadError> {
        loop {
            match decode_instruction(&self.buffer) {
                Ok((instruction, consumed)) => {
                    self.buffer.drain(..consumed);
                    return Ok(instruction);
                }
                Err(ProtocolError::InsufficientData { .. }) => {}
                Err(err) => return Err(err.into()),
            }

            if self.buffer.len() > MAX_INSTRUCTION_SIZE {
                return Err(ProtocolError::MalformedElement(format!(
                    "instruction larger than {MAX_INSTRUCTION_SIZE} bytes"
                ))
                .into());
            }
            self.fill()?;
        }
    }

    fn fill(&mut self) -> Result<(), ReadError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => return Err(ReadError::Closed),
                Ok(n) => {
                    self.buffer.extend_from_slice(&chunk[..n]);
                    return Ok(());
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
                    ) =>
                {
                    return Err(ReadError::Closed)
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read> Iterator for InstructionReader<R> {
    type Item = Result<Instruction, ReadError>;

    /// Yields instructions until the stream closes.
    fn next(&mut self) -> Option<Self::Item> {
        match self.read_instruction() {
            Err(ReadError::Closed) => None,
            other => Some(other),
        }
    }
}
