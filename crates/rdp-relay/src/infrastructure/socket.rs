//! Buffered instruction writer for the display client connection.
//!
//! Instructions are encoded into an in-memory buffer and written out on
//! [`DisplaySink::flush`].  An instruction is always appended whole, and the
//! buffer is only ever written out between instructions, so the client never
//! observes half an instruction even when the buffer fills up mid-frame.

use std::io::{ErrorKind, Write};

use rdp_relay_core::protocol::encode_elements;
use rdp_relay_core::Instruction;
use tracing::trace;

use crate::application::sink::DisplaySink;
use crate::domain::error::SinkError;

/// Buffered bytes above which the buffer is written out before the next
/// instruction is appended.
pub const SOCKET_BUFFER_SIZE: usize = 8192;

/// [`DisplaySink`] writing the text protocol to any byte stream.
pub struct GuacSocket<W: Write> {
    writer: W,
    buffer: Vec<u8>,
}

impl<W: Write> GuacSocket<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(SOCKET_BUFFER_SIZE),
        }
    }

    /// Bytes encoded but not yet written.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_buffer(&mut self) -> Result<(), SinkError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        trace!(bytes = self.buffer.len(), "writing instruction buffer");
        let result = self.writer.write_all(&self.buffer);
        self.buffer.clear();
        result.map_err(classify)
    }
}

impl<W: Write + Send> DisplaySink for GuacSocket<W> {
    fn send(&mut self, instruction: &Instruction) -> Result<(), SinkError> {
        if self.buffer.len() >= SOCKET_BUFFER_SIZE {
            self.write_buffer()?;
        }
        encode_elements(&instruction.to_elements(), &mut self.buffer);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.write_buffer()?;
        self.writer.flush().map_err(classify)
    }
}

/// A peer that hung up is reported as [`SinkError::Closed`].
fn classify(err: std::io::Error) -> SinkError {
    match err.kind() {
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
            SinkError::Closed
        }
        _ => SinkError::Io(err),
    }
}
