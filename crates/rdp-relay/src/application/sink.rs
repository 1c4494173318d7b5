//! Outbound side of the relay: where display instructions go.

use rdp_relay_core::Instruction;

use crate::domain::error::SinkError;

/// Ordered, buffered writer of display instructions.
///
/// `send` may buffer; nothing is guaranteed to reach the client before
/// `flush`.  Implementations write each instruction atomically with respect
/// to the buffer, so a flush never exposes half an instruction.
pub trait DisplaySink: Send {
    fn send(&mut self, instruction: &Instruction) -> Result<(), SinkError>;

    /// Pushes all buffered instructions to the client.
    fn flush(&mut self) -> Result<(), SinkError>;
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn send(&mut self, instruction: &Instruction) -> Result<(), SinkError> {
        (**self).send(instruction)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}
