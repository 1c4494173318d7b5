//! Error taxonomy of the relay.
//!
//! Errors fall into two groups.  *Session-fatal* errors end the session:
//! the client sent unusable parameters, the remote server could not be
//! reached, the outbound socket died, or the engine dropped the connection.
//! *Isolated* errors affect one update only: a drawing order naming a cache
//! slot that does not exist is logged and skipped, and the session goes on.
//! [`RelayError::is_fatal`] is the single place that draws this line.

use rdp_relay_core::{CacheError, ImageError, ProtocolError};
use thiserror::Error;

/// Errors produced by the session bridge.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Session parameters were missing or malformed.  Reported on the
    /// socket before any connection attempt.
    #[error("bad argument: {0}")]
    BadArgument(String),

    /// The remote desktop server could not be reached or refused us.
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// An update referenced a cache slot that holds no valid image.
    #[error("unknown {kind} slot {index}")]
    UnknownSlot { kind: &'static str, index: u32 },

    /// Pixel geometry of an update was unusable; the slot stays invalid.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// An optional virtual channel (clipboard, audio) failed to load.
    #[error("failed to load channel {channel:?}: {reason}")]
    ChannelLoadFailure { channel: String, reason: String },

    /// An image could not be turned into a protocol payload.
    #[error("image encoding failed: {0}")]
    Image(#[from] ImageError),

    /// Writing to the display client failed.
    #[error("display sink failed: {0}")]
    Sink(#[from] SinkError),

    /// The remote engine lost its connection.
    #[error("remote engine disconnected: {0}")]
    Disconnected(String),
}

impl RelayError {
    /// Returns `true` if the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RelayError::BadArgument(_)
                | RelayError::ConnectionFailure(_)
                | RelayError::Sink(_)
                | RelayError::Disconnected(_)
        )
    }
}

impl From<CacheError> for RelayError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::UnknownSlot { kind, index }
            | CacheError::SlotOutOfRange { kind, index, .. } => {
                RelayError::UnknownSlot { kind, index }
            }
            CacheError::InvalidDimensions { .. } => RelayError::InvalidDimensions(err.to_string()),
        }
    }
}

/// Errors raised by the outbound socket.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("display client closed the connection")]
    Closed,
}

/// Errors reported by the remote engine across its boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Connecting to the remote server failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A virtual channel plugin is not available.
    #[error("channel {0:?} is not available")]
    ChannelUnavailable(String),

    /// The transport to the remote server is gone.
    #[error("transport closed")]
    Closed,

    #[error("engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading instructions from the display client.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("display client closed the connection")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_session_level_errors_are_fatal() {
        // Arrange
        let fatal = [
            RelayError::BadArgument("x".into()),
            RelayError::ConnectionFailure("x".into()),
            RelayError::Sink(SinkError::Closed),
            RelayError::Disconnected("x".into()),
        ];
        let isolated = [
            RelayError::UnknownSlot {
                kind: "cursor",
                index: 1,
            },
            RelayError::InvalidDimensions("x".into()),
            RelayError::ChannelLoadFailure {
                channel: "cliprdr".into(),
                reason: "x".into(),
            },
        ];

        // Assert
        assert!(fatal.iter().all(RelayError::is_fatal));
        assert!(!isolated.iter().any(RelayError::is_fatal));
    }

    #[test]
    fn test_cache_errors_map_to_slot_errors() {
        let unknown: RelayError = CacheError::UnknownSlot {
            kind: "glyph",
            index: 9,
        }
        .into();
        let out_of_range: RelayError = CacheError::SlotOutOfRange {
            kind: "glyph",
            index: 9000,
            capacity: 10,
        }
        .into();
        let invalid: RelayError = CacheError::InvalidDimensions {
            width: 0,
            height: 1,
            stride: 0,
            reason: "dimensions must be positive",
        }
        .into();

        assert!(matches!(unknown, RelayError::UnknownSlot { index: 9, .. }));
        assert!(matches!(out_of_range, RelayError::UnknownSlot { index: 9000, .. }));
        assert!(matches!(invalid, RelayError::InvalidDimensions(_)));
    }
}
