//! Error Types
//!
//! Error taxonomy for the IEC 60870-5 protocol core. Codec errors are
//! recoverable (the offending frame is dropped), protocol errors are fatal to
//! the connection, state errors are reported synchronously to the caller.

use thiserror::Error;

/// Result type for voltage-iec60870 operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level protocol library error
#[derive(Debug, Error)]
pub enum Error {
    /// Encode/decode failure, recoverable by dropping the frame
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Protocol violation, fatal to the connection
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// API misuse, reported synchronously
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Transport failure, surfaced from the adapter unchanged
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

/// ASDU and information object encode/decode errors
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Not enough bytes to decode the announced structure
    #[error("message truncated")]
    Truncated,

    /// Type identifier outside the supported catalogue
    #[error("unknown type identifier {0}")]
    UnknownType(u8),

    /// A configured or encoded field width is not permitted
    #[error("invalid field width {0}")]
    InvalidWidth(u8),

    /// Information object type differs from the ASDU type
    #[error("mixed information object types in one ASDU")]
    MixedTypes,

    /// Sequence ASDU addresses must increase by exactly one
    #[error("non-consecutive information object address")]
    NonConsecutiveIoa,

    /// Appending would exceed the configured maximum ASDU size
    #[error("maximum ASDU size exceeded")]
    Overflow,
}

/// Link and transport-layer protocol violations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Received sequence number does not match the expected one
    #[error("sequence mismatch: expected {expected}, got {got}")]
    SequenceMismatch { expected: u16, got: u16 },

    /// Peer acknowledged frames that were never sent
    #[error("send window exceeded")]
    WindowExceeded,

    /// Frame format not valid in the current state
    #[error("unexpected frame format")]
    UnexpectedFormat,

    /// A protocol timer elapsed without the required peer reaction
    #[error("timer {0} expired")]
    TimerExpired(&'static str),
}

/// Programmer errors in the connection API
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    /// Data transfer has not been started
    #[error("data transfer not started")]
    NotStarted,

    /// Data transfer is already running
    #[error("data transfer already started")]
    AlreadyStarted,

    /// The requested transition is not legal in the current state
    #[error("invalid state transition")]
    InvalidTransition,
}
