//! Error types shared across layers.

use thiserror::Error;

/// Errors in the crypto layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key length does not select an AES variant.
    #[error("invalid key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidKeyLength(usize),

    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivationFailed,
}

/// Errors reported by an ARQ engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArqError {
    /// No complete message is waiting to be received.
    #[error("receive queue is empty")]
    EmptyQueue,

    /// Caller buffer cannot hold the next message.
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Size of the next message.
        needed: usize,
        /// Size of the caller buffer.
        available: usize,
    },

    /// Message would need more fragments than the receive window allows.
    #[error("message needs {0} fragments, exceeding the receive window")]
    TooManyFragments(usize),

    /// Datagram ended in the middle of a segment.
    #[error("truncated segment")]
    Truncated,

    /// Segment belongs to a different conversation.
    #[error("conversation mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ConvMismatch {
        /// Local conversation id.
        expected: u32,
        /// Conversation id carried by the segment.
        actual: u32,
    },

    /// Unknown segment command byte.
    #[error("unknown command: {0}")]
    UnknownCommand(u8),

    /// MTU too small to carry a segment header.
    #[error("invalid mtu: {0}")]
    InvalidMtu(usize),

    /// Reservation leaves no room for payload.
    #[error("invalid reservation: {reserved} bytes with mtu {mtu}")]
    InvalidReserve {
        /// Requested reservation.
        reserved: usize,
        /// Current MTU.
        mtu: usize,
    },
}
