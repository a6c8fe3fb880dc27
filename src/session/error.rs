//! Session error types.

use std::io;

use thiserror::Error;

use crate::core::ArqError;
use crate::transport::FrameError;

/// Errors returned by [`Session`](super::Session) operations.
///
/// Transient conditions (nothing to read, send window full) are reported as
/// `Ok(0)`, never as errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No socket attached.
    #[error("session is not connected")]
    NotConnected,

    /// Socket failure.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Received datagram failed framing checks.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The engine rejected data.
    #[error("arq error: {0}")]
    Arq(#[from] ArqError),

    /// Peer host could not be resolved.
    #[error("address resolution failed: {0}")]
    Resolve(String),
}

impl SessionError {
    /// The offending datagram was discarded and the session is unaffected.
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, Self::Frame(_))
    }

    /// A datagram failed its checksum after decryption.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Frame(FrameError::ChecksumMismatch { .. }))
    }
}
