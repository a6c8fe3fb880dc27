//! Transport layer error types.

use thiserror::Error;

/// Errors produced while framing or unframing a datagram.
///
/// Both variants mean the datagram is unusable. The session treats them as
/// packet loss; the engine recovers through retransmission.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame cannot hold the crypto header plus at least one payload byte.
    #[error("frame too short: {len} bytes (minimum {min})")]
    TooShort {
        /// Actual length.
        len: usize,
        /// Minimum valid length.
        min: usize,
    },

    /// Decrypted payload does not match the stored checksum.
    #[error("checksum mismatch: stored {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum carried by the frame.
        expected: u32,
        /// Checksum computed over the decrypted payload.
        actual: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_display() {
        let err = FrameError::TooShort { len: 20, min: 21 };
        assert_eq!(err.to_string(), "frame too short: 20 bytes (minimum 21)");

        let err = FrameError::ChecksumMismatch {
            expected: 0x3610_a686,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "checksum mismatch: stored 0x3610a686, computed 0x00000001"
        );
    }
}
