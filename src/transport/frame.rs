//! Encrypted frame encoding and decoding.
//!
//! Wire format of an encrypted frame:
//! ```text
//! +------------------+----------+----------------------------+
//! | header (16)      | CRC32 (4)| ARQ datagram (N - 20)      |
//! +------------------+----------+----------------------------+
//! |<------------------- encrypted (N) ---------------------->|
//! ```
//!
//! The CRC32 (IEEE) covers the ARQ datagram and is stored little-endian.
//! Without a cipher, frames are the bare ARQ datagram.

use std::fmt;
use std::sync::Arc;

use crate::core::{BlockCrypt, CRYPT_HEADER_SIZE, MIN_FRAME_SIZE, NONCE_SIZE};

use super::error::FrameError;

/// Frames and unframes ARQ datagrams with an optional shared cipher.
#[derive(Clone, Default)]
pub struct FrameCodec {
    crypt: Option<Arc<dyn BlockCrypt>>,
}

impl FrameCodec {
    /// Create a codec. `None` disables framing entirely.
    pub fn new(crypt: Option<Arc<dyn BlockCrypt>>) -> Self {
        Self { crypt }
    }

    /// Codec that passes datagrams through unchanged.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Bytes the engine must reserve at the front of each datagram.
    pub fn header_size(&self) -> usize {
        if self.crypt.is_some() { CRYPT_HEADER_SIZE } else { 0 }
    }

    /// Whether frames are encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.crypt.is_some()
    }

    /// Turn an engine datagram into a wire frame, in place.
    ///
    /// `datagram` must start with [`header_size`](Self::header_size)
    /// reserved bytes. The first 16 are left as they are; the checksum is
    /// written after them and the whole buffer is then encrypted.
    pub fn encode(&self, datagram: &mut [u8]) -> Result<(), FrameError> {
        let Some(crypt) = &self.crypt else {
            return Ok(());
        };
        if datagram.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                len: datagram.len(),
                min: MIN_FRAME_SIZE,
            });
        }

        let checksum = crc32fast::hash(&datagram[CRYPT_HEADER_SIZE..]);
        datagram[NONCE_SIZE..CRYPT_HEADER_SIZE].copy_from_slice(&checksum.to_le_bytes());
        crypt.encrypt(datagram);
        Ok(())
    }

    /// Decrypt and verify a wire frame in place, returning the ARQ datagram.
    ///
    /// Frames too short to carry a payload are rejected before the cipher
    /// is touched.
    pub fn decode<'a>(&self, frame: &'a mut [u8]) -> Result<&'a [u8], FrameError> {
        let Some(crypt) = &self.crypt else {
            return Ok(frame);
        };
        if frame.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                len: frame.len(),
                min: MIN_FRAME_SIZE,
            });
        }

        crypt.decrypt(frame);

        let stored = u32::from_le_bytes([
            frame[NONCE_SIZE],
            frame[NONCE_SIZE + 1],
            frame[NONCE_SIZE + 2],
            frame[NONCE_SIZE + 3],
        ]);
        let computed = crc32fast::hash(&frame[CRYPT_HEADER_SIZE..]);
        if stored != computed {
            return Err(FrameError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        Ok(&frame[CRYPT_HEADER_SIZE..])
    }
}

impl fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("encrypted", &self.is_encrypted())
            .finish()
    }
}
