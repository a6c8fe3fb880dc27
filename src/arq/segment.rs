//! KCP segment header encoding and decoding.
//!
//! Wire format (24 bytes, all integers little-endian):
//! ```text
//! +--------+-----+-----+-------+--------+--------+--------+--------+
//! | conv   | cmd | frg | wnd   | ts     | sn     | una    | len    |
//! | 4      | 1   | 1   | 2     | 4      | 4      | 4      | 4      |
//! +--------+-----+-----+-------+--------+--------+--------+--------+
//! ```
//! followed by `len` bytes of data.

use crate::core::ArqError;

/// Segment header size.
pub const SEGMENT_HEADER_SIZE: usize = 24;

/// Segment command identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// Data segment.
    Push = 81,
    /// Acknowledgment.
    Ack = 82,
    /// Window probe (ask peer for its window).
    WindowAsk = 83,
    /// Window size announcement.
    WindowTell = 84,
}

impl Command {
    /// Parse a command from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            81 => Some(Self::Push),
            82 => Some(Self::Ack),
            83 => Some(Self::WindowAsk),
            84 => Some(Self::WindowTell),
            _ => None,
        }
    }

    /// Byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Decoded segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Conversation id.
    pub conv: u32,
    /// Command.
    pub cmd: Command,
    /// Remaining fragments after this one.
    pub frg: u8,
    /// Sender's free receive window.
    pub wnd: u16,
    /// Timestamp.
    pub ts: u32,
    /// Sequence number.
    pub sn: u32,
    /// Sender's next expected sequence number.
    pub una: u32,
    /// Data length following the header.
    pub len: u32,
}

impl SegmentHeader {
    /// Write the header into the first [`SEGMENT_HEADER_SIZE`] bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.conv.to_le_bytes());
        buf[4] = self.cmd.as_byte();
        buf[5] = self.frg;
        buf[6..8].copy_from_slice(&self.wnd.to_le_bytes());
        buf[8..12].copy_from_slice(&self.ts.to_le_bytes());
        buf[12..16].copy_from_slice(&self.sn.to_le_bytes());
        buf[16..20].copy_from_slice(&self.una.to_le_bytes());
        buf[20..24].copy_from_slice(&self.len.to_le_bytes());
    }

    /// Parse a header from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ArqError> {
        if bytes.len() < SEGMENT_HEADER_SIZE {
            return Err(ArqError::Truncated);
        }

        let cmd = Command::from_byte(bytes[4]).ok_or(ArqError::UnknownCommand(bytes[4]))?;

        Ok(Self {
            conv: read_u32(bytes, 0),
            cmd,
            frg: bytes[5],
            wnd: u16::from_le_bytes([bytes[6], bytes[7]]),
            ts: read_u32(bytes, 8),
            sn: read_u32(bytes, 12),
            una: read_u32(bytes, 16),
            len: read_u32(bytes, 20),
        })
    }
}

/// Read the conversation id from the front of a raw datagram.
pub fn peek_conv(bytes: &[u8]) -> Option<u32> {
    (bytes.len() >= 4).then(|| read_u32(bytes, 0))
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
