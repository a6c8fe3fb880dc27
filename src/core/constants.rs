//! Wire and buffer constants.
//!
//! The framing values are part of the wire format and MUST NOT be changed
//! without breaking interoperability with existing peers.

// =============================================================================
// CRYPTO FRAME LAYOUT
// =============================================================================

/// Header reservation at the front of every encrypted frame.
///
/// Historically described as a per-packet nonce. It is neither randomized
/// nor derived per packet: it carries whatever bytes were already present in
/// the engine's output buffer.
pub const NONCE_SIZE: usize = 16;

/// CRC32 checksum field size.
pub const CRC_SIZE: usize = 4;

/// Overall crypto header size (header reservation + checksum).
pub const CRYPT_HEADER_SIZE: usize = NONCE_SIZE + CRC_SIZE;

/// Smallest encrypted frame that carries at least one payload byte.
pub const MIN_FRAME_SIZE: usize = CRYPT_HEADER_SIZE + 1;

// =============================================================================
// BLOCK CIPHER
// =============================================================================

/// AES block size; regions are zero-padded to a multiple of this.
pub const AES_BLOCK_SIZE: usize = 16;

/// Fixed initialization vector shared by every frame of every session.
pub const INITIAL_VECTOR: [u8; AES_BLOCK_SIZE] = [
    167, 115, 79, 156, 18, 172, 27, 1, 164, 21, 242, 193, 252, 120, 230, 107,
];

/// Derived key size (AES-256).
pub const DERIVED_KEY_SIZE: usize = 32;

// =============================================================================
// SESSION
// =============================================================================

/// Initial receive buffer capacity (32 KiB).
pub const RECV_BUFFER_CAPACITY: usize = 32 * 1024;

/// Upper bound on serve/read passes performed by a single `recv` call.
pub const MAX_RECV_PASSES: usize = 2;
