//! Security layer
//!
//! Implements the cryptographic primitives used by encrypted sessions:
//! - AES in CFB mode over whole frames ([`AesBlockCrypt`])
//! - Passphrase key derivation ([`derive_key`])
//!
//! # Known weakness
//!
//! Every frame is encrypted with the same key and the same fixed IV, and the
//! 16-byte frame header is not a real nonce. CFB keystream is therefore
//! reused across packets. The CRC32 checksum detects corruption, not
//! forgery. The wire format is kept as-is for interoperability.

mod block;
mod keys;

pub use block::AesBlockCrypt;
pub use keys::{derive_key, PBKDF2_ROUNDS};
