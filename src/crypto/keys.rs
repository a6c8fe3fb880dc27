//! Passphrase key derivation
//!
//! Turns a shared passphrase and salt into AES-256 key material for
//! [`AesBlockCrypt`](super::AesBlockCrypt) using PBKDF2-HMAC-SHA1, the
//! scheme peers of this wire format derive their keys with.

use hmac::Hmac;
use sha1::Sha1;

use crate::core::{CryptoError, DERIVED_KEY_SIZE};

/// PBKDF2 iteration count.
pub const PBKDF2_ROUNDS: u32 = 1024;

/// Derive a 32-byte block cipher key from a passphrase and salt.
///
/// Both peers MUST use the same passphrase and salt.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Result<[u8; DERIVED_KEY_SIZE], CryptoError> {
    let mut key = [0u8; DERIVED_KEY_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha1>>(password, salt, PBKDF2_ROUNDS, &mut key)
        .map_err(|_| CryptoError::KeyDerivationFailed)?;
    Ok(key)
}
