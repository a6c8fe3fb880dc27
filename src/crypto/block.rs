//! AES-CFB block cipher over frame regions.
//!
//! Regions are zero-padded to the AES block size before the transform and
//! only the original length is written back. The pad never leaves the
//! scratch buffer.

use aes::{Aes128, Aes192, Aes256};
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use zeroize::Zeroize;

use crate::core::{BlockCrypt, CryptoError, AES_BLOCK_SIZE, INITIAL_VECTOR};

/// AES variant selected by key length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySize {
    Aes128,
    Aes192,
    Aes256,
}

impl KeySize {
    fn from_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128),
            24 => Some(Self::Aes192),
            32 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// AES block cipher in 128-bit CFB mode with the fixed protocol IV.
///
/// Key material is zeroized on drop.
#[derive(Clone)]
pub struct AesBlockCrypt {
    key: Vec<u8>,
    size: KeySize,
}

impl AesBlockCrypt {
    /// Create a cipher context from a 16, 24 or 32 byte key.
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let size = KeySize::from_len(key.len()).ok_or(CryptoError::InvalidKeyLength(key.len()))?;
        Ok(Self {
            key: key.to_vec(),
            size,
        })
    }

    /// Key length in bytes.
    pub fn key_len(&self) -> usize {
        self.key.len()
    }

    fn transform(&self, region: &mut [u8], encrypt: bool) {
        if region.is_empty() {
            return;
        }

        let mut scratch = vec![0u8; padded_len(region.len())];
        scratch[..region.len()].copy_from_slice(region);

        macro_rules! apply {
            ($aes:ty) => {
                if encrypt {
                    cfb_mode::Encryptor::<$aes>::new_from_slices(&self.key, &INITIAL_VECTOR)
                        .map(|c| c.encrypt(&mut scratch))
                } else {
                    cfb_mode::Decryptor::<$aes>::new_from_slices(&self.key, &INITIAL_VECTOR)
                        .map(|c| c.decrypt(&mut scratch))
                }
            };
        }

        // Key length was validated at construction, so this cannot fail.
        let applied = match self.size {
            KeySize::Aes128 => apply!(Aes128),
            KeySize::Aes192 => apply!(Aes192),
            KeySize::Aes256 => apply!(Aes256),
        };

        if applied.is_ok() {
            region.copy_from_slice(&scratch[..region.len()]);
        }
        scratch.zeroize();
    }
}

impl BlockCrypt for AesBlockCrypt {
    fn encrypt(&self, region: &mut [u8]) {
        self.transform(region, true);
    }

    fn decrypt(&self, region: &mut [u8]) {
        self.transform(region, false);
    }
}

impl std::fmt::Debug for AesBlockCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesBlockCrypt")
            .field("key", &"[redacted]")
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for AesBlockCrypt {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Round `len` up to the next multiple of the AES block size.
fn padded_len(len: usize) -> usize {
    let rem = len % AES_BLOCK_SIZE;
    if rem == 0 { len } else { len + AES_BLOCK_SIZE - rem }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cipher() -> AesBlockCrypt {
        AesBlockCrypt::new(&[0x42; 32]).unwrap()
    }

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 16);
        assert_eq!(padded_len(16), 16);
        assert_eq!(padded_len(17), 32);
    }

    #[test]
    fn test_rejects_bad_key_length() {
        assert_eq!(
            AesBlockCrypt::new(&[0u8; 20]).unwrap_err(),
            CryptoError::InvalidKeyLength(20)
        );
        assert!(AesBlockCrypt::new(&[0u8; 16]).is_ok());
        assert!(AesBlockCrypt::new(&[0u8; 24]).is_ok());
    }

    #[test]
    fn test_empty_region_is_noop() {
        let mut empty: [u8; 0] = [];
        cipher().encrypt(&mut empty);
        cipher().decrypt(&mut empty);
    }

    #[test]
    fn test_encrypt_changes_bytes() {
        let plaintext = b"Hello KCP: 1".to_vec();
        let mut buf = plaintext.clone();
        cipher().encrypt(&mut buf);
        assert_ne!(buf, plaintext);
        assert_eq!(buf.len(), plaintext.len());
    }

    #[test]
    fn test_keystream_is_fixed_across_calls() {
        // Same key, same IV: identical plaintexts encrypt identically.
        let mut a = [7u8; 40];
        let mut b = [7u8; 40];
        cipher().encrypt(&mut a);
        cipher().encrypt(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_prefix_independent_of_length() {
        // CFB output for the first bytes does not depend on what follows.
        let data: Vec<u8> = (0..=255).collect();
        let mut short = data[..21].to_vec();
        let mut long = data[..100].to_vec();
        cipher().encrypt(&mut short);
        cipher().encrypt(&mut long);
        assert_eq!(short[..], long[..21]);
    }

    #[test]
    fn test_different_keys_differ() {
        let mut a = [1u8; 32];
        let mut b = [1u8; 32];
        AesBlockCrypt::new(&[1; 16]).unwrap().encrypt(&mut a);
        AesBlockCrypt::new(&[2; 16]).unwrap().encrypt(&mut b);
        assert_ne!(a, b);
    }

    #[test]
    fn test_region_in_larger_buffer() {
        let mut buf = [0xAAu8; 64];
        let original = buf;
        cipher().encrypt(&mut buf[10..30]);
        assert_eq!(buf[..10], original[..10]);
        assert_eq!(buf[30..], original[30..]);
        cipher().decrypt(&mut buf[10..30]);
        assert_eq!(buf, original);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_any_length(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let crypt = cipher();
            let mut buf = data.clone();
            crypt.encrypt(&mut buf);
            crypt.decrypt(&mut buf);
            prop_assert_eq!(buf, data);
        }
    }
}
