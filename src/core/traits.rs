//! Core traits.

/// Symmetric cipher applied to whole frames in place.
///
/// Implementations transform the given region and nothing else. The region
/// may have any length, including zero. Encrypting then decrypting the same
/// region with the same context MUST yield the original bytes.
///
/// # Example
///
/// ```ignore
/// struct Xor(u8);
///
/// impl BlockCrypt for Xor {
///     fn encrypt(&self, region: &mut [u8]) {
///         region.iter_mut().for_each(|b| *b ^= self.0);
///     }
///
///     fn decrypt(&self, region: &mut [u8]) {
///         self.encrypt(region);
///     }
/// }
/// ```
pub trait BlockCrypt: Send + Sync {
    /// Encrypt `region` in place.
    fn encrypt(&self, region: &mut [u8]);

    /// Decrypt `region` in place.
    fn decrypt(&self, region: &mut [u8]);
}
