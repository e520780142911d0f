//! The static 256-bit master key under which all containers are encrypted.

use std::ops::Deref;

/// Size of the vault master key in bytes (256 bits)
pub const KEY_SIZE: usize = 32;

/// Errors that can occur when constructing a key
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid key size, expected {expected}, got {got}")]
    InvalidSize { expected: usize, got: usize },
}

/// A 256-bit symmetric key for container encryption.
///
/// A single static key covers the whole vault; key rotation is out of
/// scope. The key is held in memory only and never logged.
#[derive(PartialEq, Clone)]
pub struct VaultKey([u8; KEY_SIZE]);

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

impl Deref for VaultKey {
    type Target = [u8; KEY_SIZE];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<[u8; KEY_SIZE]> for VaultKey {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        VaultKey(bytes)
    }
}

impl VaultKey {
    /// Generate a new random key using a cryptographically secure RNG
    pub fn generate() -> Self {
        let mut buff = [0; KEY_SIZE];
        getrandom::getrandom(&mut buff).expect("failed to generate random bytes");
        Self(buff)
    }

    /// Create a key from a byte slice
    ///
    /// # Errors
    ///
    /// Returns an error if the slice length is not exactly `KEY_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, KeyError> {
        if data.len() != KEY_SIZE {
            return Err(KeyError::InvalidSize {
                expected: KEY_SIZE,
                got: data.len(),
            });
        }
        let mut buff = [0; KEY_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}
