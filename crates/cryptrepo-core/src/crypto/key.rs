//! Repository encryption keys.
//!
//! Callers either hand over 32 raw key bytes or derive them from a passphrase
//! with Argon2id, which is memory-hard and resistant to GPU-based attacks.

use argon2::Argon2;
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::error::{RepoError, Result};

/// Argon2id parameters.
///
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 1
const ARGON2_MEMORY_KB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of an encryption key in bytes.
pub const KEY_LENGTH: usize = 32;

/// Minimum salt length accepted by [`derive_key`].
const MIN_SALT_LENGTH: usize = 16;

/// A 32-byte repository encryption key.
///
/// The same key must be supplied to every init/open of a repository. The key
/// material is zeroized from memory when dropped.
#[derive(Clone, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; KEY_LENGTH],
}

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Build a key from a slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            RepoError::InvalidInput(format!(
                "Invalid key length, expected {} bytes, got {}",
                KEY_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Self { key })
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Hex encoding for SQLCipher's raw-key pragma; zeroized on drop.
    pub(crate) fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.key))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive an encryption key from a passphrase using Argon2id.
///
/// Same passphrase + salt always produces the same key, so the salt must be
/// kept alongside the repository.
///
/// # Examples
///
/// ```
/// use cryptrepo_core::crypto::derive_key;
///
/// let salt = b"unique-salt-per-repo";
/// let key = derive_key("my-passphrase", salt).unwrap();
/// assert_eq!(key.as_bytes().len(), 32);
/// ```
pub fn derive_key(passphrase: &str, salt: &[u8]) -> Result<EncryptionKey> {
    if passphrase.is_empty() {
        return Err(RepoError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(RepoError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let params = argon2::Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| RepoError::InvalidInput(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes[..])
        .map_err(|e| RepoError::InvalidInput(format!("Key derivation failed: {}", e)))?;

    Ok(EncryptionKey::from_bytes(*key_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let salt = b"test-salt-16-bytes-long";
        let key1 = derive_key("passphrase", salt).unwrap();
        let key2 = derive_key("passphrase", salt).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let key1 = derive_key("passphrase", b"salt-one-16-bytes-x").unwrap();
        let key2 = derive_key("passphrase", b"salt-two-16-bytes-x").unwrap();
        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_rejects_bad_input() {
        assert!(derive_key("", b"test-salt-16-bytes-long").is_err());
        assert!(derive_key("passphrase", b"short").is_err());
    }

    #[test]
    fn test_from_slice_checks_length() {
        assert!(EncryptionKey::from_slice(&[0u8; 31]).is_err());
        assert!(EncryptionKey::from_slice(&[0u8; 33]).is_err());
        assert!(EncryptionKey::from_slice(&[0u8; KEY_LENGTH]).is_ok());
    }

    #[test]
    fn test_debug_redacts() {
        let key = EncryptionKey::from_bytes([0xAB; KEY_LENGTH]);
        let rendered = format!("{:?}", key);
        assert!(rendered.contains("REDACTED"));
        assert!(!rendered.to_lowercase().contains("ab, ab"));
        assert_eq!(key.to_hex().len(), KEY_LENGTH * 2);
    }
}
