//! Value encryption.
//!
//! Uses XChaCha20-Poly1305 (192-bit nonce). Every seal draws a fresh random
//! nonce, which is safe at this nonce size.
//!
//! Sealed format:
//!   [ nonce (24 bytes) | ciphertext | tag (16 bytes) ]

use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

use crate::crypto::EncryptionKey;
use crate::error::{RepoError, Result};

/// XChaCha20 nonce length.
pub const NONCE_LENGTH: usize = 24;

/// Poly1305 tag length.
pub const TAG_LENGTH: usize = 16;

/// Bytes a sealed value carries on top of its plaintext.
pub const SEAL_OVERHEAD: usize = NONCE_LENGTH + TAG_LENGTH;

/// Authenticated encryption of opaque values.
#[derive(Clone)]
pub struct ValueCipher {
    aead: XChaCha20Poly1305,
}

impl std::fmt::Debug for ValueCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ValueCipher([REDACTED])")
    }
}

impl ValueCipher {
    pub fn new(key: &EncryptionKey) -> Self {
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
        }
    }

    /// Encrypt `plaintext`, prepending a fresh random nonce.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .aead
            .encrypt(&nonce, plaintext)
            .map_err(|_| RepoError::InvalidInput("Value too large to encrypt".to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a sealed value.
    ///
    /// # Errors
    ///
    /// - `RepoError::MalformedCiphertext` if the input cannot carry a nonce
    /// - `RepoError::AuthFailure` if the tag does not verify
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < NONCE_LENGTH {
            return Err(RepoError::MalformedCiphertext {
                expected: NONCE_LENGTH,
                actual: sealed.len(),
            });
        }
        let (nonce, body) = sealed.split_at(NONCE_LENGTH);
        self.aead
            .decrypt(XNonce::from_slice(nonce), body)
            .map_err(|_| RepoError::AuthFailure)
    }

    /// Plaintext size of a value stored with `stored_len` bytes.
    pub fn plaintext_size(stored_len: usize) -> usize {
        stored_len.saturating_sub(SEAL_OVERHEAD)
    }
}
