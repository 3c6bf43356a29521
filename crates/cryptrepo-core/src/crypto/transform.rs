//! Deterministic key encryption.
//!
//! A key is sealed with a nonce derived from `BLAKE3(encryption key || key)`,
//! so the same plaintext key always maps to the same encrypted atom and
//! exact-match lookups keep working against the backing store. The atom is
//! `"/" + base64url(nonce || ciphertext || tag)` without padding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key as AeadKey, XChaCha20Poly1305, XNonce};
use zeroize::Zeroizing;

use crate::crypto::value::NONCE_LENGTH;
use crate::crypto::EncryptionKey;
use crate::error::{RepoError, Result};
use crate::key::Key;
use crate::options::KeyMode;

/// Reversible, deterministic transform between plaintext and encrypted keys.
#[derive(Clone)]
pub struct KeyCipher {
    secret: Zeroizing<[u8; 32]>,
    aead: XChaCha20Poly1305,
    mode: KeyMode,
}

impl std::fmt::Debug for KeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyCipher")
            .field("secret", &"[REDACTED]")
            .field("mode", &self.mode)
            .finish()
    }
}

impl KeyCipher {
    pub fn new(key: &EncryptionKey, mode: KeyMode) -> Self {
        Self {
            secret: Zeroizing::new(*key.as_bytes()),
            aead: XChaCha20Poly1305::new(AeadKey::from_slice(key.as_bytes())),
            mode,
        }
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    /// Encrypt a plaintext key.
    ///
    /// In flat mode the whole path becomes one atom. In segmented mode each
    /// segment is encrypted on its own and the hierarchy is kept.
    pub fn encrypt(&self, key: &Key) -> Result<Key> {
        match self.mode {
            KeyMode::Flat => Ok(Key::new(self.encrypt_atom(key.as_bytes())?)),
            KeyMode::Segmented => {
                let atoms = key
                    .segments()
                    .into_iter()
                    .map(|segment| self.encrypt_atom(segment.as_bytes()))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Key::from_namespaces(atoms))
            }
        }
    }

    /// Reverse [`KeyCipher::encrypt`]. Every failure surfaces as
    /// `RepoError::InvalidKey`.
    pub fn decrypt(&self, key: &Key) -> Result<Key> {
        match self.mode {
            KeyMode::Flat => {
                let segments = key.segments();
                let [atom] = segments.as_slice() else {
                    return Err(RepoError::InvalidKey);
                };
                Ok(Key::new(self.decrypt_atom(atom)?))
            }
            KeyMode::Segmented => {
                let plain = key
                    .segments()
                    .into_iter()
                    .map(|atom| self.decrypt_atom(atom))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Key::from_namespaces(plain))
            }
        }
    }

    fn nonce_for(&self, plaintext: &[u8]) -> [u8; NONCE_LENGTH] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.secret.as_ref());
        hasher.update(plaintext);
        let digest = hasher.finalize();

        let mut nonce = [0u8; NONCE_LENGTH];
        nonce.copy_from_slice(&digest.as_bytes()[..NONCE_LENGTH]);
        nonce
    }

    fn encrypt_atom(&self, plaintext: &[u8]) -> Result<String> {
        let nonce = self.nonce_for(plaintext);
        let sealed = self
            .aead
            .encrypt(XNonce::from_slice(&nonce), plaintext)
            .map_err(|_| RepoError::InvalidInput("Key too large to encrypt".to_string()))?;

        let mut raw = Vec::with_capacity(NONCE_LENGTH + sealed.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&sealed);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    fn decrypt_atom(&self, atom: &str) -> Result<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(atom)
            .map_err(|_| RepoError::InvalidKey)?;
        if raw.len() <= NONCE_LENGTH {
            return Err(RepoError::InvalidKey);
        }
        let (nonce, body) = raw.split_at(NONCE_LENGTH);
        let plaintext = self
            .aead
            .decrypt(XNonce::from_slice(nonce), body)
            .map_err(|_| RepoError::InvalidKey)?;
        String::from_utf8(plaintext).map_err(|_| RepoError::InvalidKey)
    }
}
