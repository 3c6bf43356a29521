//! Cryptographic building blocks for the encrypted datastore.
//!
//! - [`ValueCipher`]: XChaCha20-Poly1305 with a fresh random nonce per value
//! - [`KeyCipher`]: deterministic key encryption so exact-match lookups work
//! - [`EncryptionKey`] / [`derive_key`]: the 32-byte repository key
//!
//! ## Security Model
//!
//! - Keys are never persisted by this crate and are zeroized on drop
//! - Values never reuse a nonce
//! - Key encryption is deterministic and therefore leaks key equality and
//!   key length; values leak only their length
//!
//! We do NOT defend against:
//! - Access to an unlocked, open repository in process memory
//! - Traffic analysis of key access patterns

pub mod key;
pub mod transform;
pub mod value;

pub use key::{derive_key, EncryptionKey, KEY_LENGTH};
pub use transform::KeyCipher;
pub use value::{ValueCipher, NONCE_LENGTH, SEAL_OVERHEAD, TAG_LENGTH};
