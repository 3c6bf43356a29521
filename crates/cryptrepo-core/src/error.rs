//! Error types for cryptrepo core operations.
//!
//! Every failure the repository layer can report is a variant of
//! [`RepoError`]. Callers branch on variants (notably `NotFound` and
//! `DatabaseNotFound`), so nothing here is ever string-matched. The CLI layer
//! maps these to user-friendly messages.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepoError>;

/// Core error type for repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Key absent from a datastore. Propagated unchanged through every layer.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// AEAD tag mismatch while opening a sealed value
    #[error("Authentication failed: ciphertext or tag was modified")]
    AuthFailure,

    /// Sealed value too short to even carry a nonce
    #[error("Malformed ciphertext: expected at least {expected} nonce bytes, got {actual}")]
    MalformedCiphertext { expected: usize, actual: usize },

    /// Stored value failed to decrypt
    #[error("Corrupt value for key {key}: {reason}")]
    CorruptValue { key: String, reason: String },

    /// Encrypted key could not be decoded or decrypted.
    ///
    /// Deliberately carries no detail.
    #[error("Invalid encrypted key")]
    InvalidKey,

    /// The supplied key does not unlock the encrypted database
    #[error("Incorrect encryption key for database")]
    IncorrectKey,

    /// No database file at the expected path
    #[error("Database not found: {}", .0.display())]
    DatabaseNotFound(PathBuf),

    /// Database file exists but lacks the key-value table
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Key presence does not match the on-disk encryption state
    #[error("Crypto state mismatch: {0}")]
    CryptoStateMismatch(String),

    /// Operation on a handle or store that has already been closed
    #[error("Already closed")]
    AlreadyClosed,

    /// A config field this repository does not implement
    #[error("Config field not supported: {0}")]
    ConfigSpecUnsupported(String),

    /// Keystore already holds a key under this name
    #[error("Key already exists in keystore: {0}")]
    KeyExists(String),

    /// Keystore has no key under this name
    #[error("No such key in keystore: {0}")]
    NoSuchKey(String),

    /// Repository is still held open in this process
    #[error("Repository is in use: {}", .0.display())]
    RepoInUse(PathBuf),

    /// Configuration read/merge/validation error
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid caller input (bad key length, bad salt, bad selector)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl RepoError {
    /// True for the "key absent" error, which callers routinely branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepoError::NotFound(_))
    }
}
