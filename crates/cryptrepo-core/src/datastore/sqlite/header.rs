//! On-disk encryption state detection.
//!
//! A plain SQLite file starts with the 16-byte magic `"SQLite format 3\0"`.
//! A fully encrypted SQLCipher file starts with random-looking bytes. In
//! plaintext-header mode SQLCipher keeps the first 32 bytes readable but
//! sets the reserved-space field, so bytes 72..92 of a plain file are zero
//! while an encrypted one has ciphertext there.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::error::{RepoError, Result};

/// The SQLite file magic.
pub const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Bytes 72..92 are reserved for expansion and zero in a plain database.
const RESERVED_RANGE: std::ops::Range<usize> = 72..92;

/// Classify the database file at `path` as encrypted or plaintext.
///
/// # Errors
///
/// Fails if the file cannot be read or is shorter than the magic.
pub fn is_encrypted(path: &Path) -> Result<bool> {
    let mut header = Vec::with_capacity(RESERVED_RANGE.end);
    File::open(path)?
        .take(RESERVED_RANGE.end as u64)
        .read_to_end(&mut header)?;

    if header.len() < SQLITE_MAGIC.len() {
        return Err(RepoError::Storage(format!(
            "Cannot read database header of {}",
            path.display()
        )));
    }
    if &header[..SQLITE_MAGIC.len()] != SQLITE_MAGIC {
        return Ok(true);
    }
    let reserved = header.get(RESERVED_RANGE).unwrap_or(&[]);
    Ok(reserved.iter().any(|b| *b != 0))
}

/// Refuse to proceed when key presence disagrees with the file on disk.
///
/// A missing file is fine: it will be created with whatever state the caller
/// asks for.
pub fn check_db_crypto(path: &Path, key_provided: bool) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if path.is_dir() {
        return Err(RepoError::Storage(format!(
            "Database path is a directory: {}",
            path.display()
        )));
    }

    let encrypted = is_encrypted(path)?;
    if key_provided && !encrypted {
        warn!(path = %path.display(), "key provided for a plaintext database");
        return Err(RepoError::CryptoStateMismatch(
            "key provided while datastore is NOT encrypted".to_string(),
        ));
    }
    if !key_provided && encrypted {
        warn!(path = %path.display(), "no key provided for an encrypted database");
        return Err(RepoError::CryptoStateMismatch(
            "missing key, db is encrypted".to_string(),
        ));
    }
    Ok(())
}
