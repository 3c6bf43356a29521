use std::path::PathBuf;

use cryptrepo_core::{EncryptionKey, RepoConfig};
use tempfile::TempDir;

pub fn test_key() -> EncryptionKey {
    EncryptionKey::from_bytes(*b"0123456789abcdef0123456789abcdef")
}

pub fn other_key() -> EncryptionKey {
    EncryptionKey::from_bytes([0x42; 32])
}

pub fn test_salt() -> Vec<u8> {
    b"salt-of-16-bytes".to_vec()
}

/// A fresh directory and the database path inside it.
pub fn db_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.sqlite");
    (dir, path)
}

pub fn test_config() -> RepoConfig {
    RepoConfig::with_identity("QmTestPeer", Some("CAESQ-test-private-key".to_string()))
}
