use std::fs;

use cryptrepo_core::datastore::sqlite::{is_encrypted, SQLITE_MAGIC};
use cryptrepo_core::{JournalMode, Key, RepoError, RepoRegistry, StoreOptions};

use crate::helpers::{db_path, test_config, test_key, test_salt};

#[test]
fn test_fully_encrypted_file_has_no_magic() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    registry
        .init(&path, Some(&test_key()), &StoreOptions::default(), &test_config())
        .unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_ne!(&bytes[..16], SQLITE_MAGIC);
    assert!(is_encrypted(&path).unwrap());
}

#[test]
fn test_plain_file_keeps_magic_and_zero_reserved_bytes() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    registry
        .init(&path, None, &StoreOptions::default(), &test_config())
        .unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..16], SQLITE_MAGIC);
    assert!(bytes[72..92].iter().all(|b| *b == 0));
    assert!(!is_encrypted(&path).unwrap());
}

#[test]
fn test_plaintext_header_with_wal() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::new()
        .plaintext_header(test_salt())
        .journal_mode(JournalMode::Wal);

    registry
        .init(&path, Some(&test_key()), &opts, &test_config())
        .unwrap();

    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();
    repo.datastore().put(&Key::new("/block"), b"payload").unwrap();
    repo.close().unwrap();

    let bytes = fs::read(&path).unwrap();
    assert_eq!(&bytes[..16], SQLITE_MAGIC);
    assert_eq!(bytes[18], 2, "write version must mark WAL");
    assert_eq!(bytes[19], 2, "read version must mark WAL");
    assert!(is_encrypted(&path).unwrap());

    let err = registry
        .open(&path, None, &StoreOptions::default())
        .unwrap_err();
    assert!(matches!(err, RepoError::CryptoStateMismatch(_)));

    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();
    assert_eq!(repo.datastore().get(&Key::new("/block")).unwrap(), b"payload");
    repo.close().unwrap();
}

#[test]
fn test_plaintext_header_requires_valid_salt() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::new().plaintext_header(b"short".to_vec());

    let err = registry
        .init(&path, Some(&test_key()), &opts, &test_config())
        .unwrap_err();
    assert!(matches!(err, RepoError::InvalidInput(_)));
    assert!(!path.exists());

    let no_key = StoreOptions::new().plaintext_header(test_salt());
    assert!(registry.init(&path, None, &no_key, &test_config()).is_err());
}
