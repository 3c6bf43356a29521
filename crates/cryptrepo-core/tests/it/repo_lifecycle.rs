use std::sync::Arc;
use std::thread;

use cryptrepo_core::config::RepoConfig;
use cryptrepo_core::datastore::Query;
use cryptrepo_core::{JournalMode, Key, RepoError, RepoRegistry, StoreOptions};
use serde_json::{json, Map};

use crate::helpers::{db_path, other_key, test_config, test_key, test_salt};

#[test]
fn test_init_is_idempotent() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    let key = test_key();

    assert!(!registry.is_initialized(&path, Some(&key), &opts).unwrap());
    registry.init(&path, Some(&key), &opts, &test_config()).unwrap();
    assert!(registry.is_initialized(&path, Some(&key), &opts).unwrap());

    let other = RepoConfig::with_identity("SomeoneElse", None);
    registry.init(&path, Some(&key), &opts, &other).unwrap();

    let repo = registry.open(&path, Some(&key), &opts).unwrap();
    let conf = repo.config().unwrap().unwrap();
    assert_eq!(conf.identity.peer_id, "QmTestPeer");
    repo.close().unwrap();
}

#[test]
fn test_init_rejects_datastore_spec_before_touching_disk() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    let key = test_key();

    let mut conf = test_config();
    let mut spec = Map::new();
    spec.insert("type".to_string(), json!("mount"));
    conf.datastore.spec = Some(spec);

    let err = registry.init(&path, Some(&key), &opts, &conf).unwrap_err();
    assert!(matches!(err, RepoError::ConfigSpecUnsupported(_)));
    assert!(!path.exists());

    registry.init(&path, Some(&key), &opts, &test_config()).unwrap();
    assert!(registry.is_initialized(&path, Some(&key), &opts).unwrap());
}

#[test]
fn test_open_uninitialized_database_has_no_config() {
    let (_dir, path) = db_path();
    let key = test_key();
    let opts = StoreOptions::default();
    cryptrepo_core::datastore::SqliteDatastore::create(&path, Some(&key), &opts)
        .unwrap();

    let registry = RepoRegistry::new();
    let repo = registry.open(&path, Some(&key), &opts).unwrap();
    assert!(repo.config().unwrap().is_none());
    assert!(repo.get_config_key("Identity.PeerID").unwrap_err().is_not_found());
    repo.close().unwrap();
}

#[test]
fn test_open_returns_singleton_until_fully_closed() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    let key = test_key();
    registry.init(&path, Some(&key), &opts, &test_config()).unwrap();

    let first = registry.open(&path, Some(&key), &opts).unwrap();
    let second = registry.open(&path, Some(&key), &opts).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    first.close().unwrap();
    second
        .datastore()
        .put(&Key::new("/still"), b"usable")
        .unwrap();
    assert_eq!(second.datastore().get(&Key::new("/still")).unwrap(), b"usable");

    second.close().unwrap();
    assert!(second.is_closed());
    assert!(matches!(second.close(), Err(RepoError::AlreadyClosed)));

    let third = registry.open(&path, Some(&key), &opts).unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third.datastore().get(&Key::new("/still")).unwrap(), b"usable");
    third.close().unwrap();
}

#[test]
fn test_concurrent_opens_share_one_handle() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let path = path.clone();
            let opts = opts.clone();
            thread::spawn(move || registry.open(&path, Some(&test_key()), &opts).unwrap())
        })
        .collect();
    let repos: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert!(repos.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(registry.open_count().unwrap(), 1);
    for repo in &repos {
        repo.close().unwrap();
    }
    assert_eq!(registry.open_count().unwrap(), 0);
}

#[test]
fn test_crypto_state_mismatch_both_ways() {
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();

    let (_plain_dir, plain) = db_path();
    registry.init(&plain, None, &opts, &test_config()).unwrap();
    let err = registry.open(&plain, Some(&test_key()), &opts).unwrap_err();
    assert!(matches!(err, RepoError::CryptoStateMismatch(m) if m.contains("NOT encrypted")));

    let (_enc_dir, encrypted) = db_path();
    registry
        .init(&encrypted, Some(&test_key()), &opts, &test_config())
        .unwrap();
    let err = registry.open(&encrypted, None, &opts).unwrap_err();
    assert!(matches!(err, RepoError::CryptoStateMismatch(m) if m.contains("missing key")));

    let err = registry.open(&encrypted, Some(&other_key()), &opts).unwrap_err();
    assert!(matches!(err, RepoError::IncorrectKey));
    assert_eq!(registry.open_count().unwrap(), 0);
}

#[test]
fn test_independent_repositories() {
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    let key = test_key();
    let (_a_dir, a_path) = db_path();
    let (_b_dir, b_path) = db_path();

    registry.init(&a_path, Some(&key), &opts, &test_config()).unwrap();
    registry.init(&b_path, Some(&key), &opts, &test_config()).unwrap();

    let a = registry.open(&a_path, Some(&key), &opts).unwrap();
    let b = registry.open(&b_path, Some(&key), &opts).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(registry.open_count().unwrap(), 2);

    let x = Key::new("/x");
    a.datastore().put(&x, b"1").unwrap();
    b.datastore().put(&x, b"2").unwrap();
    assert_eq!(a.datastore().get(&x).unwrap(), b"1");
    assert_eq!(b.datastore().get(&x).unwrap(), b"2");

    b.close().unwrap();
    registry.remove(&b_path).unwrap();
    assert!(!b_path.exists());

    assert_eq!(registry.open_count().unwrap(), 1);
    assert_eq!(a.datastore().get(&x).unwrap(), b"1");
    a.close().unwrap();
}

#[test]
fn test_reinit_with_plaintext_header_and_wal() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::new()
        .plaintext_header(test_salt())
        .journal_mode(JournalMode::Wal);
    let key = test_key();
    let stable = Key::new("/stable");

    for round in 0..10 {
        registry.init(&path, Some(&key), &opts, &test_config()).unwrap();
        assert!(registry.is_initialized(&path, Some(&key), &opts).unwrap());

        let repo = registry.open(&path, Some(&key), &opts).unwrap();
        if round == 0 {
            repo.datastore().put(&stable, b"kept").unwrap();
        }
        repo.datastore()
            .put(&Key::new(format!("/round/{}", round)), b"r")
            .unwrap();
        assert_eq!(repo.datastore().get(&stable).unwrap(), b"kept");
        for earlier in 0..=round {
            assert!(repo
                .datastore()
                .has(&Key::new(format!("/round/{}", earlier)))
                .unwrap());
        }
        repo.close().unwrap();

        let header = std::fs::read(&path).unwrap();
        assert_eq!(&header[..16], b"SQLite format 3\0");
        assert_eq!(header[18], 2);
        assert_eq!(header[19], 2);
    }
    assert!(registry.is_initialized(&path, Some(&key), &opts).unwrap());
    assert_eq!(registry.open_count().unwrap(), 0);
}

#[test]
fn test_separate_registries_do_not_share_handles() {
    let (_dir, path) = db_path();
    let opts = StoreOptions::default();
    let first = RepoRegistry::new();
    let second = RepoRegistry::new();
    first.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();

    let a = first.open(&path, Some(&test_key()), &opts).unwrap();
    let b = second.open(&path, Some(&test_key()), &opts).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    a.close().unwrap();
    b.close().unwrap();
}

#[test]
fn test_unknown_config_fields_are_preserved() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    repo.set_config_key("Experimental.FilestoreEnabled", json!(true)).unwrap();
    repo.set_config_key("Datastore.BloomFilterSize", json!(0)).unwrap();

    let mut updated = (*repo.config().unwrap().unwrap()).clone();
    updated.datastore.storage_max = "1GB".to_string();
    repo.set_config(&updated).unwrap();
    repo.set_config(&RepoConfig::with_identity("QmTestPeer", Some("CAESQ-test-private-key".into())))
        .unwrap();

    assert_eq!(
        repo.get_config_key("Experimental.FilestoreEnabled").unwrap(),
        json!(true)
    );
    assert_eq!(repo.get_config_key("datastore.storagemax").unwrap(), json!("10GB"));
    repo.close().unwrap();

    let reopened = registry.open(&path, Some(&test_key()), &opts).unwrap();
    let conf = reopened.config().unwrap().unwrap();
    assert_eq!(conf.extra["Experimental"], json!({"FilestoreEnabled": true}));
    reopened.close().unwrap();
}

#[test]
fn test_set_config_key_rejects_invalid_shape() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    let err = repo
        .set_config_key("Datastore.StorageGCWatermark", json!("lots"))
        .unwrap_err();
    assert!(matches!(err, RepoError::Config(_)));
    assert_eq!(
        repo.get_config_key("Datastore.StorageGCWatermark").unwrap(),
        json!(90)
    );
    repo.close().unwrap();
}

#[test]
fn test_keystore_and_data_namespaces_are_separate() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    repo.keystore().put("self", b"private-key-bytes").unwrap();
    repo.datastore().put(&Key::new("/self"), b"data").unwrap();

    assert_eq!(repo.keystore().list().unwrap(), vec!["self"]);
    let data = repo.datastore().query(&Query::new()).unwrap().rest().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].value.as_deref(), Some(&b"data"[..]));
    repo.close().unwrap();
}

#[test]
fn test_remove_deletes_files() {
    let (dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();

    registry.remove(&path).unwrap();
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(matches!(
        registry.remove(&path),
        Err(RepoError::DatabaseNotFound(_))
    ));
}
