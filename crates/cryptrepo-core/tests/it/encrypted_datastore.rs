use std::sync::Arc;

use cryptrepo_core::datastore::{
    Datastore, EncryptedDatastore, NamespacedDatastore, Query, SqliteDatastore,
};
use cryptrepo_core::{Key, KeyMode, RepoError, RepoRegistry, StoreOptions};

use crate::helpers::{db_path, test_config, test_key};

#[test]
fn test_sqlite_backed_round_trip() {
    let (_dir, path) = db_path();
    let raw: Arc<dyn Datastore> = Arc::new(
        SqliteDatastore::create(&path, Some(&test_key()), &StoreOptions::default()).unwrap(),
    );
    let enc = EncryptedDatastore::wrap(raw.clone(), &test_key(), KeyMode::Flat);

    let key = Key::new("/blocks/CIQA4T3T");
    enc.put(&key, b"block bytes").unwrap();
    assert_eq!(enc.get(&key).unwrap(), b"block bytes");
    assert_eq!(enc.get_size(&key).unwrap(), 11);
    assert!(raw.get_size(&key).unwrap_err().is_not_found());

    let stored = raw.query(&Query::new()).unwrap().rest().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].size, 11 + 40);
    assert_ne!(stored[0].key, key);
    enc.close().unwrap();
}

#[test]
fn test_key_encryption_is_deterministic_across_handles() {
    let (_dir, path) = db_path();
    let opts = StoreOptions::default();
    {
        let raw: Arc<dyn Datastore> =
            Arc::new(SqliteDatastore::create(&path, Some(&test_key()), &opts).unwrap());
        let enc = EncryptedDatastore::wrap(raw, &test_key(), KeyMode::Flat);
        enc.put(&Key::new("/k"), b"v").unwrap();
        enc.close().unwrap();
    }
    let raw: Arc<dyn Datastore> =
        Arc::new(SqliteDatastore::open(&path, Some(&test_key()), &opts).unwrap());
    let enc = EncryptedDatastore::wrap(raw, &test_key(), KeyMode::Flat);
    assert!(enc.has(&Key::new("/k")).unwrap());
    enc.close().unwrap();
}

#[test]
fn test_prefix_queries_below_the_namespace_layer() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    repo.datastore().put(&Key::new("/a"), b"1").unwrap();
    repo.datastore().put(&Key::new("/b"), b"2").unwrap();

    let root = repo.root_datastore();
    let via_root = root.query(&Query::new().prefix("/data")).unwrap().rest().unwrap();
    assert!(via_root.is_empty(), "flat key mode cannot match plaintext prefixes");

    let everything = root.query(&Query::new().keys_only()).unwrap().rest().unwrap();
    assert!(everything.iter().any(|e| e.key.as_str() == "/config"));
    assert!(everything.iter().any(|e| e.key.as_str() == "/data/a"));

    let data = repo.datastore().query(&Query::new()).unwrap().rest().unwrap();
    let keys: Vec<_> = data.iter().map(|e| e.key.as_str().to_string()).collect();
    assert_eq!(keys.len(), 2);
    assert!(keys.contains(&"/a".to_string()) && keys.contains(&"/b".to_string()));
    repo.close().unwrap();
}

#[test]
fn test_segmented_mode_repo() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::new().key_mode(KeyMode::Segmented);
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    repo.datastore().put(&Key::new("/x/1"), b"1").unwrap();
    repo.datastore().put(&Key::new("/y/1"), b"2").unwrap();

    let under_x = repo
        .root_datastore()
        .query(&Query::new().prefix("/data/x"))
        .unwrap()
        .rest()
        .unwrap();
    assert_eq!(under_x.len(), 1);
    assert_eq!(under_x[0].key.as_str(), "/data/x/1");
    assert_eq!(under_x[0].value.as_deref(), Some(&b"1"[..]));
    repo.close().unwrap();
}

#[test]
fn test_corrupted_row_surfaces_per_entry() {
    let (_dir, path) = db_path();
    let opts = StoreOptions::default();
    let raw: Arc<dyn Datastore> =
        Arc::new(SqliteDatastore::create(&path, Some(&test_key()), &opts).unwrap());
    let enc = EncryptedDatastore::wrap(raw.clone(), &test_key(), KeyMode::Flat);

    enc.put(&Key::new("/good"), b"fine").unwrap();
    enc.put(&Key::new("/bad"), b"will be damaged").unwrap();

    let target = raw
        .query(&Query::new())
        .unwrap()
        .rest()
        .unwrap()
        .into_iter()
        .find(|entry| entry.size == 15 + 40)
        .unwrap();
    let mut blob = target.value.unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0x80;
    raw.put(&target.key, &blob).unwrap();

    let results: Vec<_> = enc.query(&Query::new()).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(RepoError::CorruptValue { key, .. }) if key == "/bad")));
    assert!(matches!(
        enc.get(&Key::new("/bad")),
        Err(RepoError::CorruptValue { .. })
    ));
    enc.close().unwrap();
}

fn count(store: &dyn Datastore, prefix: &str) -> usize {
    store.query(&Query::new().prefix(prefix)).unwrap().rest().unwrap().len()
}

#[test]
fn test_prefix_matching_is_case_sensitive() {
    let (_dir, path) = db_path();
    let opts = StoreOptions::default();
    let raw: Arc<dyn Datastore> =
        Arc::new(SqliteDatastore::create(&path, Some(&test_key()), &opts).unwrap());
    let enc: Arc<dyn Datastore> = Arc::new(EncryptedDatastore::wrap(
        raw,
        &test_key(),
        KeyMode::Segmented,
    ));

    enc.put(&Key::new("/A/B"), b"v").unwrap();
    assert_eq!(count(enc.as_ref(), "/a"), 0);
    assert_eq!(count(enc.as_ref(), "/A"), 1);

    let ns = NamespacedDatastore::new("/data", enc.clone());
    ns.put(&Key::new("/A/B"), b"v").unwrap();
    assert_eq!(count(&ns, "/a"), 0);
    assert_eq!(count(&ns, "/A"), 1);
    let found = ns.query(&Query::new().prefix("/A")).unwrap().rest().unwrap();
    assert_eq!(found[0].key.as_str(), "/A/B");
    enc.close().unwrap();
}

#[test]
fn test_namespaced_prefix_is_case_sensitive_in_flat_mode() {
    let (_dir, path) = db_path();
    let registry = RepoRegistry::new();
    let opts = StoreOptions::default();
    registry.init(&path, Some(&test_key()), &opts, &test_config()).unwrap();
    let repo = registry.open(&path, Some(&test_key()), &opts).unwrap();

    repo.datastore().put(&Key::new("/A/B"), b"v").unwrap();
    let data = repo.datastore();
    assert_eq!(count(data.as_ref(), "/a"), 0);
    assert_eq!(count(data.as_ref(), "/A"), 1);
    repo.close().unwrap();
}
