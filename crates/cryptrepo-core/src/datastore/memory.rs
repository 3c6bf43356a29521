//! In-memory datastore.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::datastore::query::{naive_apply, Query, QueryEntry, QueryResults};
use crate::datastore::Datastore;
use crate::error::{RepoError, Result};
use crate::key::Key;

/// Ordered in-memory map behind a read/write lock.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    entries: RwLock<BTreeMap<Key, Vec<u8>>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.entries
            .read()
            .map_err(|_| RepoError::Storage("Memory datastore lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<Key, Vec<u8>>>> {
        self.entries
            .write()
            .map_err(|_| RepoError::Storage("Memory datastore lock poisoned".to_string()))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Raw snapshot of every stored key, for inspection in tests and tools.
    pub fn keys(&self) -> Result<Vec<Key>> {
        Ok(self.read()?.keys().cloned().collect())
    }
}

impl Datastore for MemoryDatastore {
    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.read()?
            .get(key)
            .cloned()
            .ok_or_else(|| RepoError::NotFound(key.to_string()))
    }

    fn has(&self, key: &Key) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.read()?
            .get(key)
            .map(Vec::len)
            .ok_or_else(|| RepoError::NotFound(key.to_string()))
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        self.write()?.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.write()?.remove(key);
        Ok(())
    }

    fn sync(&self, _prefix: &Key) -> Result<()> {
        Ok(())
    }

    fn query(&self, query: &Query) -> Result<QueryResults> {
        let snapshot: Vec<Result<QueryEntry>> = self
            .read()?
            .iter()
            .map(|(key, value)| {
                Ok(QueryEntry {
                    key: key.clone(),
                    value: Some(value.clone()),
                    size: value.len(),
                })
            })
            .collect();
        Ok(QueryResults::new(
            query.clone(),
            naive_apply(query, snapshot.into_iter()),
        ))
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
