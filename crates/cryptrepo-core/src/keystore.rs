//! Named private-key storage on top of a datastore.
//!
//! Each key is stored under `/<name>` of the backing store, which in a
//! repository is the `/keys` namespace of the encrypted root.

use std::sync::Arc;

use tracing::debug;

use crate::datastore::{Datastore, Query};
use crate::error::{RepoError, Result};
use crate::key::Key;

pub struct Keystore {
    ds: Arc<dyn Datastore>,
}

impl std::fmt::Debug for Keystore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keystore").finish_non_exhaustive()
    }
}

/// Key names are single path segments that do not start with a dot.
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RepoError::InvalidInput("key name cannot be empty".to_string()));
    }
    if name.contains('/') {
        return Err(RepoError::InvalidInput(format!(
            "key name may not contain '/': {:?}",
            name
        )));
    }
    if name.starts_with('.') {
        return Err(RepoError::InvalidInput(format!(
            "key name may not begin with '.': {:?}",
            name
        )));
    }
    Ok(())
}

impl Keystore {
    pub fn new(ds: Arc<dyn Datastore>) -> Self {
        Self { ds }
    }

    fn key_for(name: &str) -> Result<Key> {
        validate_name(name)?;
        Ok(Key::root().child_str(name))
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        self.ds.has(&Self::key_for(name)?)
    }

    /// Store a key.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::KeyExists` if a key with this name is already stored.
    pub fn put(&self, name: &str, key_bytes: &[u8]) -> Result<()> {
        let key = Self::key_for(name)?;
        if self.ds.has(&key)? {
            return Err(RepoError::KeyExists(name.to_string()));
        }
        self.ds.put(&key, key_bytes)?;
        debug!(name, "keystore entry added");
        Ok(())
    }

    /// Fetch a key, failing with `RepoError::NoSuchKey` if absent.
    pub fn get(&self, name: &str) -> Result<Vec<u8>> {
        match self.ds.get(&Self::key_for(name)?) {
            Ok(bytes) => Ok(bytes),
            Err(RepoError::NotFound(_)) => Err(RepoError::NoSuchKey(name.to_string())),
            Err(e) => Err(e),
        }
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        self.ds.delete(&Self::key_for(name)?)
    }

    /// Names of every stored key, in store order.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = self.ds.query(&Query::new().keys_only())?.rest()?;
        Ok(entries
            .into_iter()
            .map(|entry| entry.key.as_str().trim_start_matches('/').to_string())
            .collect())
    }
}
