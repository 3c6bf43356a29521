//! Transparent encryption over any datastore.
//!
//! Keys go through [`KeyCipher`] and values through [`ValueCipher`] on the way
//! down; on the way up query results are decrypted lazily as they are
//! consumed.
//!
//! In flat key mode a query's prefix is handed to the child unmodified. The
//! child only holds encrypted atoms, so a plaintext prefix matches nothing.
//! Callers that need prefix scans filter after decryption (see
//! [`NamespacedDatastore`](crate::datastore::NamespacedDatastore)) or use
//! segmented key mode.

use std::sync::Arc;

use tracing::trace;

use crate::crypto::{EncryptionKey, KeyCipher, ValueCipher};
use crate::datastore::query::{Query, QueryResults};
use crate::datastore::Datastore;
use crate::error::{RepoError, Result};
use crate::key::Key;
use crate::options::KeyMode;

pub struct EncryptedDatastore {
    child: Arc<dyn Datastore>,
    keys: KeyCipher,
    values: ValueCipher,
}

impl std::fmt::Debug for EncryptedDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedDatastore")
            .field("key_mode", &self.keys.mode())
            .finish_non_exhaustive()
    }
}

impl EncryptedDatastore {
    /// Wrap `child` so everything it stores is encrypted under `key`.
    pub fn wrap(child: Arc<dyn Datastore>, key: &EncryptionKey, mode: KeyMode) -> Self {
        Self {
            child,
            keys: KeyCipher::new(key, mode),
            values: ValueCipher::new(key),
        }
    }

    pub fn key_mode(&self) -> KeyMode {
        self.keys.mode()
    }

    fn open_value(&self, key: &Key, sealed: &[u8]) -> Result<Vec<u8>> {
        self.values
            .open(sealed)
            .map_err(|e| RepoError::CorruptValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    fn child_query(&self, query: &Query) -> Result<Query> {
        let mut child = query.clone();
        if self.keys.mode() == KeyMode::Segmented {
            child.prefix = match &query.prefix {
                Some(prefix) => Some(self.keys.encrypt(prefix)?),
                None => None,
            };
        }
        Ok(child)
    }
}

impl Datastore for EncryptedDatastore {
    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        trace!("encrypted get");
        let sealed = self
            .child
            .get(&self.keys.encrypt(key)?)
            .map_err(|e| match e {
                RepoError::NotFound(_) => RepoError::NotFound(key.to_string()),
                other => other,
            })?;
        self.open_value(key, &sealed)
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.child.has(&self.keys.encrypt(key)?)
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        let stored = self
            .child
            .get_size(&self.keys.encrypt(key)?)
            .map_err(|e| match e {
                RepoError::NotFound(_) => RepoError::NotFound(key.to_string()),
                other => other,
            })?;
        Ok(ValueCipher::plaintext_size(stored))
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        trace!(len = value.len(), "encrypted put");
        let sealed = self.values.seal(value)?;
        self.child.put(&self.keys.encrypt(key)?, &sealed)
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.child.delete(&self.keys.encrypt(key)?)
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.child.sync(&self.keys.encrypt(prefix)?)
    }

    fn query(&self, query: &Query) -> Result<QueryResults> {
        let results = self.child.query(&self.child_query(query)?)?;
        let keys = self.keys.clone();
        let values = self.values.clone();
        let keys_only = query.keys_only;

        let decrypted = results.map(move |item| {
            let mut entry = item?;
            entry.key = keys.decrypt(&entry.key)?;
            entry.size = ValueCipher::plaintext_size(entry.size);
            if keys_only {
                entry.value = None;
            } else if let Some(sealed) = entry.value.take() {
                let plain = values.open(&sealed).map_err(|e| RepoError::CorruptValue {
                    key: entry.key.to_string(),
                    reason: e.to_string(),
                })?;
                entry.value = Some(plain);
            }
            Ok(entry)
        });
        Ok(QueryResults::new(query.clone(), decrypted))
    }

    fn close(&self) -> Result<()> {
        self.child.close()
    }
}
