//! Prefix namespacing.
//!
//! A [`NamespacedDatastore`] exposes the sub-tree of its child under
//! `prefix` as if it were a whole store: `/x` maps to `<prefix>/x`.

use std::sync::Arc;

use crate::datastore::query::{naive_apply, Query, QueryResults};
use crate::datastore::Datastore;
use crate::error::{RepoError, Result};
use crate::key::Key;

pub struct NamespacedDatastore {
    prefix: Key,
    child: Arc<dyn Datastore>,
}

impl std::fmt::Debug for NamespacedDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamespacedDatastore")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl NamespacedDatastore {
    pub fn new(prefix: impl Into<Key>, child: Arc<dyn Datastore>) -> Self {
        Self {
            prefix: prefix.into(),
            child,
        }
    }

    pub fn prefix(&self) -> &Key {
        &self.prefix
    }

    fn convert(&self, key: &Key) -> Key {
        self.prefix.child(key)
    }

    /// Child errors name the prefixed key; report the key the caller used.
    fn rename_not_found(key: &Key, err: RepoError) -> RepoError {
        match err {
            RepoError::NotFound(_) => RepoError::NotFound(key.to_string()),
            other => other,
        }
    }
}

impl Datastore for NamespacedDatastore {
    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.child
            .get(&self.convert(key))
            .map_err(|e| Self::rename_not_found(key, e))
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.child.has(&self.convert(key))
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.child
            .get_size(&self.convert(key))
            .map_err(|e| Self::rename_not_found(key, e))
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        self.child.put(&self.convert(key), value)
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.child.delete(&self.convert(key))
    }

    fn sync(&self, prefix: &Key) -> Result<()> {
        self.child.sync(&self.convert(prefix))
    }

    /// The child is asked for everything and the namespace is filtered here,
    /// after any decryption below has happened. Prefix, offset and limit are
    /// then applied to the stripped keys.
    ///
    /// An error item carries no key, so it cannot be attributed to a
    /// namespace: child errors (for example an undecryptable key belonging to
    /// a sibling namespace) appear in every namespaced query and count
    /// towards its offset and limit.
    fn query(&self, query: &Query) -> Result<QueryResults> {
        let child_query = Query {
            prefix: None,
            keys_only: query.keys_only,
            limit: None,
            offset: 0,
        };
        let namespace = self.prefix.clone();
        let stripped = self
            .child
            .query(&child_query)?
            .filter_map(move |item| match item {
                Ok(mut entry) => {
                    if !namespace.is_ancestor_of(&entry.key) {
                        return None;
                    }
                    let inner = entry.key.strip_prefix(&namespace)?;
                    entry.key = inner;
                    Some(Ok(entry))
                }
                Err(e) => Some(Err(e)),
            });

        Ok(QueryResults::new(query.clone(), naive_apply(query, stripped)))
    }

    /// The child is shared, so closing a namespace does not close it.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
