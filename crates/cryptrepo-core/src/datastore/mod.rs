//! Key-value datastore abstraction.
//!
//! The `Datastore` trait is the single seam between the repository and its
//! storage. Implementations stack:
//!
//! - [`SqliteDatastore`]: the physical store, optionally SQLCipher-encrypted
//! - [`EncryptedDatastore`]: encrypts every key and value of a child store
//! - [`NamespacedDatastore`]: maps a sub-tree of a child store to its root
//! - [`MemoryDatastore`]: an in-process store for tests and tooling

pub mod encrypted;
pub mod memory;
pub mod namespace;
pub mod query;
pub mod sqlite;

use crate::error::Result;
use crate::key::Key;

pub use encrypted::EncryptedDatastore;
pub use memory::MemoryDatastore;
pub use namespace::NamespacedDatastore;
pub use query::{Query, QueryEntry, QueryResults};
pub use sqlite::SqliteDatastore;

/// Ordered key-value store interface.
///
/// Implementations must be safe to share between threads. Missing keys are
/// reported as `RepoError::NotFound`; deleting a missing key is not an error.
pub trait Datastore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &Key) -> Result<Vec<u8>>;

    /// Whether `key` is mapped to a value.
    fn has(&self, key: &Key) -> Result<bool>;

    /// Size in bytes of the value stored under `key`.
    fn get_size(&self, key: &Key) -> Result<usize>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &Key, value: &[u8]) -> Result<()>;

    fn delete(&self, key: &Key) -> Result<()>;

    /// Flush writes under `prefix` to durable storage.
    fn sync(&self, prefix: &Key) -> Result<()>;

    /// Run a query. Results may be produced lazily.
    fn query(&self, query: &Query) -> Result<QueryResults>;

    /// Release the store. Further calls fail with `RepoError::AlreadyClosed`
    /// where the implementation tracks it.
    fn close(&self) -> Result<()>;
}
