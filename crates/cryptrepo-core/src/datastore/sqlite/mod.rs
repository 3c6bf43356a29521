//! SQLite / SQLCipher backed datastore.
//!
//! Keys and values live in a single `(key TEXT PRIMARY KEY, data BLOB)`
//! table. When an [`EncryptionKey`] is supplied the whole file is encrypted
//! at rest by SQLCipher; without one the file is plain SQLite.

pub mod header;
mod queries;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::crypto::EncryptionKey;
use crate::datastore::query::{Query, QueryEntry, QueryResults};
use crate::datastore::Datastore;
use crate::error::{RepoError, Result};
use crate::key::Key;
use crate::options::{StoreOptions, PLAINTEXT_HEADER_SIZE};

pub use header::{check_db_crypto, is_encrypted, SQLITE_MAGIC};
use queries::Queries;

/// Single-connection SQLite datastore.
pub struct SqliteDatastore {
    path: PathBuf,
    conn: Mutex<Option<Connection>>,
    queries: Queries,
}

impl std::fmt::Debug for SqliteDatastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatastore")
            .field("path", &self.path)
            .field("table", &self.queries.table)
            .finish_non_exhaustive()
    }
}

impl SqliteDatastore {
    /// Create the database (if needed) and its table, then open it.
    pub fn create(path: &Path, key: Option<&EncryptionKey>, options: &StoreOptions) -> Result<Self> {
        options.validate(key.is_some())?;
        let queries = Queries::new(&options.table);

        let conn = Connection::open(path)?;
        configure(&conn, key, options)?;
        conn.execute_batch(&queries.create_table)?;
        debug!(path = %path.display(), encrypted = key.is_some(), "sqlite datastore created");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
            queries,
        })
    }

    /// Open an existing database.
    ///
    /// # Errors
    ///
    /// - `RepoError::DatabaseNotFound` if there is no file at `path`
    /// - `RepoError::IncorrectKey` if the key does not unlock the file
    /// - `RepoError::TableNotFound` if the key-value table is missing
    pub fn open(path: &Path, key: Option<&EncryptionKey>, options: &StoreOptions) -> Result<Self> {
        options.validate(key.is_some())?;
        if !path.is_file() {
            return Err(RepoError::DatabaseNotFound(path.to_path_buf()));
        }
        let queries = Queries::new(&options.table);

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        configure(&conn, key, options)?;
        verify_schema(&conn, &queries)?;
        debug!(path = %path.display(), encrypted = key.is_some(), "sqlite datastore opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(Some(conn)),
            queries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the database connection, failing if it was closed or poisoned.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock_conn()?;
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(RepoError::AlreadyClosed),
        }
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| RepoError::Storage("SQLite connection poisoned".to_string()))
    }
}

/// Apply the key and cipher pragmas, then prove the key unlocks the file.
fn configure(conn: &Connection, key: Option<&EncryptionKey>, options: &StoreOptions) -> Result<()> {
    if let Some(key) = key {
        let hex_key = key.to_hex();
        let pragma = Zeroizing::new(format!("PRAGMA key = \"x'{}'\";", hex_key.as_str()));
        conn.execute_batch(&pragma)?;
        conn.execute_batch(&format!("PRAGMA cipher_page_size = {};", options.page_size))?;

        if options.plaintext_header {
            conn.execute_batch(&format!(
                "PRAGMA cipher_plaintext_header_size = {};",
                PLAINTEXT_HEADER_SIZE
            ))?;
        }
        if let Some(salt) = &options.salt {
            conn.execute_batch(&format!("PRAGMA cipher_salt = \"x'{}'\";", hex::encode(salt)))?;
        }
    }

    conn.execute_batch("SELECT count(*) FROM sqlite_master;")
        .map_err(|e| match e.sqlite_error_code() {
            Some(ErrorCode::NotADatabase) => {
                warn!("database could not be unlocked with the supplied key");
                RepoError::IncorrectKey
            }
            _ => RepoError::from(e),
        })?;

    if let Some(mode) = options.journal_mode {
        conn.execute_batch(&format!("PRAGMA journal_mode = {};", mode.as_pragma()))?;
    }
    Ok(())
}

fn verify_schema(conn: &Connection, queries: &Queries) -> Result<()> {
    let exists = conn
        .query_row(&queries.table_exists, params![queries.table], |_| Ok(()))
        .optional()?
        .is_some();
    if !exists {
        return Err(RepoError::TableNotFound(queries.table.clone()));
    }

    let mut stmt = conn.prepare(&queries.table_info)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    for required in ["key", "data"] {
        if !columns.iter().any(|c| c == required) {
            return Err(RepoError::Storage(format!(
                "column {} not found in table {}",
                required, queries.table
            )));
        }
    }
    Ok(())
}

fn to_sql_count(n: Option<usize>) -> i64 {
    n.and_then(|n| i64::try_from(n).ok()).unwrap_or(-1)
}

impl Datastore for SqliteDatastore {
    fn get(&self, key: &Key) -> Result<Vec<u8>> {
        self.with_conn(|conn| {
            conn.query_row(&self.queries.get, params![key.as_str()], |row| row.get(0))
                .optional()?
                .ok_or_else(|| RepoError::NotFound(key.to_string()))
        })
    }

    fn has(&self, key: &Key) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(&self.queries.has, params![key.as_str()], |row| row.get(0))?)
        })
    }

    fn get_size(&self, key: &Key) -> Result<usize> {
        self.with_conn(|conn| {
            let size: Option<i64> = conn
                .query_row(&self.queries.get_size, params![key.as_str()], |row| row.get(0))
                .optional()?;
            let size = size.ok_or_else(|| RepoError::NotFound(key.to_string()))?;
            usize::try_from(size)
                .map_err(|_| RepoError::Storage(format!("Invalid stored size: {}", size)))
        })
    }

    fn put(&self, key: &Key, value: &[u8]) -> Result<()> {
        trace!(len = value.len(), "sqlite put");
        self.with_conn(|conn| {
            conn.execute(&self.queries.put, params![key.as_str(), value])?;
            Ok(())
        })
    }

    fn delete(&self, key: &Key) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(&self.queries.delete, params![key.as_str()])?;
            Ok(())
        })
    }

    /// Every statement is committed when it returns.
    fn sync(&self, _prefix: &Key) -> Result<()> {
        self.with_conn(|_| Ok(()))
    }

    /// Rows are read under the connection lock and handed out as a stream.
    fn query(&self, query: &Query) -> Result<QueryResults> {
        let limit = to_sql_count(query.limit);
        let offset = i64::try_from(query.offset).unwrap_or(i64::MAX);
        let prefix = query
            .prefix
            .as_ref()
            .filter(|p| !p.is_root())
            .map(|p| format!("{}/", p));

        let entries = self.with_conn(|conn| {
            let sql = self.queries.select(prefix.is_some(), query.keys_only);
            let mut stmt = conn.prepare(&sql)?;
            let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(String, Option<Vec<u8>>, i64)> {
                Ok((row.get(0)?, row.get(1)?, row.get::<_, Option<i64>>(2)?.unwrap_or(0)))
            };
            let rows = match &prefix {
                Some(p) => stmt
                    .query_map(params![p, limit, offset], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(params![limit, offset], map_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            };
            Ok(rows)
        })?;

        let entries = entries
            .into_iter()
            .map(|(key, value, size)| QueryEntry {
                key: Key::new(key),
                value,
                size: usize::try_from(size).unwrap_or(0),
            })
            .collect();
        Ok(QueryResults::from_entries(query.clone(), entries))
    }

    fn close(&self) -> Result<()> {
        let conn = self.lock_conn()?.take().ok_or(RepoError::AlreadyClosed)?;
        conn.close().map_err(|(_, e)| RepoError::from(e))?;
        debug!(path = %self.path.display(), "sqlite datastore closed");
        Ok(())
    }
}
