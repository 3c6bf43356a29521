//! SQL statements for the key-value table.
//!
//! The table name is validated by [`StoreOptions::validate`] before any
//! statement is built, so it is safe to interpolate.
//!
//! [`StoreOptions::validate`]: crate::options::StoreOptions::validate

#[derive(Debug, Clone)]
pub(crate) struct Queries {
    pub table: String,
    pub create_table: String,
    pub table_exists: String,
    pub table_info: String,
    pub get: String,
    pub has: String,
    pub get_size: String,
    pub put: String,
    pub delete: String,
}

impl Queries {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            create_table: format!(
                "CREATE TABLE IF NOT EXISTS {table} (key TEXT PRIMARY KEY, data BLOB) WITHOUT ROWID;"
            ),
            table_exists: "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1"
                .to_string(),
            table_info: format!("PRAGMA table_info({table})"),
            get: format!("SELECT data FROM {table} WHERE key = ?1"),
            has: format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE key = ?1)"),
            get_size: format!("SELECT length(data) FROM {table} WHERE key = ?1"),
            put: format!(
                "INSERT INTO {table} (key, data) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET data = excluded.data"
            ),
            delete: format!("DELETE FROM {table} WHERE key = ?1"),
        }
    }

    /// Build a listing statement.
    ///
    /// Parameters: `?1` the prefix followed by `/` (only when `with_prefix`),
    /// then `LIMIT` and `OFFSET`.
    pub fn select(&self, with_prefix: bool, keys_only: bool) -> String {
        let columns = if keys_only {
            "key, NULL, length(data)"
        } else {
            "key, data, length(data)"
        };
        let mut sql = format!("SELECT {columns} FROM {}", self.table);
        if with_prefix {
            sql.push_str(" WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key LIMIT ?2 OFFSET ?3");
        } else {
            sql.push_str(" ORDER BY key LIMIT ?1 OFFSET ?2");
        }
        sql
    }
}
