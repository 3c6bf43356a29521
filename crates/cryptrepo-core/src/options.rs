//! Options controlling how the backing SQLite/SQLCipher store is created and
//! opened.

use std::fmt;

use crate::error::{RepoError, Result};

/// Required salt length in bytes.
pub const SALT_LENGTH: usize = 16;

/// Size of the unencrypted header kept in plaintext-header mode.
pub const PLAINTEXT_HEADER_SIZE: u32 = 32;

/// Default SQLCipher page size.
pub const DEFAULT_PAGE_SIZE: u32 = 4096;

/// Default name of the key-value table.
pub const DEFAULT_TABLE: &str = "blocks";

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Memory,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_pragma(self) -> &'static str {
        match self {
            JournalMode::Delete => "DELETE",
            JournalMode::Truncate => "TRUNCATE",
            JournalMode::Persist => "PERSIST",
            JournalMode::Memory => "MEMORY",
            JournalMode::Wal => "WAL",
            JournalMode::Off => "OFF",
        }
    }
}

impl std::str::FromStr for JournalMode {
    type Err = RepoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DELETE" => Ok(JournalMode::Delete),
            "TRUNCATE" => Ok(JournalMode::Truncate),
            "PERSIST" => Ok(JournalMode::Persist),
            "MEMORY" => Ok(JournalMode::Memory),
            "WAL" => Ok(JournalMode::Wal),
            "OFF" => Ok(JournalMode::Off),
            other => Err(RepoError::InvalidInput(format!(
                "Unknown journal mode: {}",
                other
            ))),
        }
    }
}

/// How structured keys are encrypted.
///
/// `Flat` turns the whole path into a single opaque atom, so prefix queries
/// over the encrypted keyspace match nothing. `Segmented` encrypts each path
/// segment on its own: hierarchy survives and segment-level prefix queries
/// work, at the cost of leaking which segments are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Flat,
    Segmented,
}

/// Backing store options.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Keep the SQLite header readable so tooling can recognise the file.
    pub plaintext_header: bool,
    /// Caller-chosen salt (exactly [`SALT_LENGTH`] bytes).
    pub salt: Option<Vec<u8>>,
    pub journal_mode: Option<JournalMode>,
    pub key_mode: KeyMode,
    pub table: String,
    pub page_size: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            plaintext_header: false,
            salt: None,
            journal_mode: None,
            key_mode: KeyMode::Flat,
            table: DEFAULT_TABLE.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl fmt::Debug for StoreOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreOptions")
            .field("plaintext_header", &self.plaintext_header)
            .field("salt", &self.salt.as_ref().map(|_| "[SET]"))
            .field("journal_mode", &self.journal_mode)
            .field("key_mode", &self.key_mode)
            .field("table", &self.table)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plaintext_header(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.plaintext_header = true;
        self.salt = Some(salt.into());
        self
    }

    pub fn salt(mut self, salt: impl Into<Vec<u8>>) -> Self {
        self.salt = Some(salt.into());
        self
    }

    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = Some(mode);
        self
    }

    pub fn key_mode(mut self, mode: KeyMode) -> Self {
        self.key_mode = mode;
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Validate the options against the presence of an encryption key.
    pub fn validate(&self, key_provided: bool) -> Result<()> {
        if let Some(salt) = &self.salt {
            if salt.len() != SALT_LENGTH {
                return Err(RepoError::InvalidInput(format!(
                    "Invalid salt length, expected {} bytes, got {}",
                    SALT_LENGTH,
                    salt.len()
                )));
            }
        }
        if self.plaintext_header {
            if self.salt.is_none() {
                return Err(RepoError::InvalidInput(
                    "Plaintext header mode requires a salt".to_string(),
                ));
            }
            if !key_provided {
                return Err(RepoError::InvalidInput(
                    "Plaintext header mode requires an encryption key".to_string(),
                ));
            }
        }
        if self.salt.is_some() && !key_provided {
            return Err(RepoError::InvalidInput(
                "A salt was provided without an encryption key".to_string(),
            ));
        }
        if self.table.is_empty()
            || !self
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(RepoError::InvalidInput(format!(
                "Invalid table name: {:?}",
                self.table
            )));
        }
        if !self.page_size.is_power_of_two() || !(512..=65536).contains(&self.page_size) {
            return Err(RepoError::InvalidInput(format!(
                "Invalid page size: {}",
                self.page_size
            )));
        }
        Ok(())
    }

    /// Whether a store opened with `other` reads the same keyspace as one
    /// opened with `self`. Journal mode, salt and page size only matter when
    /// the file is first opened.
    pub fn same_view(&self, other: &StoreOptions) -> bool {
        self.key_mode == other.key_mode
            && self.plaintext_header == other.plaintext_header
            && self.table == other.table
    }
}
