//! # cryptrepo Core
//!
//! Encrypted key-value repository layer for a content-addressed node.
//!
//! Every key and value the application writes is encrypted before it reaches
//! the physical store, and the physical store itself can be encrypted at rest
//! with SQLCipher.
//!
//! ## Architecture
//!
//! - **crypto**: value and key ciphers, encryption keys
//! - **datastore**: the `Datastore` trait and its SQLite, encrypted,
//!   namespaced and in-memory implementations
//! - **repo**: the repository handle and the reference-counted registry
//! - **config**: the JSON repository config and dotted selectors
//! - **keystore**: named key storage
//!
//! ## Example
//!
//! ```no_run
//! use cryptrepo_core::{EncryptionKey, Key, RepoConfig, RepoRegistry, StoreOptions};
//! use std::path::Path;
//!
//! let registry = RepoRegistry::global();
//! let key = EncryptionKey::from_bytes([7u8; 32]);
//! let path = Path::new("repo.db");
//! let opts = StoreOptions::default();
//!
//! registry.init(path, Some(&key), &opts, &RepoConfig::default())?;
//! let repo = registry.open(path, Some(&key), &opts)?;
//! repo.datastore().put(&Key::new("/hello"), b"world")?;
//! repo.close()?;
//! # Ok::<(), cryptrepo_core::RepoError>(())
//! ```

pub mod config;
pub mod crypto;
pub mod datastore;
pub mod error;
pub mod key;
pub mod keystore;
pub mod options;
pub mod repo;

pub use config::RepoConfig;
pub use crypto::{derive_key, EncryptionKey, KeyCipher, ValueCipher};
pub use datastore::{Datastore, Query, QueryEntry, QueryResults};
pub use error::{RepoError, Result};
pub use key::Key;
pub use keystore::Keystore;
pub use options::{JournalMode, KeyMode, StoreOptions};
pub use repo::{Repo, RepoRegistry};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
