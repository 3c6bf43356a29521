//! Process-wide registry of open repositories.
//!
//! At most one [`Repo`] is live per database path. Opening a path that is
//! already open hands back the same `Arc<Repo>` and bumps its reference
//! count; the backing store is closed when the last holder closes.
//!
//! Two locks are involved. The map of open repositories is always taken
//! first; the lifecycle lock, which serializes init/open/remove and config
//! writes, second.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::config::{RepoConfig, DATASTORE_SPEC_SELECTOR};
use crate::crypto::EncryptionKey;
use crate::datastore::sqlite::check_db_crypto;
use crate::datastore::{Datastore, SqliteDatastore};
use crate::error::{RepoError, Result};
use crate::key::Key;
use crate::options::StoreOptions;
use crate::repo::{wrap_root, Repo, CONFIG_KEY};

static GLOBAL: Lazy<RepoRegistry> = Lazy::new(RepoRegistry::new);

pub(crate) struct Entry {
    repo: Arc<Repo>,
    refcount: usize,
    /// BLAKE3 digest of the key the repo was opened with.
    key_id: Option<[u8; 32]>,
    options: StoreOptions,
}

pub(crate) type OpenMap = Mutex<HashMap<PathBuf, Entry>>;

/// Reference-counted table of open repositories.
///
/// Cloning is cheap and clones share state. Independent registries do not
/// see each other's repositories; [`RepoRegistry::global`] is the shared
/// process-wide instance.
#[derive(Clone)]
pub struct RepoRegistry {
    open: Arc<OpenMap>,
    lifecycle: Arc<Mutex<()>>,
}

impl Default for RepoRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RepoRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let open = self.open.lock().map(|m| m.len()).unwrap_or_default();
        f.debug_struct("RepoRegistry").field("open", &open).finish()
    }
}

fn key_id(key: Option<&EncryptionKey>) -> Option<[u8; 32]> {
    key.map(|k| *blake3::hash(k.as_bytes()).as_bytes())
}

/// Canonical path used as the registry key.
fn registry_path(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RepoError::DatabaseNotFound(path.to_path_buf()),
        _ => RepoError::from(e),
    })
}

pub(crate) fn lock_lifecycle(lifecycle: &Mutex<()>) -> Result<MutexGuard<'_, ()>> {
    lifecycle
        .lock()
        .map_err(|_| RepoError::Storage("Repository lifecycle lock poisoned".to_string()))
}

fn lock_open(open: &OpenMap) -> Result<MutexGuard<'_, HashMap<PathBuf, Entry>>> {
    open.lock()
        .map_err(|_| RepoError::Storage("Repository registry poisoned".to_string()))
}

impl RepoRegistry {
    pub fn new() -> Self {
        Self {
            open: Arc::new(Mutex::new(HashMap::new())),
            lifecycle: Arc::new(Mutex::new(())),
        }
    }

    /// The process-wide registry.
    pub fn global() -> RepoRegistry {
        GLOBAL.clone()
    }

    /// Number of distinct repositories currently open.
    pub fn open_count(&self) -> Result<usize> {
        Ok(lock_open(&self.open)?.len())
    }

    /// Initialize a repository at `path`, writing `config` exactly once.
    ///
    /// Initializing an already initialized repository succeeds without
    /// touching it.
    ///
    /// # Errors
    ///
    /// - `RepoError::ConfigSpecUnsupported` if `config` carries a datastore spec
    /// - `RepoError::CryptoStateMismatch` if key presence disagrees with the file
    pub fn init(
        &self,
        path: &Path,
        key: Option<&EncryptionKey>,
        options: &StoreOptions,
        config: &RepoConfig,
    ) -> Result<()> {
        options.validate(key.is_some())?;
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;

        if is_initialized_locked(path, key, options)? {
            debug!(path = %path.display(), "repo already initialized");
            return Ok(());
        }
        if config.has_datastore_spec() {
            return Err(RepoError::ConfigSpecUnsupported(
                DATASTORE_SPEC_SELECTOR.to_string(),
            ));
        }

        check_db_crypto(path, key.is_some())?;
        let store: Arc<dyn Datastore> = Arc::new(SqliteDatastore::create(path, key, options)?);
        let root = wrap_root(store, key, options);

        let written = write_initial_config(root.as_ref(), config);
        let closed = root.close();
        written?;
        closed?;

        debug!(path = %path.display(), "repo initialized");
        Ok(())
    }

    /// Whether a repository at `path` holds a config.
    pub fn is_initialized(
        &self,
        path: &Path,
        key: Option<&EncryptionKey>,
        options: &StoreOptions,
    ) -> Result<bool> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        is_initialized_locked(path, key, options)
    }

    /// Open the repository at `path`, or share the already open handle.
    ///
    /// # Errors
    ///
    /// - `RepoError::IncorrectKey` when the repository is already open under
    ///   a different key
    /// - `RepoError::InvalidInput` when it is already open with options that
    ///   read a different keyspace (see [`StoreOptions::same_view`])
    pub fn open(
        &self,
        path: &Path,
        key: Option<&EncryptionKey>,
        options: &StoreOptions,
    ) -> Result<Arc<Repo>> {
        let id = registry_path(path)?;
        let mut open = lock_open(&self.open)?;

        if let Some(entry) = open.get_mut(&id) {
            if entry.key_id != key_id(key) {
                warn!(path = %id.display(), "repo already open under a different key");
                return Err(RepoError::IncorrectKey);
            }
            if !entry.options.same_view(options) {
                warn!(path = %id.display(), "repo already open with different options");
                return Err(RepoError::InvalidInput(format!(
                    "Repository already open with different options: {}",
                    id.display()
                )));
            }
            entry.refcount += 1;
            debug!(path = %id.display(), refcount = entry.refcount, "repo shared");
            return Ok(entry.repo.clone());
        }

        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        let repo = Arc::new(Repo::load(
            id.clone(),
            key,
            options,
            Arc::downgrade(&self.open),
            self.lifecycle.clone(),
        )?);
        open.insert(
            id.clone(),
            Entry {
                repo: repo.clone(),
                refcount: 1,
                key_id: key_id(key),
                options: options.clone(),
            },
        );
        debug!(path = %id.display(), "repo opened");
        Ok(repo)
    }

    /// Delete the repository files at `path`.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::RepoInUse` while any handle to it is open.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let id = registry_path(path)?;
        let open = lock_open(&self.open)?;
        if open.contains_key(&id) {
            return Err(RepoError::RepoInUse(id));
        }
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;

        fs::remove_file(&id)?;
        for suffix in ["-wal", "-shm"] {
            let mut companion = id.clone().into_os_string();
            companion.push(suffix);
            match fs::remove_file(PathBuf::from(companion)) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        debug!(path = %id.display(), "repo removed");
        Ok(())
    }
}

fn is_initialized_locked(
    path: &Path,
    key: Option<&EncryptionKey>,
    options: &StoreOptions,
) -> Result<bool> {
    check_db_crypto(path, key.is_some())?;
    let store: Arc<dyn Datastore> = match SqliteDatastore::open(path, key, options) {
        Ok(store) => Arc::new(store),
        Err(RepoError::DatabaseNotFound(_)) => return Ok(false),
        Err(e) => return Err(e),
    };
    let root = wrap_root(store, key, options);
    let initialized = root.has(&Key::new(CONFIG_KEY));
    root.close()?;
    initialized
}

fn write_initial_config(root: &dyn Datastore, config: &RepoConfig) -> Result<()> {
    let key = Key::new(CONFIG_KEY);
    if root.has(&key)? {
        return Ok(());
    }
    root.put(&key, &config.to_bytes()?)
}

/// Drop one reference to `repo`, closing it when none remain.
pub(crate) fn release(open: &Weak<OpenMap>, lifecycle: &Mutex<()>, repo: &Repo) -> Result<()> {
    let Some(open) = open.upgrade() else {
        let _lifecycle = lock_lifecycle(lifecycle)?;
        return repo.shutdown();
    };
    let mut map = lock_open(&open)?;

    let entry = match map.get_mut(repo.path()) {
        Some(entry) if std::ptr::eq(Arc::as_ptr(&entry.repo), repo) => entry,
        _ => return Err(RepoError::AlreadyClosed),
    };
    entry.refcount -= 1;
    if entry.refcount > 0 {
        debug!(path = %repo.path().display(), refcount = entry.refcount, "repo released");
        return Ok(());
    }

    map.remove(repo.path());
    let _lifecycle = lock_lifecycle(lifecycle)?;
    debug!(path = %repo.path().display(), "repo closed");
    repo.shutdown()
}
