//! Repository handle.
//!
//! A [`Repo`] owns the root datastore of one database file and exposes:
//!
//! - the `/data` namespace as the application datastore
//! - the `/keys` namespace as a [`Keystore`]
//! - the JSON config stored under `/config`, cached as an `Arc` snapshot
//!
//! Handles come from [`RepoRegistry::open`] and are shared per path.

mod registry;

pub use registry::RepoRegistry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{self, RepoConfig, PRIV_KEY_SELECTOR};
use crate::crypto::EncryptionKey;
use crate::datastore::sqlite::check_db_crypto;
use crate::datastore::{Datastore, EncryptedDatastore, NamespacedDatastore, Query, SqliteDatastore};
use crate::error::{RepoError, Result};
use crate::key::Key;
use crate::keystore::Keystore;
use crate::options::StoreOptions;

use registry::{lock_lifecycle, release, OpenMap};

/// Root key holding the serialized config. Its absence means "not initialized".
pub const CONFIG_KEY: &str = "/config";
/// Root of the application datastore.
pub const DATA_PREFIX: &str = "/data";
/// Root of the keystore.
pub const KEYS_PREFIX: &str = "/keys";
pub const API_KEY: &str = "/api";
pub const GATEWAY_KEY: &str = "/gateway";
pub const SWARM_KEY: &str = "/swarm.key";

/// Layer the encryption wrapper over `store` when a key is supplied.
pub(crate) fn wrap_root(
    store: Arc<dyn Datastore>,
    key: Option<&EncryptionKey>,
    options: &StoreOptions,
) -> Arc<dyn Datastore> {
    match key {
        Some(key) => Arc::new(EncryptedDatastore::wrap(store, key, options.key_mode)),
        None => store,
    }
}

/// An open repository.
pub struct Repo {
    path: PathBuf,
    root: Arc<dyn Datastore>,
    data: Arc<dyn Datastore>,
    keys: Keystore,
    config: RwLock<Option<Arc<RepoConfig>>>,
    closed: AtomicBool,
    registry: Weak<OpenMap>,
    lifecycle: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Repo {
    /// Open the backing store and read the config. The caller holds the
    /// lifecycle lock.
    pub(crate) fn load(
        path: PathBuf,
        key: Option<&EncryptionKey>,
        options: &StoreOptions,
        registry: Weak<OpenMap>,
        lifecycle: Arc<Mutex<()>>,
    ) -> Result<Self> {
        check_db_crypto(&path, key.is_some())?;
        let store: Arc<dyn Datastore> = Arc::new(SqliteDatastore::open(&path, key, options)?);
        let root = wrap_root(store, key, options);

        let config = match read_config(root.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                if let Err(close_err) = root.close() {
                    warn!(
                        path = %path.display(),
                        error = %close_err,
                        "failed to close store after config load error"
                    );
                }
                return Err(e);
            }
        };
        if config.is_none() {
            debug!(path = %path.display(), "repo opened without a config");
        }

        let data: Arc<dyn Datastore> = Arc::new(NamespacedDatastore::new(DATA_PREFIX, root.clone()));
        let keys = Keystore::new(Arc::new(NamespacedDatastore::new(KEYS_PREFIX, root.clone())));

        Ok(Self {
            path,
            root,
            data,
            keys,
            config: RwLock::new(config.map(Arc::new)),
            closed: AtomicBool::new(false),
            registry,
            lifecycle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(RepoError::AlreadyClosed);
        }
        Ok(())
    }

    /// The cached config snapshot, `None` if the repository has no config.
    ///
    /// The snapshot is never mutated; writers replace it.
    pub fn config(&self) -> Result<Option<Arc<RepoConfig>>> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        self.ensure_open()?;
        Ok(self.cached_config()?.clone())
    }

    fn cached_config(&self) -> Result<std::sync::RwLockReadGuard<'_, Option<Arc<RepoConfig>>>> {
        self.config
            .read()
            .map_err(|_| RepoError::Storage("Config cache poisoned".to_string()))
    }

    fn replace_cached_config(&self, config: RepoConfig) -> Result<()> {
        let mut cache = self
            .config
            .write()
            .map_err(|_| RepoError::Storage("Config cache poisoned".to_string()))?;
        *cache = Some(Arc::new(config));
        Ok(())
    }

    /// Persist `updated`, keeping any stored fields it does not know about.
    pub fn set_config(&self, updated: &RepoConfig) -> Result<()> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        self.ensure_open()?;
        self.set_config_locked(updated)
    }

    fn set_config_locked(&self, updated: &RepoConfig) -> Result<()> {
        let mut stored = self.read_config_map()?;
        for (field, value) in updated.to_map()? {
            stored.insert(field, value);
        }
        let merged = RepoConfig::from_map(stored)?;
        self.root.put(&Key::new(CONFIG_KEY), &merged.to_bytes()?)?;
        self.replace_cached_config(merged)?;
        debug!("config updated");
        Ok(())
    }

    /// Set one field by dotted selector, e.g. `Datastore.StorageMax`.
    ///
    /// `Identity.PrivKey` cannot be changed this way: its stored value is
    /// restored after the update. A config stored without a private key is
    /// valid and stays without one; any value written to that field is
    /// dropped rather than rejected.
    pub fn set_config_key(&self, selector: &str, value: Value) -> Result<()> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        self.ensure_open()?;

        let mut map = self.read_config_map()?;
        let priv_key = config::map_get(&map, PRIV_KEY_SELECTOR).ok();

        config::map_set(&mut map, selector, value)?;
        match priv_key {
            Some(priv_key) => config::map_set(&mut map, PRIV_KEY_SELECTOR, priv_key)?,
            None => config::map_remove(&mut map, PRIV_KEY_SELECTOR)?,
        }

        let validated = RepoConfig::from_map(map)?;
        self.set_config_locked(&validated)
    }

    /// Read one field of the stored config by dotted selector.
    pub fn get_config_key(&self, selector: &str) -> Result<Value> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        self.ensure_open()?;
        let map = self.read_config_map()?;
        config::map_get(&map, selector)
    }

    fn read_config_map(&self) -> Result<serde_json::Map<String, Value>> {
        let bytes = self.root.get(&Key::new(CONFIG_KEY))?;
        config::map_from_bytes(&bytes)
    }

    /// The application datastore (the `/data` namespace).
    pub fn datastore(&self) -> Arc<dyn Datastore> {
        self.data.clone()
    }

    pub fn keystore(&self) -> &Keystore {
        &self.keys
    }

    /// The root datastore, below all namespaces.
    pub fn root_datastore(&self) -> Arc<dyn Datastore> {
        self.root.clone()
    }

    /// Record the API listen address.
    pub fn set_api_addr(&self, addr: &str) -> Result<()> {
        self.put_addr(API_KEY, addr)
    }

    /// Record the gateway listen address.
    pub fn set_gateway_addr(&self, addr: &str) -> Result<()> {
        self.put_addr(GATEWAY_KEY, addr)
    }

    pub fn api_addr(&self) -> Result<Option<String>> {
        self.get_addr(API_KEY)
    }

    pub fn gateway_addr(&self) -> Result<Option<String>> {
        self.get_addr(GATEWAY_KEY)
    }

    fn put_addr(&self, key: &str, addr: &str) -> Result<()> {
        let _lifecycle = lock_lifecycle(&self.lifecycle)?;
        self.ensure_open()?;
        if !addr.starts_with('/') || addr.len() < 2 {
            return Err(RepoError::InvalidInput(format!(
                "not a multiaddr: {:?}",
                addr
            )));
        }
        self.root.put(&Key::new(key), addr.as_bytes())
    }

    fn get_addr(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        match self.root.get(&Key::new(key)) {
            Ok(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| RepoError::Storage(format!("stored {} is not UTF-8", key))),
            Err(RepoError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The private-network swarm key, if one is stored.
    pub fn swarm_key(&self) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        match self.root.get(&Key::new(SWARM_KEY)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(RepoError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Total plaintext size of every value in the application datastore.
    pub fn storage_usage(&self) -> Result<u64> {
        self.ensure_open()?;
        let mut total: u64 = 0;
        for entry in self.data.query(&Query::new().keys_only())? {
            total = total.saturating_add(entry?.size as u64);
        }
        Ok(total)
    }

    /// Release this handle. The backing store closes when the last handle
    /// to the path is released.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::AlreadyClosed` once every handle has been released.
    pub fn close(&self) -> Result<()> {
        self.ensure_open()?;
        release(&self.registry, &self.lifecycle, self)
    }

    /// Mark closed and close the backing store.
    pub(crate) fn shutdown(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(RepoError::AlreadyClosed);
        }
        self.root.close()
    }
}

/// Read the stored config, `None` when absent.
fn read_config(root: &dyn Datastore) -> Result<Option<RepoConfig>> {
    match root.get(&Key::new(CONFIG_KEY)) {
        Ok(bytes) => Ok(Some(RepoConfig::from_map(config::map_from_bytes(&bytes)?)?)),
        Err(RepoError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
