//! # Durable Settings
//!
//! Small string key-value storage that survives restarts, plus a typed view over it.
//!
//! ## Keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `location.<feature>` | external directory (path or URI) holding the feature's file |
//! | `remote.<feature>.uri` | remote mirror handle |
//! | `remote.<feature>.name` | remote mirror display name |
//! | `sync_mode.<feature>` | `local` or `mirrored` |
//! | `pending_sync` | JSON list of feature names awaiting a push |
//!
//! ## Implementations
//!
//! - [`JsonKvStore`]: one `settings.json` file, rewritten atomically on every mutation.
//! - [`MemKvStore`]: for tests, with write-failure simulation.

use crate::error::{CartError, Result};
use crate::model::{Feature, PickedRemote, SyncMode};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

pub const PENDING_SYNC_KEY: &str = "pending_sync";

/// Durable string key-value storage.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn delete(&self, key: &str) -> Result<()>;
}

/// Key-value store persisted as a single pretty-printed JSON object.
///
/// The file is read once at open time; the in-memory map is the source of truth
/// afterwards and every mutation rewrites the file.
pub struct JsonKvStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonKvStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = fs::read_to_string(&path).map_err(CartError::Io)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(CartError::Serialization)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| CartError::Store("Settings file has no parent".to_string()))?;
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir).map_err(CartError::Io)?;
        }
        let content = serde_json::to_string_pretty(values).map_err(CartError::Serialization)?;

        // Atomic write
        let tmp_file = dir.join(format!(".settings-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_file, content).map_err(CartError::Io)?;
        fs::rename(&tmp_file, &self.path).map_err(CartError::Io)?;
        Ok(())
    }
}

impl KvStore for JsonKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values();
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *values = next;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut values = self.values();
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.persist(&next)?;
        *values = next;
        Ok(())
    }
}

/// In-memory key-value store for tests.
#[derive(Default)]
pub struct MemKvStore {
    values: Mutex<BTreeMap<String, String>>,
    simulate_write_error: AtomicBool,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    fn values(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_write(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(CartError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_write()?;
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.check_write()?;
        self.values().remove(key);
        Ok(())
    }
}

/// Typed per-feature settings on top of a [`KvStore`].
#[derive(Clone)]
pub struct FeatureSettings {
    kv: Arc<dyn KvStore>,
}

impl FeatureSettings {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn kv(&self) -> &Arc<dyn KvStore> {
        &self.kv
    }

    fn location_key(feature: &Feature) -> String {
        format!("location.{}", feature)
    }

    fn remote_uri_key(feature: &Feature) -> String {
        format!("remote.{}.uri", feature)
    }

    fn remote_name_key(feature: &Feature) -> String {
        format!("remote.{}.name", feature)
    }

    fn sync_mode_key(feature: &Feature) -> String {
        format!("sync_mode.{}", feature)
    }

    pub fn location(&self, feature: &Feature) -> Result<Option<String>> {
        Ok(self
            .kv
            .get(&Self::location_key(feature))?
            .filter(|dir| !dir.trim().is_empty()))
    }

    pub fn set_location(&self, feature: &Feature, dir: &str) -> Result<()> {
        self.kv.set(&Self::location_key(feature), dir)
    }

    pub fn clear_location(&self, feature: &Feature) -> Result<()> {
        self.kv.delete(&Self::location_key(feature))
    }

    /// The attached remote, if both the URI and display name are present.
    pub fn remote(&self, feature: &Feature) -> Result<Option<PickedRemote>> {
        let uri = self.kv.get(&Self::remote_uri_key(feature))?;
        let name = self.kv.get(&Self::remote_name_key(feature))?;
        Ok(match uri {
            Some(uri) if !uri.is_empty() => Some(PickedRemote {
                display_name: name.unwrap_or_default(),
                uri,
            }),
            _ => None,
        })
    }

    pub fn set_remote(&self, feature: &Feature, remote: &PickedRemote) -> Result<()> {
        self.kv.set(&Self::remote_uri_key(feature), &remote.uri)?;
        self.kv
            .set(&Self::remote_name_key(feature), &remote.display_name)
    }

    pub fn clear_remote(&self, feature: &Feature) -> Result<()> {
        self.kv.delete(&Self::remote_uri_key(feature))?;
        self.kv.delete(&Self::remote_name_key(feature))
    }

    pub fn sync_mode(&self, feature: &Feature) -> Result<SyncMode> {
        Ok(self
            .kv
            .get(&Self::sync_mode_key(feature))?
            .map(|raw| SyncMode::parse(&raw))
            .unwrap_or_default())
    }

    pub fn set_sync_mode(&self, feature: &Feature, mode: SyncMode) -> Result<()> {
        match mode {
            SyncMode::Local => self.kv.delete(&Self::sync_mode_key(feature)),
            SyncMode::Mirrored => self.kv.set(&Self::sync_mode_key(feature), mode.as_str()),
        }
    }

    /// Mirrored mode with a remote attached.
    pub fn mirror_target(&self, feature: &Feature) -> Result<Option<PickedRemote>> {
        if self.sync_mode(feature)? != SyncMode::Mirrored {
            return Ok(None);
        }
        self.remote(feature)
    }
}
