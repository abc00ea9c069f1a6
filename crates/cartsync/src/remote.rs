//! # Remote Files
//!
//! The remote mirror is a dumb byte blob addressed by an opaque URI. This module defines the
//! capability the mirror needs ([`RemoteFile`]) and the picker that yields a URI in the first
//! place ([`RemotePicker`]).
//!
//! - [`FsRemote`]: remote files reachable through the filesystem (a synced cloud folder, a
//!   mounted share). Accepts plain paths and `file://` URIs.
//! - [`MemRemote`]: for tests, with failure and latency injection.

use crate::error::{CartError, Result};
use crate::model::PickedRemote;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// Whole-blob access to a remote file.
///
/// Errors are always `CartError::Remote`: callers treat every failure here as
/// "remote unreachable" and decide whether to retry.
pub trait RemoteFile: Send + Sync {
    fn read(&self, uri: &str) -> Result<String>;
    fn write(&self, uri: &str, content: &str) -> Result<()>;
}

/// Lets the user choose a remote file. `None` means the user cancelled.
pub trait RemotePicker {
    fn pick(&self) -> Option<PickedRemote>;
}

impl<F> RemotePicker for F
where
    F: Fn() -> Option<PickedRemote>,
{
    fn pick(&self) -> Option<PickedRemote> {
        self()
    }
}

/// Remote files on a filesystem path.
#[derive(Debug, Default, Clone)]
pub struct FsRemote;

impl FsRemote {
    pub fn new() -> Self {
        Self
    }

    fn path_of(uri: &str) -> Result<PathBuf> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(PathBuf::from(path));
        }
        if uri.contains("://") {
            return Err(CartError::Remote(format!("Unsupported remote URI: {uri}")));
        }
        Ok(PathBuf::from(uri))
    }
}

impl RemoteFile for FsRemote {
    fn read(&self, uri: &str) -> Result<String> {
        let path = Self::path_of(uri)?;
        fs::read_to_string(&path).map_err(|e| CartError::Remote(format!("{uri}: {e}")))
    }

    /// Writes a sibling temp file and renames it over the target, so an interrupted
    /// write never leaves a truncated mirror.
    fn write(&self, uri: &str, content: &str) -> Result<()> {
        let path = Self::path_of(uri)?;
        let remote_err = |e: std::io::Error| CartError::Remote(format!("{uri}: {e}"));
        let tmp_path = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                parent.join(format!(".cartsync-{}.tmp", Uuid::new_v4()))
            }
            _ => PathBuf::from(format!(".cartsync-{}.tmp", Uuid::new_v4())),
        };
        fs::write(&tmp_path, content).map_err(remote_err)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(remote_err(e));
        }
        Ok(())
    }
}

/// In-memory remote for tests.
#[derive(Default)]
pub struct MemRemote {
    blobs: Mutex<HashMap<String, String>>,
    unreachable: AtomicBool,
    latency: Mutex<Duration>,
    writes: AtomicUsize,
}

impl MemRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Test helper: place content at a URI.
    pub fn put(&self, uri: &str, content: &str) {
        self.blobs().insert(uri.to_string(), content.to_string());
    }

    pub fn get(&self, uri: &str) -> Option<String> {
        self.blobs().get(uri).cloned()
    }

    /// Make every read and write fail, like a lost connection.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay applied to every write before it lands.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    /// Number of write attempts, successful or not.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(CartError::Remote("Remote unreachable".to_string()));
        }
        Ok(())
    }
}

impl RemoteFile for MemRemote {
    fn read(&self, uri: &str) -> Result<String> {
        self.check_reachable()?;
        self.get(uri)
            .ok_or_else(|| CartError::Remote(format!("No such remote file: {uri}")))
    }

    fn write(&self, uri: &str, content: &str) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        self.check_reachable()?;
        self.put(uri, content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_fs_remote_round_trip_with_file_uri() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloud.csv");
        let uri = format!("file://{}", path.display());
        let remote = FsRemote::new();
        remote.write(&uri, "hello").unwrap();
        assert_eq!(remote.read(&uri).unwrap(), "hello");
        assert_eq!(remote.read(path.to_str().unwrap()).unwrap(), "hello");
    }

    #[test]
    fn test_fs_remote_write_replaces_file_and_leaves_no_tmp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cloud.csv");
        fs::write(&path, "old content that is longer").unwrap();

        FsRemote::new().write(path.to_str().unwrap(), "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cloud.csv"]);
    }

    #[test]
    fn test_fs_remote_write_to_missing_dir_fails_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone").join("cloud.csv");
        let err = FsRemote::new().write(path.to_str().unwrap(), "x").unwrap_err();
        assert!(err.is_remote());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fs_remote_missing_file_is_remote_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.csv");
        let err = FsRemote::new().read(path.to_str().unwrap()).unwrap_err();
        assert!(err.is_remote());
    }

    #[test]
    fn test_fs_remote_rejects_foreign_schemes() {
        assert!(FsRemote::new().read("https://example.com/x").is_err());
    }

    #[test]
    fn test_mem_remote_unreachable() {
        let remote = MemRemote::new();
        remote.put("mem://a", "x");
        remote.set_unreachable(true);
        assert!(remote.read("mem://a").is_err());
        assert!(remote.write("mem://a", "y").is_err());
        assert_eq!(remote.write_count(), 1);
        assert_eq!(remote.get("mem://a").as_deref(), Some("x"));
    }

    #[test]
    fn test_closure_picker() {
        let picker = || Some(PickedRemote::new("mem://a", "a.csv"));
        assert_eq!(picker.pick().unwrap().display_name, "a.csv");
        let cancelled = || -> Option<PickedRemote> { None };
        assert!(RemotePicker::pick(&cancelled).is_none());
    }
}
