use super::backend::{DirEntry, Handle, StorageBackend};
use crate::error::{CartError, Result};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Filesystem backend.
///
/// Understands plain paths and `file://` URIs. Handles derived from a `file://`
/// directory (listing entries, created children) keep the `file://` form so the
/// external-vs-local distinction survives a round trip through the backend.
#[derive(Debug, Default, Clone)]
pub struct FsBackend;

impl FsBackend {
    pub fn new() -> Self {
        Self
    }

    fn path_of(&self, handle: &Handle) -> Result<PathBuf> {
        handle
            .to_path()
            .ok_or_else(|| CartError::Store(format!("Unsupported handle: {}", handle)))
    }

    fn handle_like(&self, parent: &Handle, path: &Path) -> Handle {
        if parent.is_external() {
            Handle::new(format!("file://{}", path.display()))
        } else {
            Handle::from_path(path)
        }
    }
}

impl StorageBackend for FsBackend {
    fn exists(&self, handle: &Handle) -> Result<bool> {
        Ok(self.path_of(handle)?.exists())
    }

    fn is_dir(&self, handle: &Handle) -> Result<bool> {
        Ok(self.path_of(handle)?.is_dir())
    }

    fn read_text(&self, file: &Handle) -> Result<Option<String>> {
        let path = self.path_of(file)?;
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(CartError::Io)?;
        Ok(Some(content))
    }

    fn write_text(&self, file: &Handle, content: &str) -> Result<()> {
        let path = self.path_of(file)?;
        let parent = path
            .parent()
            .ok_or_else(|| CartError::Store(format!("No parent directory for {}", file)))?;
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(CartError::Io)?;
        }

        // Atomic write
        let tmp_path = parent.join(format!(".cartsync-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(CartError::Io)?;
        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(CartError::Io(e));
        }
        Ok(())
    }

    fn append_text(&self, file: &Handle, content: &str) -> Result<()> {
        let path = self.path_of(file)?;
        let mut f = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(CartError::Io)?;
        f.write_all(content.as_bytes()).map_err(CartError::Io)?;
        Ok(())
    }

    fn ends_with_newline(&self, file: &Handle) -> Result<bool> {
        let path = self.path_of(file)?;
        if !path.is_file() {
            return Ok(true);
        }
        let mut f = fs::File::open(path).map_err(CartError::Io)?;
        if f.metadata().map_err(CartError::Io)?.len() == 0 {
            return Ok(true);
        }
        f.seek(SeekFrom::End(-1)).map_err(CartError::Io)?;
        let mut last = [0u8; 1];
        f.read_exact(&mut last).map_err(CartError::Io)?;
        Ok(last[0] == b'\n')
    }

    fn size(&self, file: &Handle) -> Result<Option<u64>> {
        let path = self.path_of(file)?;
        if !path.is_file() {
            return Ok(None);
        }
        let meta = fs::metadata(path).map_err(CartError::Io)?;
        Ok(Some(meta.len()))
    }

    fn ensure_dir(&self, dir: &Handle) -> Result<()> {
        let path = self.path_of(dir)?;
        if !path.exists() {
            fs::create_dir_all(path).map_err(CartError::Io)?;
        }
        Ok(())
    }

    fn create_file(&self, dir: &Handle, name: &str) -> Result<Handle> {
        let path = self.path_of(dir)?.join(name);
        if path.is_dir() {
            return Err(CartError::LocationConflict(format!(
                "{} is a directory",
                path.display()
            )));
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(CartError::Io)?;
        Ok(self.handle_like(dir, &path))
    }

    fn delete(&self, handle: &Handle) -> Result<()> {
        let path = self.path_of(handle)?;
        if path.is_dir() {
            fs::remove_dir_all(path).map_err(CartError::Io)?;
        } else if path.exists() {
            fs::remove_file(path).map_err(CartError::Io)?;
        }
        Ok(())
    }

    fn list_dir(&self, dir: &Handle) -> Result<Vec<DirEntry>> {
        let root = self.path_of(dir)?;
        let mut entries = Vec::new();
        for entry in fs::read_dir(&root).map_err(CartError::Io)? {
            let entry = entry.map_err(CartError::Io)?;
            let path = entry.path();
            let is_dir = entry.file_type().map_err(CartError::Io)?.is_dir();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                handle: self.handle_like(dir, &path),
                is_dir,
            });
        }
        Ok(entries)
    }
}
