use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An opaque address for a file or directory.
///
/// Plain filesystem paths are "local". Anything carrying a URI scheme (`file://`,
/// `content://`, ...) is "external": the provider behind it issues the URIs, so a
/// child's URI cannot be assumed to be `parent + "/" + name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_external(&self) -> bool {
        self.scheme().is_some()
    }

    pub fn scheme(&self) -> Option<&str> {
        let (scheme, _) = self.0.split_once("://")?;
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then_some(scheme)
    }

    /// Filesystem path for local handles and `file://` URIs.
    pub fn to_path(&self) -> Option<PathBuf> {
        match self.scheme() {
            None => Some(PathBuf::from(&self.0)),
            Some("file") => self.0.strip_prefix("file://").map(PathBuf::from),
            Some(_) => None,
        }
    }

    /// Child handle built by path concatenation. Only trustworthy for local handles.
    pub fn join(&self, name: &str) -> Handle {
        if self.0.ends_with('/') {
            Handle(format!("{}{}", self.0, name))
        } else {
            Handle(format!("{}/{}", self.0, name))
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Decoded display name (what the user would see), not the raw URI segment.
    pub name: String,
    pub handle: Handle,
    pub is_dir: bool,
}

/// Abstract interface for raw file I/O.
///
/// This trait handles the "how" of storage (filesystem vs memory vs a document
/// provider), while `RecordStore` handles the "what" (CSV rows, cache, mirroring).
pub trait StorageBackend: Send + Sync {
    // --- File capabilities ---

    /// True if anything (file or directory) lives at `handle`.
    fn exists(&self, handle: &Handle) -> Result<bool>;

    fn is_dir(&self, handle: &Handle) -> Result<bool>;

    /// Read the whole file.
    /// Returns Ok(None) if the file does not exist.
    fn read_text(&self, file: &Handle) -> Result<Option<String>>;

    /// Overwrite the whole file, creating it if needed.
    fn write_text(&self, file: &Handle, content: &str) -> Result<()>;

    /// Append to the end of an existing file.
    fn append_text(&self, file: &Handle, content: &str) -> Result<()>;

    /// True if the file is empty or its last byte is `\n`. Files edited elsewhere often
    /// lack the final newline, and an append must not glue onto the last row.
    fn ends_with_newline(&self, file: &Handle) -> Result<bool> {
        Ok(self
            .read_text(file)?
            .map_or(true, |text| text.is_empty() || text.ends_with('\n')))
    }

    /// Byte size, or None if the file does not exist.
    fn size(&self, file: &Handle) -> Result<Option<u64>>;

    // --- Directory capabilities ---

    /// Create the directory (and parents) if missing.
    fn ensure_dir(&self, dir: &Handle) -> Result<()>;

    /// Create an empty file named `name` inside `dir` and return its real handle.
    /// Returns `CartError::LocationConflict` if a directory already occupies that name.
    fn create_file(&self, dir: &Handle, name: &str) -> Result<Handle>;

    /// Delete a file or a directory (recursively).
    fn delete(&self, handle: &Handle) -> Result<()>;

    fn list_dir(&self, dir: &Handle) -> Result<Vec<DirEntry>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_is_local() {
        let h = Handle::new("/home/user/docs/list.csv");
        assert!(!h.is_external());
        assert_eq!(h.to_path(), Some(PathBuf::from("/home/user/docs/list.csv")));
    }

    #[test]
    fn test_uri_is_external() {
        let h = Handle::new("content://com.provider/tree/primary%3ADocs");
        assert!(h.is_external());
        assert_eq!(h.scheme(), Some("content"));
        assert_eq!(h.to_path(), None);
    }

    #[test]
    fn test_file_uri_maps_to_path() {
        let h = Handle::new("file:///tmp/x");
        assert!(h.is_external());
        assert_eq!(h.to_path(), Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_windows_like_paths_are_not_uris() {
        assert!(!Handle::new("C:\\docs\\list.csv").is_external());
        assert!(!Handle::new("relative/dir").is_external());
    }

    #[test]
    fn test_join() {
        assert_eq!(Handle::new("/a").join("b.csv").as_str(), "/a/b.csv");
        assert_eq!(Handle::new("/a/").join("b.csv").as_str(), "/a/b.csv");
    }
}
