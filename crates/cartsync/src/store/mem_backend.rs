use super::backend::{DirEntry, Handle, StorageBackend};
use crate::error::{CartError, Result};
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug)]
enum Node {
    File(String),
    Dir,
}

#[derive(Clone, Debug)]
struct Entry {
    node: Node,
    name: String,
    parent: Option<String>,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    next_document: u64,
}

/// In-memory storage backend for testing.
///
/// Local handles (plain paths) behave like a filesystem. External handles behave like a
/// document provider: a file created inside an external directory gets a provider-issued
/// URI (`<scheme>://provider/document/<n>`) that cannot be predicted from its name, and
/// writing to a guessed URI fails.
///
/// Uses a `Mutex` rather than `RefCell` because the pending queue may drain from a
/// trigger thread.
#[derive(Default)]
pub struct MemBackend {
    state: Mutex<State>,
    simulate_read_error: AtomicBool,
    simulate_write_error: AtomicBool,
    simulate_list_error: AtomicBool,
    reads: AtomicUsize,
}

fn parent_of(handle: &str) -> Option<String> {
    handle
        .rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .filter(|p| !p.is_empty())
}

fn name_of(handle: &str) -> String {
    handle
        .rsplit_once('/')
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| handle.to_string())
}

fn simulated(kind: &str) -> CartError {
    CartError::Io(io::Error::other(format!("Simulated {kind} error")))
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enable read error simulation (affects `read_text` only).
    pub fn set_simulate_read_error(&self, simulate: bool) {
        self.simulate_read_error.store(simulate, Ordering::SeqCst);
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Make `list_dir` fail, as a revoked or flaky provider would.
    pub fn set_simulate_list_error(&self, simulate: bool) {
        self.simulate_list_error.store(simulate, Ordering::SeqCst);
    }

    /// Number of successful `read_text` calls so far.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Test helper: put a file at a local handle, creating it if needed.
    pub fn put_file(&self, handle: &Handle, content: &str) {
        let mut state = self.state();
        state.entries.insert(
            handle.as_str().to_string(),
            Entry {
                node: Node::File(content.to_string()),
                name: name_of(handle.as_str()),
                parent: parent_of(handle.as_str()),
            },
        );
    }

    /// Test helper: put a directory at a handle.
    pub fn put_dir(&self, handle: &Handle) {
        let mut state = self.state();
        state.entries.insert(
            handle.as_str().to_string(),
            Entry {
                node: Node::Dir,
                name: name_of(handle.as_str()),
                parent: parent_of(handle.as_str()),
            },
        );
    }

    /// Test helper: raw content at a handle, bypassing error simulation.
    pub fn content(&self, handle: &Handle) -> Option<String> {
        match self.state().entries.get(handle.as_str()) {
            Some(Entry {
                node: Node::File(text),
                ..
            }) => Some(text.clone()),
            _ => None,
        }
    }

    /// Test helper: count of files named `name` directly inside `dir`.
    pub fn count_named(&self, dir: &Handle, name: &str) -> usize {
        self.state()
            .entries
            .values()
            .filter(|e| e.parent.as_deref() == Some(dir.as_str()) && e.name == name)
            .count()
    }

    fn check_write(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(simulated("write"));
        }
        Ok(())
    }
}

impl StorageBackend for MemBackend {
    fn exists(&self, handle: &Handle) -> Result<bool> {
        Ok(self.state().entries.contains_key(handle.as_str()))
    }

    fn is_dir(&self, handle: &Handle) -> Result<bool> {
        Ok(matches!(
            self.state().entries.get(handle.as_str()),
            Some(Entry {
                node: Node::Dir,
                ..
            })
        ))
    }

    fn read_text(&self, file: &Handle) -> Result<Option<String>> {
        if self.simulate_read_error.load(Ordering::SeqCst) {
            return Err(simulated("read"));
        }
        let text = self.content(file);
        if text.is_some() {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }
        Ok(text)
    }

    fn write_text(&self, file: &Handle, content: &str) -> Result<()> {
        self.check_write()?;
        let mut state = self.state();
        match state.entries.get_mut(file.as_str()) {
            Some(Entry {
                node: Node::Dir, ..
            }) => Err(CartError::Store(format!("{} is a directory", file))),
            Some(entry) => {
                entry.node = Node::File(content.to_string());
                Ok(())
            }
            None if file.is_external() => {
                Err(CartError::Store(format!("Unknown document: {}", file)))
            }
            None => {
                state.entries.insert(
                    file.as_str().to_string(),
                    Entry {
                        node: Node::File(content.to_string()),
                        name: name_of(file.as_str()),
                        parent: parent_of(file.as_str()),
                    },
                );
                Ok(())
            }
        }
    }

    fn append_text(&self, file: &Handle, content: &str) -> Result<()> {
        self.check_write()?;
        let mut state = self.state();
        match state.entries.get_mut(file.as_str()) {
            Some(Entry {
                node: Node::File(text),
                ..
            }) => {
                text.push_str(content);
                Ok(())
            }
            _ => Err(CartError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", file),
            ))),
        }
    }

    fn ends_with_newline(&self, file: &Handle) -> Result<bool> {
        if self.simulate_read_error.load(Ordering::SeqCst) {
            return Err(simulated("read"));
        }
        Ok(self
            .content(file)
            .map_or(true, |text| text.is_empty() || text.ends_with('\n')))
    }

    fn size(&self, file: &Handle) -> Result<Option<u64>> {
        Ok(self.content(file).map(|text| text.len() as u64))
    }

    fn ensure_dir(&self, dir: &Handle) -> Result<()> {
        if self.exists(dir)? {
            return Ok(());
        }
        self.check_write()?;
        self.put_dir(dir);
        Ok(())
    }

    fn create_file(&self, dir: &Handle, name: &str) -> Result<Handle> {
        self.check_write()?;
        let mut state = self.state();
        if !state.entries.contains_key(dir.as_str()) {
            return Err(CartError::Store(format!("No such directory: {}", dir)));
        }

        let existing = state
            .entries
            .iter()
            .find(|(_, e)| e.parent.as_deref() == Some(dir.as_str()) && e.name == name)
            .map(|(key, e)| (key.clone(), e.node.clone()));
        match existing {
            Some((key, Node::Dir)) => {
                return Err(CartError::LocationConflict(format!("{} is a directory", key)))
            }
            Some((key, Node::File(_))) => return Ok(Handle::new(key)),
            None => {}
        }

        let handle = match dir.scheme() {
            Some(scheme) => {
                state.next_document += 1;
                Handle::new(format!(
                    "{}://provider/document/{}",
                    scheme, state.next_document
                ))
            }
            None => dir.join(name),
        };
        state.entries.insert(
            handle.as_str().to_string(),
            Entry {
                node: Node::File(String::new()),
                name: name.to_string(),
                parent: Some(dir.as_str().to_string()),
            },
        );
        Ok(handle)
    }

    fn delete(&self, handle: &Handle) -> Result<()> {
        self.check_write()?;
        let mut state = self.state();
        let mut doomed = vec![handle.as_str().to_string()];
        let mut i = 0;
        while i < doomed.len() {
            let current = doomed[i].clone();
            doomed.extend(
                state
                    .entries
                    .iter()
                    .filter(|(_, e)| e.parent.as_deref() == Some(current.as_str()))
                    .map(|(key, _)| key.clone()),
            );
            i += 1;
        }
        for key in doomed {
            state.entries.remove(&key);
        }
        Ok(())
    }

    fn list_dir(&self, dir: &Handle) -> Result<Vec<DirEntry>> {
        if self.simulate_list_error.load(Ordering::SeqCst) {
            return Err(simulated("list"));
        }
        let state = self.state();
        if !state.entries.contains_key(dir.as_str()) {
            return Err(CartError::Store(format!("No such directory: {}", dir)));
        }
        Ok(state
            .entries
            .iter()
            .filter(|(_, e)| e.parent.as_deref() == Some(dir.as_str()))
            .map(|(key, e)| DirEntry {
                name: e.name.clone(),
                handle: Handle::new(key.clone()),
                is_dir: matches!(e.node, Node::Dir),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_create_uses_joined_path() {
        let backend = MemBackend::new();
        let dir = Handle::new("/docs");
        backend.ensure_dir(&dir).unwrap();
        let file = backend.create_file(&dir, "list.csv").unwrap();
        assert_eq!(file.as_str(), "/docs/list.csv");
    }

    #[test]
    fn test_external_create_issues_unpredictable_uri() {
        let backend = MemBackend::new();
        let dir = Handle::new("content://tree/Docs");
        backend.ensure_dir(&dir).unwrap();
        let file = backend.create_file(&dir, "list.csv").unwrap();
        assert_ne!(file, dir.join("list.csv"));
        assert!(!backend.exists(&dir.join("list.csv")).unwrap());

        let listed = backend.list_dir(&dir).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "list.csv");
        assert_eq!(listed[0].handle, file);
    }

    #[test]
    fn test_write_to_guessed_external_uri_fails() {
        let backend = MemBackend::new();
        let guessed = Handle::new("content://tree/Docs/list.csv");
        assert!(backend.write_text(&guessed, "x").is_err());
    }

    #[test]
    fn test_create_file_over_directory_conflicts() {
        let backend = MemBackend::new();
        let dir = Handle::new("/docs");
        backend.ensure_dir(&dir).unwrap();
        backend.put_dir(&dir.join("list.csv"));
        let result = backend.create_file(&dir, "list.csv");
        assert!(matches!(result, Err(CartError::LocationConflict(_))));
    }

    #[test]
    fn test_delete_is_recursive() {
        let backend = MemBackend::new();
        let dir = Handle::new("/docs/sub");
        backend.put_dir(&dir);
        backend.put_file(&dir.join("a"), "x");
        backend.delete(&dir).unwrap();
        assert!(!backend.exists(&dir.join("a")).unwrap());
        assert!(!backend.exists(&dir).unwrap());
    }

    #[test]
    fn test_append_requires_existing_file() {
        let backend = MemBackend::new();
        let file = Handle::new("/docs/a.csv");
        assert!(backend.append_text(&file, "x").is_err());
        backend.put_file(&file, "a");
        backend.append_text(&file, "b").unwrap();
        assert_eq!(backend.content(&file).as_deref(), Some("ab"));
    }
}
