//! # Location Resolution
//!
//! Decides which file backs a feature.
//!
//! ## Resolution Order
//!
//! 1. If the feature has a configured directory (`location.<feature>`), the file lives there.
//! 2. Otherwise it lives in the fixed local documents directory.
//!
//! In both cases the file name is `<feature>.csv`.
//!
//! ## External Directories
//!
//! A configured directory may be an external, provider-backed location addressed by a URI.
//! Providers issue their own child URIs, so `dir + "/" + name` may not be the address of
//! an existing file with that name. Guessing leads to a second, duplicate file being
//! created next to the real one.
//!
//! For external directories the resolver therefore lists the directory and matches entries
//! by decoded name. Only when nothing matches does it fall back to the constructed child
//! handle, which [`LocationResolver::ensure_file`] later materializes through the
//! provider. A listing failure is logged and treated as "no match".

use crate::codec;
use crate::error::{CartError, Result};
use crate::model::Feature;
use crate::settings::FeatureSettings;
use crate::store::backend::{Handle, StorageBackend};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a feature's file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    pub handle: Handle,
    pub directory: Handle,
    pub is_external: bool,
}

pub struct LocationResolver {
    backend: Arc<dyn StorageBackend>,
    settings: FeatureSettings,
    local_dir: Handle,
}

impl LocationResolver {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        settings: FeatureSettings,
        local_dir: Handle,
    ) -> Self {
        Self {
            backend,
            settings,
            local_dir,
        }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn local_dir(&self) -> &Handle {
        &self.local_dir
    }

    pub fn resolve_file(&self, feature: &Feature) -> Result<ResolvedFile> {
        let file_name = feature.file_name();

        let Some(configured) = self.settings.location(feature)? else {
            return Ok(ResolvedFile {
                handle: self.local_dir.join(&file_name),
                directory: self.local_dir.clone(),
                is_external: false,
            });
        };

        let directory = Handle::new(configured);
        if !directory.is_external() {
            return Ok(ResolvedFile {
                handle: directory.join(&file_name),
                directory,
                is_external: false,
            });
        }

        let handle = match self.find_by_name(&directory, &file_name) {
            Some(found) => found,
            None => directory.join(&file_name),
        };
        Ok(ResolvedFile {
            handle,
            directory,
            is_external: true,
        })
    }

    fn find_by_name(&self, directory: &Handle, file_name: &str) -> Option<Handle> {
        match self.backend.list_dir(directory) {
            Ok(entries) => {
                let found = entries
                    .into_iter()
                    .find(|e| !e.is_dir && e.name == file_name)
                    .map(|e| e.handle);
                debug!(directory = %directory, file_name, found = found.is_some(), "listed external directory");
                found
            }
            Err(e) => {
                warn!(directory = %directory, error = %e, "could not list external directory, constructing path");
                None
            }
        }
    }

    /// Make sure the feature's file exists, creating it with just the header if absent.
    ///
    /// Existence is always re-checked against the backend since external storage can change
    /// underneath us. A directory squatting on the file's name is deleted and creation is
    /// retried once.
    pub fn ensure_file(&self, feature: &Feature) -> Result<ResolvedFile> {
        let resolved = self.resolve_file(feature)?;
        if self.backend.exists(&resolved.handle)? && !self.backend.is_dir(&resolved.handle)? {
            return Ok(resolved);
        }

        self.backend.ensure_dir(&resolved.directory)?;
        let file_name = feature.file_name();
        let created = match self.backend.create_file(&resolved.directory, &file_name) {
            Ok(handle) => handle,
            Err(CartError::LocationConflict(reason)) => {
                warn!(feature = %feature, %reason, "directory occupies file location, removing it");
                self.remove_conflicting_dir(&resolved, &file_name)?;
                self.backend.create_file(&resolved.directory, &file_name)?
            }
            Err(e) => return Err(e),
        };

        self.backend.write_text(&created, &codec::header_line())?;
        debug!(feature = %feature, file = %created, "created list file");
        Ok(ResolvedFile {
            handle: created,
            ..resolved
        })
    }

    fn remove_conflicting_dir(&self, resolved: &ResolvedFile, file_name: &str) -> Result<()> {
        if self.backend.is_dir(&resolved.handle)? {
            return self.backend.delete(&resolved.handle);
        }
        // Provider-issued URI: find the directory entry by name.
        let entries = self.backend.list_dir(&resolved.directory)?;
        for entry in entries.into_iter().filter(|e| e.is_dir && e.name == file_name) {
            self.backend.delete(&entry.handle)?;
        }
        Ok(())
    }
}
