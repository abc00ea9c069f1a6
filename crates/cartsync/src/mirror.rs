//! # Cloud Mirror
//!
//! Directional, whole-file sync between a feature's local file and its remote handle.
//!
//! - **Pull** (remote → local): the remote blob replaces the local file verbatim.
//! - **Push** (local → remote): the local file replaces the remote blob verbatim.
//!
//! There is no merging. Both directions are no-ops returning `false` unless the feature's
//! sync mode is `mirrored` and a remote is attached. I/O failures are returned to the caller,
//! never swallowed here: the record store turns push failures into pending markers, the
//! attach flow turns pull failures into a rollback.

use crate::error::Result;
use crate::location::LocationResolver;
use crate::model::{Feature, PickedRemote, SyncMode};
use crate::remote::RemoteFile;
use crate::settings::FeatureSettings;
use std::sync::Arc;
use tracing::{info, warn};

pub struct CloudMirror {
    resolver: Arc<LocationResolver>,
    remote: Arc<dyn RemoteFile>,
    settings: FeatureSettings,
}

impl CloudMirror {
    pub fn new(
        resolver: Arc<LocationResolver>,
        remote: Arc<dyn RemoteFile>,
        settings: FeatureSettings,
    ) -> Self {
        Self {
            resolver,
            remote,
            settings,
        }
    }

    pub fn is_mirrored(&self, feature: &Feature) -> Result<bool> {
        Ok(self.settings.mirror_target(feature)?.is_some())
    }

    /// Overwrite the local file with the remote blob. Returns `false` when not mirrored.
    pub fn pull_to_local(&self, feature: &Feature) -> Result<bool> {
        let Some(target) = self.settings.mirror_target(feature)? else {
            return Ok(false);
        };
        let content = self.remote.read(&target.uri)?;
        let resolved = self.resolver.ensure_file(feature)?;
        self.resolver
            .backend()
            .write_text(&resolved.handle, &content)?;
        info!(feature = %feature, remote = %target.uri, bytes = content.len(), "pulled remote into local file");
        Ok(true)
    }

    /// Overwrite the remote blob with the local file. Returns `false` when not mirrored or
    /// when there is no local file yet.
    pub fn push_from_local(&self, feature: &Feature) -> Result<bool> {
        let Some(target) = self.settings.mirror_target(feature)? else {
            return Ok(false);
        };
        let resolved = self.resolver.resolve_file(feature)?;
        let Some(content) = self.resolver.backend().read_text(&resolved.handle)? else {
            return Ok(false);
        };
        self.remote.write(&target.uri, &content)?;
        info!(feature = %feature, remote = %target.uri, bytes = content.len(), "pushed local file to remote");
        Ok(true)
    }

    /// Attach a picked remote and seed the local file from it.
    ///
    /// If the initial pull fails, the previous remote settings are restored so the feature is
    /// never left half-configured.
    pub fn attach_remote(&self, feature: &Feature, picked: &PickedRemote) -> Result<()> {
        let previous_remote = self.settings.remote(feature)?;
        let previous_mode = self.settings.sync_mode(feature)?;

        let attached = self
            .settings
            .set_remote(feature, picked)
            .and_then(|_| self.settings.set_sync_mode(feature, SyncMode::Mirrored))
            .and_then(|_| self.pull_to_local(feature));

        if let Err(e) = attached {
            warn!(feature = %feature, remote = %picked.uri, error = %e, "attach failed, rolling back");
            self.restore(feature, previous_remote.as_ref(), previous_mode)?;
            return Err(e);
        }
        info!(feature = %feature, remote = %picked.uri, name = %picked.display_name, "attached remote");
        Ok(())
    }

    fn restore(
        &self,
        feature: &Feature,
        remote: Option<&PickedRemote>,
        mode: SyncMode,
    ) -> Result<()> {
        match remote {
            Some(remote) => self.settings.set_remote(feature, remote)?,
            None => self.settings.clear_remote(feature)?,
        }
        self.settings.set_sync_mode(feature, mode)
    }

    /// Forget the remote. Local data is left untouched.
    pub fn detach_remote(&self, feature: &Feature) -> Result<()> {
        self.settings.clear_remote(feature)?;
        self.settings.set_sync_mode(feature, SyncMode::Local)?;
        info!(feature = %feature, "detached remote");
        Ok(())
    }
}
