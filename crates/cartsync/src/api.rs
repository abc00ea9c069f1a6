//! # API Facade
//!
//! [`Engine`] wires the components together once per process; [`ListApi`] is the per-feature
//! handle every UI talks to. The facade owns no logic of its own beyond sequencing:
//!
//! ```text
//!            ListApi (feature)
//!                 │
//!     ┌───────────┼──────────────┐
//!     ▼           ▼              ▼
//! RecordStore  CloudMirror   PendingQueue
//!     │           │              │
//!     └──► LocationResolver ◄────┘
//!              │
//!       StorageBackend + FeatureSettings
//! ```
//!
//! ## Error Tiers
//!
//! Local persistence errors come back as `Err`. Remote errors during a write never do: the
//! write reports [`MirrorOutcome::Queued`] and the pending queue retries later. Remote
//! errors during an explicit pull or attach are returned, since the user asked for them.
//!
//! ## Cache Coherence
//!
//! Every operation that can change the local file behind the store's back (attach, refresh,
//! relocation) drops the feature's cache entry afterwards.

use crate::error::Result;
use crate::location::LocationResolver;
use crate::mirror::CloudMirror;
use crate::model::{total_price, Feature, FileInfo, PickedRemote, Record};
use crate::pending::{DrainReport, PendingQueue};
use crate::remote::{RemoteFile, RemotePicker};
use crate::settings::{FeatureSettings, KvStore};
use crate::store::backend::{Handle, StorageBackend};
use crate::store::record_store::{MirrorOutcome, RecordStore, Snapshot};
use crate::triggers::TriggerSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The assembled components. Cheap to share; hand out [`ListApi`]s with [`Engine::list`].
pub struct Engine {
    settings: FeatureSettings,
    resolver: Arc<LocationResolver>,
    mirror: Arc<CloudMirror>,
    queue: Arc<PendingQueue>,
    store: Arc<RecordStore>,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        remote: Arc<dyn RemoteFile>,
        kv: Arc<dyn KvStore>,
        local_dir: Handle,
        cache_ttl: Duration,
    ) -> Result<Self> {
        let settings = FeatureSettings::new(kv.clone());
        let resolver = Arc::new(LocationResolver::new(backend, settings.clone(), local_dir));
        let mirror = Arc::new(CloudMirror::new(
            resolver.clone(),
            remote,
            settings.clone(),
        ));
        let queue = Arc::new(PendingQueue::load(kv, mirror.clone())?);
        let store = Arc::new(RecordStore::new(
            resolver.clone(),
            mirror.clone(),
            queue.clone(),
            cache_ttl,
        ));
        Ok(Self {
            settings,
            resolver,
            mirror,
            queue,
            store,
        })
    }

    pub fn list(&self, feature: Feature) -> ListApi {
        ListApi {
            feature,
            settings: self.settings.clone(),
            mirror: self.mirror.clone(),
            queue: self.queue.clone(),
            store: self.store.clone(),
        }
    }

    /// Register the retry triggers and drain leftovers from the previous session.
    pub fn start(
        &self,
        connectivity: &dyn TriggerSource,
        foreground: &dyn TriggerSource,
    ) -> Option<DrainReport> {
        self.queue.start(connectivity, foreground)
    }

    pub fn settings(&self) -> &FeatureSettings {
        &self.settings
    }

    pub fn resolver(&self) -> &Arc<LocationResolver> {
        &self.resolver
    }

    pub fn mirror(&self) -> &Arc<CloudMirror> {
        &self.mirror
    }

    pub fn queue(&self) -> &Arc<PendingQueue> {
        &self.queue
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }
}

/// Where the records returned by [`ListApi::refresh`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSource {
    /// Pulled from the remote, then re-read.
    Remote,
    /// Not mirrored; re-read from the local file.
    Local,
    /// The pull failed; these are the last known records.
    StaleFallback { error: String },
    /// Local writes are still waiting to be pushed, so the remote was not pulled over
    /// them. These are the local records.
    LocalAhead,
}

#[derive(Debug, Clone)]
pub struct Refresh {
    pub records: Vec<Record>,
    pub source: RefreshSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached(PickedRemote),
    Cancelled,
}

/// Operations on one feature's list.
#[derive(Clone)]
pub struct ListApi {
    feature: Feature,
    settings: FeatureSettings,
    mirror: Arc<CloudMirror>,
    queue: Arc<PendingQueue>,
    store: Arc<RecordStore>,
}

impl ListApi {
    pub fn feature(&self) -> &Feature {
        &self.feature
    }

    pub fn read_all(&self, force_refresh: bool) -> Result<Vec<Record>> {
        self.store.read_all(&self.feature, force_refresh)
    }

    pub fn read_all_detailed(&self, force_refresh: bool) -> Result<Snapshot> {
        self.store.read_all_detailed(&self.feature, force_refresh)
    }

    pub fn append(&self, record: Record) -> Result<MirrorOutcome> {
        self.store.append(&self.feature, record)
    }

    pub fn remove_by_id(&self, id: &str) -> Result<MirrorOutcome> {
        self.store.remove_by_id(&self.feature, id)
    }

    pub fn remove_by_ids<I: AsRef<str>>(&self, ids: &[I]) -> Result<MirrorOutcome> {
        self.store.remove_by_ids(&self.feature, ids)
    }

    pub fn ensure_file(&self) -> Result<()> {
        self.store.ensure_file(&self.feature)
    }

    pub fn file_info(&self) -> Result<FileInfo> {
        self.store.file_info(&self.feature)
    }

    pub fn total_price(&self) -> Result<f64> {
        Ok(total_price(&self.read_all(false)?))
    }

    pub fn is_mirrored(&self) -> Result<bool> {
        self.mirror.is_mirrored(&self.feature)
    }

    pub fn remote(&self) -> Result<Option<PickedRemote>> {
        self.settings.remote(&self.feature)
    }

    /// Attach a remote and seed the local file from it. On failure nothing changes.
    pub fn attach_remote(&self, picked: &PickedRemote) -> Result<()> {
        let attached = self.mirror.attach_remote(&self.feature, picked);
        self.store.invalidate(&self.feature);
        attached
    }

    /// Ask the picker for a remote and attach it. Cancelling is not an error.
    pub fn attach_with_picker(&self, picker: &dyn RemotePicker) -> Result<AttachOutcome> {
        match picker.pick() {
            Some(picked) => {
                self.attach_remote(&picked)?;
                Ok(AttachOutcome::Attached(picked))
            }
            None => {
                info!(feature = %self.feature, "remote selection cancelled");
                Ok(AttachOutcome::Cancelled)
            }
        }
    }

    pub fn detach_remote(&self) -> Result<()> {
        self.mirror.detach_remote(&self.feature)
    }

    /// Pull from the remote if mirrored, then re-read. A failed pull falls back to the
    /// last known records and says so in [`Refresh::source`].
    ///
    /// A pending feature is pushed first. If it is still pending afterwards the pull is
    /// skipped, since it would overwrite writes the remote has not seen.
    pub fn refresh(&self) -> Result<Refresh> {
        if self.queue.is_pending(&self.feature) {
            self.queue.drain();
            if self.queue.is_pending(&self.feature) {
                warn!(feature = %self.feature, "local writes not pushed yet, skipping pull");
                return Ok(Refresh {
                    records: self.read_all(false)?,
                    source: RefreshSource::LocalAhead,
                });
            }
        }
        match self.store.pull_remote(&self.feature) {
            Ok(pulled) => {
                let records = self.read_all(true)?;
                let source = if pulled {
                    RefreshSource::Remote
                } else {
                    RefreshSource::Local
                };
                Ok(Refresh { records, source })
            }
            Err(e) => {
                warn!(feature = %self.feature, error = %e, "refresh could not pull remote");
                Ok(Refresh {
                    records: self.read_all(false)?,
                    source: RefreshSource::StaleFallback {
                        error: e.to_string(),
                    },
                })
            }
        }
    }

    /// Store the feature's file in `dir` from now on. Existing data is not moved.
    pub fn set_location(&self, dir: &str) -> Result<()> {
        self.settings.set_location(&self.feature, dir)?;
        self.store.invalidate(&self.feature);
        Ok(())
    }

    pub fn clear_location(&self) -> Result<()> {
        self.settings.clear_location(&self.feature)?;
        self.store.invalidate(&self.feature);
        Ok(())
    }

    pub fn location(&self) -> Result<Option<String>> {
        self.settings.location(&self.feature)
    }

    pub fn is_pending(&self) -> bool {
        self.queue.is_pending(&self.feature)
    }

    /// Drain the pending queue now, for every feature.
    pub fn sync_now(&self) -> DrainReport {
        self.queue.drain()
    }
}
