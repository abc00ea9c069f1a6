//! # Pending-Sync Queue
//!
//! A durable set of features whose remote mirror may be behind the local file.
//!
//! ## Invariant
//!
//! A feature is pending if and only if its last push failed and no push has succeeded
//! since. The set lives in memory and is written to the key-value store (`pending_sync`,
//! a JSON list) on every mutation, so a restart picks up exactly where the last process
//! left off.
//!
//! ## Draining
//!
//! [`PendingQueue::drain`] retries the push for every pending feature:
//!
//! 1. Only one drain runs at a time. A drain requested while another is in flight returns
//!    immediately with [`DrainReport::skipped`] set.
//! 2. The pass works on a snapshot taken at its start. Features enqueued meanwhile wait for
//!    the next pass.
//! 3. A successful push removes the marker, unless the feature was re-enqueued during the
//!    pass (a newer write failed to push and the remote is behind again).
//! 4. A failed push keeps the marker and the pass moves on.
//! 5. The resulting set is persisted and the draining flag cleared, whatever happened.
//!
//! ## Triggers
//!
//! [`PendingQueue::start`] subscribes `drain` to the connectivity-restored and
//! app-foregrounded sources and runs one drain for markers left by a previous session.
//! Calling it again is a no-op.

use crate::error::Result;
use crate::mirror::CloudMirror;
use crate::model::Feature;
use crate::settings::{KvStore, PENDING_SYNC_KEY};
use crate::triggers::TriggerSource;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Default)]
struct Markers {
    pending: BTreeSet<Feature>,
    /// Features enqueued while a drain was running.
    touched: HashSet<Feature>,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Another drain was already running, or there was nothing to do.
    pub skipped: bool,
    pub synced: Vec<Feature>,
    pub failed: Vec<Feature>,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.synced.len() + self.failed.len()
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct PendingQueue {
    kv: Arc<dyn KvStore>,
    mirror: Arc<CloudMirror>,
    markers: Mutex<Markers>,
    draining: AtomicBool,
    started: AtomicBool,
}

impl PendingQueue {
    /// Load the persisted set. Called once per process.
    pub fn load(kv: Arc<dyn KvStore>, mirror: Arc<CloudMirror>) -> Result<Self> {
        let pending = match kv.get(PENDING_SYNC_KEY)? {
            Some(raw) => match serde_json::from_str::<Vec<Feature>>(&raw) {
                Ok(features) => features.into_iter().collect(),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable pending-sync list");
                    BTreeSet::new()
                }
            },
            None => BTreeSet::new(),
        };
        if !pending.is_empty() {
            info!(count = pending.len(), "loaded pending syncs from previous session");
        }
        Ok(Self {
            kv,
            mirror,
            markers: Mutex::new(Markers {
                pending,
                touched: HashSet::new(),
            }),
            draining: AtomicBool::new(false),
            started: AtomicBool::new(false),
        })
    }

    fn markers(&self) -> MutexGuard<'_, Markers> {
        self.markers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, pending: &BTreeSet<Feature>) -> Result<()> {
        let list: Vec<&Feature> = pending.iter().collect();
        let raw = serde_json::to_string(&list)?;
        self.kv.set(PENDING_SYNC_KEY, &raw)
    }

    /// Mark a feature as needing a push. Idempotent.
    pub fn enqueue(&self, feature: &Feature) -> Result<()> {
        let mut markers = self.markers();
        if self.draining.load(Ordering::SeqCst) {
            markers.touched.insert(feature.clone());
        }
        if markers.pending.insert(feature.clone()) {
            debug!(feature = %feature, "queued pending sync");
        }
        self.persist(&markers.pending)
    }

    pub fn is_pending(&self, feature: &Feature) -> bool {
        self.markers().pending.contains(feature)
    }

    pub fn pending(&self) -> Vec<Feature> {
        self.markers().pending.iter().cloned().collect()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Retry the push for every pending feature. See the module docs for the rules.
    pub fn drain(&self) -> DrainReport {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("drain already running");
            return DrainReport::skipped();
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot: Vec<Feature> = {
            let mut markers = self.markers();
            markers.touched.clear();
            markers.pending.iter().cloned().collect()
        };
        if snapshot.is_empty() {
            return DrainReport::skipped();
        }

        let mut report = DrainReport::default();
        for feature in snapshot {
            match self.mirror.push_from_local(&feature) {
                Ok(_) => report.synced.push(feature),
                Err(e) => {
                    warn!(feature = %feature, error = %e, "pending sync failed, will retry");
                    report.failed.push(feature);
                }
            }
        }

        let mut markers = self.markers();
        for feature in &report.synced {
            if !markers.touched.contains(feature) {
                markers.pending.remove(feature);
            }
        }
        markers.touched.clear();
        if let Err(e) = self.persist(&markers.pending) {
            warn!(error = %e, "could not persist pending-sync list");
        }
        info!(
            synced = report.synced.len(),
            failed = report.failed.len(),
            remaining = markers.pending.len(),
            "drain finished"
        );
        report
    }

    /// Subscribe to the wake-up sources and drain once for leftovers from a previous run.
    ///
    /// Returns `None` if the queue was already started.
    pub fn start(
        self: &Arc<Self>,
        connectivity: &dyn TriggerSource,
        foreground: &dyn TriggerSource,
    ) -> Option<DrainReport> {
        if self.started.swap(true, Ordering::SeqCst) {
            return None;
        }
        for source in [connectivity, foreground] {
            let queue = Arc::downgrade(self);
            source.subscribe(Arc::new(move || {
                if let Some(queue) = queue.upgrade() {
                    queue.drain();
                }
            }));
        }
        Some(self.drain())
    }
}
