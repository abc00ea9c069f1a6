use super::backend::StorageBackend;
use crate::codec;
use crate::error::Result;
use crate::location::LocationResolver;
use crate::mirror::CloudMirror;
use crate::model::{Feature, FileInfo, Record};
use crate::pending::PendingQueue;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// Counts of rows dropped while decoding a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub duplicates_dropped: usize,
    pub malformed_dropped: usize,
}

/// Records as returned to callers, with where they came from.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub records: Vec<Record>,
    pub report: LoadReport,
    pub from_cache: bool,
    pub loaded_at: DateTime<Utc>,
}

/// What happened to the remote mirror after a local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    /// The feature is not mirrored.
    LocalOnly,
    Pushed,
    /// The push failed and the feature is now pending.
    Queued,
    /// Nothing changed, nothing was written.
    Unchanged,
}

struct CacheEntry {
    records: Vec<Record>,
    report: LoadReport,
    fetched: Instant,
    loaded_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(records: Vec<Record>, report: LoadReport) -> Self {
        Self {
            records,
            report,
            fetched: Instant::now(),
            loaded_at: Utc::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched.elapsed() < ttl
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            records: self.records.clone(),
            report: self.report,
            from_cache: true,
            loaded_at: self.loaded_at,
        }
    }
}

/// Owns the decoded records of every feature and keeps them coherent with the files.
///
/// Reads are served from a per-feature cache until it is older than the TTL. Writes go
/// to the file first, then update the cache, then try to push to the mirror. A failed push
/// never fails the write: the feature is handed to the [`PendingQueue`] instead.
pub struct RecordStore {
    resolver: Arc<LocationResolver>,
    mirror: Arc<CloudMirror>,
    queue: Arc<PendingQueue>,
    ttl: Duration,
    cache: Mutex<HashMap<Feature, CacheEntry>>,
}

impl RecordStore {
    pub fn new(
        resolver: Arc<LocationResolver>,
        mirror: Arc<CloudMirror>,
        queue: Arc<PendingQueue>,
        ttl: Duration,
    ) -> Self {
        Self {
            resolver,
            mirror,
            queue,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn backend(&self) -> &Arc<dyn StorageBackend> {
        self.resolver.backend()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<Feature, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fresh_snapshot(&self, feature: &Feature) -> Option<Snapshot> {
        self.cache()
            .get(feature)
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(CacheEntry::snapshot)
    }

    pub fn read_all(&self, feature: &Feature, force_refresh: bool) -> Result<Vec<Record>> {
        Ok(self.read_all_detailed(feature, force_refresh)?.records)
    }

    /// Like [`RecordStore::read_all`], with drop counts and cache provenance.
    ///
    /// A local read failure degrades to an empty list, which is not cached.
    pub fn read_all_detailed(&self, feature: &Feature, force_refresh: bool) -> Result<Snapshot> {
        if !force_refresh {
            if let Some(snapshot) = self.fresh_snapshot(feature) {
                debug!(feature = %feature, count = snapshot.records.len(), "cache hit");
                return Ok(snapshot);
            }
        }

        match self.load_from_file(feature) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                warn!(feature = %feature, error = %e, "could not read list file, returning empty list");
                Ok(Snapshot {
                    records: Vec::new(),
                    report: LoadReport::default(),
                    from_cache: false,
                    loaded_at: Utc::now(),
                })
            }
        }
    }

    /// Records for a mutation: cached if fresh, otherwise from the file. Read errors propagate
    /// so a failed read can never turn into a rewrite with an empty list.
    fn records_for_update(&self, feature: &Feature) -> Result<Vec<Record>> {
        match self.fresh_snapshot(feature) {
            Some(snapshot) => Ok(snapshot.records),
            None => Ok(self.load_from_file(feature)?.records),
        }
    }

    fn load_from_file(&self, feature: &Feature) -> Result<Snapshot> {
        let resolved = self.resolver.resolve_file(feature)?;
        let text = self
            .backend()
            .read_text(&resolved.handle)?
            .unwrap_or_default();

        let decoded = codec::decode_file(&text);
        let mut seen = HashSet::new();
        let mut records = Vec::with_capacity(decoded.records.len());
        let mut report = LoadReport {
            malformed_dropped: decoded.malformed,
            ..Default::default()
        };
        for record in decoded.records {
            if seen.insert(record.id.clone()) {
                records.push(record);
            } else {
                warn!(feature = %feature, id = %record.id, "dropping duplicate record id");
                report.duplicates_dropped += 1;
            }
        }
        if report.malformed_dropped > 0 {
            warn!(feature = %feature, count = report.malformed_dropped, "dropped malformed rows");
        }
        debug!(feature = %feature, count = records.len(), file = %resolved.handle, "loaded list file");

        let entry = CacheEntry::new(records, report);
        let snapshot = Snapshot {
            from_cache: false,
            ..entry.snapshot()
        };
        self.cache().insert(feature.clone(), entry);
        Ok(snapshot)
    }

    /// Create the feature's file with just the header if it does not exist.
    pub fn ensure_file(&self, feature: &Feature) -> Result<()> {
        self.resolver.ensure_file(feature)?;
        Ok(())
    }

    /// Append one row without rewriting the file.
    pub fn append(&self, feature: &Feature, record: Record) -> Result<MirrorOutcome> {
        record.validate()?;
        let resolved = self.resolver.ensure_file(feature)?;
        let mut line = String::new();
        if !self.backend().ends_with_newline(&resolved.handle)? {
            debug!(feature = %feature, "list file lacks a final newline, adding one");
            line.push('\n');
        }
        line.push_str(&codec::encode(&record));
        line.push('\n');
        self.backend().append_text(&resolved.handle, &line)?;

        {
            let mut cache = self.cache();
            let warm = cache
                .get(feature)
                .is_some_and(|entry| entry.is_fresh(self.ttl));
            if warm {
                if let Some(entry) = cache.get_mut(feature) {
                    if entry.records.iter().any(|r| r.id == record.id) {
                        warn!(feature = %feature, id = %record.id, "appended an id that already exists");
                        entry.report.duplicates_dropped += 1;
                    } else {
                        entry.records.push(record);
                    }
                }
            } else {
                cache.remove(feature);
            }
        }

        Ok(self.mirror_after_write(feature))
    }

    pub fn remove_by_id(&self, feature: &Feature, id: &str) -> Result<MirrorOutcome> {
        self.remove_by_ids(feature, &[id])
    }

    /// Drop every record whose id is in `ids` and rewrite the file.
    pub fn remove_by_ids<I: AsRef<str>>(&self, feature: &Feature, ids: &[I]) -> Result<MirrorOutcome> {
        let doomed: HashSet<&str> = ids.iter().map(AsRef::as_ref).collect();
        let records = self.records_for_update(feature)?;
        let before = records.len();
        let remaining: Vec<Record> = records
            .into_iter()
            .filter(|r| !doomed.contains(r.id.as_str()))
            .collect();
        if remaining.len() == before {
            debug!(feature = %feature, "nothing to remove");
            return Ok(MirrorOutcome::Unchanged);
        }

        let resolved = self.resolver.ensure_file(feature)?;
        self.backend()
            .write_text(&resolved.handle, &codec::encode_file(&remaining))?;
        debug!(feature = %feature, removed = before - remaining.len(), "rewrote list file");
        self.cache()
            .insert(feature.clone(), CacheEntry::new(remaining, LoadReport::default()));

        Ok(self.mirror_after_write(feature))
    }

    fn mirror_after_write(&self, feature: &Feature) -> MirrorOutcome {
        match self.mirror.push_from_local(feature) {
            Ok(true) => MirrorOutcome::Pushed,
            Ok(false) => MirrorOutcome::LocalOnly,
            Err(e) => {
                warn!(feature = %feature, error = %e, "push after write failed, queueing retry");
                if let Err(e) = self.queue.enqueue(feature) {
                    warn!(feature = %feature, error = %e, "could not persist pending sync");
                }
                MirrorOutcome::Queued
            }
        }
    }

    /// Pull the remote into the local file and drop the cache. Errors propagate.
    pub fn pull_remote(&self, feature: &Feature) -> Result<bool> {
        let pulled = self.mirror.pull_to_local(feature)?;
        if pulled {
            self.invalidate(feature);
        }
        Ok(pulled)
    }

    pub fn invalidate(&self, feature: &Feature) {
        self.cache().remove(feature);
    }

    pub fn file_info(&self, feature: &Feature) -> Result<FileInfo> {
        let resolved = self.resolver.resolve_file(feature)?;
        let size = self.backend().size(&resolved.handle)?;
        let item_count = match size {
            Some(_) => self.read_all(feature, false)?.len(),
            None => 0,
        };
        Ok(FileInfo {
            exists: size.is_some(),
            size_bytes: size.unwrap_or(0),
            item_count,
            path: resolved.handle.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CartError;
    use crate::test_utils::MemEnv;
    use std::thread;

    fn seed(env: &MemEnv, rows: &[&str]) {
        let mut text = codec::header_line();
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        env.backend.put_file(&env.local_file(), &text);
    }

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let env = MemEnv::new();
        let records = env.store.read_all(&MemEnv::feature(), false).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_scenario_then_remove() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,Market,3.50,Alice", "2,Bread,1,,,Bob"]);

        let records = env.store.read_all(&feature, false).unwrap();
        assert_eq!(names(&records), vec!["Milk", "Bread"]);

        env.store.remove_by_id(&feature, "1").unwrap();
        let records = env.store.read_all(&feature, false).unwrap();
        assert_eq!(names(&records), vec!["Bread"]);
        assert_eq!(
            env.backend.content(&env.local_file()).unwrap(),
            format!("{}\n2,Bread,1,,,Bob\n", codec::HEADER)
        );
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(
            &env,
            &["1,Milk,2,,,", "2,Bread,1,,,", "1,Milk again,5,,,", "short,row"],
        );

        let snapshot = env.store.read_all_detailed(&feature, false).unwrap();
        assert_eq!(names(&snapshot.records), vec!["Milk", "Bread"]);
        assert_eq!(snapshot.report.duplicates_dropped, 1);
        assert_eq!(snapshot.report.malformed_dropped, 1);
        assert!(!snapshot.from_cache);
    }

    #[test]
    fn test_append_to_warm_cache_does_not_read_file() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        env.store.read_all(&feature, false).unwrap();

        let bread = Record::new("Bread");
        env.store.append(&feature, bread.clone()).unwrap();
        env.backend.set_simulate_read_error(true);

        let snapshot = env.store.read_all_detailed(&feature, false).unwrap();
        assert!(snapshot.from_cache);
        assert_eq!(snapshot.records.last(), Some(&bread));
        assert_eq!(snapshot.records.len(), 2);
    }

    #[test]
    fn test_append_with_cold_cache_reads_from_file() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        env.store.append(&feature, Record::new("Milk")).unwrap();
        let reads_before = env.backend.read_count();

        let snapshot = env.store.read_all_detailed(&feature, false).unwrap();
        assert!(!snapshot.from_cache);
        assert_eq!(names(&snapshot.records), vec!["Milk"]);
        assert_eq!(env.backend.read_count(), reads_before + 1);
    }

    #[test]
    fn test_append_does_not_rewrite_existing_rows() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,Market,3.50,Alice"]);
        let record = Record::new("Eggs, large").with_id("2").quantity("12");
        env.store.append(&feature, record).unwrap();

        assert_eq!(
            env.backend.content(&env.local_file()).unwrap(),
            format!(
                "{}\n1,Milk,2,Market,3.50,Alice\n2,\"Eggs, large\",12,,,\n",
                codec::HEADER
            )
        );
    }

    #[test]
    fn test_append_after_row_without_final_newline() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        let text = format!("{}\n1,Milk,2,Market,3.50,Alice", codec::HEADER);
        env.backend.put_file(&env.local_file(), &text);

        env.store
            .append(&feature, Record::new("Bread").with_id("2"))
            .unwrap();

        assert_eq!(
            env.backend.content(&env.local_file()).unwrap(),
            format!("{text}\n2,Bread,1,,,\n")
        );
        let records = env.store.read_all(&feature, true).unwrap();
        assert_eq!(names(&records), vec!["Milk", "Bread"]);
        assert_eq!(records[0].added_by, "Alice");
    }

    #[test]
    fn test_append_rejects_blank_name() {
        let env = MemEnv::new();
        let result = env.store.append(&MemEnv::feature(), Record::new("  "));
        assert!(matches!(result, Err(CartError::InvalidRecord(_))));
        assert!(!env.backend.exists(&env.local_file()).unwrap());
    }

    #[test]
    fn test_append_write_failure_propagates() {
        let env = MemEnv::new();
        env.backend.set_simulate_write_error(true);
        assert!(env
            .store
            .append(&MemEnv::feature(), Record::new("Milk"))
            .is_err());
    }

    #[test]
    fn test_cache_expires_after_ttl() {
        let env = MemEnv::with_ttl(Duration::from_millis(50));
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        env.store.read_all(&feature, false).unwrap();

        seed(&env, &["1,Milk,2,,,", "2,Bread,1,,,"]);
        assert_eq!(env.store.read_all(&feature, false).unwrap().len(), 1);

        thread::sleep(Duration::from_millis(80));
        assert_eq!(env.store.read_all(&feature, false).unwrap().len(), 2);
    }

    #[test]
    fn test_force_refresh_bypasses_fresh_cache() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        env.store.read_all(&feature, false).unwrap();

        seed(&env, &["1,Milk,2,,,", "2,Bread,1,,,"]);
        assert_eq!(env.store.read_all(&feature, true).unwrap().len(), 2);
    }

    #[test]
    fn test_read_error_degrades_to_empty_and_is_not_cached() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        env.backend.set_simulate_read_error(true);
        assert!(env.store.read_all(&feature, false).unwrap().is_empty());

        env.backend.set_simulate_read_error(false);
        assert_eq!(env.store.read_all(&feature, false).unwrap().len(), 1);
    }

    #[test]
    fn test_remove_with_read_error_does_not_wipe_file() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,", "2,Bread,1,,,"]);
        env.backend.set_simulate_read_error(true);

        assert!(env.store.remove_by_id(&feature, "1").is_err());
        assert!(env.backend.content(&env.local_file()).unwrap().contains("Bread"));
    }

    #[test]
    fn test_remove_by_ids_removes_set() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,", "2,Bread,1,,,", "3,Eggs,12,,,"]);

        env.store.remove_by_ids(&feature, &["1", "3", "404"]).unwrap();
        let records = env.store.read_all(&feature, true).unwrap();
        assert_eq!(names(&records), vec!["Bread"]);
    }

    #[test]
    fn test_remove_unknown_id_is_unchanged() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        let outcome = env.store.remove_by_id(&feature, "404").unwrap();
        assert_eq!(outcome, MirrorOutcome::Unchanged);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        seed(&env, &["1,Milk,2,,,"]);
        let mut records = env.store.read_all(&feature, false).unwrap();
        records.clear();
        assert_eq!(env.store.read_all(&feature, false).unwrap().len(), 1);
    }

    #[test]
    fn test_write_pushes_when_mirrored() {
        let env = MemEnv::new();
        env.attach_fresh_remote();
        let feature = MemEnv::feature();

        let outcome = env.store.append(&feature, Record::new("Milk")).unwrap();
        assert_eq!(outcome, MirrorOutcome::Pushed);
        assert!(env.remote.get(MemEnv::REMOTE_URI).unwrap().contains("Milk"));
        assert!(!env.queue.is_pending(&feature));
    }

    #[test]
    fn test_failed_push_is_queued_not_raised() {
        let env = MemEnv::new();
        env.attach_fresh_remote();
        let feature = MemEnv::feature();
        env.remote.set_unreachable(true);

        let outcome = env.store.append(&feature, Record::new("Milk")).unwrap();
        assert_eq!(outcome, MirrorOutcome::Queued);
        assert!(env.queue.is_pending(&feature));

        let outcome = env.store.remove_by_ids(&feature, &[] as &[&str]).unwrap();
        assert_eq!(outcome, MirrorOutcome::Unchanged);
    }

    #[test]
    fn test_local_only_outcome() {
        let env = MemEnv::new();
        let outcome = env
            .store
            .append(&MemEnv::feature(), Record::new("Milk"))
            .unwrap();
        assert_eq!(outcome, MirrorOutcome::LocalOnly);
        assert_eq!(env.remote.write_count(), 0);
    }

    #[test]
    fn test_file_info() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        let info = env.store.file_info(&feature).unwrap();
        assert!(!info.exists);
        assert_eq!(info.item_count, 0);

        seed(&env, &["1,Milk,2,,,", "2,Bread,1,,,"]);
        let info = env.store.file_info(&feature).unwrap();
        assert!(info.exists);
        assert_eq!(info.item_count, 2);
        assert_eq!(info.path, env.local_file().to_string());
        assert_eq!(
            info.size_bytes,
            env.backend.content(&env.local_file()).unwrap().len() as u64
        );
    }

    #[test]
    fn test_ensure_file_twice_keeps_single_header() {
        let env = MemEnv::new();
        let feature = MemEnv::feature();
        env.store.ensure_file(&feature).unwrap();
        env.store.ensure_file(&feature).unwrap();
        assert_eq!(
            env.backend.content(&env.local_file()).unwrap(),
            codec::header_line()
        );
    }
}
