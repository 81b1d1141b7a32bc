//! Indexed Store: one Record Log plus an Ordered and a Point Index per
//! entity kind.
//!
//! On-disk files for a kind with stem `students`:
//! - `students.dat`: the Record Log
//! - `students.idx`: Ordered Index side-file
//! - `students.hash`: Point Index side-file
//!
//! The store is the only mutation path, so both indexes always map a key to
//! the same Location. The side-files are a derived cache: when one is missing,
//! corrupted or disagrees with the log, the indexes are rebuilt by scanning
//! the log.

use crate::btree::OrderedIndex;
use crate::entity::{Entity, EntityKind};
use crate::hash::PointIndex;
use crate::log::{Location, RecordLog};
use crate::sidefile::{IndexKind, SideFile};
use quadra_common::{QuadraError, Result, StorageConfig};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Extension of the Record Log file.
pub const LOG_EXTENSION: &str = "dat";
/// Extension of the Ordered Index side-file.
pub const ORDERED_EXTENSION: &str = "idx";
/// Extension of the Point Index side-file.
pub const HASH_EXTENSION: &str = "hash";

/// Keyed, persistent collection of one entity kind.
pub struct IndexedStore<E: Entity> {
    log: RecordLog,
    ordered: OrderedIndex<Location>,
    point: PointIndex<Location>,
    ordered_path: PathBuf,
    hash_path: PathBuf,
    initial_buckets: usize,
    max_load_factor: f64,
    fsync: bool,
    dirty: bool,
    _entity: PhantomData<E>,
}

impl<E: Entity> std::fmt::Debug for IndexedStore<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedStore")
            .field("kind", &E::KIND)
            .field("log", &self.log.path())
            .field("len", &self.ordered.len())
            .finish()
    }
}

impl<E: Entity> IndexedStore<E> {
    /// Opens the store for `E` inside `config.data_dir`.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        Self::open_in(&config.data_dir, E::KIND.file_stem(), config)
    }

    /// Opens the store with an explicit directory and file stem.
    pub fn open_in(dir: &Path, stem: &str, config: &StorageConfig) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let log = RecordLog::open(dir.join(format!("{}.{}", stem, LOG_EXTENSION)), config.fsync_enabled)?;

        let mut store = Self {
            log,
            ordered: OrderedIndex::new(),
            point: PointIndex::with_load_factor(
                config.hash_initial_buckets,
                config.hash_max_load_factor,
            ),
            ordered_path: dir.join(format!("{}.{}", stem, ORDERED_EXTENSION)),
            hash_path: dir.join(format!("{}.{}", stem, HASH_EXTENSION)),
            initial_buckets: config.hash_initial_buckets,
            max_load_factor: config.hash_max_load_factor,
            fsync: config.fsync_enabled,
            dirty: false,
            _entity: PhantomData,
        };

        let mut needs_rebuild = match store.load_side_files() {
            Ok(true) => false,
            Ok(false) => {
                if store.log.live_count() > 0 {
                    warn!(kind = %E::KIND, "Index side-file missing, rebuilding from log");
                    true
                } else {
                    false
                }
            }
            Err(e) => {
                warn!(kind = %E::KIND, error = %e, "Index side-file unreadable, rebuilding from log");
                true
            }
        };

        if !needs_rebuild && config.verify_on_open {
            if let Err(e) = store.verify() {
                warn!(kind = %E::KIND, error = %e, "Index verification failed, rebuilding from log");
                needs_rebuild = true;
            }
        }
        if needs_rebuild {
            store.rebuild_indexes()?;
        }

        info!(kind = %E::KIND, records = store.len(), "Opened store");
        Ok(store)
    }

    /// Restores both indexes from their side-files. Returns false if either
    /// is absent, leaving the indexes empty.
    fn load_side_files(&mut self) -> Result<bool> {
        let ordered = SideFile::read(&self.ordered_path)?;
        let hashed = SideFile::read(&self.hash_path)?;
        let (Some(ordered), Some(hashed)) = (ordered, hashed) else {
            return Ok(false);
        };

        let wrong_kind = |path: &Path, expected: IndexKind| QuadraError::SideFileCorrupted {
            path: path.to_path_buf(),
            reason: format!("expected {:?} index", expected),
        };
        if ordered.kind != IndexKind::Ordered {
            return Err(wrong_kind(&self.ordered_path, IndexKind::Ordered));
        }
        if hashed.kind != IndexKind::Hash || hashed.bucket_count == 0 {
            return Err(wrong_kind(&self.hash_path, IndexKind::Hash));
        }

        for (key, loc) in ordered.entries {
            self.ordered.insert(&key, loc);
        }
        self.point = PointIndex::with_load_factor(hashed.bucket_count as usize, self.max_load_factor);
        for (key, loc) in hashed.entries {
            self.point.insert(&key, loc);
        }
        Ok(true)
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(QuadraError::InvalidKey(format!("empty {} key", E::KIND)));
        }
        if key.len() > u16::MAX as usize {
            return Err(QuadraError::InvalidKey(format!(
                "{} key of {} bytes exceeds {}",
                E::KIND,
                key.len(),
                u16::MAX
            )));
        }
        Ok(())
    }

    /// Entity kind held by this store.
    pub fn kind(&self) -> EntityKind {
        E::KIND
    }

    /// Number of entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Adds an entity. An existing key is updated in place instead.
    pub fn add(&mut self, entity: &E) -> Result<()> {
        let key = entity.key();
        Self::check_key(&key)?;
        if self.point.contains(&key) {
            self.update(entity)?;
            return Ok(());
        }

        let loc = self.log.append(&entity.encode())?;
        self.ordered.insert(&key, loc);
        self.point.insert(&key, loc);
        self.dirty = true;
        debug!(kind = %E::KIND, key = %key, "Added record");
        Ok(())
    }

    /// Looks up an entity by key.
    pub fn get(&self, key: &str) -> Result<Option<E>> {
        match self.point.get(key) {
            Some(&loc) => E::decode(self.log.read(loc)?).map(Some),
            None => Ok(None),
        }
    }

    /// Replaces an existing entity. Returns false if the key is absent.
    pub fn update(&mut self, entity: &E) -> Result<bool> {
        let key = entity.key();
        let Some(&loc) = self.point.get(&key) else {
            return Ok(false);
        };
        self.log.overwrite(loc, &entity.encode())?;
        Ok(true)
    }

    /// Removes an entity. Returns false if the key is absent.
    pub fn remove(&mut self, key: &str) -> Result<bool> {
        let Some(&loc) = self.point.get(key) else {
            return Ok(false);
        };
        self.log.abandon(loc)?;
        self.ordered.remove(key);
        self.point.remove(key);
        self.dirty = true;
        debug!(kind = %E::KIND, key = %key, "Removed record");
        Ok(true)
    }

    /// Returns true if `key` is present.
    #[inline]
    pub fn exists(&self, key: &str) -> bool {
        self.point.contains(key)
    }

    /// Every entity, ascending by key.
    pub fn get_all(&self) -> Result<Vec<E>> {
        self.ordered
            .pairs()
            .into_iter()
            .map(|(_, loc)| E::decode(self.log.read(loc)?))
            .collect()
    }

    /// Every key, ascending.
    pub fn keys(&self) -> Vec<String> {
        self.ordered.keys()
    }

    /// Writes both side-files if the indexes changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let ordered = SideFile {
            kind: IndexKind::Ordered,
            bucket_count: 0,
            entries: self.ordered.pairs(),
        };
        let bucket_count = u32::try_from(self.point.bucket_count()).map_err(|_| {
            QuadraError::IndexInconsistent(format!(
                "{} point index has {} buckets",
                E::KIND,
                self.point.bucket_count()
            ))
        })?;
        let hashed = SideFile {
            kind: IndexKind::Hash,
            bucket_count,
            entries: self.point.pairs(),
        };
        ordered.write(&self.ordered_path, self.fsync)?;
        hashed.write(&self.hash_path, self.fsync)?;
        self.dirty = false;
        debug!(kind = %E::KIND, records = self.len(), "Flushed index side-files");
        Ok(())
    }

    /// Checks that both indexes agree with each other and with the log.
    pub fn verify(&self) -> Result<()> {
        let fault = |msg: String| QuadraError::IndexInconsistent(format!("{}: {}", E::KIND, msg));

        self.ordered.check_invariants()?;
        if self.ordered.len() != self.point.len() {
            return Err(fault(format!(
                "ordered index has {} keys, point index has {}",
                self.ordered.len(),
                self.point.len()
            )));
        }

        let mut indexed = HashSet::with_capacity(self.ordered.len());
        for (key, loc) in self.ordered.pairs() {
            match self.point.get(&key) {
                Some(&p) if p == loc => {}
                Some(_) => return Err(fault(format!("indexes disagree on location of {:?}", key))),
                None => return Err(fault(format!("key {:?} missing from point index", key))),
            }
            let line = self
                .log
                .read(loc)
                .map_err(|_| fault(format!("key {:?} points at a dead slot", key)))?;
            let entity = E::decode(line)
                .map_err(|e| fault(format!("key {:?} record does not decode: {}", key, e)))?;
            if entity.key() != key {
                return Err(fault(format!(
                    "key {:?} points at the record for {:?}",
                    key,
                    entity.key()
                )));
            }
            indexed.insert(loc);
        }

        for (loc, line) in self.log.scan() {
            if indexed.contains(&loc) {
                continue;
            }
            match E::decode(line) {
                Ok(entity) => {
                    return Err(fault(format!("live record for {:?} is not indexed", entity.key())));
                }
                Err(e) => debug!(kind = %E::KIND, error = %e, "Ignoring undecodable record"),
            }
        }
        Ok(())
    }

    /// Clears both indexes and rebuilds them from the log.
    ///
    /// When a key has several live records, the last one wins and the
    /// earlier ones are abandoned. Records that fail to decode are skipped.
    pub fn rebuild_indexes(&mut self) -> Result<()> {
        self.ordered.clear();
        self.point = PointIndex::with_load_factor(self.initial_buckets, self.max_load_factor);

        let mut found = Vec::new();
        let mut skipped = 0usize;
        for (loc, line) in self.log.scan() {
            match E::decode(line) {
                Ok(entity) if !entity.key().is_empty() => found.push((entity.key(), loc)),
                Ok(_) => skipped += 1,
                Err(e) => {
                    warn!(kind = %E::KIND, location = loc.0, error = %e, "Skipping undecodable record");
                    skipped += 1;
                }
            }
        }

        let mut superseded = Vec::new();
        for (key, loc) in found {
            if let Some(&old) = self.point.get(&key) {
                superseded.push(old);
            }
            self.ordered.insert(&key, loc);
            self.point.insert(&key, loc);
        }
        for loc in &superseded {
            self.log.abandon(*loc)?;
        }

        self.dirty = true;
        self.flush()?;
        info!(
            kind = %E::KIND,
            records = self.len(),
            skipped,
            superseded = superseded.len(),
            "Rebuilt indexes from log"
        );
        Ok(())
    }
}

impl<E: Entity> Drop for IndexedStore<E> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(kind = %E::KIND, error = %e, "Failed to flush index side-files on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Course;
    use tempfile::tempdir;

    fn config(dir: &Path) -> StorageConfig {
        StorageConfig {
            fsync_enabled: false,
            ..StorageConfig::with_data_dir(dir)
        }
    }

    #[test]
    fn test_add_get_update_remove() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();

        let course = Course::new("CS201", "Data Structures", 3, "T1");
        store.add(&course).unwrap();
        assert!(store.exists("CS201"));
        assert_eq!(store.get("CS201").unwrap(), Some(course.clone()));

        let mut renamed = course.clone();
        renamed.name = "Algorithms".to_string();
        assert!(store.update(&renamed).unwrap());
        assert_eq!(store.get("CS201").unwrap().unwrap().name, "Algorithms");

        assert!(store.remove("CS201").unwrap());
        assert!(!store.remove("CS201").unwrap());
        assert!(store.get("CS201").unwrap().is_none());
        store.verify().unwrap();
    }

    #[test]
    fn test_update_missing_returns_false() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        assert!(!store.update(&Course::new("X1", "x", 1, "T")).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_add_existing_updates_in_place() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        store.add(&Course::new("CS1", "v1", 1, "T")).unwrap();
        store.add(&Course::new("CS1", "v2", 1, "T")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.log.len(), 1);
        assert_eq!(store.get("CS1").unwrap().unwrap().name, "v2");
    }

    #[test]
    fn test_empty_key_rejected() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        let err = store.add(&Course::new("", "x", 1, "T")).unwrap_err();
        assert!(matches!(err, QuadraError::InvalidKey(_)));
        assert_eq!(store.log.len(), 0);
    }

    #[test]
    fn test_update_keeps_location() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        for id in ["A1", "B1", "C1"] {
            store.add(&Course::new(id, id, 1, "T")).unwrap();
        }
        let before = store.ordered.pairs();
        store.update(&Course::new("B1", "changed", 1, "T")).unwrap();
        assert_eq!(store.ordered.pairs(), before);
        assert_eq!(store.point.get("B1"), store.ordered.search("B1"));
    }

    #[test]
    fn test_verify_detects_disagreement() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        store.add(&Course::new("A1", "a", 1, "T")).unwrap();
        store.add(&Course::new("B1", "b", 1, "T")).unwrap();

        let a = *store.point.get("A1").unwrap();
        store.point.insert("B1", a);
        assert!(matches!(store.verify(), Err(QuadraError::IndexInconsistent(_))));

        store.rebuild_indexes().unwrap();
        store.verify().unwrap();
        assert_eq!(store.get("B1").unwrap().unwrap().name, "b");
    }

    #[test]
    fn test_rebuild_keeps_last_duplicate() {
        let dir = tempdir().unwrap();
        let mut store: IndexedStore<Course> = IndexedStore::open(&config(dir.path())).unwrap();
        store.log.append(&Course::new("A1", "old", 1, "T").encode()).unwrap();
        store.log.append("not|a|course").unwrap();
        store.log.append(&Course::new("A1", "new", 1, "T").encode()).unwrap();

        store.rebuild_indexes().unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("A1").unwrap().unwrap().name, "new");
        store.verify().unwrap();
    }
}
