//! Per-level unlock and completion state, persisted as one small JSON
//! document per level under `<data_dir>/levels/<id>.json`.
//!
//! Records are created lazily: the first `load` of a level that has no file
//! writes a locked default straight away, so later reads never see a missing
//! record. Nothing is saved implicitly; callers decide when to `save`.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type LevelId = u32;

const LEVELS_DIR: &str = "levels";

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct LevelRecord {
    pub unlocked: bool,
    #[serde(default)]
    pub completed: bool,
    /// Fields written by other versions of the game, kept as-is on save.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("level {0} is not registered")]
    UnknownLevel(LevelId),
    #[error("level {0} has not been loaded")]
    NotLoaded(LevelId),
    #[error("progress data for level {level} at {} is corrupt: {source}", .path.display())]
    CorruptProgressData {
        level: LevelId,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to persist progress for level {level} at {}: {source}", .path.display())]
    PersistenceFailure {
        level: LevelId,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Resource, Debug)]
pub struct LevelProgressStore {
    root: PathBuf,
    known: BTreeSet<LevelId>,
    records: HashMap<LevelId, LevelRecord>,
}

impl LevelProgressStore {
    /// A store writing under `data_dir`. Nothing touches disk until `load`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
            known: BTreeSet::new(),
            records: HashMap::new(),
        }
    }

    pub fn with_levels(
        data_dir: impl Into<PathBuf>,
        ids: impl IntoIterator<Item = LevelId>,
    ) -> Self {
        let mut store = Self::new(data_dir);
        for id in ids {
            store.register(id);
        }
        store
    }

    /// Id 0 is not a level and is ignored.
    pub fn register(&mut self, id: LevelId) -> bool {
        if id == 0 {
            return false;
        }
        self.known.insert(id)
    }

    pub fn is_level(&self, id: LevelId) -> bool {
        self.known.contains(&id)
    }

    pub fn level_ids(&self) -> impl Iterator<Item = LevelId> + '_ {
        self.known.iter().copied()
    }

    /// Next registered id after `id`, skipping holes in the numbering.
    pub fn next_level(&self, id: LevelId) -> Option<LevelId> {
        self.known.range(id.saturating_add(1)..).next().copied()
    }

    pub fn record_path(&self, id: LevelId) -> PathBuf {
        self.root.join(LEVELS_DIR).join(format!("{id}.json"))
    }

    pub fn record(&self, id: LevelId) -> Option<&LevelRecord> {
        self.records.get(&id)
    }

    pub fn is_loaded(&self, id: LevelId) -> bool {
        self.records.contains_key(&id)
    }

    /// Read the durable record for `id`, creating and persisting a locked
    /// default when none exists.
    pub fn load(&mut self, id: LevelId) -> Result<&LevelRecord, ProgressError> {
        if !self.is_level(id) {
            return Err(ProgressError::UnknownLevel(id));
        }
        let path = self.record_path(id);
        if !path.exists() {
            self.records.insert(id, LevelRecord::default());
            if let Err(err) = self.save(id) {
                self.records.remove(&id);
                return Err(err);
            }
            info!("[ledgehop progress] Created progress file {}", path.display());
        } else {
            let contents =
                fs::read_to_string(&path).map_err(|source| ProgressError::PersistenceFailure {
                    level: id,
                    path: path.clone(),
                    source,
                })?;
            let record: LevelRecord = serde_json::from_str(&contents).map_err(|source| {
                ProgressError::CorruptProgressData {
                    level: id,
                    path: path.clone(),
                    source,
                }
            })?;
            self.records.insert(id, record);
        }
        self.records.get(&id).ok_or(ProgressError::NotLoaded(id))
    }

    /// Load every registered level. A failing level stays unloaded and the
    /// rest are still attempted; the failures are returned in id order.
    pub fn load_all(&mut self) -> Vec<ProgressError> {
        let ids: Vec<LevelId> = self.known.iter().copied().collect();
        ids.into_iter()
            .filter_map(|id| self.load(id).err())
            .collect()
    }

    /// Overwrite the durable record for `id` with the in-memory one.
    ///
    /// Writes to a sibling temp file and renames it over the target so a
    /// crash never leaves a truncated record behind.
    pub fn save(&self, id: LevelId) -> Result<(), ProgressError> {
        let record = self.records.get(&id).ok_or(ProgressError::NotLoaded(id))?;
        self.write_record(id, record)
    }

    fn write_record(&self, id: LevelId, record: &LevelRecord) -> Result<(), ProgressError> {
        let path = self.record_path(id);
        let persist_err = |source| ProgressError::PersistenceFailure {
            level: id,
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let body = serde_json::to_string(record).map_err(|source| {
            ProgressError::CorruptProgressData {
                level: id,
                path: path.clone(),
                source,
            }
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(persist_err)?;
        fs::rename(&tmp, &path).map_err(persist_err)?;
        Ok(())
    }

    /// Pure in-memory read; levels that were never loaded count as locked.
    pub fn is_unlocked(&self, id: LevelId) -> bool {
        self.records.get(&id).is_some_and(|r| r.unlocked)
    }

    /// Unlock in memory only; call `save` to persist.
    pub fn unlock(&mut self, id: LevelId) -> Result<(), ProgressError> {
        let record = self.records.get_mut(&id).ok_or(ProgressError::NotLoaded(id))?;
        record.unlocked = true;
        Ok(())
    }

    /// Mark `id` completed, unlock the next registered level and save both.
    /// Returns the level that was unlocked, if any.
    ///
    /// Each record only changes in memory once it has been written, so a
    /// failed save leaves memory matching disk.
    pub fn complete_level(&mut self, id: LevelId) -> Result<Option<LevelId>, ProgressError> {
        let mut record = self
            .records
            .get(&id)
            .cloned()
            .ok_or(ProgressError::NotLoaded(id))?;
        record.completed = true;
        record.unlocked = true;
        self.write_record(id, &record)?;
        self.records.insert(id, record);

        let Some(next) = self.next_level(id) else {
            return Ok(None);
        };
        if !self.is_loaded(next) {
            self.load(next)?;
        }
        let mut next_record = self
            .records
            .get(&next)
            .cloned()
            .ok_or(ProgressError::NotLoaded(next))?;
        next_record.unlocked = true;
        self.write_record(next, &next_record)?;
        self.records.insert(next, next_record);
        Ok(Some(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn store_in(dir: &Path) -> LevelProgressStore {
        LevelProgressStore::with_levels(dir, 1..=12)
    }

    #[test]
    fn fresh_level_loads_locked_and_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());

        let record = store.load(7).expect("load level 7");
        assert!(!record.unlocked);
        assert!(!store.is_unlocked(7));
        assert!(store.record_path(7).exists());
    }

    #[test]
    fn unlock_survives_restart_after_save() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = store_in(dir.path());
            store.load(3).expect("first load");
            store.unlock(3).expect("unlock");
            store.save(3).expect("save");
        }

        let mut restarted = store_in(dir.path());
        assert!(!restarted.is_unlocked(3));
        let record = restarted.load(3).expect("reload");
        assert!(record.unlocked);
        assert!(restarted.is_unlocked(3));
    }

    #[test]
    fn unsaved_mutation_is_not_persisted() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let mut store = store_in(dir.path());
            store.load(2).expect("load");
            store.unlock(2).expect("unlock");
        }
        let mut restarted = store_in(dir.path());
        assert!(!restarted.load(2).expect("reload").unlocked);
    }

    #[test]
    fn save_then_load_round_trips_every_field() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.load(4).expect("load");
        store.unlock(4).expect("unlock");
        store.save(4).expect("save");
        let saved = store.record(4).cloned().expect("record");

        let mut restarted = store_in(dir.path());
        assert!(!restarted.is_loaded(4));
        let loaded = restarted.load(4).expect("reload").clone();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn unknown_fields_are_preserved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        let path = store.record_path(5);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, r#"{"unlocked":true,"stars":3}"#).expect("seed file");

        let record = store.load(5).expect("load");
        assert!(record.unlocked);
        assert!(!record.completed);
        assert_eq!(record.extra.get("stars"), Some(&serde_json::json!(3)));

        store.save(5).expect("save");
        let written = fs::read_to_string(&path).expect("read back");
        let value: serde_json::Value = serde_json::from_str(&written).expect("json");
        assert_eq!(value["stars"], 3);
        assert_eq!(value["unlocked"], true);
    }

    #[test]
    fn corrupt_file_is_reported_not_defaulted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        let path = store.record_path(6);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "{\"unlocked\": tru").expect("seed file");

        let err = store.load(6).expect_err("corrupt data must fail");
        assert!(matches!(err, ProgressError::CorruptProgressData { level: 6, .. }));
        assert!(!store.is_loaded(6));
        assert_eq!(
            fs::read_to_string(&path).expect("file untouched"),
            "{\"unlocked\": tru"
        );
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        let path = store.record_path(1);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, r#"{"unlocked":"yes"}"#).expect("seed file");

        assert!(matches!(
            store.load(1),
            Err(ProgressError::CorruptProgressData { .. })
        ));
    }

    #[test]
    fn unwritable_data_dir_is_a_persistence_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").expect("seed blocker");
        let mut store = LevelProgressStore::with_levels(&blocker, [1]);

        let err = store.load(1).expect_err("cannot create levels dir under a file");
        assert!(matches!(err, ProgressError::PersistenceFailure { level: 1, .. }));
        assert!(!store.is_loaded(1));
    }

    #[test]
    fn unregistered_and_unloaded_levels_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        assert!(matches!(store.load(13), Err(ProgressError::UnknownLevel(13))));
        assert!(matches!(store.save(2), Err(ProgressError::NotLoaded(2))));
        assert!(matches!(store.unlock(2), Err(ProgressError::NotLoaded(2))));
        assert!(!store.register(0));
        assert!(!store.is_level(0));
    }

    #[test]
    fn completing_a_level_unlocks_the_next_one() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.load(1).expect("load");
        store.unlock(1).expect("unlock");

        let next = store.complete_level(1).expect("complete");
        assert_eq!(next, Some(2));
        assert!(store.is_unlocked(2));

        let mut restarted = store_in(dir.path());
        assert!(restarted.load_all().is_empty());
        assert!(restarted.record(1).expect("level 1").completed);
        assert!(restarted.is_unlocked(2));
        assert!(!restarted.is_unlocked(3));
    }

    #[test]
    fn failed_completion_save_leaves_memory_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.load(1).expect("load");
        let levels_dir = store.record_path(1).parent().expect("parent").to_path_buf();
        fs::remove_dir_all(&levels_dir).expect("remove levels dir");
        fs::write(&levels_dir, "file in the way").expect("seed blocker");

        let err = store.complete_level(1).expect_err("levels dir is a file");
        assert!(matches!(err, ProgressError::PersistenceFailure { level: 1, .. }));
        let record = store.record(1).expect("still loaded");
        assert!(!record.completed);
        assert!(!record.unlocked);
        assert!(!store.is_loaded(2));
    }

    #[test]
    fn load_all_keeps_going_past_corrupt_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = LevelProgressStore::with_levels(dir.path(), 1..=3);
        let path = store.record_path(2);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "not json").expect("seed file");

        let errors = store.load_all();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ProgressError::CorruptProgressData { level: 2, .. }
        ));
        assert!(store.is_loaded(1));
        assert!(!store.is_loaded(2));
        assert!(store.is_loaded(3));
    }

    #[test]
    fn completing_the_last_level_unlocks_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = LevelProgressStore::with_levels(dir.path(), [1, 2, 5]);
        assert_eq!(store.next_level(2), Some(5));
        store.load(5).expect("load");
        assert_eq!(store.complete_level(5).expect("complete"), None);
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = store_in(dir.path());
        store.load(8).expect("load");
        let levels_dir = store.record_path(8).parent().expect("parent").to_path_buf();
        let names: Vec<String> = fs::read_dir(levels_dir)
            .expect("read dir")
            .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["8.json".to_string()]);
    }
}
