//! Durable slot table.
//!
//! Slots are kept as a JSON object mapping slot id to step position, e.g.
//! `{"pos1": 1234, "pos2": -80}`. `null` values are accepted on load and
//! mean "unset".
//!
//! Every save rewrites the whole table to a temp file in the same directory,
//! syncs it and renames it over the old file, so a crash leaves either the
//! old table or the new one. A missing or unreadable file loads as an empty
//! table; persistence failures are logged and returned but never disturb the
//! in-memory table.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use handmov_common::error::PersistenceError;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct PositionStore {
    path: PathBuf,
    slots: BTreeMap<String, i64>,
}

impl PositionStore {
    /// Load the table at `path`, falling back to empty on any failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let slots = match Self::load(&path) {
            Ok(slots) => slots,
            Err(e) => {
                warn!("{}; starting with an empty slot table", e);
                BTreeMap::new()
            }
        };
        Self { path, slots }
    }

    /// Read the table at `path`. A missing file is an empty table.
    pub fn load(path: &Path) -> Result<BTreeMap<String, i64>, PersistenceError> {
        debug!("Loading slots from {:?}", path);
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Slot file does not exist, starting fresh");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(PersistenceError::Read(e)),
        };
        let raw: BTreeMap<String, Option<i64>> =
            serde_json::from_str(&content).map_err(|e| PersistenceError::Parse(e.to_string()))?;
        let slots: BTreeMap<String, i64> = raw
            .into_iter()
            .filter_map(|(slot, value)| value.map(|v| (slot, v)))
            .collect();
        info!("Loaded {} slots from {:?}", slots.len(), path);
        Ok(slots)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, slot: &str) -> Option<i64> {
        self.slots.get(slot).copied()
    }

    pub fn slots(&self) -> &BTreeMap<String, i64> {
        &self.slots
    }

    /// Store `position` in `slot` and persist the whole table.
    ///
    /// The in-memory value is updated even when persisting fails.
    pub fn set(&mut self, slot: &str, position: i64) -> Result<(), PersistenceError> {
        self.slots.insert(slot.to_string(), position);
        match self.persist() {
            Ok(()) => {
                info!("Saved slot '{}' = {}", slot, position);
                Ok(())
            }
            Err(e) => {
                warn!("Slot '{}' kept in memory only: {}", slot, e);
                Err(e)
            }
        }
    }

    fn persist(&self) -> Result<(), PersistenceError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .map_err(|e| PersistenceError::Write(format!("Failed to create directory: {}", e)))?;

        let tmp = NamedTempFile::new_in(dir)
            .map_err(|e| PersistenceError::Write(format!("Failed to create temp file: {}", e)))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.slots)
                .map_err(|e| PersistenceError::Write(format!("Failed to serialize slots: {}", e)))?;
            writer
                .flush()
                .map_err(|e| PersistenceError::Write(format!("Failed to flush slots: {}", e)))?;
        }
        tmp.as_file()
            .sync_all()
            .map_err(|e| PersistenceError::Write(format!("Failed to sync slots: {}", e)))?;
        tmp.persist(&self.path)
            .map_err(|e| PersistenceError::Write(format!("Failed to replace slot file: {}", e)))?;
        debug!("Persisted {} slots to {:?}", self.slots.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = PositionStore::open(dir.path().join("position.json"));
        assert!(store.slots().is_empty());
        assert_eq!(store.get("pos1"), None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("position.json");
        let mut store = PositionStore::open(&path);
        store.set("pos1", 1234).unwrap();
        store.set("pos2", -80).unwrap();

        let reloaded = PositionStore::open(&path);
        assert_eq!(reloaded.get("pos1"), Some(1234));
        assert_eq!(reloaded.get("pos2"), Some(-80));
    }

    #[test]
    fn test_null_slots_are_unset() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("position.json");
        fs::write(&path, r#"{"pos1": 500, "pos2": null}"#).unwrap();
        let store = PositionStore::open(&path);
        assert_eq!(store.get("pos1"), Some(500));
        assert_eq!(store.get("pos2"), None);
        assert_eq!(store.slots().len(), 1);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("position.json");
        fs::write(&path, "{\"pos1\": 12").unwrap();
        assert!(matches!(
            PositionStore::load(&path),
            Err(PersistenceError::Parse(_))
        ));
        let store = PositionStore::open(&path);
        assert!(store.slots().is_empty());
    }

    #[test]
    fn test_save_replaces_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("position.json");
        fs::write(&path, "garbage").unwrap();
        let mut store = PositionStore::open(&path);
        store.set("pos1", 7).unwrap();
        assert_eq!(PositionStore::load(&path).unwrap().get("pos1"), Some(&7));
    }

    #[test]
    fn test_unwritable_location_keeps_memory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let mut store = PositionStore::open(blocker.join("position.json"));
        let err = store.set("pos1", 42).unwrap_err();
        assert!(matches!(err, PersistenceError::Write(_)));
        assert_eq!(store.get("pos1"), Some(42));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("position.json");
        let mut store = PositionStore::open(&path);
        store.set("a", 1).unwrap();
        store.set("b", 2).unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }
}
