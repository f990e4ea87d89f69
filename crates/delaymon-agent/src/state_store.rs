//! Durable copy of rule states across daemon restarts.

use delaymon_alert::state::EntityDelayState;
use delaymon_common::types::EntityId;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Rule name → entity → state.
pub type StoredStates = BTreeMap<String, HashMap<EntityId, EntityDelayState>>;

/// JSON file store. Writers are serialized and replace the file atomically
/// (temp file + rename); readers see the last complete snapshot.
pub struct JsonStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the last snapshot; a missing file yields no states.
    pub fn load(&self) -> anyhow::Result<StoredStates> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoredStates::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, states: &StoredStates) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(states)?;
        let tmp = self.path.with_extension("tmp");

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &self.path)?;

        tracing::debug!(path = %self.path.display(), rules = states.len(), "Rule states saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use delaymon_alert::threshold::ThresholdTable;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("nested").join("states.json"));

        let table = ThresholdTable::parse("0:01:00=WARN;0:10:00=CRIT");
        let mut state = EntityDelayState::new(&table);
        state.reached_threshold = Duration::minutes(1);
        state.next_threshold = Some(Duration::minutes(10));
        state.last_emission_time = Utc.with_ymd_and_hms(2024, 5, 6, 8, 0, 0).unwrap();

        let mut stored = StoredStates::new();
        stored.insert("rule".into(), HashMap::from([(42, state.clone())]));
        store.save(&stored).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded["rule"][&42], state);
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn save_replaces_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("states.json"));
        let table = ThresholdTable::parse("0:01:00=WARN");

        let mut first = StoredStates::new();
        first.insert("old-rule".into(), HashMap::from([(1, EntityDelayState::new(&table))]));
        store.save(&first).unwrap();

        let mut second = StoredStates::new();
        second.insert("new-rule".into(), HashMap::from([(2, EntityDelayState::new(&table))]));
        store.save(&second).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains_key("new-rule"));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path().join("states.json"));
        assert!(store.load().unwrap().is_empty());
    }
}
