use crate::error::StorageError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Durable key/value store for notifier state, shaped like browser
/// `localStorage`: string keys, string values.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// All keys live in a single JSON object file. A missing or corrupt file
/// reads as empty; every write rewrites the file.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> BTreeMap<String, String> {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "ignoring unreadable state file");
                BTreeMap::new()
            }
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let data = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut entries = self.read_all();
        f(&mut entries);
        self.write_all(&entries)
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(self.read_all().remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Ids a notification was already fired for, persisted as a JSON array.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShownSet {
    ids: HashSet<String>,
}

impl ShownSet {
    /// Missing key or undecodable value yields an empty set.
    pub fn load(storage: &dyn Storage, key: &str) -> Self {
        let stored = match storage.get(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return Self::default(),
            Err(error) => {
                tracing::warn!(key, %error, "cannot read shown ids, starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str::<Vec<String>>(&stored) {
            Ok(ids) => Self {
                ids: ids.into_iter().collect(),
            },
            Err(error) => {
                tracing::warn!(key, %error, "shown ids are not a JSON array, starting empty");
                Self::default()
            }
        }
    }

    pub fn save(&self, storage: &dyn Storage, key: &str) -> Result<(), StorageError> {
        let data = serde_json::to_string(&self.sorted())?;
        storage.set(key, &data)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn mark_shown(&mut self, id: &str) {
        self.ids.insert(id.to_string());
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn sorted(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shown_set_round_trips_through_file_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("nested").join("state.json"));

        let mut shown = ShownSet::default();
        shown.mark_shown("alert-2");
        shown.mark_shown("alert-1");
        shown.save(&storage, "empresa_alerts_shown").expect("save");

        let reloaded = ShownSet::load(&storage, "empresa_alerts_shown");
        assert_eq!(reloaded, shown);
        assert_eq!(
            storage.get("empresa_alerts_shown").expect("get"),
            Some(r#"["alert-1","alert-2"]"#.to_string())
        );
    }

    #[test]
    fn keys_are_independent_and_removable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FileStorage::new(dir.path().join("state.json"));

        storage.set("empresa_alerts_shown", r#"["a"]"#).expect("set alerts");
        storage.set("empresa_hardware_shown", r#"["hw"]"#).expect("set hardware");
        storage.remove("empresa_alerts_shown").expect("remove");

        assert_eq!(storage.get("empresa_alerts_shown").expect("get"), None);
        assert_eq!(
            ShownSet::load(&storage, "empresa_hardware_shown").sorted(),
            vec!["hw".to_string()]
        );
    }

    #[test]
    fn corrupt_values_load_as_empty() {
        let storage = MemoryStorage::new();
        storage.set("k", "{not json").expect("set");
        assert!(ShownSet::load(&storage, "k").is_empty());

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").expect("write");
        let file = FileStorage::new(&path);
        assert_eq!(file.get("k").expect("get"), None);
    }

    #[test]
    fn load_accepts_any_order() {
        let storage = MemoryStorage::new();
        storage.set("k", r#"["b","a","b"]"#).expect("set");
        let shown = ShownSet::load(&storage, "k");
        assert_eq!(shown.len(), 2);
        assert!(shown.contains("a") && shown.contains("b"));
    }
}
