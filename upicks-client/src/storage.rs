use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::error::{ClientError, ClientResult};

/// Per-device key/value store. Remembers what an anonymous viewer did.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> ClientResult<()>;
    fn remove(&self, key: &str) -> ClientResult<()>;

    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl<T: LocalStore + ?Sized> LocalStore for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        (**self).remove(key)
    }
}

/// The device store named by `path`, or an in-memory one when unset.
pub fn open_store(path: Option<&Path>) -> ClientResult<Box<dyn LocalStore>> {
    match path {
        Some(path) => Ok(Box::new(FileStore::open(path)?)),
        None => Ok(Box::new(MemoryStore::new())),
    }
}

pub fn upvoted_review_key(rating_id: Uuid) -> String {
    format!("upvoted_review_{rating_id}")
}

pub fn rated_campus_key(campus_id: Uuid) -> String {
    format!("rated_campus_{campus_id}")
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// JSON object on disk, rewritten in full on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|e| ClientError::Store(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(ClientError::Store(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> ClientResult<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| ClientError::Store(e.to_string()))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| ClientError::Store(format!("{}: {e}", self.path.display())))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryStore::new();
        let key = upvoted_review_key(Uuid::nil());
        assert!(!store.contains(&key));
        store.set(&key, "1").unwrap();
        assert_eq!(store.get(&key).as_deref(), Some("1"));
        store.remove(&key).unwrap();
        assert!(!store.contains(&key));
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = std::env::temp_dir().join(format!("upicks-store-{}.json", Uuid::new_v4()));
        let key = rated_campus_key(Uuid::new_v4());

        let store = FileStore::open(&path).unwrap();
        store.set(&key, "true").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get(&key).as_deref(), Some("true"));
        reopened.remove(&key).unwrap();
        assert!(FileStore::open(&path).unwrap().get(&key).is_none());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn failed_write_keeps_previous_entries() {
        let path = std::env::temp_dir()
            .join(format!("upicks-missing-{}", Uuid::new_v4()))
            .join("store.json");
        let key = upvoted_review_key(Uuid::new_v4());

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(store.set(&key, "true"), Err(ClientError::Store(_))));
        assert!(!store.contains(&key));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = std::env::temp_dir().join(format!("upicks-store-{}.json", Uuid::new_v4()));
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(ClientError::Store(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn open_store_without_path_is_in_memory() {
        let store = open_store(None).unwrap();
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn keys_match_device_markers() {
        let id = Uuid::nil();
        assert_eq!(upvoted_review_key(id), format!("upvoted_review_{id}"));
        assert_eq!(rated_campus_key(id), format!("rated_campus_{id}"));
    }
}
