//! A generic, write-through, atomically-persisted `(key → value)` file store, backing
//! the `.functions` and `.operations` state files (§6) and satisfying §9's "atomic
//! per-key writes" design note.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::Error;

/// An in-memory map mirrored to a single JSON file on disk. Every mutating call
/// rewrites the whole file via write-temp-then-rename so a reader never observes a
/// partially-written file.
pub struct KvStore<V> {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, V>>,
}

impl<V> KvStore<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Opens (or creates) the store backed by `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| Error::internal(format!("corrupt state file {:?}: {}", path, e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(Error::internal(format!(
                    "failed to read state file {:?}: {}",
                    path, e
                )))
            }
        };
        Ok(KvStore {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().expect("kv store lock poisoned").get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().expect("kv store lock poisoned").contains_key(key)
    }

    pub fn list(&self) -> Vec<V> {
        self.entries
            .lock()
            .expect("kv store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Inserts or overwrites `key`, then persists the whole map atomically.
    pub fn insert(&self, key: impl Into<String>, value: V) -> Result<(), Error> {
        let mut guard = self.entries.lock().expect("kv store lock poisoned");
        guard.insert(key.into(), value);
        self.flush(&guard)
    }

    /// Removes `key` if present, then persists the whole map atomically.
    pub fn remove(&self, key: &str) -> Result<Option<V>, Error> {
        let mut guard = self.entries.lock().expect("kv store lock poisoned");
        let removed = guard.remove(key);
        self.flush(&guard)?;
        Ok(removed)
    }

    fn flush(&self, entries: &BTreeMap<String, V>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::internal(format!("failed to create state directory: {}", e)))?;
        }
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| Error::internal(format!("failed to serialize state: {}", e)))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::internal(format!("failed to create temp file: {}", e)))?;
        tmp.write_all(&json)
            .map_err(|e| Error::internal(format!("failed to write temp file: {}", e)))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::internal(format!("failed to persist state file: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Widget {
        color: String,
    }

    #[test]
    fn it_persists_inserts_and_removals_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".widgets");

        {
            let store: KvStore<Widget> = KvStore::open(&path).unwrap();
            store
                .insert("a", Widget { color: "red".into() })
                .unwrap();
            store
                .insert("b", Widget { color: "blue".into() })
                .unwrap();
        }

        let reopened: KvStore<Widget> = KvStore::open(&path).unwrap();
        assert_eq!(reopened.get("a"), Some(Widget { color: "red".into() }));
        assert_eq!(reopened.list().len(), 2);

        reopened.remove("a").unwrap();
        assert_eq!(reopened.get("a"), None);

        let reopened_again: KvStore<Widget> = KvStore::open(&path).unwrap();
        assert_eq!(reopened_again.list().len(), 1);
    }

    #[test]
    fn it_starts_empty_when_the_file_does_not_exist_yet() {
        let dir = tempfile::tempdir().unwrap();
        let store: KvStore<Widget> = KvStore::open(dir.path().join(".missing")).unwrap();
        assert!(store.list().is_empty());
    }
}
