//! Extension storage backend.
//!
//! Persistent key-value storage for extensions. Each extension gets its own
//! namespace backed by a JSON file under the host data directory, so values
//! written before an unload are visible after a later reload. Values are
//! opaque strings; structured data must be serialized by the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;

/// One lock per namespace, shared by every handle to that namespace. Keeps
/// set/get/clear sequences consistent if the host ever runs two handles for
/// the same extension at once.
static NAMESPACE_LOCKS: Lazy<Mutex<HashMap<String, Arc<Mutex<()>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn namespace_lock(identity: &str) -> Arc<Mutex<()>> {
    let mut locks = NAMESPACE_LOCKS.lock().unwrap();
    locks
        .entry(identity.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

/// Extension-specific key-value storage.
///
/// Data is cached in memory and written back to disk on every modification.
/// A write failure leaves the in-memory view intact and is logged rather
/// than surfaced to the calling script.
pub struct ExtensionStorage {
    /// Extension identity (namespace and log context).
    identity: String,
    /// Path to the namespace's storage file.
    storage_path: PathBuf,
    /// In-memory cache of stored values.
    cache: HashMap<String, String>,
    /// Namespace-wide lock guarding file access.
    lock: Arc<Mutex<()>>,
}

impl ExtensionStorage {
    /// Open the storage namespace for an extension.
    ///
    /// If the namespace file exists it is loaded into cache; otherwise the
    /// namespace starts empty.
    pub fn new(identity: &str, storage_dir: &Path) -> Self {
        let storage_path = storage_dir.join(format!("{identity}.json"));
        let lock = namespace_lock(identity);

        let cache = {
            let _guard = lock.lock().unwrap();
            if storage_path.exists() {
                fs::read_to_string(&storage_path)
                    .ok()
                    .and_then(|contents| serde_json::from_str(&contents).ok())
                    .unwrap_or_default()
            } else {
                HashMap::new()
            }
        };

        Self {
            identity: identity.to_string(),
            storage_path,
            cache,
            lock,
        }
    }

    /// Get a value. `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key).cloned()
    }

    /// Upsert a value.
    pub fn set(&mut self, key: &str, value: String) {
        self.cache.insert(key.to_string(), value);
        self.flush();
    }

    /// Remove a key. No-op if absent.
    pub fn remove(&mut self, key: &str) {
        if self.cache.remove(key).is_some() {
            self.flush();
        }
    }

    /// All current keys in the namespace, each exactly once. No ordering
    /// guarantee.
    pub fn keys(&self) -> Vec<String> {
        self.cache.keys().cloned().collect()
    }

    /// Remove every key in the namespace.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.flush();
    }

    /// Write the cache to disk. Failures are logged and the in-memory view
    /// stays authoritative for the rest of the invocation.
    fn flush(&self) {
        let _guard = self.lock.lock().unwrap();
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = self.storage_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let contents = serde_json::to_string_pretty(&self.cache)
                .map_err(std::io::Error::other)?;
            fs::write(&self.storage_path, contents)
        })();
        if let Err(e) = result {
            tracing::warn!(identity = %self.identity, error = %e, "storage flush failed");
        }
    }

    /// Delete a namespace's backing file entirely (extension uninstall).
    pub fn delete_namespace(storage_dir: &Path, identity: &str) {
        let lock = namespace_lock(identity);
        let _guard = lock.lock().unwrap();
        let path = storage_dir.join(format!("{identity}.json"));
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(identity, error = %e, "storage namespace removal failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = ExtensionStorage::new("test-ext", temp_dir.path());

        assert_eq!(storage.get("key"), None);

        storage.set("key", "value1".to_string());
        assert_eq!(storage.get("key").as_deref(), Some("value1"));

        storage.set("key", "value2".to_string());
        assert_eq!(storage.get("key").as_deref(), Some("value2"));

        storage.remove("key");
        assert_eq!(storage.get("key"), None);
    }

    #[test]
    fn test_storage_remove_absent_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = ExtensionStorage::new("test-ext", temp_dir.path());
        storage.remove("missing");
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_storage_keys() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = ExtensionStorage::new("test-ext", temp_dir.path());

        assert!(storage.keys().is_empty());

        storage.set("a", "1".to_string());
        storage.set("b", "2".to_string());
        storage.set("a", "3".to_string());

        let mut keys = storage.keys();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_storage_clear() {
        let temp_dir = TempDir::new().unwrap();
        let mut storage = ExtensionStorage::new("test-ext", temp_dir.path());

        storage.set("a", "1".to_string());
        storage.set("b", "2".to_string());
        storage.clear();

        assert_eq!(storage.get("a"), None);
        assert_eq!(storage.get("b"), None);
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn test_storage_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut storage = ExtensionStorage::new("test-ext", temp_dir.path());
            storage.set("persistent", "42".to_string());
        }

        let storage = ExtensionStorage::new("test-ext", temp_dir.path());
        assert_eq!(storage.get("persistent").as_deref(), Some("42"));
    }

    #[test]
    fn test_namespace_isolation() {
        let temp_dir = TempDir::new().unwrap();
        let mut a = ExtensionStorage::new("ext-a", temp_dir.path());
        let mut b = ExtensionStorage::new("ext-b", temp_dir.path());

        a.set("key", "from-a".to_string());
        b.set("key", "from-b".to_string());

        assert_eq!(a.get("key").as_deref(), Some("from-a"));
        assert_eq!(b.get("key").as_deref(), Some("from-b"));

        a.clear();
        assert_eq!(b.get("key").as_deref(), Some("from-b"));
    }

    #[test]
    fn test_delete_namespace() {
        let temp_dir = TempDir::new().unwrap();
        {
            let mut storage = ExtensionStorage::new("doomed", temp_dir.path());
            storage.set("k", "v".to_string());
        }
        ExtensionStorage::delete_namespace(temp_dir.path(), "doomed");
        let storage = ExtensionStorage::new("doomed", temp_dir.path());
        assert_eq!(storage.get("k"), None);
    }
}
