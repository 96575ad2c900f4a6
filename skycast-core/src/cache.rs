use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::model::CacheEntry;

/// Namespace prefix so snapshot entries never collide with unrelated keys in
/// the same store.
const CACHE_PREFIX: &str = "skycast_v3_";

/// Synchronous string key-value persistence, mirroring the browser-storage
/// collaborator the dashboard runs against: no expiry, no eviction,
/// overwrite-on-set.
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }
}

/// Durable store backed by a single JSON map file.
///
/// Reads and writes the whole file per operation, which matches the small,
/// one-entry-per-city workload. I/O failures degrade to "absent" and a
/// warning rather than failing the fetch that triggered them.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_map(&self) -> HashMap<String, String> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read cache file");
                return HashMap::new();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(map) => map,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache file is corrupt, starting empty");
                HashMap::new()
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create cache directory");
                return;
            }
        }

        match serde_json::to_string(&map) {
            Ok(serialized) => {
                if let Err(e) = fs::write(&self.path, serialized) {
                    warn!(path = %self.path.display(), error = %e, "failed to write cache file");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize cache map"),
        }
    }
}

/// Namespaced, typed view over a [`KeyValueStore`] holding one
/// [`CacheEntry`] per normalized city key.
///
/// Freshness is the orchestrator's concern; this type only encodes, decodes
/// and namespaces.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    store: Arc<dyn KeyValueStore>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn storage_key(city_key: &str) -> String {
        format!("{CACHE_PREFIX}{city_key}")
    }

    /// Last persisted entry for `city_key`, or `None` when absent or
    /// undecodable.
    pub fn load(&self, city_key: &str) -> Option<CacheEntry> {
        let raw = self.store.get(&Self::storage_key(city_key))?;

        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(city_key, error = %e, "discarding undecodable cache entry");
                None
            }
        }
    }

    /// Persist `entry`, overwriting any prior entry for `city_key`.
    pub fn save(&self, city_key: &str, entry: &CacheEntry) {
        match serde_json::to_string(entry) {
            Ok(serialized) => self.store.set(&Self::storage_key(city_key), &serialized),
            Err(e) => warn!(city_key, error = %e, "failed to serialize cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::test_support::sample_snapshot;

    fn entry(ts: i64) -> CacheEntry {
        CacheEntry {
            data: sample_snapshot(),
            timestamp: ts,
        }
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v1");
        store.set("k", "v2");
        assert_eq!(store.get("k"), Some("v2".to_string()));
    }

    #[test]
    fn snapshot_cache_roundtrip_and_overwrite() {
        let store = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(store.clone());

        assert!(cache.load("paris").is_none());

        cache.save("paris", &entry(1000));
        assert_eq!(cache.load("paris").map(|e| e.timestamp), Some(1000));

        cache.save("paris", &entry(2000));
        assert_eq!(cache.load("paris").map(|e| e.timestamp), Some(2000));
    }

    #[test]
    fn entries_are_namespaced() {
        let store = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(store.clone());

        cache.save("paris", &entry(1000));
        assert!(store.get("paris").is_none());
        assert!(store.get("skycast_v3_paris").is_some());
    }

    #[test]
    fn undecodable_entry_reads_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("skycast_v3_paris", "not json at all");

        let cache = SnapshotCache::new(store);
        assert!(cache.load("paris").is_none());
    }

    #[test]
    fn persisted_shape_is_data_plus_timestamp() {
        let store = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(store.clone());

        cache.save("paris", &entry(1234));

        let raw = store.get("skycast_v3_paris").expect("entry present");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(value["timestamp"], 1234);
        assert!(value["data"]["city"].is_string());
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("skycast-cache-test-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let store = FileStore::new(dir.join("cache.json"));
        assert_eq!(store.get("k"), None);
        store.set("k", "v");
        store.set("other", "w");
        assert_eq!(store.get("k"), Some("v".to_string()));
        assert_eq!(store.get("other"), Some("w".to_string()));

        // A second handle over the same file sees the data.
        let reopened = FileStore::new(dir.join("cache.json"));
        assert_eq!(reopened.get("k"), Some("v".to_string()));

        let _ = fs::remove_dir_all(&dir);
    }
}
