//! The shared durable slot: a string key-value store visible to every
//! context. [`MemorySlotStore`] models browser local storage (shared map,
//! change notifications, quota); [`FileSlotStore`] persists across runs with
//! the atomic write-then-rename discipline.

use std::collections::HashMap;
use std::fs::{remove_file, rename, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::error::SlotError;

/// Key for the live match snapshot.
pub const STATE_KEY: &str = "volleyball_scoreboard_state";

/// Key for operator preferences.
pub const SETTINGS_KEY: &str = "volleyball-scoreboard-settings";

/// Namespace prefix; eviction under quota pressure only touches keys under
/// this prefix.
pub const KEY_PREFIX: &str = "volleyball";

pub type WatchCallback = Arc<dyn Fn(&str, Option<&str>) + Send + Sync>;

type WatchRegistry = Mutex<Vec<(u64, WatchCallback)>>;

/// Deregistration handle for a change watcher. Stores that cannot notify
/// return a detached handle whose cancel is a no-op.
pub struct WatchHandle {
    id: u64,
    registry: Weak<WatchRegistry>,
}

impl WatchHandle {
    fn detached() -> Self {
        Self { id: 0, registry: Weak::new() }
    }

    pub fn cancel(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().expect("watch registry poisoned").retain(|(id, _)| *id != self.id);
        }
    }
}

pub trait SlotStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SlotError>;
    fn remove(&self, key: &str);
    fn keys(&self) -> Vec<String>;
    /// Observe slot changes. The callback receives the key and the new
    /// value (`None` on removal).
    fn watch(&self, callback: WatchCallback) -> WatchHandle;
}

struct MemoryInner {
    entries: Mutex<HashMap<String, String>>,
    watchers: Arc<WatchRegistry>,
    next_watch_id: AtomicU64,
    quota_bytes: Option<usize>,
}

/// Shared in-memory store. Clones share the same map, so handing clones to
/// several contexts models tabs of one browser profile.
#[derive(Clone)]
pub struct MemorySlotStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemorySlotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Quota-limited store; writes pushing the total payload past the limit
    /// fail with [`SlotError::QuotaExceeded`].
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self::with_capacity(Some(quota_bytes))
    }

    fn with_capacity(quota_bytes: Option<usize>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                entries: Mutex::new(HashMap::new()),
                watchers: Arc::new(Mutex::new(Vec::new())),
                next_watch_id: AtomicU64::new(0),
                quota_bytes,
            }),
        }
    }

    fn notify(&self, key: &str, value: Option<&str>) {
        let watchers: Vec<WatchCallback> = {
            let registry = self.inner.watchers.lock().expect("watch registry poisoned");
            registry.iter().map(|(_, callback)| callback.clone()).collect()
        };
        for callback in watchers {
            callback(key, value);
        }
    }
}

impl SlotStore for MemorySlotStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.entries.lock().expect("slot lock poisoned").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        {
            let mut entries = self.inner.entries.lock().expect("slot lock poisoned");
            if let Some(quota) = self.inner.quota_bytes {
                let current: usize = entries
                    .iter()
                    .filter(|(k, _)| k.as_str() != key)
                    .map(|(k, v)| k.len() + v.len())
                    .sum();
                let projected = current + key.len() + value.len();
                if projected > quota {
                    return Err(SlotError::QuotaExceeded {
                        key: key.to_string(),
                        size: projected,
                    });
                }
            }
            entries.insert(key.to_string(), value.to_string());
        }
        self.notify(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) {
        let removed = self
            .inner
            .entries
            .lock()
            .expect("slot lock poisoned")
            .remove(key)
            .is_some();
        if removed {
            self.notify(key, None);
        }
    }

    fn keys(&self) -> Vec<String> {
        self.inner.entries.lock().expect("slot lock poisoned").keys().cloned().collect()
    }

    fn watch(&self, callback: WatchCallback) -> WatchHandle {
        let id = self.inner.next_watch_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .watchers
            .lock()
            .expect("watch registry poisoned")
            .push((id, callback));
        WatchHandle { id, registry: Arc::downgrade(&self.inner.watchers) }
    }
}

/// File-per-key store, durable across process restarts. Writes go to a temp
/// file first and are renamed into place so readers never observe a torn
/// value. No change notifications; the connectivity poll covers detection.
pub struct FileSlotStore {
    dir: PathBuf,
}

impl FileSlotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SlotError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are namespaced identifiers, not arbitrary paths.
        let safe: String =
            key.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' }).collect();
        self.dir.join(format!("{}.json", safe))
    }

    fn write_atomic(path: &Path, value: &str) -> Result<(), SlotError> {
        let temp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
        }
        rename(&temp_path, path)?;
        Ok(())
    }
}

impl SlotStore for FileSlotStore {
    fn get(&self, key: &str) -> Option<String> {
        let mut contents = String::new();
        let mut file = File::open(self.path_for(key)).ok()?;
        file.read_to_string(&mut contents).ok()?;
        Some(contents)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SlotError> {
        let path = self.path_for(key);
        Self::write_atomic(&path, value)?;
        log::debug!("wrote {} bytes to {:?}", value.len(), path);
        Ok(())
    }

    fn remove(&self, key: &str) {
        let path = self.path_for(key);
        if path.exists() {
            if let Err(err) = remove_file(&path) {
                log::warn!("failed to remove {:?}: {}", path, err);
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect()
    }

    fn watch(&self, _callback: WatchCallback) -> WatchHandle {
        WatchHandle::detached()
    }
}
