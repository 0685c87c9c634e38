use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{Arc, RwLock},
};

pub const KEY_ENABLED: &str = "enabled";
pub const KEY_SMART_DETECTION: &str = "smartDetection";
pub const KEY_ADS_BLOCKED: &str = "adsBlocked";
pub const KEY_LAST_RESET: &str = "lastReset";

/// Resume handoff keys, written immediately before a deliberate reload and
/// consumed by the next page load.
pub const KEY_RESUME_SECONDS: &str = "refresh_timestamp";
pub const KEY_RESUME_URL: &str = "refresh_url";

struct LocalStoreInner {
    path: Option<PathBuf>,
    data: RwLock<Map<String, Value>>,
}

/// Durable key-value store standing in for the host's local storage area.
/// Writes are last-write-wins; there is no transactional read-modify-write.
#[derive(Clone)]
pub struct LocalStore {
    inner: Arc<LocalStoreInner>,
}

impl LocalStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(LocalStoreInner {
                path: None,
                data: RwLock::new(Map::new()),
            }),
        }
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read storage from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            Map::new()
        };

        Ok(Self {
            inner: Arc::new(LocalStoreInner {
                path: Some(path),
                data: RwLock::new(data),
            }),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.data.read().unwrap().contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.read().unwrap().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|value| value.as_bool())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|value| value.as_u64())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)
            .and_then(|value| value.as_str().map(str::to_string))
    }

    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut guard = self.inner.data.write().unwrap();
        guard.insert(key.to_string(), value);
        self.persist(&guard)
    }

    pub fn set_many(&self, entries: &[(&str, Value)]) -> Result<()> {
        let mut guard = self.inner.data.write().unwrap();
        for (key, value) in entries {
            guard.insert(key.to_string(), value.clone());
        }
        self.persist(&guard)
    }

    fn persist(&self, data: &Map<String, Value>) -> Result<()> {
        let Some(path) = &self.inner.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write storage to {}", path.display()))
    }
}

/// Session-scoped storage: tied to one tab's browsing context, survives a
/// page reload, gone when the tab goes away.
#[derive(Clone, Default)]
pub struct SessionStore {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: String) {
        self.data.write().unwrap().insert(key.to_string(), value);
    }

    pub fn remove(&self, key: &str) {
        self.data.write().unwrap().remove(key);
    }
}
