// src/storage.rs

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Reserved keys the current-object caches persist under.
pub(crate) const CURRENT_USER_KEY: &str = "_currentUser";
pub(crate) const CURRENT_INSTALLATION_KEY: &str = "_currentInstallation";
pub(crate) const CURRENT_CONFIG_KEY: &str = "_currentConfig";

/// Keychain-analog persistence seam used by the current-object caches.
/// Implementations must be safe to call from any thread; the query core
/// never touches this, only the object-lifecycle layer does.
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn delete(&self, key: &str);
    fn delete_all(&self);
}

/// Process-local store, the default when no platform store is injected.
/// Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.lock().insert(key.to_string(), value);
    }

    fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    fn delete_all(&self) {
        self.lock().clear();
    }
}
