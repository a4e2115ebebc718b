//! In-memory cache backend.
//!
//! # Responsibility
//! - Provide the default process-local `CacheStore` backend, also used as
//!   the test substitute for external cache deployments.
//!
//! # Invariants
//! - Entries live until explicitly deleted; there is no expiry.

use super::{CacheError, CacheResult, CacheStore};
use std::collections::HashMap;
use std::sync::Mutex;

/// Mutex-guarded map implementing the cache store contract.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries; used by coherence assertions.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("cache mutex poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheStore, InMemoryCacheStore};

    #[test]
    fn set_get_delete_roundtrip() {
        let cache = InMemoryCacheStore::new();
        assert_eq!(cache.get("k").unwrap(), None);

        cache.set("k", "v").unwrap();
        assert_eq!(cache.get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(cache.len(), 1);

        cache.delete("k").unwrap();
        assert_eq!(cache.get("k").unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn deleting_absent_key_is_a_noop() {
        let cache = InMemoryCacheStore::new();
        cache.delete("missing").unwrap();
        assert!(cache.is_empty());
    }
}
