//! Model/tokenizer cache collaborator.
//!
//! Loaded model state is expensive; callers share it across conversations
//! through this interface. The runtime only reads ready entries — eviction
//! policy and synchronization internals belong to the implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use tracing::debug;

/// Keyed load-on-first-use cache for model/tokenizer pairs.
pub trait ModelCache<T: Clone + Send>: Send + Sync {
    /// Return the cached entry for `key`, running `loader` once if absent.
    /// A loader failure is returned to the caller and nothing is cached.
    fn load(&self, key: &str, loader: &dyn Fn() -> Result<T>) -> Result<T>;
}

/// In-memory cache with no eviction. Entries live until the cache is dropped.
pub struct MemoryModelCache<T> {
    entries: Mutex<HashMap<String, T>>,
}

impl<T> MemoryModelCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryModelCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send> ModelCache<T> for MemoryModelCache<T> {
    fn load(&self, key: &str, loader: &dyn Fn() -> Result<T>) -> Result<T> {
        let mut entries = self.entries.lock().expect("model cache lock poisoned");
        if let Some(entry) = entries.get(key) {
            debug!("Model cache hit for {}", key);
            return Ok(entry.clone());
        }

        debug!("Model cache miss for {}, loading", key);
        let entry = loader()?;
        entries.insert(key.to_string(), entry.clone());
        Ok(entry)
    }
}
