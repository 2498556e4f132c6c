//! Diff result cache and its key format.
//!
//! Keys look like `"{note_id}:{id1}:{id2}:{mode}"`. They are order sensitive:
//! comparing A to B and B to A are different entries because added and removed
//! swap sides.

use crate::diff::{Change, DiffMode};
use crate::lru::Lru;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Build the cache key for one comparison
pub fn cache_key(note_id: &str, id1: &str, id2: &str, mode: DiffMode) -> String {
    format!("{}:{}:{}:{}", note_id, id1, id2, mode)
}

/// Prefix shared by every key belonging to a note
pub fn note_prefix(note_id: &str) -> String {
    format!("{}:", note_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub utilization: f64,
}

/// Bounded LRU map from cache key to a computed change sequence
pub struct DiffCache {
    entries: Lru<String, Arc<Vec<Change>>>,
}

impl DiffCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Lru::new(capacity),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn get(&mut self, key: &str) -> Option<Arc<Vec<Change>>> {
        self.entries.get(key).cloned()
    }

    pub fn set(&mut self, key: String, changes: Arc<Vec<Change>>) {
        if let Some(evicted) = self.entries.insert(key, changes) {
            debug!("Evicted diff cache entry {}", evicted);
        }
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Drop every entry whose key starts with `prefix`
    pub fn invalidate_prefix(&mut self, prefix: &str) -> usize {
        let removed = self.entries.retain_keys(|key| !key.starts_with(prefix));
        debug!("Invalidated {} diff cache entries under {:?}", removed, prefix);
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.entries.len();
        let capacity = self.entries.capacity();
        CacheStats {
            size,
            capacity,
            utilization: size as f64 / capacity as f64,
        }
    }
}
