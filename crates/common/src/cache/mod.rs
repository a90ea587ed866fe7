//! Process-local embedding cache (§4.4.1, §9).
//!
//! A concurrent map with TTL eviction is sufficient at this scale; there is no LRU unless memory
//! pressure is observed. Keyed on the SHA-256 digest of the trimmed input text, shared between
//! the Query Executor's `search_text` resolution and the Ingestion pipeline's embedding step.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

struct Entry {
    embedding: Vec<f32>,
    inserted_at: Instant,
}

/// TTL-evicting embedding cache. Entries expire lazily on lookup, not via a background sweep.
pub struct EmbeddingCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl EmbeddingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Digest the trimmed text into the cache key. Two texts that differ only in surrounding
    /// whitespace share a cache entry.
    pub fn key_for(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up a cached embedding, treating an expired entry as a miss.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = Self::key_for(text);
        let entries = self.entries.read().expect("embedding cache poisoned");
        entries.get(&key).and_then(|entry| {
            if entry.inserted_at.elapsed() < self.ttl {
                Some(entry.embedding.clone())
            } else {
                None
            }
        })
    }

    pub fn put(&self, text: &str, embedding: Vec<f32>) {
        let key = Self::key_for(text);
        let mut entries = self.entries.write().expect("embedding cache poisoned");
        entries.insert(
            key,
            Entry {
                embedding,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Number of entries currently stored, including ones that have expired but have not yet
    /// been looked up (and thus evicted). Used for the cache-size metrics gauge.
    pub fn len(&self) -> usize {
        self.entries.read().expect("embedding cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_within_ttl_hits() {
        let cache = EmbeddingCache::new(Duration::from_secs(3600));
        cache.put("digital twins", vec![0.1, 0.2, 0.3]);
        assert_eq!(cache.get("digital twins"), Some(vec![0.1, 0.2, 0.3]));
    }

    #[test]
    fn trimmed_text_shares_a_key() {
        let cache = EmbeddingCache::new(Duration::from_secs(3600));
        cache.put("  digital twins  ", vec![0.1, 0.2]);
        assert_eq!(cache.get("digital twins"), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = EmbeddingCache::new(Duration::from_millis(1));
        cache.put("reinforcement learning", vec![0.5]);
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.get("reinforcement learning"), None);
    }

    #[test]
    fn miss_returns_none() {
        let cache = EmbeddingCache::new(Duration::from_secs(60));
        assert_eq!(cache.get("never cached"), None);
    }
}
