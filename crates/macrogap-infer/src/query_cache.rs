//! In-memory LRU cache for query vectors.
//!
//! Recipe vectors are persisted; query vectors only live here so a repeated
//! message does not hit the embedding service twice. Default: 256 entries, 10-minute TTL.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Thread-safe LRU + TTL cache keyed by query text.
pub struct QueryVectorCache {
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    order: VecDeque<String>,
    max_size: usize,
    ttl: Duration,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

impl QueryVectorCache {
    /// Hold at most `max_size` vectors (at least one), each for `ttl`.
    pub fn new(max_size: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(max_size),
                order: VecDeque::with_capacity(max_size),
                max_size: max_size.max(1),
                ttl,
            }),
        }
    }

    /// 256 entries, 10 minutes.
    pub fn default_cache() -> Self {
        Self::new(256, Duration::from_secs(600))
    }

    /// Cached vector, or `None` on miss or expiry.
    pub fn get(&self, query: &str) -> Option<Vec<f32>> {
        let mut inner = self.inner.lock();
        let ttl = inner.ttl;
        let expired = inner
            .entries
            .get(query)
            .map(|e| e.inserted_at.elapsed() >= ttl)?;

        if expired {
            inner.remove(query);
            return None;
        }
        let vector = inner.entries.get(query).map(|e| e.vector.clone());
        inner.touch(query);
        vector
    }

    /// Insert or refresh a vector, evicting the least recently used entry when full.
    pub fn put(&self, query: String, vector: Vec<f32>) {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&query) {
            inner.touch(&query);
        } else {
            while inner.entries.len() >= inner.max_size {
                match inner.order.pop_front() {
                    Some(oldest) => {
                        inner.entries.remove(&oldest);
                    }
                    None => break,
                }
            }
            inner.order.push_back(query.clone());
        }
        inner.entries.insert(
            query,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Entry count, expired entries included until their next lookup.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_and_miss() {
        let cache = QueryVectorCache::new(10, Duration::from_secs(60));
        assert!(cache.get("oats").is_none());
        cache.put("oats".into(), vec![1.0, 2.0]);
        assert_eq!(cache.get("oats"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_least_recent_evicted() {
        let cache = QueryVectorCache::new(2, Duration::from_secs(60));
        cache.put("a".into(), vec![1.0]);
        cache.put("b".into(), vec![2.0]);
        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.put("c".into(), vec![3.0]);
        assert_eq!(cache.len(), 2);
        assert!(cache.get("b").is_none());
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = QueryVectorCache::new(10, Duration::from_millis(1));
        cache.put("soon gone".into(), vec![1.0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("soon gone").is_none());
        assert!(cache.is_empty());
    }
}
