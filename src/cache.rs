use dashmap::DashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Process-lifetime memoization of fetched page bodies, keyed by URL.
///
/// Bounded: once the capacity ceiling is reached an arbitrary resident entry
/// is evicted before the new one is inserted. Safe for concurrent
/// read/insert across fetch workers.
#[derive(Clone)]
pub struct FetchCache {
    entries: Arc<DashMap<String, String>>,
    capacity: usize,
}

impl FetchCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(100).unwrap());
        Self {
            entries: Arc::new(DashMap::with_capacity(capacity.get())),
            capacity: capacity.get(),
        }
    }

    pub fn get(&self, url: &str) -> Option<String> {
        self.entries.get(url).map(|entry| entry.clone())
    }

    pub fn insert(&self, url: String, body: String) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&url) {
            let victim = self.entries.iter().next().map(|entry| entry.key().clone());
            if let Some(key) = victim {
                self.entries.remove(&key);
            }
        }
        self.entries.insert(url, body);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_memoized_body() {
        let cache = FetchCache::new(10);
        assert!(cache.get("https://example.com").is_none());
        cache.insert("https://example.com".into(), "<html></html>".into());
        assert_eq!(
            cache.get("https://example.com").as_deref(),
            Some("<html></html>")
        );
    }

    #[test]
    fn eviction_keeps_cache_bounded() {
        let cache = FetchCache::new(3);
        for i in 0..10 {
            cache.insert(format!("https://example.com/{i}"), format!("page {i}"));
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn reinserting_resident_key_does_not_evict() {
        let cache = FetchCache::new(2);
        cache.insert("a".into(), "1".into());
        cache.insert("b".into(), "2".into());
        cache.insert("a".into(), "3".into());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a").as_deref(), Some("3"));
        assert_eq!(cache.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let cache = FetchCache::new(0);
        cache.insert("a".into(), "1".into());
        assert_eq!(cache.get("a").as_deref(), Some("1"));
    }
}
