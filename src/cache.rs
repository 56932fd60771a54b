//! In-memory decision cache.
//!
//! Memoizes (intention, URL) → verdict so repeat visits within one
//! intention epoch answer instantly and the classification service is
//! called at most once per pair. The cache is cleared in full whenever
//! the intention changes; there is no other expiry. Keys are bounded by
//! per-session browsing volume, so no eviction policy is applied.

use std::collections::HashMap;

use crate::verdict::{CacheKey, Verdict};

/// Decision memoization cache, read-through / write-on-miss.
///
/// Only successful classifications are stored; fail-open fallback
/// verdicts are never cached, so a later visit retries the service.
#[derive(Debug, Default)]
pub struct DecisionCache {
    entries: HashMap<CacheKey, Verdict>,
}

impl DecisionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a previously stored verdict.
    pub fn lookup(&self, key: &CacheKey) -> Option<Verdict> {
        self.entries.get(key).cloned()
    }

    /// Store a verdict for a key, overwriting any previous entry.
    pub fn store(&mut self, key: CacheKey, verdict: Verdict) {
        self.entries.insert(key, verdict);
    }

    /// Drop every entry. Called exactly once per intention change.
    pub fn invalidate_all(&mut self) {
        self.entries.clear();
    }

    /// Number of cached verdicts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(block: bool) -> Verdict {
        Verdict {
            should_block: block,
            justification: "test".into(),
        }
    }

    #[test]
    fn store_then_lookup() {
        let mut cache = DecisionCache::new();
        let key = CacheKey::new("write report", "https://docs.example.com/");
        assert!(cache.lookup(&key).is_none());

        cache.store(key.clone(), verdict(false));
        let hit = cache.lookup(&key).unwrap();
        assert!(!hit.should_block);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn same_url_different_intentions_are_independent() {
        let mut cache = DecisionCache::new();
        let url = "https://news.example.com/";
        cache.store(CacheKey::new("write report", url), verdict(true));
        cache.store(CacheKey::new("read the news", url), verdict(false));

        assert!(
            cache
                .lookup(&CacheKey::new("write report", url))
                .unwrap()
                .should_block
        );
        assert!(
            !cache
                .lookup(&CacheKey::new("read the news", url))
                .unwrap()
                .should_block
        );
    }

    #[test]
    fn invalidate_all_clears_everything() {
        let mut cache = DecisionCache::new();
        cache.store(CacheKey::new("a", "https://x.example/"), verdict(true));
        cache.store(CacheKey::new("b", "https://y.example/"), verdict(false));
        assert_eq!(cache.len(), 2);

        cache.invalidate_all();
        assert!(cache.is_empty());
        assert!(cache.lookup(&CacheKey::new("a", "https://x.example/")).is_none());
    }

    #[test]
    fn store_overwrites_existing_entry() {
        let mut cache = DecisionCache::new();
        let key = CacheKey::new("task", "https://example.com/");
        cache.store(key.clone(), verdict(true));
        cache.store(key.clone(), verdict(false));
        assert!(!cache.lookup(&key).unwrap().should_block);
        assert_eq!(cache.len(), 1);
    }
}
