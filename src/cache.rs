use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::error::AppResult;
use crate::layout::PageCharMap;

pub const DEFAULT_MAX_PAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub doc_id: u64,
    pub page: usize,
}

impl PageKey {
    pub fn new(doc_id: u64, page: usize) -> Self {
        Self { doc_id, page }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Per-page character maps, owned by whoever issues highlight requests.
///
/// A page's layout never changes for a loaded document, so entries are
/// inserted once and never replaced. Eviction only bounds memory; an evicted
/// page is simply rebuilt on the next miss.
#[derive(Debug)]
pub struct PageCharCache {
    max_entries: usize,
    entries: LruCache<PageKey, Arc<PageCharMap>>,
    counters: CacheCounters,
}

impl Default for PageCharCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

impl PageCharCache {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_entries: max_entries.get(),
            entries: LruCache::new(max_entries),
            counters: CacheCounters::default(),
        }
    }

    pub fn get(&mut self, key: &PageKey) -> Option<Arc<PageCharMap>> {
        match self.entries.get(key) {
            Some(map) => {
                self.counters.hits += 1;
                Some(Arc::clone(map))
            }
            None => {
                self.counters.misses += 1;
                None
            }
        }
    }

    /// Stores `map` unless the key is already resident; returns the resident entry.
    pub fn insert_if_absent(&mut self, key: PageKey, map: PageCharMap) -> Arc<PageCharMap> {
        if let Some(existing) = self.entries.get(&key) {
            return Arc::clone(existing);
        }

        let map = Arc::new(map);
        if let Some((evicted, _)) = self.entries.push(key, Arc::clone(&map))
            && evicted != key
        {
            self.counters.evictions += 1;
            log::debug!(
                "evicted page {} of doc {:#x} from char cache",
                evicted.page,
                evicted.doc_id
            );
        }
        map
    }

    /// Returns the cached map or builds it with `build`. Build errors are not cached.
    pub fn get_or_try_insert_with<F>(&mut self, key: PageKey, build: F) -> AppResult<Arc<PageCharMap>>
    where
        F: FnOnce() -> AppResult<PageCharMap>,
    {
        if let Some(map) = self.get(&key) {
            return Ok(map);
        }
        let map = build()?;
        Ok(self.insert_if_absent(key, map))
    }

    pub fn remove_doc(&mut self, doc_id: u64) {
        let doomed: Vec<_> = self
            .entries
            .iter()
            .filter_map(|(key, _)| (key.doc_id == doc_id).then_some(*key))
            .collect();

        for key in doomed {
            if self.entries.pop(&key).is_some() {
                self.counters.evictions += 1;
            }
        }
    }

    pub fn contains(&self, key: &PageKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn counters(&self) -> CacheCounters {
        self.counters
    }

    pub fn hit_rate(&self) -> f64 {
        let lookups = self.counters.hits + self.counters.misses;
        if lookups == 0 {
            return 0.0;
        }
        self.counters.hits as f64 / lookups as f64
    }
}
