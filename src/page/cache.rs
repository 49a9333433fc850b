//! Shared cache of published pages
//!
//! Keyed by storage offset. A flushed page has exactly one offset, is never
//! modified afterwards and is shared by every revision that references it,
//! so entries never go stale and can be handed to any number of readers
//! without copying.
//!
//! - Only durable pages are cached; transaction-log pages never are
//! - A full cache evicts with the clock (second chance) policy: a hit sets
//!   the entry's reference bit, the hand clears bits until it finds an
//!   entry that was not read since its last pass
//! - Statistics are passive and never influence caching

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::kind::Page;

/// Cache statistics snapshot
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for newer pages
    pub evictions: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug)]
struct Slot {
    offset: u64,
    page: Arc<Page>,
    referenced: AtomicBool,
}

#[derive(Debug, Default)]
struct ClockRing {
    index: HashMap<u64, usize>,
    slots: Vec<Slot>,
    hand: usize,
}

impl ClockRing {
    /// Slot the hand stops at; clears reference bits on the way.
    fn victim(&mut self) -> usize {
        loop {
            let position = self.hand;
            self.hand = (self.hand + 1) % self.slots.len();
            if !self.slots[position].referenced.swap(false, Ordering::Relaxed) {
                return position;
            }
        }
    }
}

#[derive(Debug)]
pub struct PageCache {
    ring: RwLock<ClockRing>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PageCache {
    /// `max_entries == 0` disables caching.
    pub fn new(max_entries: usize) -> Self {
        let capacity = max_entries.min(1024);
        Self {
            ring: RwLock::new(ClockRing {
                index: HashMap::with_capacity(capacity),
                slots: Vec::with_capacity(capacity),
                hand: 0,
            }),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, offset: u64) -> Option<Arc<Page>> {
        let found = {
            let ring = self.ring.read();
            ring.index.get(&offset).map(|&position| {
                let slot = &ring.slots[position];
                slot.referenced.store(true, Ordering::Relaxed);
                Arc::clone(&slot.page)
            })
        };
        match found {
            Some(page) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(page)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Caches `page`, evicting an entry when full, and returns the shared
    /// copy readers should use.
    pub fn insert(&self, offset: u64, page: Arc<Page>) -> Arc<Page> {
        if self.max_entries == 0 {
            return page;
        }

        let mut ring = self.ring.write();
        if let Some(&position) = ring.index.get(&offset) {
            return Arc::clone(&ring.slots[position].page);
        }

        let slot = Slot {
            offset,
            page: Arc::clone(&page),
            referenced: AtomicBool::new(false),
        };
        if ring.slots.len() < self.max_entries {
            let position = ring.slots.len();
            ring.slots.push(slot);
            ring.index.insert(offset, position);
            return page;
        }

        let position = ring.victim();
        let evicted = std::mem::replace(&mut ring.slots[position], slot);
        ring.index.remove(&evicted.offset);
        ring.index.insert(offset, position);
        self.evictions.fetch_add(1, Ordering::Relaxed);
        page
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.ring.read().index.contains_key(&offset)
    }

    pub fn len(&self) -> usize {
        self.ring.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.read().slots.is_empty()
    }

    pub fn clear(&self) {
        let mut ring = self.ring.write();
        ring.index.clear();
        ring.slots.clear();
        ring.hand = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
