//! Shared cache of analyzed code keyed by code hash
//!
//! Lookups are lock-free through `DashMap`. Misses are resolved under a
//! fair mutex, so concurrent misses for the same hash perform the world
//! state read and the jump analysis only once. Entries are evicted in
//! insertion order once the capacity is reached.

use crate::code::CodeInfo;
use dashmap::DashMap;
use fugue_primitives::H256;
use parking_lot::FairMutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded code cache
#[derive(Debug)]
pub struct CodeCache {
    entries: DashMap<H256, Arc<CodeInfo>>,
    order: FairMutex<VecDeque<H256>>,
    capacity: usize,
}

impl CodeCache {
    /// Cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: FairMutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Cached entry for `hash`
    pub fn get(&self, hash: &H256) -> Option<Arc<CodeInfo>> {
        self.entries.get(hash).map(|entry| entry.value().clone())
    }

    /// Cached entry for `hash`, building it with `build` on a miss
    pub fn get_or_try_insert_with<E>(
        &self,
        hash: H256,
        build: impl FnOnce() -> Result<Arc<CodeInfo>, E>,
    ) -> Result<Arc<CodeInfo>, E> {
        if let Some(info) = self.get(&hash) {
            return Ok(info);
        }
        let mut order = self.order.lock();
        if let Some(info) = self.get(&hash) {
            return Ok(info);
        }
        let info = build()?;
        self.insert_locked(&mut order, hash, info.clone());
        Ok(info)
    }

    /// Store an entry, replacing any previous one
    pub fn set(&self, hash: H256, info: Arc<CodeInfo>) {
        let mut order = self.order.lock();
        self.insert_locked(&mut order, hash, info);
    }

    fn insert_locked(&self, order: &mut VecDeque<H256>, hash: H256, info: Arc<CodeInfo>) {
        if self.entries.insert(hash, info).is_none() {
            order.push_back(hash);
        }
        while order.len() > self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.entries.remove(&evicted);
                tracing::debug!(code_hash = %evicted, "code cache eviction");
            }
        }
    }

    /// Whether `hash` is cached
    pub fn contains(&self, hash: &H256) -> bool {
        self.entries.contains_key(hash)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
