// Copyright 2025 promics Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{collections::VecDeque, sync::Arc};

use hashbrown::HashMap;
use parking_lot::Mutex;
use promics_common::{
    code::{ObjectKey, StoreObject},
    memory::{total_memory_bytes, MemoryProbe, ProcStatusProbe},
    progress::Progress,
};

use crate::{backend::CacheBackend, entry::CachedEntry, error::Result};

/// Object cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Share of the memory budget usable before eviction begins, in `(0, 1]`.
    pub memory_share: f64,
    /// Minimum object count protected from eviction regardless of pressure.
    pub keep_threshold: usize,
    /// Memory budget in bytes. Defaults to total host memory. `None`
    /// together with an unreadable probe degrades to count-only bounding.
    pub memory_budget: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_share: 0.75,
            keep_threshold: 10_000,
            memory_budget: total_memory_bytes(),
        }
    }
}

struct CacheState<T> {
    objects: HashMap<ObjectKey, CachedEntry<T>>,
    /// Admission order. Every cached key appears here exactly once;
    /// eviction pops from the front.
    queue: VecDeque<ObjectKey>,
    memory_share: f64,
    read_only: bool,
}

/// Bounded in-memory map of live objects with a FIFO eviction queue.
///
/// Eviction is driven by process memory pressure: whenever the cache holds
/// more than `keep_threshold` objects and the probe reports usage above
/// `memory_share * memory_budget`, about a quarter of the cache is flushed
/// to the backend and dropped, repeatedly until the pressure clears.
pub struct ObjectCache<T, B>
where
    T: StoreObject,
    B: CacheBackend<T>,
{
    state: Mutex<CacheState<T>>,
    backend: Arc<B>,
    keep_threshold: usize,
    memory_budget: Option<u64>,
    probe: Box<dyn MemoryProbe>,
}

impl<T, B> ObjectCache<T, B>
where
    T: StoreObject,
    B: CacheBackend<T>,
{
    /// Creates a cache over the given backend, probing `/proc` for memory usage.
    pub fn new(backend: Arc<B>, config: CacheConfig) -> Self {
        Self::with_probe(backend, config, Box::new(ProcStatusProbe))
    }

    /// Creates a cache with a caller-provided memory probe.
    pub fn with_probe(backend: Arc<B>, config: CacheConfig, probe: Box<dyn MemoryProbe>) -> Self {
        Self {
            state: Mutex::new(CacheState {
                objects: HashMap::new(),
                queue: VecDeque::new(),
                memory_share: config.memory_share,
                read_only: false,
            }),
            backend,
            keep_threshold: config.keep_threshold,
            memory_budget: config.memory_budget,
            probe,
        }
    }

    /// Point lookup. Does not affect the admission order.
    pub fn get(&self, key: ObjectKey) -> Option<Arc<T>> {
        let state = self.state.lock();
        state.objects.get(&key).map(|entry| entry.object.clone())
    }

    /// Contention-tolerant point lookup: a miss is returned if the cache is
    /// busy flushing, callers then fall through to the backing store.
    pub fn try_get(&self, key: ObjectKey) -> Option<Arc<T>> {
        let state = self.state.try_lock()?;
        state.objects.get(&key).map(|entry| entry.object.clone())
    }

    /// Whether the key is currently cached.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.state.lock().objects.contains_key(&key)
    }

    /// Number of cached objects.
    pub fn len(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().objects.is_empty()
    }

    /// Admits an object. First writer wins: inserting an already cached key
    /// is silently ignored. No-op when the cache is read only.
    ///
    /// `in_store` marks objects warmed from the backing store, `edited`
    /// marks objects dirty since load.
    pub fn insert(&self, key: ObjectKey, object: Arc<T>, in_store: bool, edited: bool) -> Result<bool> {
        let mut state = self.state.lock();

        if state.read_only {
            return Ok(false);
        }

        let admitted = if state.objects.contains_key(&key) {
            false
        } else {
            state.objects.insert(key, CachedEntry::new(object, in_store, edited));
            state.queue.push_back(key);
            true
        };

        self.update(&mut state)?;

        Ok(admitted)
    }

    /// Admits a batch of objects under a single critical section, with one
    /// pressure check at the end. Same first-writer-wins policy as [`Self::insert`].
    pub fn insert_batch(
        &self,
        objects: impl IntoIterator<Item = (ObjectKey, Arc<T>)>,
        in_store: bool,
        edited: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();

        if state.read_only {
            return Ok(());
        }

        for (key, object) in objects {
            if !state.objects.contains_key(&key) {
                state.objects.insert(key, CachedEntry::new(object, in_store, edited));
                state.queue.push_back(key);
            }
        }

        self.update(&mut state)
    }

    /// Marks a cached object as edited, replacing the cached instance.
    ///
    /// Returns `false` if the key is not cached or the cache is read only.
    pub fn replace(&self, key: ObjectKey, object: Arc<T>) -> bool {
        let mut state = self.state.lock();

        if state.read_only {
            return false;
        }

        match state.objects.get_mut(&key) {
            Some(entry) => {
                entry.object = object;
                entry.edited = true;
                true
            }
            None => false,
        }
    }

    /// Removes an object from the map and the queue, returning its type
    /// name for index bookkeeping. No-op when read only.
    pub fn remove(&self, key: ObjectKey) -> Option<&'static str> {
        let mut state = self.state.lock();

        if state.read_only {
            return None;
        }

        let entry = state.objects.remove(&key)?;
        state.queue.retain(|queued| *queued != key);

        Some(entry.object.type_name())
    }

    /// Flushes up to `max` entries in admission order.
    ///
    /// Entries without a persisted counterpart are batched into inserts,
    /// edited persisted entries into updates; the backend writes and commits
    /// both. With `clear` the flushed entries are also evicted. State is
    /// only mutated after the backend succeeds, so a failed flush can be
    /// retried wholesale.
    pub fn flush(&self, max: usize, progress: Option<&dyn Progress>, clear: bool) -> Result<usize> {
        let mut state = self.state.lock();

        if state.read_only {
            return Ok(0);
        }

        self.flush_locked(&mut state, max, progress, clear)
    }

    /// Flushes the whole cache, optionally evicting it.
    pub fn save_all(&self, progress: Option<&dyn Progress>, clear: bool) -> Result<usize> {
        let mut state = self.state.lock();

        if state.read_only {
            return Ok(0);
        }

        let len = state.objects.len();
        self.flush_locked(&mut state, len, progress, clear)
    }

    /// Updates the memory share and immediately re-evaluates pressure.
    pub fn set_memory_share(&self, memory_share: f64) -> Result<()> {
        let mut state = self.state.lock();
        state.memory_share = memory_share;
        self.update(&mut state)
    }

    /// Toggles write acceptance. Existing entries are kept either way.
    pub fn set_read_only(&self, read_only: bool) {
        self.state.lock().read_only = read_only;
    }

    fn flush_locked(
        &self,
        state: &mut CacheState<T>,
        max: usize,
        progress: Option<&dyn Progress>,
        clear: bool,
    ) -> Result<usize> {
        if let Some(progress) = progress {
            progress.set_total(max.min(state.queue.len()));
        }

        let mut processed = Vec::new();
        let mut inserts = Vec::new();
        let mut updates = Vec::new();

        for &key in state.queue.iter().take(max) {
            if let Some(progress) = progress {
                if progress.is_cancelled() {
                    break;
                }
                progress.tick();
            }

            if let Some(entry) = state.objects.get(&key) {
                if !entry.in_store {
                    inserts.push((key, entry.object.clone()));
                } else if entry.edited {
                    updates.push((key, entry.object.clone()));
                }
            }

            processed.push(key);
        }

        if !inserts.is_empty() || !updates.is_empty() {
            tracing::debug!(
                inserts = inserts.len(),
                updates = updates.len(),
                clear,
                "flushing cache entries"
            );
            self.backend.write_back(&inserts, &updates)?;
        }

        for key in processed.iter() {
            if clear {
                state.queue.pop_front();
                state.objects.remove(key);
            } else if let Some(entry) = state.objects.get_mut(key) {
                entry.in_store = true;
                entry.edited = false;
            }
        }

        Ok(processed.len())
    }

    fn over_budget(&self, memory_share: f64) -> bool {
        match (self.probe.used_bytes(), self.memory_budget) {
            (Some(used), Some(budget)) => used as f64 > memory_share * budget as f64,
            // No usable accounting, degrade to the count-only bound.
            _ => true,
        }
    }

    fn update(&self, state: &mut CacheState<T>) -> Result<()> {
        while state.objects.len() > self.keep_threshold && self.over_budget(state.memory_share) {
            let quarter = (state.objects.len() >> 2).max(1);
            let flushed = self.flush_locked(state, quarter, None, true)?;
            if flushed == 0 {
                break;
            }
        }

        Ok(())
    }
}
