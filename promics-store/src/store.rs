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

use std::{path::Path, sync::Arc};

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use promics_cache::{CacheConfig, ObjectCache};
use promics_common::{
    code::{ObjectKey, StoreObject},
    memory::MemoryProbe,
    progress::Progress,
};

use crate::{
    engine::SqliteEngine,
    error::{Error, Result},
};

/// Store lifecycle. Only `Active` permits object operations; `Committing`
/// is a brief exclusive phase entered only by `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Connecting,
    Active,
    Committing,
    Closed,
}

/// Object store construction options.
pub struct StoreOptions {
    /// Object cache tuning.
    pub cache: CacheConfig,
    /// Memory probe override, mainly for tests.
    pub probe: Option<Box<dyn MemoryProbe>>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            probe: None,
        }
    }
}

/// Identity-stable object store keyed by caller-assigned 64-bit keys.
///
/// Hot objects live in the object cache, cold ones in the SQLite engine.
/// Object operations hold a shared guard on the commit barrier; `commit`
/// holds the exclusive guard, so a commit never interleaves with object
/// access while accesses freely interleave with each other.
pub struct ObjectStore<T>
where
    T: StoreObject,
{
    engine: Arc<SqliteEngine<T>>,
    cache: ObjectCache<T, SqliteEngine<T>>,
    barrier: RwLock<()>,
    state: Mutex<State>,
}

impl<T> ObjectStore<T>
where
    T: StoreObject,
{
    /// Opens (or creates) a store at the given database path.
    pub fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let engine = Arc::new(SqliteEngine::open(path)?);
        let cache = match options.probe {
            Some(probe) => ObjectCache::with_probe(engine.clone(), options.cache, probe),
            None => ObjectCache::new(engine.clone(), options.cache),
        };

        Ok(Self {
            engine,
            cache,
            barrier: RwLock::new(()),
            state: Mutex::new(State::Active),
        })
    }

    /// The backing engine.
    pub fn engine(&self) -> &Arc<SqliteEngine<T>> {
        &self.engine
    }

    /// The object cache.
    pub fn cache(&self) -> &ObjectCache<T, SqliteEngine<T>> {
        &self.cache
    }

    fn access(&self) -> Result<RwLockReadGuard<'_, ()>> {
        let guard = self.barrier.read();
        match *self.state.lock() {
            State::Active => Ok(guard),
            _ => Err(Error::Closed),
        }
    }

    /// Inserts a new first-level object under the given key.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already mapped; the
    /// check happens strictly before any mutation, indices stay consistent.
    pub fn insert_object(&self, key: ObjectKey, mut object: T) -> Result<()> {
        {
            let _access = self.access()?;

            object.set_id(key);
            object.set_first_level(true);

            self.engine.reserve(key, object.type_name())?;
            self.cache.insert(key, Arc::new(object), false, false)?;
        }

        self.maybe_commit()
    }

    /// Inserts a batch of first-level objects atomically: every key is
    /// checked before any mutation, a single duplicate fails the whole batch.
    pub fn insert_objects(
        &self,
        objects: impl IntoIterator<Item = (ObjectKey, T)>,
        progress: Option<&dyn Progress>,
    ) -> Result<()> {
        {
            let _access = self.access()?;

            let mut reserved = Vec::new();
            let mut admitted = Vec::new();

            for (key, mut object) in objects {
                object.set_id(key);
                object.set_first_level(true);
                reserved.push((key, object.type_name()));
                admitted.push((key, Arc::new(object)));
            }

            if let Some(progress) = progress {
                progress.set_total(admitted.len());
            }

            self.engine.reserve_batch(&reserved)?;
            self.cache.insert_batch(admitted, false, false)?;

            if let Some(progress) = progress {
                for _ in 0..reserved.len() {
                    progress.tick();
                }
            }
        }

        self.maybe_commit()
    }

    /// Retrieves an object by key: id mapping gate, then cache, then engine
    /// load with a cache warm. Returns `None` for unknown keys.
    pub fn retrieve_object(&self, key: ObjectKey) -> Result<Option<Arc<T>>> {
        let _access = self.access()?;

        if !self.engine.contains(key) {
            return Ok(None);
        }

        if let Some(object) = self.cache.get(key) {
            return Ok(Some(object));
        }

        match self.engine.load(key)? {
            Some(object) => {
                let object = Arc::new(object);
                self.cache.insert(key, object.clone(), true, false)?;
                Ok(Some(object))
            }
            None => Ok(None),
        }
    }

    /// Retrieves a batch of objects, warming the cache with every object
    /// loaded from the engine in one batched admission. Cancellation through
    /// the progress sink returns the partial result collected so far.
    pub fn retrieve_objects(
        &self,
        keys: &[ObjectKey],
        progress: Option<&dyn Progress>,
    ) -> Result<Vec<Arc<T>>> {
        let _access = self.access()?;

        if let Some(progress) = progress {
            progress.set_total(keys.len());
        }

        let mut collected = Vec::with_capacity(keys.len());
        let mut warm = Vec::new();

        for &key in keys {
            if let Some(progress) = progress {
                if progress.is_cancelled() {
                    break;
                }
                progress.tick();
            }

            if !self.engine.contains(key) {
                continue;
            }

            if let Some(object) = self.cache.get(key) {
                collected.push(object);
                continue;
            }

            if let Some(object) = self.engine.load(key)? {
                let object = Arc::new(object);
                warm.push((key, object.clone()));
                collected.push(object);
            }
        }

        self.cache.insert_batch(warm, true, false)?;

        Ok(collected)
    }

    /// Retrieves all first-level objects of a type, via the class index.
    pub fn retrieve_by_class(
        &self,
        class: &str,
        progress: Option<&dyn Progress>,
    ) -> Result<Vec<Arc<T>>> {
        let keys = self.engine.keys_by_class(class);
        self.retrieve_objects(&keys, progress)
    }

    /// Warms the cache for the given keys without returning the objects.
    /// Returns the number of objects loaded from the engine.
    pub fn load_objects(
        &self,
        keys: &[ObjectKey],
        progress: Option<&dyn Progress>,
    ) -> Result<usize> {
        let _access = self.access()?;

        if let Some(progress) = progress {
            progress.set_total(keys.len());
        }

        let mut warm = Vec::new();

        for &key in keys {
            if let Some(progress) = progress {
                if progress.is_cancelled() {
                    break;
                }
                progress.tick();
            }

            if self.cache.contains(key) {
                continue;
            }

            if let Some(object) = self.engine.load(key)? {
                warm.push((key, Arc::new(object)));
            }
        }

        let loaded = warm.len();
        self.cache.insert_batch(warm, true, false)?;

        Ok(loaded)
    }

    /// Warms the cache with all first-level objects of a type.
    pub fn load_by_class(&self, class: &str, progress: Option<&dyn Progress>) -> Result<usize> {
        let keys = self.engine.keys_by_class(class);
        self.load_objects(&keys, progress)
    }

    /// Replaces a known object, marking it dirty for the next flush.
    pub fn update_object(&self, key: ObjectKey, mut object: T) -> Result<()> {
        let _access = self.access()?;

        if !self.engine.contains(key) {
            return Err(Error::KeyNotFound { key });
        }

        object.set_id(key);
        object.set_first_level(true);
        let object = Arc::new(object);

        if !self.cache.replace(key, object.clone()) {
            // Evicted meanwhile: readmit as edited so the flush writes it.
            let stored = self.engine.stored(key);
            self.cache.insert(key, object, stored, true)?;
        }

        Ok(())
    }

    /// Removes an object from cache, indices and the backing engine.
    pub fn remove_object(&self, key: ObjectKey) -> Result<()> {
        let _access = self.access()?;

        self.cache.remove(key);
        if !self.engine.remove(key)? {
            return Err(Error::KeyNotFound { key });
        }

        Ok(())
    }

    /// Removes a batch of objects; unknown keys are skipped. Cancellation
    /// stops after the current element.
    pub fn remove_objects(
        &self,
        keys: &[ObjectKey],
        progress: Option<&dyn Progress>,
    ) -> Result<usize> {
        let _access = self.access()?;

        if let Some(progress) = progress {
            progress.set_total(keys.len());
        }

        let mut removed = 0;

        for &key in keys {
            if let Some(progress) = progress {
                if progress.is_cancelled() {
                    break;
                }
                progress.tick();
            }

            self.cache.remove(key);
            if self.engine.remove(key)? {
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Whether the key is known to the store.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.engine.contains(key)
    }

    /// Whether the key currently resides in the cache.
    pub fn in_cache(&self, key: ObjectKey) -> bool {
        self.cache.contains(key)
    }

    /// Number of first-level objects of a type.
    pub fn count_by_class(&self, class: &str) -> usize {
        self.engine.count_by_class(class)
    }

    /// Logical keys of all first-level objects of a type.
    pub fn keys_by_class(&self, class: &str) -> Vec<ObjectKey> {
        self.engine.keys_by_class(class)
    }

    /// Forces a full, non-clearing cache flush so in-memory edits become
    /// visible to ad-hoc queries against the engine.
    pub fn dump_to_db(&self) -> Result<()> {
        let _access = self.access()?;
        self.cache.save_all(None, false)?;
        Ok(())
    }

    /// Commits the backing transaction and begins a new one.
    ///
    /// Holds the exclusive barrier guard: waits for in-flight object
    /// operations to drain and blocks new ones for the commit window.
    pub fn commit(&self) -> Result<()> {
        let _guard = self.barrier.write();

        {
            let mut state = self.state.lock();
            if *state != State::Active {
                return Err(Error::Closed);
            }
            *state = State::Committing;
        }

        let result = self.engine.commit();
        *self.state.lock() = State::Active;

        result
    }

    fn maybe_commit(&self) -> Result<()> {
        if self.engine.commit_due() {
            self.commit()?;
        }
        Ok(())
    }

    /// Flushes (and with `clearing` evicts) the cache, commits the
    /// outstanding transaction and releases the engine. With `clearing`,
    /// the id mapping is wiped as well.
    pub fn close(&self, clearing: bool) -> Result<()> {
        let _guard = self.barrier.write();

        if *self.state.lock() == State::Closed {
            return Ok(());
        }

        self.cache.save_all(None, clearing)?;
        self.engine.close(clearing)?;
        *self.state.lock() = State::Closed;

        Ok(())
    }

    /// (Re)establishes the engine connection. With `loading`, repopulates
    /// the id mapping and class index from persisted first-level objects.
    pub fn establish_connection(&self, loading: bool) -> Result<()> {
        let _guard = self.barrier.write();

        *self.state.lock() = State::Connecting;
        let result = self.engine.connect(loading);
        *self.state.lock() = if result.is_ok() { State::Active } else { State::Closed };

        result
    }
}
