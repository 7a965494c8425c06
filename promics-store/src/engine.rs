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

use std::{
    marker::PhantomData,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use promics_cache::CacheBackend;
use promics_common::code::{ObjectKey, StoreObject};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS objects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key INTEGER NOT NULL UNIQUE,
    class TEXT NOT NULL,
    first_level INTEGER NOT NULL,
    data BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS objects_class_index ON objects (class);
";

/// Store-internal row id. 0 marks a key reserved but not yet flushed.
const PENDING: i64 = 0;

#[derive(Default)]
struct EngineInner {
    conn: Option<Connection>,
    /// Logical key to store-internal row id, [`PENDING`] until flushed.
    id_map: HashMap<ObjectKey, i64>,
    /// Type name to the logical keys of that type, kept in step with `id_map`.
    class_index: HashMap<String, HashSet<ObjectKey>>,
    current_added: usize,
}

impl EngineInner {
    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::Closed)
    }
}

/// Embedded SQLite persistence engine.
///
/// Owns the connection and its long-running transaction, the id mapping and
/// the per-class key index. Object residency is delegated entirely to the
/// object cache; the engine implements its write-back seam.
pub struct SqliteEngine<T>
where
    T: StoreObject,
{
    path: PathBuf,
    inner: Mutex<EngineInner>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SqliteEngine<T>
where
    T: StoreObject,
{
    /// Opens (or creates) the database file and begins the first transaction.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let engine = Self {
            path: path.as_ref().to_path_buf(),
            inner: Mutex::new(EngineInner::default()),
            _marker: PhantomData,
        };
        engine.connect(false)?;
        Ok(engine)
    }

    /// Database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// (Re)opens the connection. With `loading`, repopulates the id mapping
    /// and class index from persisted first-level rows; this is the
    /// crash/restart recovery path.
    pub fn connect(&self, loading: bool) -> Result<()> {
        let mut inner = self.inner.lock();

        if inner.conn.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            tracing::debug!(path = %self.path.display(), loading, "opening database");

            let conn = Connection::open(&self.path)?;
            conn.execute_batch(SCHEMA)?;
            conn.execute_batch("BEGIN")?;
            inner.conn = Some(conn);
        }

        if loading {
            let conn = inner.conn.take().expect("connection opened above");
            let mut id_map = HashMap::new();
            let mut class_index: HashMap<String, HashSet<ObjectKey>> = HashMap::new();
            {
                let mut stmt =
                    conn.prepare("SELECT key, id, class FROM objects WHERE first_level = 1")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let key: ObjectKey = row.get(0)?;
                    let id: i64 = row.get(1)?;
                    let class: String = row.get(2)?;
                    id_map.insert(key, id);
                    class_index.entry(class).or_default().insert(key);
                }
            }
            inner.conn = Some(conn);
            inner.id_map = id_map;
            inner.class_index = class_index;
        }

        Ok(())
    }

    /// Whether the connection is open.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().conn.is_some()
    }

    /// Commits the outstanding transaction and begins a new one.
    pub fn commit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.conn()?.execute_batch("COMMIT; BEGIN")?;
        inner.current_added = 0;
        Ok(())
    }

    /// Commits and releases the connection. With `clearing`, also wipes the
    /// id mapping and class index.
    pub fn close(&self, clearing: bool) -> Result<()> {
        let mut inner = self.inner.lock();

        if let Some(conn) = inner.conn.take() {
            conn.execute_batch("COMMIT")?;
        }

        if clearing {
            inner.id_map.clear();
            inner.class_index.clear();
            inner.current_added = 0;
        }

        Ok(())
    }

    /// Reserves a key for a new first-level object: fails on duplicates
    /// before any mutation, then records the pending id mapping and the
    /// class index entry.
    pub fn reserve(&self, key: ObjectKey, class: &'static str) -> Result<()> {
        self.reserve_batch(&[(key, class)])
    }

    /// Same contract as [`Self::reserve`] for a batch: all duplicate checks
    /// happen before any mutation, a single duplicate fails the whole batch.
    pub fn reserve_batch(&self, entries: &[(ObjectKey, &'static str)]) -> Result<()> {
        let mut inner = self.inner.lock();

        let mut seen = HashSet::with_capacity(entries.len());
        for (key, _) in entries {
            if inner.id_map.contains_key(key) || !seen.insert(*key) {
                return Err(Error::DuplicateKey { key: *key });
            }
        }

        for (key, class) in entries {
            inner.id_map.insert(*key, PENDING);
            inner.class_index.entry((*class).to_string()).or_default().insert(*key);
        }
        inner.current_added += entries.len();

        Ok(())
    }

    /// Whether the key is known to the id mapping.
    pub fn contains(&self, key: ObjectKey) -> bool {
        self.inner.lock().id_map.contains_key(&key)
    }

    /// Whether the key has a durable row (flushed at least once).
    pub fn stored(&self, key: ObjectKey) -> bool {
        matches!(self.inner.lock().id_map.get(&key), Some(&id) if id != PENDING)
    }

    /// Loads an object by logical key. Returns `None` for unknown keys and
    /// for keys whose object has not been flushed yet (those live in cache).
    pub fn load(&self, key: ObjectKey) -> Result<Option<T>> {
        let inner = self.inner.lock();

        let id = match inner.id_map.get(&key) {
            Some(&id) if id != PENDING => id,
            _ => return Ok(None),
        };

        let data: Option<Vec<u8>> = inner
            .conn()?
            .query_row("SELECT data FROM objects WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;

        match data {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Logical keys of all first-level objects of a type.
    pub fn keys_by_class(&self, class: &str) -> Vec<ObjectKey> {
        self.inner
            .lock()
            .class_index
            .get(class)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of first-level objects of a type, 0 if the type is unseen.
    pub fn count_by_class(&self, class: &str) -> usize {
        self.inner.lock().class_index.get(class).map(|keys| keys.len()).unwrap_or(0)
    }

    /// Removes a key from the id mapping and class index and deletes its row
    /// if it was durable, all within one critical section. Returns whether
    /// the key was known.
    pub fn remove(&self, key: ObjectKey) -> Result<bool> {
        let mut inner = self.inner.lock();

        let id = match inner.id_map.remove(&key) {
            Some(id) => id,
            None => return Ok(false),
        };

        // The class index is the single source of truth for the type name.
        inner.class_index.retain(|_, keys| {
            keys.remove(&key);
            !keys.is_empty()
        });

        if id != PENDING {
            inner.conn()?.execute("DELETE FROM objects WHERE id = ?1", params![id])?;
        }

        Ok(true)
    }

    /// Whether enough objects accumulated since the last commit to warrant
    /// one. One commit per 10,000 inserts keeps the transaction bounded.
    pub fn commit_due(&self) -> bool {
        self.inner.lock().current_added >= 10_000
    }
}

impl<T> CacheBackend<T> for SqliteEngine<T>
where
    T: StoreObject,
{
    fn write_back(
        &self,
        inserts: &[(ObjectKey, Arc<T>)],
        updates: &[(ObjectKey, Arc<T>)],
    ) -> anyhow::Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let conn = inner.conn.as_ref().context("store is not active")?;

        {
            let mut stmt = conn.prepare_cached(
                "INSERT INTO objects (key, class, first_level, data) VALUES (?1, ?2, ?3, ?4)",
            )?;
            let mut assigned = Vec::with_capacity(inserts.len());

            for (key, object) in inserts {
                let data = bincode::serialize(object.as_ref())?;
                stmt.execute(params![key, object.type_name(), object.first_level(), data])?;
                assigned.push((*key, conn.last_insert_rowid()));
            }

            drop(stmt);

            let mut stmt = conn.prepare_cached("UPDATE objects SET data = ?2 WHERE id = ?1")?;

            for (key, object) in updates {
                let id = inner.id_map.get(key).copied().unwrap_or(PENDING);
                if id == PENDING {
                    tracing::warn!(key = *key, "skipping update for a key with no durable row");
                    continue;
                }
                let data = bincode::serialize(object.as_ref())?;
                stmt.execute(params![id, data])?;
            }

            drop(stmt);

            conn.execute_batch("COMMIT; BEGIN")?;

            for (key, id) in assigned {
                inner.id_map.insert(key, id);
            }
        }

        inner.current_added = 0;

        Ok(())
    }
}
