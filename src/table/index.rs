//! Secondary indexes
//!
//! In-memory key → ID maps kept in sync through `TableObserver`.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::id::Ksid;

use super::{Row, Table};

/// Receives every persisted mutation of a table
///
/// Called synchronously while the table's write lock is held, so
/// implementations must not call back into the table.
pub trait TableObserver<T>: Send + Sync {
    fn on_append(&self, row: &T);
    fn on_update(&self, prev: &T, curr: &T);
    fn on_delete(&self, row: &T);
}

type KeyFn<K, T> = Box<dyn Fn(&T) -> K + Send + Sync>;

/// Lookup by a unique secondary key
///
/// If several rows share a key, the most recently written one wins.
pub struct UniqueIndex<K, T> {
    key_fn: KeyFn<K, T>,
    by_key: Mutex<HashMap<K, Ksid>>,
}

impl<K, T> UniqueIndex<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Row,
{
    /// Build the index from `table` and keep it updated
    pub fn attach(table: &Table<T>, key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Arc<Self> {
        let index = Arc::new(Self {
            key_fn: Box::new(key_fn),
            by_key: Mutex::new(HashMap::new()),
        });
        table.add_observer(index.clone());
        index
    }

    pub fn id(&self, key: &K) -> Option<Ksid> {
        self.by_key.lock().get(key).copied()
    }

    /// The row stored under `key`, if any
    pub fn get(&self, table: &Table<T>, key: &K) -> Option<T> {
        let id = self.id(key)?;
        table.get(id).ok()
    }

    pub fn len(&self) -> usize {
        self.by_key.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> TableObserver<T> for UniqueIndex<K, T>
where
    K: Eq + Hash + Send + Sync,
    T: Row,
{
    fn on_append(&self, row: &T) {
        self.by_key.lock().insert((self.key_fn)(row), row.id());
    }

    fn on_update(&self, prev: &T, curr: &T) {
        let (old_key, new_key) = ((self.key_fn)(prev), (self.key_fn)(curr));
        let mut by_key = self.by_key.lock();
        if old_key != new_key && by_key.get(&old_key) == Some(&prev.id()) {
            by_key.remove(&old_key);
        }
        by_key.insert(new_key, curr.id());
    }

    fn on_delete(&self, row: &T) {
        let key = (self.key_fn)(row);
        let mut by_key = self.by_key.lock();
        if by_key.get(&key) == Some(&row.id()) {
            by_key.remove(&key);
        }
    }
}

/// Lookup by a non-unique secondary key
pub struct Index<K, T> {
    key_fn: KeyFn<K, T>,
    by_key: Mutex<HashMap<K, BTreeSet<Ksid>>>,
}

impl<K, T> Index<K, T>
where
    K: Eq + Hash + Send + Sync + 'static,
    T: Row,
{
    /// Build the index from `table` and keep it updated
    pub fn attach(table: &Table<T>, key_fn: impl Fn(&T) -> K + Send + Sync + 'static) -> Arc<Self> {
        let index = Arc::new(Self {
            key_fn: Box::new(key_fn),
            by_key: Mutex::new(HashMap::new()),
        });
        table.add_observer(index.clone());
        index
    }

    /// IDs stored under `key`, ascending
    pub fn ids(&self, key: &K) -> Vec<Ksid> {
        self.by_key
            .lock()
            .get(key)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rows stored under `key`, ascending by ID
    ///
    /// Rows deleted between the ID snapshot and the lookup are skipped.
    pub fn rows(&self, table: &Table<T>, key: &K) -> Vec<T> {
        self.ids(key)
            .into_iter()
            .filter_map(|id| table.get(id).ok())
            .collect()
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.by_key.lock().len()
    }
}

impl<K, T> Index<K, T>
where
    K: Eq + Hash,
{
    fn insert(by_key: &mut HashMap<K, BTreeSet<Ksid>>, key: K, id: Ksid) {
        by_key.entry(key).or_default().insert(id);
    }

    fn remove(by_key: &mut HashMap<K, BTreeSet<Ksid>>, key: &K, id: Ksid) {
        if let Some(ids) = by_key.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                by_key.remove(key);
            }
        }
    }
}

impl<K, T> TableObserver<T> for Index<K, T>
where
    K: Eq + Hash + Send + Sync,
    T: Row,
{
    fn on_append(&self, row: &T) {
        Self::insert(&mut self.by_key.lock(), (self.key_fn)(row), row.id());
    }

    fn on_update(&self, prev: &T, curr: &T) {
        let (old_key, new_key) = ((self.key_fn)(prev), (self.key_fn)(curr));
        if old_key == new_key {
            return;
        }
        let mut by_key = self.by_key.lock();
        Self::remove(&mut by_key, &old_key, prev.id());
        Self::insert(&mut by_key, new_key, curr.id());
    }

    fn on_delete(&self, row: &T) {
        Self::remove(&mut self.by_key.lock(), &(self.key_fn)(row), row.id());
    }
}
