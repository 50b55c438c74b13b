//! Transactional ordered map.
//!
//! Committed entries live in `committed`. In-flight writes go to `staged`
//! and in-flight erasures of committed keys go to `tombstones`. A key is
//! never in both `staged` and `tombstones`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::BoundsError;
use crate::scope::{CallScope, CellId, FrameId, Transactional, UndoLog};

pub struct TransactionalMap<K, V> {
    id: CellId,
    scope: CallScope,
    committed: BTreeMap<K, V>,
    staged: BTreeMap<K, V>,
    tombstones: BTreeSet<K>,
    undo: UndoLog<(BTreeMap<K, V>, BTreeSet<K>)>,
}

impl<K: Ord + Clone, V: Clone> TransactionalMap<K, V> {
    pub fn new(scope: &CallScope) -> Self {
        Self::with_id(scope, scope.allocate())
    }

    /// Create a map that reports writes under an existing cell id, so a
    /// composite container settles as one unit.
    pub fn with_id(scope: &CallScope, id: CellId) -> Self {
        TransactionalMap {
            id,
            scope: scope.clone(),
            committed: BTreeMap::new(),
            staged: BTreeMap::new(),
            tombstones: BTreeSet::new(),
            undo: UndoLog::new(),
        }
    }

    pub fn from_committed(scope: &CallScope, entries: BTreeMap<K, V>) -> Self {
        let mut map = Self::new(scope);
        map.replace_committed(entries);
        map
    }

    /// Swap in loaded committed contents, dropping anything staged
    pub(crate) fn replace_committed(&mut self, entries: BTreeMap<K, V>) {
        self.committed = entries;
        self.staged.clear();
        self.tombstones.clear();
        self.undo.clear();
    }

    fn checkpoint(&mut self) {
        let frame = self.scope.touch(self.id);
        self.undo
            .record(frame, || (self.staged.clone(), self.tombstones.clone()));
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        if let Some(value) = self.staged.get(key) {
            return Some(value);
        }
        if self.tombstones.contains(key) {
            return None;
        }
        self.committed.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// 0 or 1, as seen by the in-flight call
    pub fn count(&self, key: &K) -> usize {
        usize::from(self.contains(key))
    }

    /// Like [`get`](Self::get) but fails when the key is absent
    pub fn at(&self, key: &K) -> Result<&V, BoundsError> {
        self.get(key).ok_or(BoundsError::KeyNotFound)
    }

    /// Mutable access to an existing entry, staging a copy on first touch
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.contains(key) {
            return None;
        }
        self.checkpoint();
        if !self.staged.contains_key(key) {
            let value = self.committed.get(key)?.clone();
            self.staged.insert(key.clone(), value);
        }
        self.staged.get_mut(key)
    }

    pub fn at_mut(&mut self, key: &K) -> Result<&mut V, BoundsError> {
        self.get_mut(key).ok_or(BoundsError::KeyNotFound)
    }

    /// Insert or overwrite; returns whether the key was newly added
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let existed = self.contains(&key);
        self.checkpoint();
        self.tombstones.remove(&key);
        self.staged.insert(key, value);
        !existed
    }

    /// Remove `key`, returning whether an entry was removed
    pub fn erase(&mut self, key: &K) -> bool {
        if !self.contains(key) {
            return false;
        }
        self.checkpoint();
        self.staged.remove(key);
        if self.committed.contains_key(key) {
            self.tombstones.insert(key.clone());
        }
        true
    }

    /// Tombstone every committed key and drop staged entries
    pub fn clear(&mut self) {
        self.checkpoint();
        self.staged.clear();
        self.tombstones = self.committed.keys().cloned().collect();
    }

    pub fn len(&self) -> usize {
        let fresh = self
            .staged
            .keys()
            .filter(|key| !self.committed.contains_key(key))
            .count();
        self.committed.len() - self.tombstones.len() + fresh
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Committed value for `key`, ignoring anything staged
    pub fn get_committed(&self, key: &K) -> Option<&V> {
        self.committed.get(key)
    }

    /// Iterate committed entries only
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.committed.iter()
    }

    /// Snapshot of the map as seen by the in-flight call, in key order
    pub fn effective_entries(&self) -> Vec<(K, V)> {
        let mut merged: BTreeMap<&K, &V> = self
            .committed
            .iter()
            .filter(|(key, _)| !self.tombstones.contains(key))
            .collect();
        merged.extend(self.staged.iter());
        merged
            .into_iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.effective_entries()
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }
}

impl<K: Ord + Clone, V: Clone + Default> TransactionalMap<K, V> {
    /// Entry for `key`, default-inserting it when absent
    pub fn entry(&mut self, key: K) -> &mut V {
        if self.get_mut(&key).is_none() {
            self.insert(key.clone(), V::default());
        }
        self.staged.entry(key).or_default()
    }
}

impl<K: Ord + Clone, V: Clone> Transactional for TransactionalMap<K, V> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn commit(&mut self) {
        for key in std::mem::take(&mut self.tombstones) {
            self.committed.remove(&key);
        }
        self.committed.append(&mut self.staged);
        self.undo.clear();
    }

    fn revert(&mut self) {
        self.staged.clear();
        self.tombstones.clear();
        self.undo.clear();
    }

    fn rollback(&mut self, frame: FrameId) {
        if let Some((staged, tombstones)) = self.undo.unwind(frame) {
            self.staged = staged;
            self.tombstones = tombstones;
        }
    }

    fn is_staged(&self) -> bool {
        !self.staged.is_empty() || !self.tombstones.is_empty()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for TransactionalMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalMap")
            .field("id", &self.id)
            .field("committed", &self.committed)
            .field("staged", &self.staged)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}
