//! Map with index-based enumeration.
//!
//! Keys are kept in insertion order in a vector alongside the key/value map.
//! Both halves share one cell id so the scope settles them together.

use std::fmt;

use crate::error::BoundsError;
use crate::map::TransactionalMap;
use crate::scope::{CallScope, CellId, FrameId, Transactional};
use crate::vector::TransactionalVector;

pub struct EnumerableMap<K, V> {
    keys: TransactionalVector<K>,
    values: TransactionalMap<K, V>,
}

impl<K: Ord + Clone, V: Clone> EnumerableMap<K, V> {
    pub fn new(scope: &CallScope) -> Self {
        let id = scope.allocate();
        EnumerableMap {
            keys: TransactionalVector::with_id(scope, id),
            values: TransactionalMap::with_id(scope, id),
        }
    }

    /// Rebuild a map whose committed entries are `entries`, in that order
    pub fn from_committed(scope: &CallScope, entries: Vec<(K, V)>) -> Self {
        let id = scope.allocate();
        let keys = entries.iter().map(|(key, _)| key.clone()).collect();
        let mut map = EnumerableMap {
            keys: TransactionalVector::with_id(scope, id),
            values: TransactionalMap::with_id(scope, id),
        };
        map.keys.replace_committed(keys);
        map.values.replace_committed(entries.into_iter().collect());
        map
    }

    /// Committed entries in enumeration order
    pub fn committed_entries(&self) -> Vec<(K, V)> {
        self.keys
            .iter()
            .filter_map(|key| {
                self.values
                    .get_committed(key)
                    .map(|value| (key.clone(), value.clone()))
            })
            .collect()
    }

    /// Insert or overwrite. Returns true when the key is new.
    pub fn set(&mut self, key: K, value: V) -> bool {
        let added = self.values.insert(key.clone(), value);
        if added {
            self.keys.push(key);
        }
        added
    }

    /// Remove `key`. Returns false when it was not present.
    pub fn remove(&mut self, key: &K) -> bool {
        if !self.values.erase(key) {
            return false;
        }
        let position = (0..self.keys.len()).find(|&i| matches!(self.keys.get(i), Ok(k) if k == key));
        if let Some(position) = position {
            // position came from the live range
            self.keys.remove(position).ok();
        }
        true
    }

    /// Key and value at enumeration position `index`
    pub fn at(&self, index: u64) -> Result<(K, V), BoundsError> {
        let key = self.keys.get(index)?;
        let value = self.values.at(key)?;
        Ok((key.clone(), value.clone()))
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.values.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.values.get_mut(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.values.contains(key)
    }

    pub fn length(&self) -> u64 {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// Entries in enumeration order, as seen by the in-flight call
    pub fn entries(&self) -> Vec<(K, V)> {
        (0..self.length())
            .filter_map(|i| self.at(i).ok())
            .collect()
    }
}

impl<K: Ord + Clone, V: Clone> Transactional for EnumerableMap<K, V> {
    fn cell_id(&self) -> CellId {
        self.values.cell_id()
    }

    fn commit(&mut self) {
        self.keys.commit();
        self.values.commit();
    }

    fn revert(&mut self) {
        self.keys.revert();
        self.values.revert();
    }

    fn rollback(&mut self, frame: FrameId) {
        self.keys.rollback(frame);
        self.values.rollback(frame);
    }

    fn is_staged(&self) -> bool {
        self.keys.is_staged() || self.values.is_staged()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for EnumerableMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumerableMap")
            .field("keys", &self.keys)
            .field("values", &self.values)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_enumerates_in_insertion_order() {
        let scope = CallScope::new();
        let mut map = EnumerableMap::new(&scope);
        assert!(map.set(30u64, "c"));
        assert!(map.set(10u64, "a"));
        assert!(!map.set(30u64, "c2"));

        assert_eq!(map.length(), 2);
        assert_eq!(map.at(0).unwrap(), (30, "c2"));
        assert_eq!(map.at(1).unwrap(), (10, "a"));
        assert!(map.at(2).is_err());
    }

    #[test]
    fn test_remove_keeps_remaining_order() {
        let scope = CallScope::new();
        let mut map = EnumerableMap::new(&scope);
        for key in 1u64..=4 {
            map.set(key, key * 10);
        }
        map.commit();

        assert!(map.remove(&2));
        assert!(!map.remove(&2));
        assert_eq!(map.entries(), vec![(1, 10), (3, 30), (4, 40)]);

        map.revert();
        assert_eq!(map.length(), 4);
        assert_eq!(map.get(&2), Some(&20));
    }

    #[test]
    fn test_halves_share_cell_id() {
        let scope = CallScope::new();
        let mut map = EnumerableMap::new(&scope);
        scope.open();
        map.set(1u8, ());
        assert_eq!(scope.touched().len(), 1);
        assert!(scope.touched().contains(&map.cell_id()));
    }

    #[test]
    fn test_rollback_restores_both_halves() {
        let scope = CallScope::new();
        let mut map = EnumerableMap::new(&scope);
        map.set(1u64, 10u64);
        map.commit();

        scope.open();
        map.set(2, 20);
        scope.open();
        map.remove(&1);
        map.set(3, 30);
        *map.get_mut(&2).unwrap() += 1;
        let reverted = scope.close_revert().unwrap();
        map.rollback(reverted.frame);

        assert_eq!(map.entries(), vec![(1, 10), (2, 20)]);
        scope.close_commit().unwrap();
        map.commit();
        assert_eq!(map.committed_entries(), vec![(1, 10), (2, 20)]);
    }
}
