//! Key-value persistence for committed contract fields.
//!
//! Contracts write their committed state through a [`Storage`] at snapshot
//! time. Writes are buffered in a [`WriteBatch`] until `commit`, so a failed
//! snapshot can be rolled back without touching durable data.

pub mod codec;
pub mod memory;
pub mod persistent;

use std::collections::BTreeMap;

use crate::error::StateError;

pub type Entries = BTreeMap<Vec<u8>, Vec<u8>>;

/// Storage trait for snapshot persistence
pub trait Storage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn put(&mut self, key: &[u8], value: &[u8]);

    fn delete(&mut self, key: &[u8]);

    /// Make buffered writes durable
    fn commit(&mut self) -> Result<(), StateError>;

    /// Drop buffered writes
    fn rollback(&mut self);

    /// Keys under `prefix` as seen with buffered writes applied, in order
    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>>;

    fn exists(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Key/value pairs under `prefix`, in key order
    fn entries_with_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.keys_with_prefix(prefix)
            .into_iter()
            .filter_map(|key| self.get(&key).map(|value| (key, value)))
            .collect()
    }

    /// Delete every key under `prefix`, returning how many were deleted
    fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let keys = self.keys_with_prefix(prefix);
        for key in &keys {
            self.delete(key);
        }
        keys.len()
    }
}

/// Buffered puts and deletes over a committed key space
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteBatch {
    /// `Some(v)` when the batch decides the key's value, `None` otherwise
    pub fn lookup(&self, key: &[u8]) -> Option<Option<Vec<u8>>> {
        self.writes.get(key).cloned()
    }

    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    /// Apply the batch onto `data`, leaving the batch empty
    pub fn drain_into(&mut self, data: &mut Entries) {
        for (key, value) in std::mem::take(&mut self.writes) {
            match value {
                Some(value) => {
                    data.insert(key, value);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
    }

    /// Keys under `prefix` in `data` with this batch applied
    pub fn merged_keys(&self, data: &Entries, prefix: &[u8]) -> Vec<Vec<u8>> {
        let mut keys: Vec<Vec<u8>> = data
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| !matches!(self.writes.get(*key), Some(None)))
            .cloned()
            .collect();
        keys.extend(
            self.writes
                .iter()
                .filter(|(key, value)| {
                    key.starts_with(prefix) && value.is_some() && !data.contains_key(*key)
                })
                .map(|(key, _)| key.clone()),
        );
        keys.sort();
        keys
    }
}

pub use memory::MemoryStorage;
pub use persistent::FileStorage;
