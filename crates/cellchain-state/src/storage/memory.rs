use super::{Entries, Storage, WriteBatch};
use crate::error::StateError;

/// In-memory storage, used by tests and by nodes without a data directory
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Entries,
    pending: WriteBatch,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed keys
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn all_data(&self) -> &Entries {
        &self.data
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.pending.lookup(key) {
            Some(pending) => pending,
            None => self.data.get(key).cloned(),
        }
    }

    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.pending.put(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.pending.delete(key);
    }

    fn commit(&mut self) -> Result<(), StateError> {
        self.pending.drain_into(&mut self.data);
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.pending.merged_keys(&self.data, prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_visible_until_rollback() {
        let mut storage = MemoryStorage::new();

        storage.put(b"energy/name", b"Energy");
        assert_eq!(storage.get(b"energy/name"), Some(b"Energy".to_vec()));
        assert!(storage.is_empty());

        storage.rollback();
        assert_eq!(storage.get(b"energy/name"), None);
    }

    #[test]
    fn test_delete_and_commit() {
        let mut storage = MemoryStorage::new();
        storage.put(b"k", b"v");
        storage.commit().unwrap();

        storage.delete(b"k");
        assert!(!storage.exists(b"k"));
        storage.rollback();
        assert!(storage.exists(b"k"));

        storage.delete(b"k");
        storage.commit().unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_prefix_queries_merge_pending() {
        let mut storage = MemoryStorage::new();
        storage.put(b"system/stakes/a", b"1");
        storage.put(b"system/stakes/b", b"2");
        storage.put(b"system/num_slots", b"3");
        storage.commit().unwrap();

        storage.delete(b"system/stakes/a");
        storage.put(b"system/stakes/c", b"4");

        assert_eq!(
            storage.keys_with_prefix(b"system/stakes/"),
            vec![b"system/stakes/b".to_vec(), b"system/stakes/c".to_vec()]
        );
        assert_eq!(
            storage.entries_with_prefix(b"system/stakes/c"),
            vec![(b"system/stakes/c".to_vec(), b"4".to_vec())]
        );
    }

    #[test]
    fn test_delete_prefix() {
        let mut storage = MemoryStorage::new();
        storage.put(b"p/1", b"x");
        storage.put(b"p/2", b"y");
        storage.put(b"q/1", b"z");
        storage.commit().unwrap();

        assert_eq!(storage.delete_prefix(b"p/"), 2);
        storage.commit().unwrap();
        assert_eq!(storage.len(), 1);
    }
}
