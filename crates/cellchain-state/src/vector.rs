//! Transactional vector.
//!
//! The committed elements are kept as-is. Staging records a logical length,
//! per-index overwrites, and whether the vector was cleared, so writes near
//! the tail never copy the whole committed vector.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::BoundsError;
use crate::scope::{CallScope, CellId, FrameId, Transactional, UndoLog};

#[derive(Debug, Clone)]
struct Staging<T> {
    writes: BTreeMap<u64, T>,
    len: u64,
    cleared: bool,
}

pub struct TransactionalVector<T> {
    id: CellId,
    scope: CallScope,
    committed: Vec<T>,
    staging: Option<Staging<T>>,
    undo: UndoLog<Option<Staging<T>>>,
}

impl<T: Clone> TransactionalVector<T> {
    pub fn new(scope: &CallScope) -> Self {
        Self::with_id(scope, scope.allocate())
    }

    pub fn with_id(scope: &CallScope, id: CellId) -> Self {
        TransactionalVector {
            id,
            scope: scope.clone(),
            committed: Vec::new(),
            staging: None,
            undo: UndoLog::new(),
        }
    }

    pub fn from_committed(scope: &CallScope, values: Vec<T>) -> Self {
        let mut vector = Self::new(scope);
        vector.replace_committed(values);
        vector
    }

    pub(crate) fn replace_committed(&mut self, values: Vec<T>) {
        self.committed = values;
        self.staging = None;
        self.undo.clear();
    }

    pub fn len(&self) -> u64 {
        match &self.staging {
            Some(staging) => staging.len,
            None => self.committed.len() as u64,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: u64) -> Result<&T, BoundsError> {
        self.check(index)?;
        Ok(self.read(index))
    }

    pub fn get_mut(&mut self, index: u64) -> Result<&mut T, BoundsError> {
        self.check(index)?;
        let value = self.read(index).clone();
        let staging = self.stage();
        Ok(staging.writes.entry(index).or_insert(value))
    }

    pub fn set(&mut self, index: u64, value: T) -> Result<(), BoundsError> {
        self.check(index)?;
        self.stage().writes.insert(index, value);
        Ok(())
    }

    pub fn push(&mut self, value: T) {
        let staging = self.stage();
        let index = staging.len;
        staging.writes.insert(index, value);
        staging.len += 1;
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let last = self.len() - 1;
        let value = self.read(last).clone();
        let staging = self.stage();
        staging.writes.remove(&last);
        staging.len = last;
        Some(value)
    }

    /// Insert at `index`, shifting the tail right. `index == len` appends.
    pub fn insert(&mut self, index: u64, value: T) -> Result<(), BoundsError> {
        let len = self.len();
        if index > len {
            return Err(BoundsError::IndexOutOfRange { index, len });
        }
        let tail: Vec<T> = (index..len).map(|i| self.read(i).clone()).collect();
        let staging = self.stage();
        staging.writes.insert(index, value);
        for (offset, item) in tail.into_iter().enumerate() {
            staging.writes.insert(index + 1 + offset as u64, item);
        }
        staging.len = len + 1;
        Ok(())
    }

    /// Remove the element at `index`, shifting the tail left
    pub fn remove(&mut self, index: u64) -> Result<T, BoundsError> {
        self.check(index)?;
        let len = self.len();
        let removed = self.read(index).clone();
        let tail: Vec<T> = (index + 1..len).map(|i| self.read(i).clone()).collect();
        let staging = self.stage();
        for (offset, item) in tail.into_iter().enumerate() {
            staging.writes.insert(index + offset as u64, item);
        }
        staging.writes.remove(&(len - 1));
        staging.len = len - 1;
        Ok(removed)
    }

    pub fn clear(&mut self) {
        let staging = self.stage();
        staging.writes.clear();
        staging.len = 0;
        staging.cleared = true;
    }

    /// Elements as seen by the in-flight call
    pub fn to_vec(&self) -> Vec<T> {
        (0..self.len()).map(|i| self.read(i).clone()).collect()
    }

    /// Iterate committed elements only
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.committed.iter()
    }

    fn check(&self, index: u64) -> Result<(), BoundsError> {
        let len = self.len();
        if index >= len {
            return Err(BoundsError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Effective element at an index already known to be in range
    fn read(&self, index: u64) -> &T {
        if let Some(staging) = &self.staging {
            if let Some(value) = staging.writes.get(&index) {
                return value;
            }
        }
        &self.committed[index as usize]
    }

    fn stage(&mut self) -> &mut Staging<T> {
        let frame = self.scope.touch(self.id);
        self.undo.record(frame, || self.staging.clone());
        let len = self.committed.len() as u64;
        self.staging.get_or_insert_with(|| Staging {
            writes: BTreeMap::new(),
            len,
            cleared: false,
        })
    }
}

impl<T: Clone> Transactional for TransactionalVector<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn commit(&mut self) {
        self.undo.clear();
        let Some(staging) = self.staging.take() else {
            return;
        };
        if staging.cleared {
            self.committed.clear();
        }
        self.committed.truncate(staging.len as usize);
        for (index, value) in staging.writes {
            let index = index as usize;
            if index < self.committed.len() {
                self.committed[index] = value;
            } else {
                self.committed.push(value);
            }
        }
    }

    fn revert(&mut self) {
        self.staging = None;
        self.undo.clear();
    }

    fn rollback(&mut self, frame: FrameId) {
        if let Some(staging) = self.undo.unwind(frame) {
            self.staging = staging;
        }
    }

    fn is_staged(&self) -> bool {
        self.staging.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for TransactionalVector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalVector")
            .field("id", &self.id)
            .field("committed", &self.committed)
            .field("staging", &self.staging)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(scope: &CallScope) -> TransactionalVector<u32> {
        TransactionalVector::from_committed(scope, vec![10, 20, 30])
    }

    #[test]
    fn test_push_pop_revert() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);

        vector.push(40);
        assert_eq!(vector.len(), 4);
        assert_eq!(vector.pop(), Some(40));
        assert_eq!(vector.pop(), Some(30));
        assert_eq!(vector.to_vec(), vec![10, 20]);

        vector.revert();
        assert_eq!(vector.to_vec(), vec![10, 20, 30]);
    }

    #[test]
    fn test_pop_then_push_commit() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);
        vector.pop();
        vector.push(99);
        vector.commit();
        assert_eq!(vector.iter().copied().collect::<Vec<_>>(), vec![10, 20, 99]);
    }

    #[test]
    fn test_out_of_range() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);
        assert_eq!(
            vector.get(3),
            Err(BoundsError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert!(vector.set(7, 1).is_err());
        assert!(vector.remove(3).is_err());
        assert!(vector.insert(4, 1).is_err());
        assert!(!vector.is_staged());
    }

    #[test]
    fn test_insert_and_remove_shift() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);

        vector.insert(1, 15).unwrap();
        assert_eq!(vector.to_vec(), vec![10, 15, 20, 30]);
        vector.insert(4, 35).unwrap();
        assert_eq!(vector.to_vec(), vec![10, 15, 20, 30, 35]);

        assert_eq!(vector.remove(0).unwrap(), 10);
        assert_eq!(vector.to_vec(), vec![15, 20, 30, 35]);

        vector.commit();
        assert_eq!(vector.iter().copied().collect::<Vec<_>>(), vec![15, 20, 30, 35]);
    }

    #[test]
    fn test_clear_then_push() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);
        vector.clear();
        assert!(vector.is_empty());
        vector.push(1);
        // committed view is unaffected until commit
        assert_eq!(vector.iter().count(), 3);
        vector.commit();
        assert_eq!(vector.iter().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_get_mut_and_set() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);
        *vector.get_mut(0).unwrap() += 1;
        vector.set(2, 0).unwrap();
        assert_eq!(vector.to_vec(), vec![11, 20, 0]);
        vector.revert();
        assert_eq!(*vector.get(0).unwrap(), 10);
    }

    #[test]
    fn test_rollback_restores_enclosing_frame_staging() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);

        scope.open();
        vector.push(40);
        scope.open();
        vector.clear();
        vector.push(1);
        let reverted = scope.close_revert().unwrap();
        vector.rollback(reverted.frame);
        assert_eq!(vector.to_vec(), vec![10, 20, 30, 40]);

        scope.close_commit().unwrap();
        vector.commit();
        assert_eq!(vector.iter().copied().collect::<Vec<_>>(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_rollback_of_first_write_unstages() {
        let scope = CallScope::new();
        let mut vector = seeded(&scope);

        scope.open();
        scope.open();
        vector.set(0, 1).unwrap();
        let reverted = scope.close_revert().unwrap();
        vector.rollback(reverted.frame);
        assert!(!vector.is_staged());
        assert_eq!(vector.to_vec(), vec![10, 20, 30]);
    }
}
