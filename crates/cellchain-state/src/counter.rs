use crate::error::ArithmeticError;
use crate::numeric::TransactionalNumericCell;
use crate::scope::{CallScope, CellId, FrameId, Transactional};

/// Monotonic id allocator backed by a transactional u64
#[derive(Debug)]
pub struct Counter {
    value: TransactionalNumericCell<u64>,
}

impl Counter {
    pub fn new(scope: &CallScope) -> Self {
        Counter {
            value: TransactionalNumericCell::zero(scope),
        }
    }

    pub fn starting_at(scope: &CallScope, value: u64) -> Self {
        Counter {
            value: TransactionalNumericCell::new(scope, value),
        }
    }

    pub fn current(&self) -> u64 {
        self.value.get()
    }

    pub fn committed(&self) -> u64 {
        self.value.committed()
    }

    /// Return the current value and advance the counter
    pub fn next_id(&mut self) -> Result<u64, ArithmeticError> {
        let id = self.current();
        self.value.increment()?;
        Ok(id)
    }

    pub fn increment(&mut self) -> Result<(), ArithmeticError> {
        self.value.increment().map(|_| ())
    }

    pub fn reset(&mut self) {
        self.value.set(0);
    }
}

impl Transactional for Counter {
    fn cell_id(&self) -> CellId {
        self.value.cell_id()
    }

    fn commit(&mut self) {
        self.value.commit();
    }

    fn revert(&mut self) {
        self.value.revert();
    }

    fn rollback(&mut self, frame: FrameId) {
        self.value.rollback(frame);
    }

    fn is_staged(&self) -> bool {
        self.value.is_staged()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id_sequence() {
        let scope = CallScope::new();
        let mut counter = Counter::new(&scope);
        assert_eq!(counter.next_id().unwrap(), 0);
        assert_eq!(counter.next_id().unwrap(), 1);
        assert_eq!(counter.current(), 2);

        counter.revert();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_reset_and_overflow() {
        let scope = CallScope::new();
        let mut counter = Counter::starting_at(&scope, u64::MAX);
        assert_eq!(counter.increment(), Err(ArithmeticError::Overflow));
        counter.reset();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_ids_taken_in_reverted_frame_are_reissued() {
        let scope = CallScope::new();
        let mut counter = Counter::new(&scope);

        scope.open();
        assert_eq!(counter.next_id().unwrap(), 0);
        scope.open();
        assert_eq!(counter.next_id().unwrap(), 1);
        let reverted = scope.close_revert().unwrap();
        counter.rollback(reverted.frame);
        assert_eq!(counter.next_id().unwrap(), 1);
    }
}
