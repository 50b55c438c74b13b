//! Scalar transactional cell.

use std::fmt;

use crate::scope::{CallScope, CellId, FrameId, Transactional, UndoLog};

/// Whether a cell currently carries an in-flight value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    Committed,
    Staged(T),
}

/// Promote a slot: on first access the committed value is copied into the
/// staging slot, and every later access works on the staged copy.
pub fn promote<'a, T: Clone>(slot: &'a mut Slot<T>, committed: &T) -> &'a mut T {
    if let Slot::Committed = slot {
        *slot = Slot::Staged(committed.clone());
    }
    match slot {
        Slot::Staged(value) => value,
        Slot::Committed => unreachable!("slot promoted above"),
    }
}

/// A single storage slot with all-or-nothing commit/revert.
///
/// Reads see the staged value when there is one and the committed value
/// otherwise. Writes promote the slot and record the cell in the innermost
/// open call frame. Nothing becomes durable until `commit`.
pub struct TransactionalCell<T> {
    id: CellId,
    scope: CallScope,
    committed: T,
    slot: Slot<T>,
    undo: UndoLog<Slot<T>>,
}

impl<T: Clone> TransactionalCell<T> {
    /// Create a cell whose committed value is `value`
    pub fn new(scope: &CallScope, value: T) -> Self {
        TransactionalCell {
            id: scope.allocate(),
            scope: scope.clone(),
            committed: value,
            slot: Slot::Committed,
            undo: UndoLog::new(),
        }
    }

    /// Current value as seen by the in-flight call
    pub fn get(&self) -> &T {
        match &self.slot {
            Slot::Staged(value) => value,
            Slot::Committed => &self.committed,
        }
    }

    /// Last committed value, ignoring anything staged
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Mutable access to the staged value
    pub fn get_mut(&mut self) -> &mut T {
        self.checkpoint();
        promote(&mut self.slot, &self.committed)
    }

    pub fn set(&mut self, value: T) {
        self.checkpoint();
        self.slot = Slot::Staged(value);
    }

    fn checkpoint(&mut self) {
        let frame = self.scope.touch(self.id);
        self.undo.record(frame, || self.slot.clone());
    }
}

impl<T: Clone + Default> TransactionalCell<T> {
    pub fn with_default(scope: &CallScope) -> Self {
        Self::new(scope, T::default())
    }
}

impl<T: Clone> Transactional for TransactionalCell<T> {
    fn cell_id(&self) -> CellId {
        self.id
    }

    fn commit(&mut self) {
        if let Slot::Staged(value) = std::mem::replace(&mut self.slot, Slot::Committed) {
            self.committed = value;
        }
        self.undo.clear();
    }

    fn revert(&mut self) {
        self.slot = Slot::Committed;
        self.undo.clear();
    }

    fn rollback(&mut self, frame: FrameId) {
        if let Some(slot) = self.undo.unwind(frame) {
            self.slot = slot;
        }
    }

    fn is_staged(&self) -> bool {
        matches!(self.slot, Slot::Staged(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for TransactionalCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionalCell")
            .field("id", &self.id)
            .field("committed", &self.committed)
            .field("slot", &self.slot)
            .finish()
    }
}
