//! Cellchain State - transactional storage cells
//!
//! Contract fields are built from the cells in this crate. Each cell keeps a
//! committed value and, while a call is in flight, a staged shadow of it.
//! Writes are recorded in a [`CallScope`] so the dispatcher can commit or
//! revert exactly what a call touched. Committed state is persisted through
//! the [`Storage`] trait using the field codec in [`storage::codec`].

pub mod cell;
pub mod counter;
pub mod enumerable;
pub mod error;
pub mod map;
pub mod merkle;
pub mod numeric;
pub mod scope;
pub mod storage;
pub mod vector;

pub use cell::{promote, Slot, TransactionalCell};
pub use counter::Counter;
pub use enumerable::EnumerableMap;
pub use error::{ArithmeticError, BoundsError, StateError};
pub use map::TransactionalMap;
pub use merkle::{compute_state_root, storage_root};
pub use numeric::{Operand, TransactionalNumericCell, Uint};
pub use vector::TransactionalVector;
pub use scope::{
    commit_all, settle, CallScope, CellId, FrameId, RevertedFrame, Settlement, TouchedCells, Transactional, UndoLog,
};
pub use storage::{FileStorage, MemoryStorage, Storage};
