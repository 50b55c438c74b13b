//! Call scopes: the per-call record of which cells were written.
//!
//! Cells are created against a [`CallScope`] and receive a [`CellId`]. Every
//! mutating cell operation records its id in the innermost open frame. The
//! dispatcher opens a frame per call and, when the call resolves, commits or
//! rolls back exactly the recorded cells. Cells never know which contract
//! owns them.
//!
//! Frames nest. A cell written by several frames keeps an [`UndoLog`] of its
//! staged state as it was when each frame first wrote it, so rolling back an
//! inner frame restores what the enclosing frames had staged.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::trace;

use crate::error::StateError;

/// Identifier of a transactional cell within one [`CallScope`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellId(u64);

/// Identifier of one opened frame. Frames opened later compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(u64);

/// Set of cells touched by one frame
pub type TouchedCells = BTreeSet<CellId>;

#[derive(Debug)]
struct Frame {
    id: FrameId,
    touched: TouchedCells,
}

#[derive(Debug, Default)]
struct ScopeTable {
    next_cell: u64,
    next_frame: u64,
    frames: Vec<Frame>,
}

/// A frame closed unsuccessfully: its cells must be rolled back to their
/// state from before the frame opened
#[derive(Debug)]
pub struct RevertedFrame {
    pub frame: FrameId,
    pub touched: TouchedCells,
}

/// Shared handle onto the table of open call frames.
///
/// Cloning the handle shares the table. Execution is single-writer, so the
/// table lives behind an `Rc<RefCell<_>>`.
#[derive(Debug, Clone, Default)]
pub struct CallScope {
    table: Rc<RefCell<ScopeTable>>,
}

impl CallScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a fresh cell id
    pub fn allocate(&self) -> CellId {
        let mut table = self.table.borrow_mut();
        let id = CellId(table.next_cell);
        table.next_cell += 1;
        id
    }

    /// Record a write to `id` in the innermost open frame and return that
    /// frame.
    ///
    /// Writes made while no frame is open (genesis, loading) are not tracked;
    /// whoever makes them commits the cells explicitly.
    pub fn touch(&self, id: CellId) -> Option<FrameId> {
        let mut table = self.table.borrow_mut();
        let frame = table.frames.last_mut()?;
        frame.touched.insert(id);
        Some(frame.id)
    }

    /// Open a new innermost frame and return the resulting depth
    pub fn open(&self) -> usize {
        let mut table = self.table.borrow_mut();
        let id = FrameId(table.next_frame);
        table.next_frame += 1;
        table.frames.push(Frame {
            id,
            touched: TouchedCells::new(),
        });
        trace!(frame = ?id, depth = table.frames.len(), "call scope opened");
        table.frames.len()
    }

    pub fn depth(&self) -> usize {
        self.table.borrow().frames.len()
    }

    pub fn is_open(&self) -> bool {
        self.depth() > 0
    }

    /// Cells touched so far by the innermost frame
    pub fn touched(&self) -> TouchedCells {
        self.table
            .borrow()
            .frames
            .last()
            .map(|frame| frame.touched.clone())
            .unwrap_or_default()
    }

    /// Close the innermost frame successfully.
    ///
    /// A nested frame hands its cells to the enclosing frame and returns
    /// `None`; nothing becomes durable until the outermost frame closes. The
    /// outermost frame returns the cells that must now be committed.
    pub fn close_commit(&self) -> Result<Option<TouchedCells>, StateError> {
        let mut table = self.table.borrow_mut();
        let frame = table.frames.pop().ok_or(StateError::ScopeNotOpen)?;
        match table.frames.last_mut() {
            Some(parent) => {
                parent.touched.extend(frame.touched);
                Ok(None)
            }
            None => Ok(Some(frame.touched)),
        }
    }

    /// Close the innermost frame unsuccessfully, returning the cells that
    /// must be rolled back right away.
    pub fn close_revert(&self) -> Result<RevertedFrame, StateError> {
        let frame = self
            .table
            .borrow_mut()
            .frames
            .pop()
            .ok_or(StateError::ScopeNotOpen)?;
        Ok(RevertedFrame {
            frame: frame.id,
            touched: frame.touched,
        })
    }
}

/// Staged states of one cell, saved at its first write in each frame.
///
/// Entries are kept in frame order. A frame that commits into its parent
/// leaves its entry behind; the entry still describes the cell as it was
/// before any frame from that point on wrote it.
#[derive(Debug, Clone)]
pub struct UndoLog<S> {
    entries: Vec<(FrameId, S)>,
}

impl<S> Default for UndoLog<S> {
    fn default() -> Self {
        UndoLog { entries: Vec::new() }
    }
}

impl<S> UndoLog<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `current()` as the state before `frame`, unless something at or
    /// after `frame` was already saved
    pub fn record(&mut self, frame: Option<FrameId>, current: impl FnOnce() -> S) {
        let Some(frame) = frame else {
            return;
        };
        if self.entries.last().map_or(true, |(last, _)| *last < frame) {
            self.entries.push((frame, current()));
        }
    }

    /// Drop every entry saved since `frame` opened and return the earliest,
    /// or `None` if the cell was not written since then
    pub fn unwind(&mut self, frame: FrameId) -> Option<S> {
        let split = self.entries.partition_point(|(id, _)| *id < frame);
        self.entries.drain(split..).next().map(|(_, state)| state)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A storage slot with commit/revert semantics
pub trait Transactional {
    /// Id recorded in the call scope when this cell is written
    fn cell_id(&self) -> CellId;

    /// Make staged values durable and drop the staging area
    fn commit(&mut self);

    /// Discard all staged values, leaving committed values untouched
    fn revert(&mut self);

    /// Restore the staged state the cell had when `frame` opened
    fn rollback(&mut self, frame: FrameId);

    /// Whether the cell currently holds uncommitted state
    fn is_staged(&self) -> bool;
}

/// How a resolved frame's cells are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Commit,
    Rollback(FrameId),
}

/// Commit or roll back every cell whose id is in `touched`. Returns the
/// number of cells settled.
pub fn settle<'a, I>(cells: I, touched: &TouchedCells, settlement: Settlement) -> usize
where
    I: IntoIterator<Item = &'a mut dyn Transactional>,
{
    let mut settled = 0;
    for cell in cells {
        if touched.contains(&cell.cell_id()) {
            match settlement {
                Settlement::Commit => cell.commit(),
                Settlement::Rollback(frame) => cell.rollback(frame),
            }
            settled += 1;
        }
    }
    settled
}

/// Commit every cell regardless of tracking, used after genesis and loading
pub fn commit_all<'a, I>(cells: I)
where
    I: IntoIterator<Item = &'a mut dyn Transactional>,
{
    for cell in cells {
        cell.commit();
    }
}
