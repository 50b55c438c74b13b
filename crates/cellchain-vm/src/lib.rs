//! Cellchain VM - Built-in contracts and the call dispatcher
//!
//! Contracts keep their fields in transactional cells from `cellchain-state`.
//! The [`Host`] runs every call in a nested frame and settles the cells the
//! frame touched; the [`Executor`] drives transactions and block settlement
//! through it.

pub mod contract;
pub mod contracts;
pub mod error;
pub mod events;
pub mod executor;
pub mod host;

pub use contract::{Contract, HasOwner, Ownable};
pub use error::VmError;
pub use events::ExecutionEvent;
pub use executor::{BlockReceipt, ExecutionResult, Executor};
pub use host::Host;
