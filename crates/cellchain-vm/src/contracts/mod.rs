//! Built-in contracts.
//!
//! Each module holds the contract's state type and free functions taking the
//! [`Host`](crate::host::Host). The free functions are the only way one
//! contract mutates another.

pub mod energy;
pub mod players;
pub mod proposals;
pub mod system;

pub use energy::Energy;
pub use players::PlayerRegistry;
pub use proposals::{Proposal, ProposalBoard};
pub use system::SystemContract;
