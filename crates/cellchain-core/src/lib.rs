//! Cellchain Core - Core types, hashing and serialization
//!
//! This crate provides the foundational types shared by the transactional
//! state layer, the contract host and the node binary.

pub mod crypto;
pub mod error;
pub mod serialize;
pub mod types;

pub use crypto::{hash_blake3, Address, Hash, PubKey, PUBKEY_LEN};
pub use error::CoreError;
pub use types::*;

/// 256-bit unsigned integer used for user-facing amounts.
pub use ethnum::U256;
/// 256-bit signed integer used for pending delegation deltas.
pub use ethnum::I256;
