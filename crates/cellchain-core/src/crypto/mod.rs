pub mod hash;
pub mod keys;

pub use hash::{hash_blake3, hash_parts, Hash};
pub use keys::{Address, PubKey, ADDRESS_LEN, PUBKEY_LEN};
