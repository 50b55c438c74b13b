use serde::{Deserialize, Serialize};

use crate::crypto::PubKey;

/// One entry of the validator-set diff handed to the consensus engine.
///
/// A power of zero removes the validator; validators absent from the diff
/// are unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: PubKey,
    pub power: u64,
}

impl ValidatorUpdate {
    pub fn new(pub_key: PubKey, power: u64) -> Self {
        ValidatorUpdate { pub_key, power }
    }

    pub fn is_removal(&self) -> bool {
        self.power == 0
    }
}
