use serde::{Deserialize, Serialize};

use crate::crypto::{hash_blake3, Address, Hash, PubKey};
use crate::error::CoreError;
use crate::serialize;
use crate::types::transaction::Transaction;

/// An ordered batch of transactions delivered by the consensus layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height (genesis is 0, the first delivered block is 1)
    pub height: u64,
    /// Transactions in execution order
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(height: u64, transactions: Vec<Transaction>) -> Self {
        Block {
            height,
            transactions,
        }
    }

    /// Hash of the bincode encoding of the block
    pub fn hash(&self) -> Result<Hash, CoreError> {
        let height = serialize::to_bytes(&self.height)?;
        let mut bytes = height;
        for tx in &self.transactions {
            // Call is internally tagged, so it goes through JSON
            bytes.extend_from_slice(serialize::to_json(tx)?.as_bytes());
        }
        Ok(hash_blake3(&bytes))
    }
}

/// Token metadata for the genesis energy ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyGenesis {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for EnergyGenesis {
    fn default() -> Self {
        EnergyGenesis {
            name: "Energy".to_string(),
            symbol: "NRG".to_string(),
            decimals: 18,
        }
    }
}

/// Genesis configuration for the chain's built-in contracts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub chain_id: u64,
    /// Initial validator candidates; their genesis voting weight is zero
    pub initial_validators: Vec<PubKey>,
    /// Requested initial slot count, capped by the number of initial validators
    pub initial_num_slots: u64,
    /// Immutable ceiling for the slot count
    pub max_slots: u64,
    /// Owner of every genesis contract
    pub creator: Address,
    #[serde(default)]
    pub energy: EnergyGenesis,
}
