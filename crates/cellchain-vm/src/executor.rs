use cellchain_core::{Address, Block, Call, GenesisConfig, Hash, Transaction, ValidatorUpdate, U256};
use cellchain_state::{storage_root, MemoryStorage, Storage};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::contracts::{energy, players, proposals, system};
use crate::error::VmError;
use crate::events::ExecutionEvent;
use crate::host::Host;

/// Result of executing a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the call committed
    pub success: bool,
    /// Error message if the call reverted
    pub error: Option<String>,
    /// Events of a committed call
    pub events: Vec<ExecutionEvent>,
}

/// Outcome of a whole block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReceipt {
    pub height: u64,
    pub results: Vec<ExecutionResult>,
    /// Validator set changes produced by settlement
    pub validator_updates: Vec<ValidatorUpdate>,
}

impl BlockReceipt {
    pub fn committed(&self) -> usize {
        self.results.iter().filter(|result| result.success).count()
    }
}

/// Transaction executor: runs each call in its own outermost frame and
/// settles governance once per block
#[derive(Debug)]
pub struct Executor {
    host: Host,
}

impl Executor {
    pub fn genesis(config: &GenesisConfig) -> Result<Self, VmError> {
        info!(
            chain_id = config.chain_id,
            validators = config.initial_validators.len(),
            "initializing genesis state"
        );
        Ok(Executor {
            host: Host::genesis(config)?,
        })
    }

    pub fn load(storage: &dyn Storage) -> Result<Self, VmError> {
        Ok(Executor {
            host: Host::load(storage)?,
        })
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Mutable access for callers driving contracts directly
    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    /// Execute a single transaction
    pub fn execute(&mut self, tx: &Transaction) -> ExecutionResult {
        let method = tx.call.method();
        debug!(sender = %tx.sender, method, "executing transaction");

        self.host.begin(tx.sender, tx.value);
        let result = dispatch(&mut self.host, &tx.call);
        let events = self.host.take_events();

        match result {
            Ok(()) => ExecutionResult {
                success: true,
                error: None,
                events,
            },
            Err(err) => {
                if err.is_domain() {
                    warn!(sender = %tx.sender, method, %err, "transaction reverted");
                } else {
                    error!(sender = %tx.sender, method, %err, "transaction reverted on broken invariant");
                }
                ExecutionResult {
                    success: false,
                    error: Some(err.to_string()),
                    events: Vec::new(),
                }
            }
        }
    }

    /// Execute multiple transactions, each independently
    pub fn execute_transactions(&mut self, txs: &[Transaction]) -> Vec<ExecutionResult> {
        txs.iter().map(|tx| self.execute(tx)).collect()
    }

    /// Settle the block's governance changes
    pub fn finish_block(&mut self) -> Result<Vec<ValidatorUpdate>, VmError> {
        self.host.begin(Address::ZERO, U256::ZERO);
        let updates = system::finish_block(&mut self.host)?;
        self.host.take_events();
        if !updates.is_empty() {
            info!(
                updates = updates.len(),
                num_slots = self.host.system.num_slots(),
                "validator set changed"
            );
        }
        Ok(updates)
    }

    /// Execute every transaction of `block` in order, then settle it
    pub fn execute_block(&mut self, block: &Block) -> Result<BlockReceipt, VmError> {
        let results = self.execute_transactions(&block.transactions);
        let validator_updates = self.finish_block()?;
        let receipt = BlockReceipt {
            height: block.height,
            results,
            validator_updates,
        };
        info!(
            height = block.height,
            txs = block.transactions.len(),
            committed = receipt.committed(),
            "block executed"
        );
        Ok(receipt)
    }

    /// Write the committed state of every contract
    pub fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        self.host.dump(storage)
    }

    /// Merkle root over the snapshot encoding of the committed state
    pub fn state_root(&self) -> Result<Hash, VmError> {
        let mut storage = MemoryStorage::new();
        self.dump(&mut storage)?;
        storage.commit()?;
        Ok(storage_root(&storage))
    }
}

/// Route a call to the contract that serves it
fn dispatch(host: &mut Host, call: &Call) -> Result<(), VmError> {
    match call {
        Call::Stake => system::stake(host).map(drop),
        Call::Unstake { amount } => system::unstake(host, *amount).map(drop),
        Call::Delegate { validator, amount } => system::delegate(host, *validator, *amount).map(drop),
        Call::Undelegate { validator, amount } => {
            system::undelegate(host, *validator, *amount).map(drop)
        }
        Call::VoteSlots { validator, slots } => system::vote_slots(host, *validator, *slots),

        Call::Mint { to, amount } => energy::mint(host, *to, *amount),
        Call::Transfer { to, amount } => energy::transfer(host, *to, *amount),
        Call::Approve { spender, amount } => energy::approve(host, *spender, *amount),
        Call::TransferFrom { from, to, amount } => energy::transfer_from(host, *from, *to, *amount),

        Call::MintPlayer { name } => players::mint_player(host, name.clone()).map(drop),
        Call::DepositEnergy { token_id, amount } => players::deposit_energy(host, *token_id, *amount),
        Call::WithdrawEnergy { token_id, amount } => {
            players::withdraw_energy(host, *token_id, *amount)
        }
        Call::CreateProposal {
            token_id,
            title,
            description,
        } => players::create_proposal(host, *token_id, title.clone(), description.clone()).map(drop),
        Call::VoteOnProposal {
            token_id,
            proposal_id,
            energy,
        } => players::vote_on_proposal(host, *token_id, *proposal_id, *energy),
        Call::RemoveVote {
            token_id,
            proposal_id,
            energy,
        } => players::remove_vote(host, *token_id, *proposal_id, *energy),

        Call::SetProposalPrice { price } => proposals::set_proposal_price(host, *price),
        Call::CompleteProposal { proposal_id } => proposals::complete_proposal(host, *proposal_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchain_core::{decode_amount, EnergyGenesis, PubKey};

    fn genesis(creator: Address) -> GenesisConfig {
        GenesisConfig {
            chain_id: 1,
            initial_validators: vec![],
            initial_num_slots: 0,
            max_slots: 4,
            creator,
            energy: EnergyGenesis::default(),
        }
    }

    #[test]
    fn test_execute_transfer() {
        let creator = Address([1u8; 20]);
        let receiver = Address([2u8; 20]);
        let mut executor = Executor::genesis(&genesis(creator)).unwrap();

        let mint = Transaction::new(
            creator,
            Call::Mint {
                to: creator,
                amount: U256::from(50u64),
            },
        );
        assert!(executor.execute(&mint).success);

        let result = executor.execute(&Transaction::new(
            creator,
            Call::Transfer {
                to: receiver,
                amount: U256::from(20u64),
            },
        ));
        assert!(result.success);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e, ExecutionEvent::Transfer { .. })));
        assert_eq!(executor.host().energy.balance_of(&receiver), U256::from(20u64));
    }

    #[test]
    fn test_failed_transaction_leaves_state_and_siblings() {
        let creator = Address([1u8; 20]);
        let mut executor = Executor::genesis(&genesis(creator)).unwrap();
        let root = executor.state_root().unwrap();

        let results = executor.execute_transactions(&[
            // not the owner
            Transaction::new(
                Address([9u8; 20]),
                Call::Mint {
                    to: creator,
                    amount: U256::ONE,
                },
            ),
            Transaction::new(creator, Call::Stake).with_value(U256::from(7u64)),
        ]);
        assert!(results.iter().all(|r| !r.success && r.error.is_some()));
        assert_eq!(executor.state_root().unwrap(), root);

        let ok = executor.execute(&Transaction::new(creator, Call::Stake).with_value(decode_amount(2)));
        assert!(ok.success);
        assert_ne!(executor.state_root().unwrap(), root);
    }

    #[test]
    fn test_execute_block_settles_delegations() {
        let creator = Address([1u8; 20]);
        let mut config = genesis(creator);
        config.initial_num_slots = 1;
        let mut validator_bytes = [3u8; 33];
        validator_bytes[0] = 0x02;
        let validator = PubKey(validator_bytes);
        config.initial_validators = vec![validator];
        let mut executor = Executor::genesis(&config).unwrap();

        let owner = validator.address();
        let block = Block::new(
            1,
            vec![
                Transaction::new(owner, Call::Stake).with_value(decode_amount(10)),
                Transaction::new(
                    owner,
                    Call::Delegate {
                        validator,
                        amount: decode_amount(4),
                    },
                ),
            ],
        );
        let receipt = executor.execute_block(&block).unwrap();
        assert_eq!(receipt.committed(), 2);
        assert_eq!(receipt.validator_updates, vec![ValidatorUpdate::new(validator, 4)]);

        let mut storage = MemoryStorage::new();
        executor.dump(&mut storage).unwrap();
        storage.commit().unwrap();
        let reloaded = Executor::load(&storage).unwrap();
        assert_eq!(reloaded.state_root().unwrap(), executor.state_root().unwrap());
        assert_eq!(reloaded.host().system.elected(), vec![(validator, 4)]);
    }
}
