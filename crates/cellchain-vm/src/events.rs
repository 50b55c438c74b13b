use cellchain_core::{Address, PubKey, ValidatorUpdate, U256};
use serde::{Deserialize, Serialize};

/// Events emitted by contracts during a successful call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExecutionEvent {
    Staked {
        account: Address,
        units: u64,
    },
    /// Native refund owed to `account`; paying it out is the caller's concern
    Unstaked {
        account: Address,
        amount: U256,
    },
    Delegated {
        delegator: Address,
        validator: PubKey,
        units: u64,
    },
    Undelegated {
        delegator: Address,
        validator: PubKey,
        units: u64,
    },
    SlotsVoted {
        validator: PubKey,
        slots: u64,
    },
    ValidatorSetUpdated {
        updates: Vec<ValidatorUpdate>,
    },
    Transfer {
        from: Address,
        to: Address,
        amount: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        amount: U256,
    },
    PlayerMinted {
        token_id: u64,
        owner: Address,
        name: String,
    },
    ProposalCreated {
        proposal_id: u64,
        title: String,
    },
    ProposalVoted {
        proposal_id: u64,
        token_id: u64,
        energy: U256,
    },
    VoteRemoved {
        proposal_id: u64,
        token_id: u64,
        energy: U256,
    },
    ProposalCompleted {
        proposal_id: u64,
    },
}
