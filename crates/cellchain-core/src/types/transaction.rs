use ethnum::U256;
use serde::{Deserialize, Serialize};

use crate::crypto::{Address, PubKey};
use crate::types::amount::decimal;

/// Contract commands a transaction can carry.
///
/// The variant determines the target contract; amounts travel as decimal
/// strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Call {
    // Validator governance
    Stake,
    Unstake {
        #[serde(with = "decimal")]
        amount: U256,
    },
    Delegate {
        validator: PubKey,
        #[serde(with = "decimal")]
        amount: U256,
    },
    Undelegate {
        validator: PubKey,
        #[serde(with = "decimal")]
        amount: U256,
    },
    VoteSlots {
        validator: PubKey,
        slots: u64,
    },

    // Energy token
    Mint {
        to: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    Transfer {
        to: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    Approve {
        spender: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },
    TransferFrom {
        from: Address,
        to: Address,
        #[serde(with = "decimal")]
        amount: U256,
    },

    // Player registry
    MintPlayer {
        name: String,
    },
    DepositEnergy {
        token_id: u64,
        #[serde(with = "decimal")]
        amount: U256,
    },
    WithdrawEnergy {
        token_id: u64,
        #[serde(with = "decimal")]
        amount: U256,
    },
    CreateProposal {
        token_id: u64,
        title: String,
        description: String,
    },
    VoteOnProposal {
        token_id: u64,
        proposal_id: u64,
        #[serde(with = "decimal")]
        energy: U256,
    },
    RemoveVote {
        token_id: u64,
        proposal_id: u64,
        #[serde(with = "decimal")]
        energy: U256,
    },

    // Proposal board administration
    SetProposalPrice {
        #[serde(with = "decimal")]
        price: U256,
    },
    CompleteProposal {
        proposal_id: u64,
    },
}

impl Call {
    /// Short method name, used in logs.
    pub fn method(&self) -> &'static str {
        match self {
            Call::Stake => "stake",
            Call::Unstake { .. } => "unstake",
            Call::Delegate { .. } => "delegate",
            Call::Undelegate { .. } => "undelegate",
            Call::VoteSlots { .. } => "voteSlots",
            Call::Mint { .. } => "mint",
            Call::Transfer { .. } => "transfer",
            Call::Approve { .. } => "approve",
            Call::TransferFrom { .. } => "transferFrom",
            Call::MintPlayer { .. } => "mintPlayer",
            Call::DepositEnergy { .. } => "depositEnergy",
            Call::WithdrawEnergy { .. } => "withdrawEnergy",
            Call::CreateProposal { .. } => "createProposal",
            Call::VoteOnProposal { .. } => "voteOnProposal",
            Call::RemoveVote { .. } => "removeVote",
            Call::SetProposalPrice { .. } => "setProposalPrice",
            Call::CompleteProposal { .. } => "completeProposal",
        }
    }
}

fn zero_value() -> U256 {
    U256::ZERO
}

/// A single contract call submitted by an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Calling account
    pub sender: Address,
    /// Native token value attached to the call
    #[serde(with = "decimal", default = "zero_value")]
    pub value: U256,
    /// The command to run
    pub call: Call,
}

impl Transaction {
    pub fn new(sender: Address, call: Call) -> Self {
        Transaction {
            sender,
            value: U256::ZERO,
            call,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}
