use cellchain_core::{Address, PubKey, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },

    #[error("Insufficient allowance: have {have}, need {need}")]
    InsufficientAllowance { have: U256, need: U256 },

    #[error("Caller {0} is not authorized")]
    Unauthorized(Address),

    #[error("No stake for {0}")]
    NoStake(Address),

    #[error("No delegation from {delegator} to {validator}")]
    NoDelegation { delegator: Address, validator: PubKey },

    #[error("Unregistered validator: {0}")]
    UnregisteredValidator(PubKey),

    #[error("Validator not elected: {0}")]
    ValidatorNotElected(PubKey),

    #[error("Proposed slot count {slots} outside 1..={max}")]
    InvalidSlotCount { slots: u64, max: u64 },

    #[error("Delegation amount limit exceeded for {0}")]
    DelegationLimitExceeded(PubKey),

    #[error("No collision-free voting power available for {0}")]
    CollisionRetryExhausted(PubKey),

    #[error("Amount must be nonzero")]
    ZeroAmount,

    #[error("Amount {0} is not a multiple of the 1e9 scale")]
    Dust(String),

    #[error("Player name already taken: {0}")]
    PlayerExists(String),

    #[error("Unknown player token: {0}")]
    UnknownToken(u64),

    #[error("Unknown proposal: {0}")]
    UnknownProposal(u64),

    #[error("No vote from token {token_id} on proposal {proposal_id}")]
    UnknownVote { proposal_id: u64, token_id: u64 },

    #[error("Contract {0} is already on the call stack")]
    Reentrancy(Address),

    #[error("Consistency error: {0}")]
    Consistency(String),

    #[error("State error: {0}")]
    State(#[from] cellchain_state::StateError),

    #[error("Core error: {0}")]
    Core(#[from] cellchain_core::CoreError),
}

impl VmError {
    /// Whether this is a rejected command rather than a broken invariant.
    ///
    /// Domain errors revert the call and the block carries on. Anything else
    /// indicates corrupted state and must stop persistence.
    pub fn is_domain(&self) -> bool {
        match self {
            VmError::Consistency(_) => false,
            VmError::State(err) => matches!(
                err,
                cellchain_state::StateError::Arithmetic(_) | cellchain_state::StateError::Bounds(_)
            ),
            _ => true,
        }
    }
}

impl From<cellchain_state::ArithmeticError> for VmError {
    fn from(err: cellchain_state::ArithmeticError) -> Self {
        VmError::State(err.into())
    }
}

impl From<cellchain_state::BoundsError> for VmError {
    fn from(err: cellchain_state::BoundsError) -> Self {
        VmError::State(err.into())
    }
}

/// Scale a user amount, mapping dust to a domain error
pub(crate) fn scale_amount(amount: U256) -> Result<u64, VmError> {
    cellchain_core::encode_amount(amount).map_err(|err| match err {
        cellchain_core::CoreError::DustAmount(value) => VmError::Dust(value),
        other => VmError::Core(other),
    })
}
