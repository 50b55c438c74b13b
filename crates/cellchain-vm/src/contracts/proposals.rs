//! Proposal board: players back proposals with energy.
//!
//! Only the player registry may create proposals and move votes; the owner
//! sets the creation price and completes proposals.

use cellchain_core::{Address, U256};
use cellchain_state::numeric::checked;
use cellchain_state::storage::codec;
use cellchain_state::{
    CallScope, Counter, EnumerableMap, Storage, Transactional, TransactionalMap,
    TransactionalNumericCell,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contract::{Contract, HasOwner, Ownable};
use crate::contracts::{energy, players};
use crate::error::VmError;
use crate::events::ExecutionEvent;
use crate::host::Host;

pub const NAMESPACE: &str = "proposals";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Energy held by the proposal: the creation price plus all live votes
    pub energy: U256,
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub struct ProposalBoard {
    ownable: Ownable,
    ids: Counter,
    active: EnumerableMap<u64, Proposal>,
    completed: EnumerableMap<u64, Proposal>,
    votes: TransactionalMap<(u64, u64), U256>,
    price: TransactionalNumericCell<U256>,
}

impl ProposalBoard {
    pub fn new(scope: &CallScope, owner: Address) -> Self {
        ProposalBoard {
            ownable: Ownable::new(scope, owner),
            ids: Counter::new(scope),
            active: EnumerableMap::new(scope),
            completed: EnumerableMap::new(scope),
            votes: TransactionalMap::new(scope),
            price: TransactionalNumericCell::zero(scope),
        }
    }

    pub fn proposal_price(&self) -> U256 {
        self.price.get()
    }

    pub fn proposal_count(&self) -> u64 {
        self.ids.current()
    }

    pub fn proposal(&self, id: u64) -> Option<&Proposal> {
        self.active.get(&id)
    }

    pub fn proposal_energy(&self, id: u64) -> Result<U256, VmError> {
        self.active
            .get(&id)
            .map(|proposal| proposal.energy)
            .ok_or(VmError::UnknownProposal(id))
    }

    pub fn active_proposals(&self) -> Vec<(u64, Proposal)> {
        self.active.entries()
    }

    pub fn completed_proposals(&self) -> Vec<(u64, Proposal)> {
        self.completed.entries()
    }

    pub fn vote_of(&self, proposal_id: u64, token_id: u64) -> U256 {
        self.votes
            .get(&(proposal_id, token_id))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// All live votes on a proposal, by token
    pub fn proposal_votes(&self, proposal_id: u64) -> Vec<(u64, U256)> {
        self.votes
            .effective_entries()
            .into_iter()
            .filter(|((proposal, _), _)| *proposal == proposal_id)
            .map(|((_, token), energy)| (token, energy))
            .collect()
    }

    fn only_player(&self, caller: Address) -> Result<(), VmError> {
        if caller != players::address() {
            return Err(VmError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn set_proposal_price(&mut self, caller: Address, price: U256) -> Result<(), VmError> {
        self.only_owner(caller)?;
        self.price.set(price);
        Ok(())
    }

    pub fn complete_proposal(&mut self, caller: Address, id: u64) -> Result<(), VmError> {
        self.only_owner(caller)?;
        let proposal = self
            .active
            .get(&id)
            .cloned()
            .ok_or(VmError::UnknownProposal(id))?;
        self.active.remove(&id);
        self.completed.set(id, proposal);
        Ok(())
    }
}

impl HasOwner for ProposalBoard {
    fn ownable(&self) -> &Ownable {
        &self.ownable
    }
}

impl Contract for ProposalBoard {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn cells(&mut self) -> Vec<&mut dyn Transactional> {
        vec![
            self.ownable.cell(),
            &mut self.ids,
            &mut self.active,
            &mut self.completed,
            &mut self.votes,
            &mut self.price,
        ]
    }

    fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        self.ownable.dump(storage, NAMESPACE)?;
        let committed_count = self.ids.committed();
        codec::write_value(storage, NAMESPACE, "proposal_count", &committed_count)?;
        codec::write_vec(storage, NAMESPACE, "active", &self.active.committed_entries())?;
        codec::write_vec(storage, NAMESPACE, "completed", &self.completed.committed_entries())?;
        codec::write_map(storage, NAMESPACE, "votes", self.votes.iter())?;
        codec::write_value(storage, NAMESPACE, "price", &self.price.committed())?;
        Ok(())
    }

    fn load(scope: &CallScope, storage: &dyn Storage) -> Result<Self, VmError> {
        Ok(ProposalBoard {
            ownable: Ownable::load(scope, storage, NAMESPACE)?,
            ids: Counter::starting_at(
                scope,
                codec::require_value(storage, NAMESPACE, "proposal_count")?,
            ),
            active: EnumerableMap::from_committed(
                scope,
                codec::read_vec(storage, NAMESPACE, "active")?,
            ),
            completed: EnumerableMap::from_committed(
                scope,
                codec::read_vec(storage, NAMESPACE, "completed")?,
            ),
            votes: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "votes")?,
            ),
            price: TransactionalNumericCell::new(
                scope,
                codec::require_value(storage, NAMESPACE, "price")?,
            ),
        })
    }
}

pub fn address() -> Address {
    Address::for_contract(NAMESPACE)
}

/// Open a new proposal, pulling the creation price from the player registry
pub fn create_proposal(host: &mut Host, title: String, description: String) -> Result<u64, VmError> {
    host.call(address(), |host, caller| {
        host.proposals.only_player(caller)?;
        let price = host.proposals.proposal_price();
        if price != U256::ZERO {
            energy::transfer_from(host, caller, address(), price)?;
        }
        let id = host.proposals.ids.next_id()?;
        host.proposals.active.set(
            id,
            Proposal {
                energy: price,
                title: title.clone(),
                description,
            },
        );
        debug!(id, %price, "proposal created");
        host.emit(ExecutionEvent::ProposalCreated {
            proposal_id: id,
            title,
        });
        Ok(id)
    })
}

pub fn vote_on_proposal(host: &mut Host, token_id: u64, proposal_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.proposals.only_player(caller)?;
        let total = checked::add(host.proposals.proposal_energy(proposal_id)?, amount)?;
        let vote = checked::add(host.proposals.vote_of(proposal_id, token_id), amount)?;
        energy::transfer_from(host, caller, address(), amount)?;

        let board = &mut host.proposals;
        board.votes.insert((proposal_id, token_id), vote);
        if let Some(proposal) = board.active.get_mut(&proposal_id) {
            proposal.energy = total;
        }
        host.emit(ExecutionEvent::ProposalVoted {
            proposal_id,
            token_id,
            energy: amount,
        });
        Ok(())
    })
}

pub fn remove_vote(host: &mut Host, token_id: u64, proposal_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.proposals.only_player(caller)?;
        let key = (proposal_id, token_id);
        let current = *host.proposals.votes.get(&key).ok_or(VmError::UnknownVote {
            proposal_id,
            token_id,
        })?;
        let remaining = checked::sub(current, amount).map_err(|_| VmError::InsufficientBalance {
            have: current,
            need: amount,
        })?;

        energy::transfer(host, caller, amount)?;

        let board = &mut host.proposals;
        if remaining == U256::ZERO {
            board.votes.erase(&key);
        } else {
            board.votes.insert(key, remaining);
        }
        // completed proposals keep their final tally
        if let Some(proposal) = board.active.get_mut(&proposal_id) {
            proposal.energy = checked::sub(proposal.energy, amount)?;
        }
        host.emit(ExecutionEvent::VoteRemoved {
            proposal_id,
            token_id,
            energy: amount,
        });
        Ok(())
    })
}

pub fn set_proposal_price(host: &mut Host, price: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| host.proposals.set_proposal_price(caller, price))
}

pub fn complete_proposal(host: &mut Host, proposal_id: u64) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.proposals.complete_proposal(caller, proposal_id)?;
        host.emit(ExecutionEvent::ProposalCompleted { proposal_id });
        Ok(())
    })
}
