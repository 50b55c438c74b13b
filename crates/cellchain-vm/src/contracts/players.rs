//! Player registry: named player tokens holding energy on their owner's
//! behalf.
//!
//! The registry's own energy account backs every token balance. Proposal
//! creation and voting spend from a token's balance through the proposal
//! board.

use cellchain_core::{Address, U256};
use cellchain_state::numeric::checked;
use cellchain_state::storage::codec;
use cellchain_state::{CallScope, Counter, Storage, Transactional, TransactionalMap};
use tracing::debug;

use crate::contract::{Contract, HasOwner, Ownable};
use crate::contracts::{energy, proposals};
use crate::error::VmError;
use crate::events::ExecutionEvent;
use crate::host::Host;

pub const NAMESPACE: &str = "players";

#[derive(Debug)]
pub struct PlayerRegistry {
    ownable: Ownable,
    ids: Counter,
    owners: TransactionalMap<u64, Address>,
    names: TransactionalMap<u64, String>,
    name_index: TransactionalMap<String, u64>,
    energy_balances: TransactionalMap<u64, U256>,
}

impl PlayerRegistry {
    pub fn new(scope: &CallScope, owner: Address) -> Self {
        PlayerRegistry {
            ownable: Ownable::new(scope, owner),
            ids: Counter::new(scope),
            owners: TransactionalMap::new(scope),
            names: TransactionalMap::new(scope),
            name_index: TransactionalMap::new(scope),
            energy_balances: TransactionalMap::new(scope),
        }
    }

    pub fn total_supply(&self) -> u64 {
        self.ids.current()
    }

    pub fn owner_of(&self, token_id: u64) -> Result<Address, VmError> {
        self.owners
            .get(&token_id)
            .copied()
            .ok_or(VmError::UnknownToken(token_id))
    }

    pub fn player_name(&self, token_id: u64) -> Result<&str, VmError> {
        self.names
            .get(&token_id)
            .map(String::as_str)
            .ok_or(VmError::UnknownToken(token_id))
    }

    pub fn player_exists(&self, name: &str) -> bool {
        self.name_index.contains(&name.to_string())
    }

    pub fn player_energy(&self, token_id: u64) -> U256 {
        self.energy_balances
            .get(&token_id)
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn mint_player(&mut self, caller: Address, name: String) -> Result<u64, VmError> {
        if self.player_exists(&name) {
            return Err(VmError::PlayerExists(name));
        }
        let token_id = self.ids.next_id()?;
        self.owners.insert(token_id, caller);
        self.names.insert(token_id, name.clone());
        self.name_index.insert(name, token_id);
        Ok(token_id)
    }

    fn only_token_owner(&self, caller: Address, token_id: u64) -> Result<(), VmError> {
        if self.owner_of(token_id)? != caller {
            return Err(VmError::Unauthorized(caller));
        }
        Ok(())
    }

    fn only_token_owner_or_owner(&self, caller: Address, token_id: u64) -> Result<(), VmError> {
        if caller == self.owner() {
            self.owner_of(token_id)?;
            return Ok(());
        }
        self.only_token_owner(caller, token_id)
    }

    /// Check that `token_id` can spend `amount`, returning the balance left
    fn remaining_after(&self, token_id: u64, amount: U256) -> Result<U256, VmError> {
        let have = self.player_energy(token_id);
        checked::sub(have, amount).map_err(|_| VmError::InsufficientBalance { have, need: amount })
    }
}

impl HasOwner for PlayerRegistry {
    fn ownable(&self) -> &Ownable {
        &self.ownable
    }
}

impl Contract for PlayerRegistry {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn cells(&mut self) -> Vec<&mut dyn Transactional> {
        vec![
            self.ownable.cell(),
            &mut self.ids,
            &mut self.owners,
            &mut self.names,
            &mut self.name_index,
            &mut self.energy_balances,
        ]
    }

    fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        self.ownable.dump(storage, NAMESPACE)?;
        codec::write_value(storage, NAMESPACE, "token_count", &self.ids.committed())?;
        codec::write_map(storage, NAMESPACE, "owners", self.owners.iter())?;
        codec::write_map(storage, NAMESPACE, "names", self.names.iter())?;
        codec::write_map(storage, NAMESPACE, "energy", self.energy_balances.iter())?;
        Ok(())
    }

    fn load(scope: &CallScope, storage: &dyn Storage) -> Result<Self, VmError> {
        let names: std::collections::BTreeMap<u64, String> =
            codec::read_map(storage, NAMESPACE, "names")?;
        let name_index = names
            .iter()
            .map(|(token_id, name)| (name.clone(), *token_id))
            .collect();
        Ok(PlayerRegistry {
            ownable: Ownable::load(scope, storage, NAMESPACE)?,
            ids: Counter::starting_at(
                scope,
                codec::require_value(storage, NAMESPACE, "token_count")?,
            ),
            owners: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "owners")?,
            ),
            names: TransactionalMap::from_committed(scope, names),
            name_index: TransactionalMap::from_committed(scope, name_index),
            energy_balances: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "energy")?,
            ),
        })
    }
}

pub fn address() -> Address {
    Address::for_contract(NAMESPACE)
}

pub fn mint_player(host: &mut Host, name: String) -> Result<u64, VmError> {
    host.call(address(), |host, caller| {
        let token_id = host.players.mint_player(caller, name.clone())?;
        debug!(token_id, %caller, "player minted");
        host.emit(ExecutionEvent::PlayerMinted {
            token_id,
            owner: caller,
            name,
        });
        Ok(token_id)
    })
}

/// Move energy from the caller's account into a token's balance. The caller
/// must have approved the registry for `amount`.
pub fn deposit_energy(host: &mut Host, token_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.players.owner_of(token_id)?;
        let balance = checked::add(host.players.player_energy(token_id), amount)?;
        energy::transfer_from(host, caller, address(), amount)?;
        host.players.energy_balances.insert(token_id, balance);
        Ok(())
    })
}

/// Move energy from a token's balance to the caller, who must hold the token
/// or own the registry
pub fn withdraw_energy(host: &mut Host, token_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.players.only_token_owner_or_owner(caller, token_id)?;
        let remaining = host.players.remaining_after(token_id, amount)?;
        energy::transfer(host, caller, amount)?;
        host.players.energy_balances.insert(token_id, remaining);
        Ok(())
    })
}

/// Spend the proposal price from a token's balance to open a proposal
pub fn create_proposal(host: &mut Host, token_id: u64, title: String, description: String) -> Result<u64, VmError> {
    host.call(address(), |host, caller| {
        host.players.only_token_owner(caller, token_id)?;
        let price = host.proposals.proposal_price();
        let remaining = host.players.remaining_after(token_id, price)?;

        energy::approve(host, proposals::address(), price)?;
        let proposal_id = proposals::create_proposal(host, title, description)?;
        host.players.energy_balances.insert(token_id, remaining);
        Ok(proposal_id)
    })
}

pub fn vote_on_proposal(host: &mut Host, token_id: u64, proposal_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.players.only_token_owner(caller, token_id)?;
        let remaining = host.players.remaining_after(token_id, amount)?;

        energy::approve(host, proposals::address(), amount)?;
        proposals::vote_on_proposal(host, token_id, proposal_id, amount)?;
        host.players.energy_balances.insert(token_id, remaining);
        Ok(())
    })
}

pub fn remove_vote(host: &mut Host, token_id: u64, proposal_id: u64, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.players.only_token_owner(caller, token_id)?;
        let balance = checked::add(host.players.player_energy(token_id), amount)?;

        proposals::remove_vote(host, token_id, proposal_id, amount)?;
        host.players.energy_balances.insert(token_id, balance);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchain_state::MemoryStorage;

    #[test]
    fn test_mint_assigns_sequential_ids() {
        let scope = CallScope::new();
        let mut registry = PlayerRegistry::new(&scope, Address::ZERO);
        let alice = Address([1u8; 20]);

        assert_eq!(registry.mint_player(alice, "alice".into()).unwrap(), 0);
        assert_eq!(registry.mint_player(alice, "bob".into()).unwrap(), 1);
        assert!(matches!(
            registry.mint_player(alice, "alice".into()),
            Err(VmError::PlayerExists(_))
        ));
        assert_eq!(registry.total_supply(), 2);
        assert_eq!(registry.player_name(1).unwrap(), "bob");
        assert_eq!(registry.owner_of(0).unwrap(), alice);
        assert!(matches!(registry.owner_of(5), Err(VmError::UnknownToken(5))));
    }

    #[test]
    fn test_token_owner_guard() {
        let scope = CallScope::new();
        let mut registry = PlayerRegistry::new(&scope, Address::ZERO);
        let alice = Address([1u8; 20]);
        registry.mint_player(alice, "alice".into()).unwrap();
        assert!(registry.only_token_owner(alice, 0).is_ok());
        assert!(matches!(
            registry.only_token_owner(Address([2u8; 20]), 0),
            Err(VmError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_dump_and_load_rebuilds_name_index() {
        let scope = CallScope::new();
        let mut registry = PlayerRegistry::new(&scope, Address::ZERO);
        registry.mint_player(Address([1u8; 20]), "alice".into()).unwrap();
        registry.energy_balances.insert(0, U256::from(5u64));
        cellchain_state::commit_all(registry.cells());

        let mut storage = MemoryStorage::new();
        registry.dump(&mut storage).unwrap();
        let loaded = PlayerRegistry::load(&scope, &storage).unwrap();
        assert!(loaded.player_exists("alice"));
        assert_eq!(loaded.player_energy(0), U256::from(5u64));
        assert_eq!(loaded.total_supply(), 1);
    }
}
