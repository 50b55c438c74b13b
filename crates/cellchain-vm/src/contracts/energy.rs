//! Energy: the fungible token players spend on proposals.

use cellchain_core::{Address, EnergyGenesis, U256};
use cellchain_state::numeric::checked;
use cellchain_state::storage::codec;
use cellchain_state::{
    CallScope, Storage, Transactional, TransactionalCell, TransactionalMap,
    TransactionalNumericCell,
};
use tracing::debug;

use crate::contract::{Contract, HasOwner, Ownable};
use crate::error::VmError;
use crate::events::ExecutionEvent;
use crate::host::Host;

pub const NAMESPACE: &str = "energy";

#[derive(Debug)]
pub struct Energy {
    ownable: Ownable,
    name: TransactionalCell<String>,
    symbol: TransactionalCell<String>,
    decimals: TransactionalNumericCell<u8>,
    total_supply: TransactionalNumericCell<U256>,
    balances: TransactionalMap<Address, U256>,
    allowances: TransactionalMap<(Address, Address), U256>,
}

impl Energy {
    pub fn new(scope: &CallScope, owner: Address, meta: &EnergyGenesis) -> Self {
        Energy {
            ownable: Ownable::new(scope, owner),
            name: TransactionalCell::new(scope, meta.name.clone()),
            symbol: TransactionalCell::new(scope, meta.symbol.clone()),
            decimals: TransactionalNumericCell::new(scope, meta.decimals),
            total_supply: TransactionalNumericCell::zero(scope),
            balances: TransactionalMap::new(scope),
            allowances: TransactionalMap::new(scope),
        }
    }

    pub fn name(&self) -> &str {
        self.name.get()
    }

    pub fn symbol(&self) -> &str {
        self.symbol.get()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals.get()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply.get()
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or(U256::ZERO)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn mint(&mut self, caller: Address, to: Address, amount: U256) -> Result<(), VmError> {
        self.only_owner(caller)?;
        let credited = checked::add(self.balance_of(&to), amount)?;
        self.total_supply.add_assign(amount)?;
        self.balances.insert(to, credited);
        Ok(())
    }

    pub fn transfer(&mut self, caller: Address, to: Address, amount: U256) -> Result<(), VmError> {
        self.move_balance(caller, to, amount)
    }

    pub fn approve(&mut self, caller: Address, spender: Address, amount: U256) {
        self.allowances.insert((caller, spender), amount);
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), VmError> {
        let allowed = self.allowance(&from, &caller);
        if allowed < amount {
            return Err(VmError::InsufficientAllowance {
                have: allowed,
                need: amount,
            });
        }
        self.move_balance(from, to, amount)?;
        self.allowances.insert((from, caller), allowed - amount);
        Ok(())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
        let have = self.balance_of(&from);
        if have < amount {
            return Err(VmError::InsufficientBalance { have, need: amount });
        }
        if from == to {
            return Ok(());
        }
        let credited = checked::add(self.balance_of(&to), amount)?;
        self.balances.insert(from, have - amount);
        self.balances.insert(to, credited);
        Ok(())
    }
}

impl HasOwner for Energy {
    fn ownable(&self) -> &Ownable {
        &self.ownable
    }
}

impl Contract for Energy {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn cells(&mut self) -> Vec<&mut dyn Transactional> {
        vec![
            self.ownable.cell(),
            &mut self.name,
            &mut self.symbol,
            &mut self.decimals,
            &mut self.total_supply,
            &mut self.balances,
            &mut self.allowances,
        ]
    }

    fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        self.ownable.dump(storage, NAMESPACE)?;
        codec::write_value(storage, NAMESPACE, "name", self.name.committed())?;
        codec::write_value(storage, NAMESPACE, "symbol", self.symbol.committed())?;
        codec::write_value(storage, NAMESPACE, "decimals", &self.decimals.committed())?;
        codec::write_value(storage, NAMESPACE, "total_supply", &self.total_supply.committed())?;
        codec::write_map(storage, NAMESPACE, "balances", self.balances.iter())?;
        codec::write_map(storage, NAMESPACE, "allowances", self.allowances.iter())?;
        Ok(())
    }

    fn load(scope: &CallScope, storage: &dyn Storage) -> Result<Self, VmError> {
        Ok(Energy {
            ownable: Ownable::load(scope, storage, NAMESPACE)?,
            name: TransactionalCell::new(scope, codec::require_value(storage, NAMESPACE, "name")?),
            symbol: TransactionalCell::new(scope, codec::require_value(storage, NAMESPACE, "symbol")?),
            decimals: TransactionalNumericCell::new(
                scope,
                codec::require_value(storage, NAMESPACE, "decimals")?,
            ),
            total_supply: TransactionalNumericCell::new(
                scope,
                codec::require_value(storage, NAMESPACE, "total_supply")?,
            ),
            balances: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "balances")?,
            ),
            allowances: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "allowances")?,
            ),
        })
    }
}

pub fn address() -> Address {
    Address::for_contract(NAMESPACE)
}

pub fn mint(host: &mut Host, to: Address, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.energy.mint(caller, to, amount)?;
        debug!(%to, %amount, "energy minted");
        host.emit(ExecutionEvent::Transfer {
            from: Address::ZERO,
            to,
            amount,
        });
        Ok(())
    })
}

pub fn transfer(host: &mut Host, to: Address, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.energy.transfer(caller, to, amount)?;
        host.emit(ExecutionEvent::Transfer {
            from: caller,
            to,
            amount,
        });
        Ok(())
    })
}

pub fn approve(host: &mut Host, spender: Address, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.energy.approve(caller, spender, amount);
        host.emit(ExecutionEvent::Approval {
            owner: caller,
            spender,
            amount,
        });
        Ok(())
    })
}

pub fn transfer_from(host: &mut Host, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.energy.transfer_from(caller, from, to, amount)?;
        host.emit(ExecutionEvent::Transfer { from, to, amount });
        Ok(())
    })
}
