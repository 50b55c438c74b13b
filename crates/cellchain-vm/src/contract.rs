//! Contract plumbing shared by every built-in contract.

use cellchain_core::Address;
use cellchain_state::storage::codec;
use cellchain_state::{CallScope, Storage, Transactional, TransactionalCell};

use crate::error::VmError;

/// A contract whose fields are transactional cells.
///
/// The host settles calls through [`cells`](Contract::cells); snapshots go
/// through [`dump`](Contract::dump) and [`load`](Contract::load).
pub trait Contract {
    /// Storage namespace, also the label the contract address derives from
    fn namespace(&self) -> &'static str;

    fn address(&self) -> Address {
        Address::for_contract(self.namespace())
    }

    /// Every field of the contract
    fn cells(&mut self) -> Vec<&mut dyn Transactional>;

    /// Write the committed state of every field
    fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError>;

    /// Rebuild the contract from a snapshot
    fn load(scope: &CallScope, storage: &dyn Storage) -> Result<Self, VmError>
    where
        Self: Sized;
}

/// Single-owner capability, composed into contracts by value
#[derive(Debug)]
pub struct Ownable {
    owner: TransactionalCell<Address>,
}

impl Ownable {
    pub fn new(scope: &CallScope, owner: Address) -> Self {
        Ownable {
            owner: TransactionalCell::new(scope, owner),
        }
    }

    pub fn owner(&self) -> Address {
        *self.owner.get()
    }

    pub fn only_owner(&self, caller: Address) -> Result<(), VmError> {
        if caller != self.owner() {
            return Err(VmError::Unauthorized(caller));
        }
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), VmError> {
        self.only_owner(caller)?;
        self.owner.set(new_owner);
        Ok(())
    }

    pub fn cell(&mut self) -> &mut dyn Transactional {
        &mut self.owner
    }

    pub fn dump(&self, storage: &mut dyn Storage, namespace: &str) -> Result<(), VmError> {
        codec::write_value(storage, namespace, "owner", self.owner.committed())?;
        Ok(())
    }

    pub fn load(scope: &CallScope, storage: &dyn Storage, namespace: &str) -> Result<Self, VmError> {
        let owner = codec::require_value(storage, namespace, "owner")?;
        Ok(Self::new(scope, owner))
    }
}

/// Contracts that compose an [`Ownable`]
pub trait HasOwner {
    fn ownable(&self) -> &Ownable;

    fn owner(&self) -> Address {
        self.ownable().owner()
    }

    fn only_owner(&self, caller: Address) -> Result<(), VmError> {
        self.ownable().only_owner(caller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchain_state::MemoryStorage;

    #[test]
    fn test_only_owner() {
        let scope = CallScope::new();
        let owner = Address([1u8; 20]);
        let ownable = Ownable::new(&scope, owner);
        assert!(ownable.only_owner(owner).is_ok());
        assert!(matches!(
            ownable.only_owner(Address([2u8; 20])),
            Err(VmError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_transfer_ownership_and_reload() {
        let scope = CallScope::new();
        let owner = Address([1u8; 20]);
        let next = Address([3u8; 20]);
        let mut ownable = Ownable::new(&scope, owner);
        ownable.transfer_ownership(owner, next).unwrap();
        ownable.cell().commit();

        let mut storage = MemoryStorage::new();
        ownable.dump(&mut storage, "test").unwrap();
        let loaded = Ownable::load(&scope, &storage, "test").unwrap();
        assert_eq!(loaded.owner(), next);
    }
}
