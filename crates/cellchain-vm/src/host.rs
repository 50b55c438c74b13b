//! The contract host: owns every contract and runs calls in nested frames.

use cellchain_core::{Address, GenesisConfig, U256};
use cellchain_state::{commit_all, settle, CallScope, Settlement, Storage, TouchedCells, Transactional};
use tracing::trace;

use crate::contract::Contract;
use crate::contracts::{Energy, PlayerRegistry, ProposalBoard, SystemContract};
use crate::error::VmError;
use crate::events::ExecutionEvent;

/// Contract state plus the context of the transaction being executed
#[derive(Debug)]
pub struct Host {
    scope: CallScope,
    origin: Address,
    value: U256,
    stack: Vec<Address>,
    events: Vec<ExecutionEvent>,
    pub system: SystemContract,
    pub energy: Energy,
    pub players: PlayerRegistry,
    pub proposals: ProposalBoard,
}

impl Host {
    /// Create every contract from the genesis configuration, owned by its
    /// creator, and commit the result
    pub fn genesis(config: &GenesisConfig) -> Result<Self, VmError> {
        let scope = CallScope::new();
        let mut host = Host {
            system: SystemContract::genesis(&scope, config)?,
            energy: Energy::new(&scope, config.creator, &config.energy),
            players: PlayerRegistry::new(&scope, config.creator),
            proposals: ProposalBoard::new(&scope, config.creator),
            scope,
            origin: Address::ZERO,
            value: U256::ZERO,
            stack: Vec::new(),
            events: Vec::new(),
        };
        commit_all(host.cells());
        Ok(host)
    }

    /// Rebuild every contract from a snapshot
    pub fn load(storage: &dyn Storage) -> Result<Self, VmError> {
        let scope = CallScope::new();
        Ok(Host {
            system: SystemContract::load(&scope, storage)?,
            energy: Energy::load(&scope, storage)?,
            players: PlayerRegistry::load(&scope, storage)?,
            proposals: ProposalBoard::load(&scope, storage)?,
            scope,
            origin: Address::ZERO,
            value: U256::ZERO,
            stack: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Write the committed state of every contract
    pub fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        self.system.dump(storage)?;
        self.energy.dump(storage)?;
        self.players.dump(storage)?;
        self.proposals.dump(storage)?;
        Ok(())
    }

    /// Set the account and attached value for the next top-level call
    pub fn begin(&mut self, origin: Address, value: U256) {
        self.origin = origin;
        self.value = value;
        self.events.clear();
    }

    pub fn origin(&self) -> Address {
        self.origin
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    /// Address of the contract currently executing, if any
    pub fn current(&self) -> Option<Address> {
        self.stack.last().copied()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn emit(&mut self, event: ExecutionEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<ExecutionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Run `f` as a call into `callee`.
    ///
    /// The caller passed to `f` is the contract on top of the stack, or the
    /// transaction origin for a top-level call. A failed call rolls the cells
    /// its frame touched back to their state when the call began and drops
    /// the events it emitted; writes made by enclosing frames survive. A
    /// successful nested call hands its cells to the enclosing frame, and the
    /// outermost frame commits them.
    pub fn call<T, F>(&mut self, callee: Address, f: F) -> Result<T, VmError>
    where
        F: FnOnce(&mut Host, Address) -> Result<T, VmError>,
    {
        if self.stack.contains(&callee) {
            return Err(VmError::Reentrancy(callee));
        }
        let caller = self.current().unwrap_or(self.origin);
        let events_mark = self.events.len();

        let depth = self.scope.open();
        self.stack.push(callee);
        trace!(%caller, %callee, depth, "call");
        let result = f(self, caller);
        self.stack.pop();

        match result {
            Ok(value) => {
                if let Some(touched) = self.scope.close_commit()? {
                    let settled = self.settle_touched(&touched, Settlement::Commit);
                    trace!(settled, "call committed");
                }
                Ok(value)
            }
            Err(err) => {
                let reverted = self.scope.close_revert()?;
                let settled =
                    self.settle_touched(&reverted.touched, Settlement::Rollback(reverted.frame));
                self.events.truncate(events_mark);
                trace!(settled, %err, "call reverted");
                Err(err)
            }
        }
    }

    fn settle_touched(&mut self, touched: &TouchedCells, settlement: Settlement) -> usize {
        settle(self.cells(), touched, settlement)
    }

    /// Every cell of every contract
    pub fn cells(&mut self) -> Vec<&mut dyn Transactional> {
        let mut cells = self.system.cells();
        cells.extend(self.energy.cells());
        cells.extend(self.players.cells());
        cells.extend(self.proposals.cells());
        cells
    }

    /// Whether any cell holds uncommitted state
    pub fn has_staged_state(&mut self) -> bool {
        self.cells().iter().any(|cell| cell.is_staged())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::energy;
    use cellchain_core::EnergyGenesis;

    fn host(creator: Address) -> Host {
        Host::genesis(&GenesisConfig {
            chain_id: 1,
            initial_validators: vec![],
            initial_num_slots: 0,
            max_slots: 4,
            creator,
            energy: EnergyGenesis::default(),
        })
        .unwrap()
    }

    #[test]
    fn test_top_level_caller_is_origin() {
        let creator = Address([1u8; 20]);
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);
        let seen = host.call(energy::address(), |_, caller| Ok(caller)).unwrap();
        assert_eq!(seen, creator);
        assert_eq!(host.depth(), 0);
    }

    #[test]
    fn test_nested_caller_is_contract() {
        let creator = Address([1u8; 20]);
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);
        let inner = host
            .call(Address::for_contract("outer"), |host, _| {
                host.call(energy::address(), |_, caller| Ok(caller))
            })
            .unwrap();
        assert_eq!(inner, Address::for_contract("outer"));
    }

    #[test]
    fn test_reentrancy_rejected() {
        let creator = Address([1u8; 20]);
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);
        let err = host
            .call(energy::address(), |host, _| {
                host.call(energy::address(), |_, _| Ok(()))
            })
            .unwrap_err();
        assert!(matches!(err, VmError::Reentrancy(_)));
        assert_eq!(host.depth(), 0);
    }

    #[test]
    fn test_failed_call_reverts_cells_and_events() {
        let creator = Address([1u8; 20]);
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);
        energy::mint(&mut host, creator, U256::from(10u64)).unwrap();
        assert_eq!(host.take_events().len(), 1);

        let result: Result<(), VmError> = host.call(Address::for_contract("outer"), |host, _| {
            host.energy.approve(creator, Address([2u8; 20]), U256::ONE);
            host.emit(ExecutionEvent::ProposalCompleted { proposal_id: 0 });
            Err(VmError::ZeroAmount)
        });
        assert!(result.is_err());
        assert!(host.take_events().is_empty());
        assert_eq!(host.energy.allowance(&creator, &Address([2u8; 20])), U256::ZERO);
        assert_eq!(host.energy.balance_of(&creator), U256::from(10u64));
        assert!(!host.has_staged_state());
    }

    #[test]
    fn test_handled_inner_failure_keeps_outer_writes() {
        let creator = Address([1u8; 20]);
        let spender = Address([2u8; 20]);
        let outer = Address::for_contract("outer");
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);

        host.call(outer, |host, _| {
            energy::approve(host, spender, U256::from(5u64))?;
            let failed: Result<(), VmError> = host.call(Address::for_contract("middle"), |host, _| {
                energy::approve(host, spender, U256::from(9u64))?;
                Err(VmError::ZeroAmount)
            });
            assert!(failed.is_err());
            assert_eq!(host.energy.allowance(&outer, &spender), U256::from(5u64));
            Ok(())
        })
        .unwrap();

        assert_eq!(host.energy.allowance(&outer, &spender), U256::from(5u64));
        assert!(!host.has_staged_state());
        let events = host.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ExecutionEvent::Approval { .. }));
    }

    #[test]
    fn test_second_call_into_same_contract_fails_after_first_succeeds() {
        let creator = Address([1u8; 20]);
        let spender = Address([2u8; 20]);
        let outer = Address::for_contract("outer");
        let mut host = host(creator);
        host.begin(creator, U256::ZERO);

        host.call(outer, |host, _| {
            energy::approve(host, spender, U256::from(5u64))?;
            let failed: Result<(), VmError> = host.call(energy::address(), |host, caller| {
                host.energy.approve(caller, spender, U256::from(7u64));
                host.energy.transfer(caller, spender, U256::ONE)
            });
            assert!(matches!(failed, Err(VmError::InsufficientBalance { .. })));
            assert!(energy::transfer(host, spender, U256::from(100u64)).is_err());
            Ok(())
        })
        .unwrap();

        assert_eq!(host.energy.allowance(&outer, &spender), U256::from(5u64));
        assert!(!host.has_staged_state());
    }
}
