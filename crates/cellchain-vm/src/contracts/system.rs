//! Validator governance: staking, delegation and the per-block validator set.
//!
//! Accounts stake native tokens and delegate the stake to validator keys. The
//! ranking of validators by delegated votes only moves at block boundaries:
//! delegate/undelegate record a pending delta per validator and
//! [`SystemContract::finish_block`] folds the deltas into a new ranking,
//! re-evaluates the slot count and reports the validator set changes.

use std::collections::{BTreeMap, BTreeSet};

use cellchain_core::{decode_amount, Address, GenesisConfig, PubKey, ValidatorUpdate, I256, U256};
use cellchain_state::numeric::checked;
use cellchain_state::storage::codec;
use cellchain_state::{
    CallScope, Storage, Transactional, TransactionalCell, TransactionalMap, TransactionalNumericCell,
    TransactionalVector,
};
use tracing::{debug, info};

use crate::contract::Contract;
use crate::error::{scale_amount, VmError};
use crate::events::ExecutionEvent;
use crate::host::Host;

pub const NAMESPACE: &str = "system";

#[derive(Debug)]
pub struct SystemContract {
    num_slots: TransactionalNumericCell<u64>,
    max_slots: TransactionalNumericCell<u64>,
    target_slots: TransactionalMap<PubKey, u64>,
    target_slots_modified: TransactionalCell<bool>,
    stakes: TransactionalMap<Address, u64>,
    delegations: TransactionalMap<Address, BTreeMap<PubKey, u64>>,
    validators: TransactionalVector<PubKey>,
    validator_votes: TransactionalVector<u64>,
    delegation_deltas: TransactionalMap<PubKey, I256>,
}

impl SystemContract {
    /// Build the genesis state. Initial validators enter the ranking with
    /// zero votes, each backed by a zero delegation from the creator.
    pub fn genesis(scope: &CallScope, config: &GenesisConfig) -> Result<Self, VmError> {
        let num_slots = config
            .initial_num_slots
            .min(config.initial_validators.len() as u64);
        if num_slots > config.max_slots {
            return Err(VmError::Consistency(format!(
                "initial slot count {num_slots} exceeds max slots {}",
                config.max_slots
            )));
        }

        let mut initial = config.initial_validators.clone();
        initial.sort();
        initial.dedup();

        let creator_delegations: BTreeMap<PubKey, u64> =
            initial.iter().map(|key| (*key, 0)).collect();
        let mut delegations = BTreeMap::new();
        if !creator_delegations.is_empty() {
            delegations.insert(config.creator, creator_delegations);
        }
        let votes = vec![0u64; initial.len()];

        Ok(SystemContract {
            num_slots: TransactionalNumericCell::new(scope, num_slots),
            max_slots: TransactionalNumericCell::new(scope, config.max_slots),
            target_slots: TransactionalMap::new(scope),
            target_slots_modified: TransactionalCell::new(scope, false),
            stakes: TransactionalMap::new(scope),
            delegations: TransactionalMap::from_committed(scope, delegations),
            validators: TransactionalVector::from_committed(scope, initial),
            validator_votes: TransactionalVector::from_committed(scope, votes),
            delegation_deltas: TransactionalMap::new(scope),
        })
    }

    pub fn num_slots(&self) -> u64 {
        self.num_slots.get()
    }

    pub fn max_slots(&self) -> u64 {
        self.max_slots.get()
    }

    pub fn stake_of(&self, account: &Address) -> u64 {
        self.stakes.get(account).copied().unwrap_or(0)
    }

    pub fn delegation(&self, delegator: &Address, validator: &PubKey) -> Option<u64> {
        self.delegations
            .get(delegator)
            .and_then(|by_validator| by_validator.get(validator))
            .copied()
    }

    pub fn target_slots(&self, validator: &PubKey) -> Option<u64> {
        self.target_slots.get(validator).copied()
    }

    pub fn pending_delta(&self, validator: &PubKey) -> I256 {
        self.delegation_deltas
            .get(validator)
            .copied()
            .unwrap_or(I256::ZERO)
    }

    pub fn has_pending_deltas(&self) -> bool {
        !self.delegation_deltas.is_empty()
    }

    /// Full ranking as of the last settled block, best first
    pub fn ranking(&self) -> Vec<(PubKey, u64)> {
        self.validators
            .to_vec()
            .into_iter()
            .zip(self.validator_votes.to_vec())
            .collect()
    }

    /// The top `num_slots` entries of the ranking
    pub fn elected(&self) -> Vec<(PubKey, u64)> {
        let mut ranking = self.ranking();
        ranking.truncate(self.num_slots() as usize);
        ranking
    }

    fn ranked_votes(&self, validator: &PubKey) -> u64 {
        (0..self.validators.len())
            .find(|&i| matches!(self.validators.get(i), Ok(key) if key == validator))
            .and_then(|i| self.validator_votes.get(i).ok().copied())
            .unwrap_or(0)
    }

    /// Ranked votes plus this block's pending delta
    fn projected_votes(&self, validator: &PubKey) -> I256 {
        I256::from(self.ranked_votes(validator)) + self.pending_delta(validator)
    }

    /// Largest amount not above `amount` whose application leaves the
    /// validator's projected votes distinct from every other candidate's.
    ///
    /// A zero total never collides; zero-vote placeholders order by key.
    fn collision_free_amount(&self, validator: &PubKey, amount: u64, positive: bool) -> Result<u64, VmError> {
        let base = self.projected_votes(validator);
        let target = |units: u64| {
            if positive {
                base + I256::from(units)
            } else {
                base - I256::from(units)
            }
        };

        let requested = target(amount);
        if requested < I256::ZERO || requested > I256::from(i64::MAX) {
            return Err(VmError::DelegationLimitExceeded(*validator));
        }

        let mut candidates: BTreeSet<PubKey> = self.validators.to_vec().into_iter().collect();
        candidates.extend(self.delegation_deltas.keys());
        candidates.remove(validator);
        let taken: BTreeSet<I256> = candidates
            .iter()
            .map(|key| self.projected_votes(key))
            .collect();

        let mut units = amount;
        loop {
            let total = target(units);
            if total == I256::ZERO || !taken.contains(&total) {
                return Ok(units);
            }
            units -= 1;
            if units == 0 {
                return Err(VmError::CollisionRetryExhausted(*validator));
            }
        }
    }

    fn record_delta(&mut self, validator: PubKey, units: u64, positive: bool) {
        let current = self.pending_delta(&validator);
        let delta = if positive {
            current + I256::from(units)
        } else {
            current - I256::from(units)
        };
        self.delegation_deltas.insert(validator, delta);
    }

    /// Credit the caller's stake with the attached value. Returns the scaled
    /// amount credited.
    pub fn stake(&mut self, caller: Address, value: U256) -> Result<u64, VmError> {
        let units = scale_amount(value)?;
        if units == 0 {
            return Err(VmError::ZeroAmount);
        }
        let balance = checked::add(self.stake_of(&caller), units)?;
        self.stakes.insert(caller, balance);
        Ok(units)
    }

    /// Debit the caller's stake. Returns the native amount to refund.
    pub fn unstake(&mut self, caller: Address, amount: U256) -> Result<U256, VmError> {
        let balance = *self.stakes.get(&caller).ok_or(VmError::NoStake(caller))?;
        let units = scale_amount(amount)?;
        if units == 0 {
            return Err(VmError::ZeroAmount);
        }
        if balance < units {
            return Err(VmError::InsufficientBalance {
                have: decode_amount(balance),
                need: amount,
            });
        }
        self.set_stake(caller, balance - units);
        Ok(decode_amount(units))
    }

    fn set_stake(&mut self, account: Address, balance: u64) {
        if balance == 0 {
            self.stakes.erase(&account);
        } else {
            self.stakes.insert(account, balance);
        }
    }

    /// Move stake into a delegation. Returns the units applied, which the
    /// collision loop may have reduced below the requested amount.
    pub fn delegate(&mut self, caller: Address, validator: PubKey, amount: U256) -> Result<u64, VmError> {
        let balance = *self.stakes.get(&caller).ok_or(VmError::NoStake(caller))?;
        let requested = scale_amount(amount)?;
        if requested == 0 {
            return Err(VmError::ZeroAmount);
        }
        if balance < requested {
            return Err(VmError::InsufficientBalance {
                have: decode_amount(balance),
                need: amount,
            });
        }
        // a key becomes delegatable once it delegates to itself
        let validator_address = validator.address();
        if self.delegation(&validator_address, &validator).is_none() && caller != validator_address {
            return Err(VmError::UnregisteredValidator(validator));
        }

        let units = self.collision_free_amount(&validator, requested, true)?;
        let delegated = checked::add(self.delegation(&caller, &validator).unwrap_or(0), units)?;

        self.set_stake(caller, balance - units);
        self.delegations.entry(caller).insert(validator, delegated);
        self.record_delta(validator, units, true);
        Ok(units)
    }

    /// Return delegated units to stake. Returns the units removed from the
    /// validator's votes.
    pub fn undelegate(&mut self, caller: Address, validator: PubKey, amount: U256) -> Result<u64, VmError> {
        let existing = self
            .delegation(&caller, &validator)
            .ok_or(VmError::NoDelegation {
                delegator: caller,
                validator,
            })?;
        let requested = scale_amount(amount)?;
        if requested == 0 {
            return Err(VmError::ZeroAmount);
        }

        let units = self.collision_free_amount(&validator, requested, false)?;
        let refunded = units.min(existing);
        let balance = checked::add(self.stake_of(&caller), refunded)?;

        let by_validator = self.delegations.entry(caller);
        if existing == refunded {
            by_validator.remove(&validator);
        } else {
            by_validator.insert(validator, existing - refunded);
        }
        if by_validator.is_empty() {
            self.delegations.erase(&caller);
        }
        if refunded > 0 {
            self.stakes.insert(caller, balance);
        }
        self.record_delta(validator, units, false);
        Ok(units)
    }

    /// Record an elected validator's preferred slot count
    pub fn vote_slots(&mut self, caller: Address, validator: PubKey, slots: u64) -> Result<(), VmError> {
        let max = self.max_slots();
        if slots < 1 || slots > max {
            return Err(VmError::InvalidSlotCount { slots, max });
        }
        if validator.address() != caller {
            return Err(VmError::Unauthorized(caller));
        }
        let seats = self.num_slots().min(self.validators.len());
        let elected = (0..seats).any(|i| matches!(self.validators.get(i), Ok(key) if *key == validator));
        if !elected {
            return Err(VmError::ValidatorNotElected(validator));
        }
        self.target_slots.insert(validator, slots);
        self.target_slots_modified.set(true);
        Ok(())
    }

    /// Rank every candidate by ranked votes plus pending delta, best first,
    /// ties broken by key bytes.
    ///
    /// A candidate stays ranked with zero votes only if it already was and
    /// nothing touched it this block.
    fn sorted_candidates(&self) -> Result<Vec<(PubKey, u64)>, VmError> {
        let mut totals: BTreeMap<PubKey, I256> = BTreeMap::new();
        for (key, votes) in self.ranking() {
            totals.insert(key, I256::from(votes));
        }
        let deltas = self.delegation_deltas.effective_entries();
        for (key, delta) in &deltas {
            *totals.entry(*key).or_insert(I256::ZERO) += *delta;
        }
        let touched: BTreeSet<PubKey> = deltas.into_iter().map(|(key, _)| key).collect();

        let mut sorted = Vec::with_capacity(totals.len());
        for (key, total) in totals {
            let votes = vote_units(total)
                .ok_or_else(|| VmError::Consistency(format!("votes out of range for {key}")))?;
            let placeholder = votes == 0 && !touched.contains(&key) && self.is_ranked(&key);
            if votes > 0 || placeholder {
                sorted.push((key, votes));
            }
        }
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(sorted)
    }

    fn is_ranked(&self, validator: &PubKey) -> bool {
        (0..self.validators.len()).any(|i| matches!(self.validators.get(i), Ok(key) if key == validator))
    }

    /// Count slot votes among the validators elected under the current slot
    /// count. Returns whether the slot count changed.
    fn reevaluate_slots(&mut self, sorted: &[(PubKey, u64)]) -> bool {
        let num_slots = self.num_slots();
        let max_slots = self.max_slots();
        let electorate = &sorted[..sorted.len().min(num_slots as usize)];

        let mut raise = Vec::new();
        let mut lower = Vec::new();
        for (key, _) in electorate {
            match self.target_slots(key) {
                Some(vote) if vote > num_slots => raise.push(vote.min(max_slots)),
                Some(vote) if vote < num_slots => lower.push(vote),
                _ => {}
            }
        }

        let quorum = electorate.len() * 2 / 3 + 1;
        raise.sort_unstable_by(|a, b| b.cmp(a));
        lower.sort_unstable();
        let adopted = if raise.len() >= quorum {
            raise[quorum - 1]
        } else if lower.len() >= quorum {
            lower[quorum - 1]
        } else {
            return false;
        };

        self.num_slots.set(adopted);
        for key in self.target_slots.keys() {
            if self.target_slots(&key) == Some(adopted) {
                self.target_slots.erase(&key);
            }
        }
        info!(from = num_slots, to = adopted, "validator slot count changed");
        true
    }

    /// Settle the block: fold pending deltas into the ranking, re-evaluate
    /// the slot count and return the validator set changes.
    pub fn finish_block(&mut self) -> Result<Vec<ValidatorUpdate>, VmError> {
        let changed_delegations = self.has_pending_deltas();
        let slots_voted = *self.target_slots_modified.get();
        if !changed_delegations && !slots_voted {
            return Ok(Vec::new());
        }

        let old = self.ranking();
        let old_num_slots = self.num_slots();
        let sorted = self.sorted_candidates()?;

        if changed_delegations {
            self.delegation_deltas.clear();
            self.validators.clear();
            self.validator_votes.clear();
            for (key, votes) in &sorted {
                self.validators.push(*key);
                self.validator_votes.push(*votes);
            }
            let elected: BTreeSet<PubKey> = sorted
                .iter()
                .take(old_num_slots as usize)
                .map(|(key, _)| *key)
                .collect();
            for key in self.target_slots.keys() {
                if !elected.contains(&key) {
                    self.target_slots.erase(&key);
                }
            }
        }

        let mut changed_slots = false;
        if slots_voted {
            self.target_slots_modified.set(false);
            changed_slots = self.reevaluate_slots(&sorted);
        }

        if !changed_delegations && !changed_slots {
            return Ok(Vec::new());
        }
        Ok(validator_diff(&old, old_num_slots, &sorted, self.num_slots()))
    }
}

fn vote_units(total: I256) -> Option<u64> {
    if total < I256::ZERO || total > I256::from(i64::MAX) {
        return None;
    }
    let bytes = total.to_be_bytes();
    let mut low = [0u8; 8];
    low.copy_from_slice(&bytes[24..]);
    Some(u64::from_be_bytes(low))
}

/// Compare the old elected window against the new one
fn validator_diff(
    old: &[(PubKey, u64)],
    old_num_slots: u64,
    sorted: &[(PubKey, u64)],
    new_num_slots: u64,
) -> Vec<ValidatorUpdate> {
    let old_elected = &old[..old.len().min(old_num_slots as usize)];
    let new_elected = &sorted[..sorted.len().min(new_num_slots as usize)];
    let power_in = |window: &[(PubKey, u64)], key: &PubKey| {
        window
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, votes)| *votes)
    };

    let mut updates = Vec::new();
    for (key, votes) in old_elected {
        let power = power_in(new_elected, key).unwrap_or(0);
        if power != *votes {
            updates.push(ValidatorUpdate::new(*key, power));
        }
    }
    for (key, votes) in new_elected {
        if *votes > 0 && power_in(old_elected, key).is_none() {
            updates.push(ValidatorUpdate::new(*key, *votes));
        }
    }
    updates
}

impl Contract for SystemContract {
    fn namespace(&self) -> &'static str {
        NAMESPACE
    }

    fn cells(&mut self) -> Vec<&mut dyn Transactional> {
        vec![
            &mut self.num_slots,
            &mut self.max_slots,
            &mut self.target_slots,
            &mut self.target_slots_modified,
            &mut self.stakes,
            &mut self.delegations,
            &mut self.validators,
            &mut self.validator_votes,
            &mut self.delegation_deltas,
        ]
    }

    fn dump(&self, storage: &mut dyn Storage) -> Result<(), VmError> {
        if self.has_pending_deltas() {
            return Err(VmError::Consistency(
                "delegation deltas pending at snapshot".to_string(),
            ));
        }
        codec::write_value(storage, NAMESPACE, "num_slots", &self.num_slots.committed())?;
        codec::write_value(storage, NAMESPACE, "max_slots", &self.max_slots.committed())?;
        codec::write_map(storage, NAMESPACE, "target_slots", self.target_slots.iter())?;
        codec::write_map(storage, NAMESPACE, "stakes", self.stakes.iter())?;
        codec::write_map(storage, NAMESPACE, "delegations", self.delegations.iter())?;
        codec::write_vec(storage, NAMESPACE, "validators", self.validators.iter())?;
        codec::write_vec(storage, NAMESPACE, "validator_votes", self.validator_votes.iter())?;
        Ok(())
    }

    fn load(scope: &CallScope, storage: &dyn Storage) -> Result<Self, VmError> {
        let validators: Vec<PubKey> = codec::read_vec(storage, NAMESPACE, "validators")?;
        let votes: Vec<u64> = codec::read_vec(storage, NAMESPACE, "validator_votes")?;
        if validators.len() != votes.len() {
            return Err(VmError::Consistency(format!(
                "{} validators but {} vote entries",
                validators.len(),
                votes.len()
            )));
        }
        Ok(SystemContract {
            num_slots: TransactionalNumericCell::new(
                scope,
                codec::require_value(storage, NAMESPACE, "num_slots")?,
            ),
            max_slots: TransactionalNumericCell::new(
                scope,
                codec::require_value(storage, NAMESPACE, "max_slots")?,
            ),
            target_slots: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "target_slots")?,
            ),
            target_slots_modified: TransactionalCell::new(scope, false),
            stakes: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "stakes")?,
            ),
            delegations: TransactionalMap::from_committed(
                scope,
                codec::read_map(storage, NAMESPACE, "delegations")?,
            ),
            validators: TransactionalVector::from_committed(scope, validators),
            validator_votes: TransactionalVector::from_committed(scope, votes),
            delegation_deltas: TransactionalMap::new(scope),
        })
    }
}

pub fn address() -> Address {
    Address::for_contract(NAMESPACE)
}

/// Stake the value attached to the transaction
pub fn stake(host: &mut Host) -> Result<u64, VmError> {
    let value = host.value();
    host.call(address(), |host, caller| {
        let units = host.system.stake(caller, value)?;
        debug!(%caller, units, "staked");
        host.emit(ExecutionEvent::Staked {
            account: caller,
            units,
        });
        Ok(units)
    })
}

pub fn unstake(host: &mut Host, amount: U256) -> Result<U256, VmError> {
    host.call(address(), |host, caller| {
        let refund = host.system.unstake(caller, amount)?;
        debug!(%caller, %refund, "unstaked");
        host.emit(ExecutionEvent::Unstaked {
            account: caller,
            amount: refund,
        });
        Ok(refund)
    })
}

pub fn delegate(host: &mut Host, validator: PubKey, amount: U256) -> Result<u64, VmError> {
    host.call(address(), |host, caller| {
        let units = host.system.delegate(caller, validator, amount)?;
        debug!(%caller, %validator, units, "delegated");
        host.emit(ExecutionEvent::Delegated {
            delegator: caller,
            validator,
            units,
        });
        Ok(units)
    })
}

pub fn undelegate(host: &mut Host, validator: PubKey, amount: U256) -> Result<u64, VmError> {
    host.call(address(), |host, caller| {
        let units = host.system.undelegate(caller, validator, amount)?;
        debug!(%caller, %validator, units, "undelegated");
        host.emit(ExecutionEvent::Undelegated {
            delegator: caller,
            validator,
            units,
        });
        Ok(units)
    })
}

pub fn vote_slots(host: &mut Host, validator: PubKey, slots: u64) -> Result<(), VmError> {
    host.call(address(), |host, caller| {
        host.system.vote_slots(caller, validator, slots)?;
        host.emit(ExecutionEvent::SlotsVoted { validator, slots });
        Ok(())
    })
}

pub fn finish_block(host: &mut Host) -> Result<Vec<ValidatorUpdate>, VmError> {
    host.call(address(), |host, _| {
        let updates = host.system.finish_block()?;
        if !updates.is_empty() {
            host.emit(ExecutionEvent::ValidatorSetUpdated {
                updates: updates.clone(),
            });
        }
        Ok(updates)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellchain_state::{commit_all, MemoryStorage};

    fn key(byte: u8) -> PubKey {
        let mut bytes = [byte; 33];
        bytes[0] = 0x02;
        PubKey(bytes)
    }

    fn units(n: u64) -> U256 {
        decode_amount(n)
    }

    fn config(validators: Vec<PubKey>, num_slots: u64, max_slots: u64) -> GenesisConfig {
        GenesisConfig {
            chain_id: 1,
            initial_validators: validators,
            initial_num_slots: num_slots,
            max_slots,
            creator: Address([0xCC; 20]),
            energy: Default::default(),
        }
    }

    fn commit(system: &mut SystemContract) {
        commit_all(system.cells());
    }

    /// Stake and self-delegate `votes` units for `validator`
    fn register(system: &mut SystemContract, validator: PubKey, votes: u64) {
        let owner = validator.address();
        system.stake(owner, units(votes)).unwrap();
        system.delegate(owner, validator, units(votes)).unwrap();
    }

    #[test]
    fn test_genesis_caps_slots() {
        let scope = CallScope::new();
        let system = SystemContract::genesis(&scope, &config(vec![key(1), key(2)], 5, 10)).unwrap();
        assert_eq!(system.num_slots(), 2);
        assert_eq!(system.ranking(), vec![(key(1), 0), (key(2), 0)]);
        assert_eq!(system.delegation(&Address([0xCC; 20]), &key(1)), Some(0));

        let err = SystemContract::genesis(&scope, &config(vec![key(1), key(2)], 2, 1)).unwrap_err();
        assert!(matches!(err, VmError::Consistency(_)));
    }

    #[test]
    fn test_stake_rejects_dust_and_zero() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        let alice = Address([1u8; 20]);

        assert!(matches!(system.stake(alice, U256::from(5u64)), Err(VmError::Dust(_))));
        assert!(matches!(system.stake(alice, U256::ZERO), Err(VmError::ZeroAmount)));
        assert_eq!(system.stake(alice, units(3)).unwrap(), 3);
        assert_eq!(system.stake_of(&alice), 3);
    }

    #[test]
    fn test_unstake_erases_empty_record() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        let alice = Address([1u8; 20]);

        assert!(matches!(system.unstake(alice, units(1)), Err(VmError::NoStake(_))));
        system.stake(alice, units(4)).unwrap();
        assert!(matches!(
            system.unstake(alice, units(5)),
            Err(VmError::InsufficientBalance { .. })
        ));
        assert_eq!(system.unstake(alice, units(4)).unwrap(), units(4));
        assert!(system.stakes.get(&alice).is_none());
    }

    #[test]
    fn test_delegate_requires_self_registration() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        let validator = key(7);
        let alice = Address([1u8; 20]);
        system.stake(alice, units(10)).unwrap();

        assert!(matches!(
            system.delegate(alice, validator, units(1)),
            Err(VmError::UnregisteredValidator(_))
        ));
        register(&mut system, validator, 5);
        assert_eq!(system.delegate(alice, validator, units(2)).unwrap(), 2);
        assert_eq!(system.stake_of(&alice), 8);
        assert_eq!(system.pending_delta(&validator), I256::from(7u64));
    }

    #[test]
    fn test_delegate_avoids_vote_collision() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        register(&mut system, key(1), 10);

        let owner = key(2).address();
        system.stake(owner, units(10)).unwrap();
        // 10 would tie with key(1)
        assert_eq!(system.delegate(owner, key(2), units(10)).unwrap(), 9);
        assert_eq!(system.delegation(&owner, &key(2)), Some(9));
        assert_eq!(system.stake_of(&owner), 1);
    }

    #[test]
    fn test_collision_retry_exhausted() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        register(&mut system, key(1), 1);

        let owner = key(2).address();
        system.stake(owner, units(1)).unwrap();
        assert!(matches!(
            system.delegate(owner, key(2), units(1)),
            Err(VmError::CollisionRetryExhausted(_))
        ));
    }

    #[test]
    fn test_undelegate_refunds_and_erases() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        let validator = key(3);
        let owner = validator.address();
        register(&mut system, validator, 6);

        assert_eq!(system.undelegate(owner, validator, units(6)).unwrap(), 6);
        assert_eq!(system.stake_of(&owner), 6);
        assert_eq!(system.delegation(&owner, &validator), None);
        assert!(system.delegations.get(&owner).is_none());
        assert_eq!(system.pending_delta(&validator), I256::ZERO);
        assert!(matches!(
            system.undelegate(owner, validator, units(1)),
            Err(VmError::NoDelegation { .. })
        ));
    }

    #[test]
    fn test_undelegate_beyond_votes_exceeds_limit() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        let validator = key(3);
        register(&mut system, validator, 2);
        assert!(matches!(
            system.undelegate(validator.address(), validator, units(3)),
            Err(VmError::DelegationLimitExceeded(_))
        ));
    }

    #[test]
    fn test_finish_block_elects_and_diffs() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![key(1), key(2)], 2, 4)).unwrap();
        register(&mut system, key(3), 5);

        let updates = system.finish_block().unwrap();
        commit(&mut system);
        // key(3) takes the first seat, key(2) loses its placeholder seat
        assert_eq!(system.ranking(), vec![(key(3), 5), (key(1), 0), (key(2), 0)]);
        assert_eq!(updates, vec![ValidatorUpdate::new(key(3), 5)]);
        assert!(!system.has_pending_deltas());

        // nothing pending: nothing to report
        assert!(system.finish_block().unwrap().is_empty());
    }

    #[test]
    fn test_vote_slots_requires_elected_caller() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![key(1), key(2)], 1, 4)).unwrap();

        assert!(matches!(
            system.vote_slots(key(1).address(), key(1), 0),
            Err(VmError::InvalidSlotCount { .. })
        ));
        assert!(matches!(
            system.vote_slots(key(1).address(), key(1), 5),
            Err(VmError::InvalidSlotCount { .. })
        ));
        assert!(matches!(
            system.vote_slots(key(2).address(), key(1), 2),
            Err(VmError::Unauthorized(_))
        ));
        assert!(matches!(
            system.vote_slots(key(2).address(), key(2), 2),
            Err(VmError::ValidatorNotElected(_))
        ));
        system.vote_slots(key(1).address(), key(1), 2).unwrap();
        assert_eq!(system.target_slots(&key(1)), Some(2));
    }

    #[test]
    fn test_slot_vote_raises_num_slots() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![key(1), key(2)], 1, 4)).unwrap();
        system.vote_slots(key(1).address(), key(1), 4).unwrap();

        let updates = system.finish_block().unwrap();
        commit(&mut system);
        assert_eq!(system.num_slots(), 4);
        // the satisfied vote is dropped
        assert_eq!(system.target_slots(&key(1)), None);
        // newly seated placeholders carry no power
        assert!(updates.is_empty());
    }

    #[test]
    fn test_dump_refuses_pending_deltas() {
        let scope = CallScope::new();
        let mut system = SystemContract::genesis(&scope, &config(vec![], 0, 4)).unwrap();
        register(&mut system, key(1), 3);
        commit(&mut system);

        let mut storage = MemoryStorage::new();
        assert!(matches!(system.dump(&mut storage), Err(VmError::Consistency(_))));

        system.finish_block().unwrap();
        commit(&mut system);
        system.dump(&mut storage).unwrap();
        let loaded = SystemContract::load(&scope, &storage).unwrap();
        assert_eq!(loaded.ranking(), vec![(key(1), 3)]);
        assert_eq!(loaded.stake_of(&key(1).address()), 0);
        assert_eq!(loaded.delegation(&key(1).address(), &key(1)), Some(3));
        assert!(!loaded.has_pending_deltas());
    }
}
