//! Stake pool registry
//!
//! A pool is keyed by its staking address and bound 1:1 to a mining address
//! (the identity the validator uses in consensus). The pool holds the
//! validator's self-stake plus delegator stakes.
//!
//! ## Eligibility
//!
//! A pool is eligible for election while its self-stake is at least the
//! candidate minimum. Eligible pools are kept in the order they became
//! eligible; election ties are broken by this order, never by address.
//!
//! ## Bounds
//!
//! - A staker's balance in a pool must end up at zero or at least the minimum
//!   for its role (candidate minimum for self-stake, delegator minimum
//!   otherwise).
//! - A pool's total never exceeds `max_stake`.
//! - Delegating into a pool without self-stake is refused.

use crate::clock::EpochClock;
use crate::config::StakingConfig;
use crate::election::Candidate;
use crate::ledger::StakeSnapshot;
use crate::types::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Staking pool of one validator candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub staking_address: Address,
    pub mining_address: Address,

    /// Validator's own stake
    pub self_stake: Amount,

    /// Delegator stakes, ordered by delegator address
    pub delegators: BTreeMap<Address, Amount>,

    /// Self-stake + all delegator stakes
    pub total_stake: Amount,

    /// Derived: `self_stake >= candidate_min_stake`
    pub eligible: bool,
}

impl Pool {
    fn new(staking_address: Address, mining_address: Address) -> Self {
        Self {
            staking_address,
            mining_address,
            self_stake: 0,
            delegators: BTreeMap::new(),
            total_stake: 0,
            eligible: false,
        }
    }

    /// Stake held by `staker` in this pool
    pub fn stake_of(&self, staker: &Address) -> Amount {
        if *staker == self.staking_address {
            self.self_stake
        } else {
            self.delegators.get(staker).copied().unwrap_or(0)
        }
    }

    /// Current stake composition, as recorded at an epoch boundary
    pub fn snapshot(&self) -> StakeSnapshot {
        StakeSnapshot {
            validator_stake: self.self_stake,
            total_stake: self.total_stake,
            delegators: self
                .delegators
                .iter()
                .map(|(addr, amount)| (*addr, *amount))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StakingError {
    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Pool {0} not found")]
    PoolNotFound(Address),

    #[error("Pool {0} already exists")]
    PoolAlreadyExists(Address),

    #[error("Mining address {0} is already bound to a pool")]
    MiningAddressTaken(Address),

    #[error("Stake out of range: resulting {resulting}, allowed {min}..={max}")]
    StakeOutOfRange {
        resulting: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("Pool {0} has no self-stake and cannot take delegations")]
    PoolInactive(Address),

    #[error("Withdrawals are disallowed from {window_start} until the epoch ends (now {now})")]
    WithdrawalDisallowed { now: Timestamp, window_start: Timestamp },

    #[error("Insufficient stake: have {available}, requested {requested}")]
    InsufficientStake { available: Amount, requested: Amount },

    #[error("Stake arithmetic overflow")]
    Overflow,

    #[error("Pool {0} backs a current or pending validator and must keep the candidate minimum")]
    ValidatorStakeLocked(Address),
}

/// Registry of all staking pools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePoolRegistry {
    config: StakingConfig,

    /// Pools by staking address
    pools: BTreeMap<Address, Pool>,

    /// Mining address → staking address
    staking_by_mining: BTreeMap<Address, Address>,

    /// Eligible pools (staking addresses) in the order they became eligible
    to_be_elected: Vec<Address>,

    /// Sum of all pool totals
    total_staked: Amount,
}

impl StakePoolRegistry {
    pub fn new(config: StakingConfig) -> Self {
        Self {
            config,
            pools: BTreeMap::new(),
            staking_by_mining: BTreeMap::new(),
            to_be_elected: Vec::new(),
            total_staked: 0,
        }
    }

    /// Create an empty pool binding `staking` to `mining`
    pub fn register_pool(&mut self, staking: Address, mining: Address) -> Result<(), StakingError> {
        if self.pools.contains_key(&staking) {
            return Err(StakingError::PoolAlreadyExists(staking));
        }
        if self.staking_by_mining.contains_key(&mining) {
            return Err(StakingError::MiningAddressTaken(mining));
        }

        self.pools.insert(staking, Pool::new(staking, mining));
        self.staking_by_mining.insert(mining, staking);
        debug!(%staking, %mining, "pool registered");
        Ok(())
    }

    /// Create a pool and place its first self-stake in one step
    ///
    /// Nothing is registered if the stake would be rejected.
    pub fn stake_new_pool(
        &mut self,
        staking: Address,
        mining: Address,
        amount: Amount,
    ) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        self.check_range(amount, self.config.candidate_min_stake, amount)?;

        self.register_pool(staking, mining)?;
        self.stake(staking, staking, amount)
    }

    /// Add `amount` of `staker`'s stake to `pool`
    pub fn stake(&mut self, staker: Address, pool: Address, amount: Amount) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let candidate_min = self.config.candidate_min_stake;
        let delegator_min = self.config.delegator_min_stake;

        let entry = self.pools.get(&pool).ok_or(StakingError::PoolNotFound(pool))?;
        let is_self = staker == pool;
        if !is_self && entry.self_stake == 0 {
            return Err(StakingError::PoolInactive(pool));
        }

        let min = if is_self { candidate_min } else { delegator_min };
        let resulting = entry
            .stake_of(&staker)
            .checked_add(amount)
            .ok_or(StakingError::Overflow)?;
        let pool_total = entry
            .total_stake
            .checked_add(amount)
            .ok_or(StakingError::Overflow)?;
        self.check_range(resulting, min, pool_total)?;

        let entry = self.pools.get_mut(&pool).ok_or(StakingError::PoolNotFound(pool))?;
        if is_self {
            entry.self_stake = resulting;
        } else {
            entry.delegators.insert(staker, resulting);
        }
        entry.total_stake = pool_total;
        self.total_staked = self.total_staked.saturating_add(amount);
        self.refresh_eligibility(&pool);

        debug!(%staker, %pool, amount, pool_total, "stake placed");
        Ok(())
    }

    /// Remove `amount` of `staker`'s stake from `pool`
    ///
    /// Refused inside the disallow window before the fixed epoch end.
    pub fn withdraw(
        &mut self,
        staker: Address,
        pool: Address,
        amount: Amount,
        clock: &EpochClock,
        now: Timestamp,
    ) -> Result<(), StakingError> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if clock.is_withdraw_disallowed(now) {
            return Err(StakingError::WithdrawalDisallowed {
                now,
                window_start: clock
                    .fixed_epoch_end_time()
                    .saturating_sub(self.config.withdraw_disallow_period),
            });
        }

        let is_self = staker == pool;
        let min = if is_self {
            self.config.candidate_min_stake
        } else {
            self.config.delegator_min_stake
        };
        let max = self.config.max_stake;

        let entry = self.pools.get_mut(&pool).ok_or(StakingError::PoolNotFound(pool))?;
        let available = entry.stake_of(&staker);
        if amount > available {
            return Err(StakingError::InsufficientStake {
                available,
                requested: amount,
            });
        }

        let remaining = available - amount;
        if remaining != 0 && remaining < min {
            return Err(StakingError::StakeOutOfRange {
                resulting: remaining,
                min,
                max,
            });
        }

        if is_self {
            entry.self_stake = remaining;
        } else if remaining == 0 {
            entry.delegators.remove(&staker);
        } else {
            entry.delegators.insert(staker, remaining);
        }
        entry.total_stake -= amount;
        self.total_staked -= amount;
        self.refresh_eligibility(&pool);

        debug!(%staker, %pool, amount, "stake withdrawn");
        Ok(())
    }

    /// Drop a pool whose stake has been fully withdrawn
    ///
    /// The caller must not pass a pool that is still in a committee.
    /// Returns whether the pool was removed.
    pub fn prune(&mut self, staking: &Address) -> bool {
        let empty = self
            .pools
            .get(staking)
            .map_or(false, |pool| pool.total_stake == 0);
        if !empty {
            return false;
        }

        if let Some(pool) = self.pools.remove(staking) {
            self.staking_by_mining.remove(&pool.mining_address);
        }
        self.to_be_elected.retain(|addr| addr != staking);
        debug!(%staking, "empty pool pruned");
        true
    }

    fn check_range(&self, resulting: Amount, min: Amount, pool_total: Amount) -> Result<(), StakingError> {
        let max = self.config.max_stake;
        if resulting < min || pool_total > max {
            return Err(StakingError::StakeOutOfRange { resulting, min, max });
        }
        Ok(())
    }

    fn refresh_eligibility(&mut self, staking: &Address) {
        let Some(pool) = self.pools.get_mut(staking) else {
            return;
        };
        let eligible = pool.self_stake >= self.config.candidate_min_stake;
        if eligible == pool.eligible {
            return;
        }

        pool.eligible = eligible;
        if eligible {
            self.to_be_elected.push(*staking);
        } else {
            self.to_be_elected.retain(|addr| addr != staking);
        }
        debug!(%staking, eligible, "pool eligibility changed");
    }

    /// Eligible pools (staking addresses) in insertion order
    pub fn pools_to_be_elected(&self) -> &[Address] {
        &self.to_be_elected
    }

    /// Eligible pools as election candidates, in insertion order
    pub fn candidates(&self) -> Vec<Candidate> {
        self.to_be_elected
            .iter()
            .filter_map(|staking| self.pools.get(staking))
            .map(|pool| Candidate {
                staking_address: pool.staking_address,
                mining_address: pool.mining_address,
                total_stake: pool.total_stake,
            })
            .collect()
    }

    pub fn pool(&self, staking: &Address) -> Option<&Pool> {
        self.pools.get(staking)
    }

    pub fn pool_by_mining(&self, mining: &Address) -> Option<&Pool> {
        self.staking_by_mining
            .get(mining)
            .and_then(|staking| self.pools.get(staking))
    }

    pub fn staking_by_mining(&self, mining: &Address) -> Option<Address> {
        self.staking_by_mining.get(mining).copied()
    }

    pub fn mining_by_staking(&self, staking: &Address) -> Option<Address> {
        self.pools.get(staking).map(|pool| pool.mining_address)
    }

    pub fn stake_amount(&self, pool: &Address, staker: &Address) -> Amount {
        self.pools.get(pool).map_or(0, |p| p.stake_of(staker))
    }

    pub fn pool_total(&self, pool: &Address) -> Amount {
        self.pools.get(pool).map_or(0, |p| p.total_stake)
    }

    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }
}
