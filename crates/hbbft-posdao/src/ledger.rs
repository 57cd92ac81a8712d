//! Reward pot ledger
//!
//! Native value held by the engine is split into:
//!
//! - **delta pot**: funded explicitly, paid out over `delta_pot_payout_divisor` epochs
//! - **reinsert pot**: funded explicitly or by any direct transfer, paid out over
//!   `reinsert_pot_payout_divisor` epochs; also receives every rounding residue
//! - **undistributed rewards**: computed but not yet claimed
//!
//! ## Epoch reward
//!
//! ```text
//! total        = delta / Dd + reinsert / Dr
//! governance   = total * num / den                      (pushed to treasury)
//! per          = (total - governance) / n               (n = committee size)
//! validator    = max(per * vStake / tStake, per * min% / 100)
//! delegator_i  = (per - validator) * dStake_i / (tStake - vStake)
//! ```
//!
//! Stakes come from the snapshot written when the validator's membership for
//! the epoch was finalized. All divisions floor; every residue goes back to
//! the reinsert pot.
//!
//! ## Conservation
//!
//! `balance == delta + reinsert + undistributed` after every public call.

use crate::config::RewardConfig;
use crate::payout::{Payout, PayoutError};
use crate::types::{Address, Amount, Epoch};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// `a * b / c` without intermediate overflow (floor)
///
/// Returns 0 when `c == 0` and saturates if the quotient does not fit.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Amount {
    if c == 0 {
        return 0;
    }
    let result = BigUint::from(a) * BigUint::from(b) / BigUint::from(c);
    u128::try_from(result).unwrap_or(Amount::MAX)
}

/// Amount released from `pot` this epoch, and what stays behind
pub fn draw_from_pot(pot: Amount, divisor: Amount) -> (Amount, Amount) {
    if divisor == 0 {
        return (0, pot);
    }
    let amount = pot / divisor;
    (amount, pot - amount)
}

/// Stake composition of one pool at an epoch boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeSnapshot {
    pub validator_stake: Amount,
    /// Validator + all delegators
    pub total_stake: Amount,
    /// Delegator stakes, ordered by address
    pub delegators: Vec<(Address, Amount)>,
}

/// Validator taking part in a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitteeMember {
    pub mining_address: Address,
    /// Receives the validator's share
    pub staking_address: Address,
}

/// Summary of one epoch's distribution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRewardRecord {
    pub total_reward: Amount,
    pub governance_share: Amount,
    /// Whether the treasury accepted the push
    pub governance_paid: bool,
    pub per_validator_share: Amount,
    pub validators: usize,
    /// Rounding residue (or the whole share, for an empty committee)
    pub returned_to_reinsert: Amount,
    /// Payees whose push was refused; their share became claimable
    pub failed_payouts: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClaimError {
    #[error("Nothing to claim for {0}")]
    NothingToClaim(Address),

    #[error("Payout rejected: {0}")]
    PayoutRejected(#[from] PayoutError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FundingError {
    #[error("Funding {amount} would overflow the ledger balance")]
    Overflow { amount: Amount },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardPotLedger {
    config: RewardConfig,

    delta_pot: Amount,
    reinsert_pot: Amount,
    native_reward_undistributed: Amount,

    /// Native value held
    balance: Amount,

    /// Value that has left the ledger through successful payouts
    total_paid_out: Amount,

    snapshots: BTreeMap<(Epoch, Address), StakeSnapshot>,
    validator_rewards: BTreeMap<(Epoch, Address), Amount>,
    delegator_rewards: BTreeMap<(Epoch, Address, Address), Amount>,
    epoch_records: BTreeMap<Epoch, EpochRewardRecord>,

    /// Pull balances; sums to `native_reward_undistributed`
    claimable: BTreeMap<Address, Amount>,
}

impl RewardPotLedger {
    pub fn new(config: RewardConfig) -> Self {
        Self {
            config,
            delta_pot: 0,
            reinsert_pot: 0,
            native_reward_undistributed: 0,
            balance: 0,
            total_paid_out: 0,
            snapshots: BTreeMap::new(),
            validator_rewards: BTreeMap::new(),
            delegator_rewards: BTreeMap::new(),
            epoch_records: BTreeMap::new(),
            claimable: BTreeMap::new(),
        }
    }

    pub fn add_to_delta_pot(&mut self, amount: Amount) -> Result<(), FundingError> {
        let (pot, balance) = self.credit(self.delta_pot, amount)?;
        self.delta_pot = pot;
        self.balance = balance;
        debug!(amount, delta_pot = self.delta_pot, "delta pot funded");
        self.check_conservation();
        Ok(())
    }

    pub fn add_to_reinsert_pot(&mut self, amount: Amount) -> Result<(), FundingError> {
        let (pot, balance) = self.credit(self.reinsert_pot, amount)?;
        self.reinsert_pot = pot;
        self.balance = balance;
        debug!(amount, reinsert_pot = self.reinsert_pot, "reinsert pot funded");
        self.check_conservation();
        Ok(())
    }

    /// Value arriving outside the funding calls lands in the reinsert pot
    pub fn receive_transfer(&mut self, from: &Address, amount: Amount) -> Result<(), FundingError> {
        self.add_to_reinsert_pot(amount)?;
        info!(%from, amount, "direct transfer credited to reinsert pot");
        Ok(())
    }

    /// New `(pot, balance)` after crediting `amount`; nothing changes on overflow
    fn credit(&self, pot: Amount, amount: Amount) -> Result<(Amount, Amount), FundingError> {
        match (pot.checked_add(amount), self.balance.checked_add(amount)) {
            (Some(pot), Some(balance)) => Ok((pot, balance)),
            _ => {
                warn!(amount, balance = self.balance, "funding refused, balance would overflow");
                Err(FundingError::Overflow { amount })
            }
        }
    }

    /// Record `mining`'s stake composition for `epoch`
    ///
    /// Write-once: returns false and keeps the existing record if one is
    /// already present.
    pub fn record_snapshot(&mut self, epoch: Epoch, mining: Address, snapshot: StakeSnapshot) -> bool {
        match self.snapshots.entry((epoch, mining)) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                debug!(
                    epoch,
                    %mining,
                    validator_stake = snapshot.validator_stake,
                    total_stake = snapshot.total_stake,
                    "stake snapshot recorded"
                );
                slot.insert(snapshot);
                true
            }
        }
    }

    /// Pay out `epoch`'s reward to `committee`
    ///
    /// Runs once per epoch; returns `None` if `epoch` was already distributed.
    pub fn distribute<P: Payout + ?Sized>(
        &mut self,
        epoch: Epoch,
        committee: &[CommitteeMember],
        payout: &mut P,
    ) -> Option<EpochRewardRecord> {
        if self.epoch_records.contains_key(&epoch) {
            warn!(epoch, "rewards already distributed");
            return None;
        }

        let (from_delta, delta_left) =
            draw_from_pot(self.delta_pot, self.config.delta_pot_payout_divisor);
        let (from_reinsert, reinsert_left) =
            draw_from_pot(self.reinsert_pot, self.config.reinsert_pot_payout_divisor);
        self.delta_pot = delta_left;
        self.reinsert_pot = reinsert_left;

        let total_reward = from_delta + from_reinsert;
        let mut record = EpochRewardRecord {
            total_reward,
            validators: committee.len(),
            ..EpochRewardRecord::default()
        };

        let governance_share = mul_div(
            total_reward,
            self.config.governance_share_numerator,
            self.config.governance_share_denominator,
        );
        record.governance_share = governance_share;
        if governance_share > 0 {
            let treasury = self.config.governance_address;
            record.governance_paid = self.push(&treasury, governance_share, payout);
            if !record.governance_paid {
                record.failed_payouts.push(treasury);
            }
        }

        let remaining = total_reward - governance_share;
        if committee.is_empty() {
            record.returned_to_reinsert = remaining;
        } else {
            let n = committee.len() as Amount;
            let per = remaining / n;
            record.per_validator_share = per;
            let mut residue = remaining - per * n;

            for member in committee {
                residue += self.split_pool_reward(epoch, member, per, payout, &mut record);
            }
            record.returned_to_reinsert = residue;
        }
        self.reinsert_pot += record.returned_to_reinsert;

        info!(
            epoch,
            total_reward,
            governance_share,
            per_validator = record.per_validator_share,
            residue = record.returned_to_reinsert,
            "epoch rewards distributed"
        );
        self.epoch_records.insert(epoch, record.clone());
        self.check_conservation();
        Some(record)
    }

    /// Split one validator's share; returns the residue
    fn split_pool_reward<P: Payout + ?Sized>(
        &mut self,
        epoch: Epoch,
        member: &CommitteeMember,
        share: Amount,
        payout: &mut P,
        record: &mut EpochRewardRecord,
    ) -> Amount {
        let snapshot = self.snapshots.get(&(epoch, member.mining_address)).cloned();
        let (validator_part, delegators) = match snapshot {
            Some(s) if s.total_stake > 0 && !s.delegators.is_empty() => {
                let by_stake = mul_div(share, s.validator_stake, s.total_stake);
                let floor = mul_div(share, self.config.validator_min_reward_percent, 100);
                (by_stake.max(floor).min(share), Some(s))
            }
            _ => (share, None),
        };

        self.validator_rewards
            .insert((epoch, member.mining_address), validator_part);
        if validator_part > 0 && !self.push(&member.staking_address, validator_part, payout) {
            record.failed_payouts.push(member.staking_address);
        }

        let Some(snapshot) = delegators else {
            return 0;
        };
        let delegators_part = share - validator_part;
        let delegated_total = snapshot.total_stake - snapshot.validator_stake;
        let mut credited = 0;
        for (delegator, stake) in &snapshot.delegators {
            let reward = mul_div(delegators_part, *stake, delegated_total);
            self.delegator_rewards
                .insert((epoch, member.mining_address, *delegator), reward);
            if reward > 0 {
                self.credit_claimable(delegator, reward);
                credited += reward;
            }
        }
        delegators_part - credited
    }

    /// Push `amount` to `to`; on refusal the amount becomes claimable
    fn push<P: Payout + ?Sized>(&mut self, to: &Address, amount: Amount, payout: &mut P) -> bool {
        match payout.transfer(to, amount) {
            Ok(()) => {
                self.balance -= amount;
                self.total_paid_out += amount;
                true
            }
            Err(e) => {
                warn!(%to, amount, error = %e, "push payment refused, credited as claimable");
                self.credit_claimable(to, amount);
                false
            }
        }
    }

    fn credit_claimable(&mut self, to: &Address, amount: Amount) {
        *self.claimable.entry(*to).or_insert(0) += amount;
        self.native_reward_undistributed += amount;
    }

    /// Pay out everything `address` can claim
    pub fn claim<P: Payout + ?Sized>(&mut self, address: &Address, payout: &mut P) -> Result<Amount, ClaimError> {
        let amount = self.claimable.remove(address).unwrap_or(0);
        if amount == 0 {
            return Err(ClaimError::NothingToClaim(*address));
        }

        if let Err(e) = payout.transfer(address, amount) {
            self.claimable.insert(*address, amount);
            warn!(%address, amount, "claim payout refused");
            return Err(e.into());
        }

        self.native_reward_undistributed -= amount;
        self.balance -= amount;
        self.total_paid_out += amount;
        info!(%address, amount, "reward claimed");
        self.check_conservation();
        Ok(amount)
    }

    pub fn is_conserved(&self) -> bool {
        let claimable: Amount = self.claimable.values().sum();
        claimable == self.native_reward_undistributed
            && Some(self.balance)
                == self
                    .delta_pot
                    .checked_add(self.reinsert_pot)
                    .and_then(|sum| sum.checked_add(self.native_reward_undistributed))
    }

    fn check_conservation(&self) {
        debug_assert!(self.is_conserved(), "pot conservation violated");
    }

    pub fn delta_pot(&self) -> Amount {
        self.delta_pot
    }

    pub fn reinsert_pot(&self) -> Amount {
        self.reinsert_pot
    }

    pub fn native_reward_undistributed(&self) -> Amount {
        self.native_reward_undistributed
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_paid_out(&self) -> Amount {
        self.total_paid_out
    }

    pub fn snapshot(&self, epoch: Epoch, mining: &Address) -> Option<&StakeSnapshot> {
        self.snapshots.get(&(epoch, *mining))
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    pub fn validator_reward(&self, epoch: Epoch, mining: &Address) -> Amount {
        self.validator_rewards
            .get(&(epoch, *mining))
            .copied()
            .unwrap_or(0)
    }

    pub fn delegator_reward(&self, epoch: Epoch, mining: &Address, delegator: &Address) -> Amount {
        self.delegator_rewards
            .get(&(epoch, *mining, *delegator))
            .copied()
            .unwrap_or(0)
    }

    pub fn claimable(&self, address: &Address) -> Amount {
        self.claimable.get(address).copied().unwrap_or(0)
    }

    pub fn epoch_record(&self, epoch: Epoch) -> Option<&EpochRewardRecord> {
        self.epoch_records.get(&epoch)
    }

    /// Feed every balance and record, in key order, into `hasher`
    pub(crate) fn hash_into(&self, hasher: &mut Sha256) {
        for value in [
            self.delta_pot,
            self.reinsert_pot,
            self.native_reward_undistributed,
            self.balance,
            self.total_paid_out,
        ] {
            hasher.update(value.to_be_bytes());
        }
        for ((epoch, mining), s) in &self.snapshots {
            hasher.update(epoch.to_be_bytes());
            hasher.update(mining.as_bytes());
            hasher.update(s.validator_stake.to_be_bytes());
            hasher.update(s.total_stake.to_be_bytes());
            for (delegator, stake) in &s.delegators {
                hasher.update(delegator.as_bytes());
                hasher.update(stake.to_be_bytes());
            }
        }
        for ((epoch, mining), reward) in &self.validator_rewards {
            hasher.update(epoch.to_be_bytes());
            hasher.update(mining.as_bytes());
            hasher.update(reward.to_be_bytes());
        }
        for ((epoch, mining, delegator), reward) in &self.delegator_rewards {
            hasher.update(epoch.to_be_bytes());
            hasher.update(mining.as_bytes());
            hasher.update(delegator.as_bytes());
            hasher.update(reward.to_be_bytes());
        }
        for (address, amount) in &self.claimable {
            hasher.update(address.as_bytes());
            hasher.update(amount.to_be_bytes());
        }
    }
}
