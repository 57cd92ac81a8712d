//! Engine configuration
//!
//! One immutable structure handed to the engine at construction. Nothing in
//! the crate reads ambient constants, so independent engines with different
//! settings can coexist (tests rely on this).

use crate::types::{Address, Amount, Timestamp, COIN};
use serde::{Deserialize, Serialize};

/// Staking bounds and epoch timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    /// Minimum balance a delegator must hold in a pool
    pub delegator_min_stake: Amount,

    /// Minimum self-stake for a pool to be eligible for election
    pub candidate_min_stake: Amount,

    /// Maximum total stake (self + delegated) a single pool may hold
    pub max_stake: Amount,

    /// Epoch length in seconds
    pub fixed_epoch_duration: Timestamp,

    /// Length of the transition window at the tail of each epoch
    pub transition_window_length: Timestamp,

    /// Seconds before the fixed epoch end during which withdrawals are refused
    pub withdraw_disallow_period: Timestamp,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            delegator_min_stake: COIN,
            candidate_min_stake: COIN,
            max_stake: 100_000 * COIN,
            fixed_epoch_duration: 86_400, // 1 day
            transition_window_length: 3_600, // 1 hour
            withdraw_disallow_period: 2,
        }
    }
}

/// Pot amortization and reward split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    /// Delta pot is paid out over this many epochs
    pub delta_pot_payout_divisor: Amount,

    /// Reinsert pot is paid out over this many epochs
    pub reinsert_pot_payout_divisor: Amount,

    /// Governance share numerator (of the total epoch reward)
    pub governance_share_numerator: Amount,

    /// Governance share denominator
    pub governance_share_denominator: Amount,

    /// Lower bound of a validator's cut of its own per-validator share, in percent
    pub validator_min_reward_percent: Amount,

    /// Treasury receiving the governance share
    pub governance_address: Address,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            delta_pot_payout_divisor: 6_000,
            reinsert_pot_payout_divisor: 6_000,
            governance_share_numerator: 1,
            governance_share_denominator: 10,
            validator_min_reward_percent: 30,
            governance_address: "0xDA0da0da0Da0Da0Da0DA00DA0da0da0DA0DA0dA0"
                .parse()
                .unwrap_or(Address::repeat_byte(0xda)),
        }
    }
}

/// How the next committee is picked from the eligible pools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionRule {
    /// First `committee_size` pools in the order they became eligible
    InsertionOrder,
    /// Largest pools by total stake; ties keep insertion order
    TopStake,
}

/// What to do when too few pools are eligible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortfallRule {
    /// Publish no pending set; the current committee carries over
    RetainCurrent,
    /// Publish the current committee as the pending set and re-key it
    RepublishCurrent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionPolicy {
    /// Maximum committee size
    pub committee_size: usize,

    /// Fewer eligible pools than this triggers the shortfall rule
    pub min_committee_size: usize,

    pub rule: SelectionRule,

    pub shortfall: ShortfallRule,
}

impl Default for ElectionPolicy {
    fn default() -> Self {
        Self {
            committee_size: 25,
            min_committee_size: 1,
            rule: SelectionRule::InsertionOrder,
            shortfall: ShortfallRule::RetainCurrent,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub staking: StakingConfig,
    pub rewards: RewardConfig,
    pub election: ElectionPolicy,

    /// Only caller allowed to invoke the per-block reward entry point
    pub system_address: Address,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            staking: StakingConfig::default(),
            rewards: RewardConfig::default(),
            election: ElectionPolicy::default(),
            system_address: Address::repeat_byte(0xff),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Epoch duration must be non-zero")]
    ZeroEpochDuration,

    #[error("Transition window {window}s must be shorter than the epoch ({epoch}s)")]
    TransitionWindowTooLong { window: Timestamp, epoch: Timestamp },

    #[error("Withdraw disallow period {period}s must be shorter than the epoch ({epoch}s)")]
    DisallowPeriodTooLong { period: Timestamp, epoch: Timestamp },

    #[error("Minimum stake {min} exceeds maximum stake {max}")]
    MinAboveMax { min: Amount, max: Amount },

    #[error("Pot payout divisor must be non-zero")]
    ZeroDivisor,

    #[error("Governance share {numerator}/{denominator} is not a fraction in [0, 1]")]
    InvalidGovernanceShare { numerator: Amount, denominator: Amount },

    #[error("Validator minimum reward {0}% exceeds 100%")]
    PercentOutOfRange(Amount),

    #[error("Committee size must be non-zero")]
    ZeroCommitteeSize,

    #[error("Minimum committee size {min} exceeds committee size {size}")]
    MinCommitteeAboveSize { min: usize, size: usize },
}

impl EngineConfig {
    /// Reject settings that would make the epoch or reward math meaningless
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.staking;
        if s.fixed_epoch_duration == 0 {
            return Err(ConfigError::ZeroEpochDuration);
        }
        if s.transition_window_length >= s.fixed_epoch_duration {
            return Err(ConfigError::TransitionWindowTooLong {
                window: s.transition_window_length,
                epoch: s.fixed_epoch_duration,
            });
        }
        if s.withdraw_disallow_period >= s.fixed_epoch_duration {
            return Err(ConfigError::DisallowPeriodTooLong {
                period: s.withdraw_disallow_period,
                epoch: s.fixed_epoch_duration,
            });
        }
        let min = s.candidate_min_stake.max(s.delegator_min_stake);
        if min > s.max_stake {
            return Err(ConfigError::MinAboveMax { min, max: s.max_stake });
        }

        let r = &self.rewards;
        if r.delta_pot_payout_divisor == 0 || r.reinsert_pot_payout_divisor == 0 {
            return Err(ConfigError::ZeroDivisor);
        }
        if r.governance_share_denominator == 0
            || r.governance_share_numerator > r.governance_share_denominator
        {
            return Err(ConfigError::InvalidGovernanceShare {
                numerator: r.governance_share_numerator,
                denominator: r.governance_share_denominator,
            });
        }
        if r.validator_min_reward_percent > 100 {
            return Err(ConfigError::PercentOutOfRange(r.validator_min_reward_percent));
        }

        let e = &self.election;
        if e.committee_size == 0 {
            return Err(ConfigError::ZeroCommitteeSize);
        }
        if e.min_committee_size > e.committee_size {
            return Err(ConfigError::MinCommitteeAboveSize {
                min: e.min_committee_size,
                size: e.committee_size,
            });
        }

        Ok(())
    }
}
