//! Epoch clock
//!
//! Pure time arithmetic over the stored epoch start and the configured
//! durations. Boundaries are inclusive-start, exclusive-end: a timestamp equal
//! to a boundary belongs to the later phase.
//!
//! ```text
//!  epoch start          transition start          fixed end
//!      │   RegularBlockCreation   │      Transition      │ EpochEndBoundary ...
//!      ├──────────────────────────┼──────────────────────┼──────────────────
//!                                  ◄── window length ───►
//!                                                 ◄disallow►
//! ```

use crate::config::StakingConfig;
use crate::types::{Epoch, Timestamp};
use serde::{Deserialize, Serialize};

/// Phase of the current epoch at a given timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Normal block production, no election activity
    RegularBlockCreation,
    /// Next committee elected, key generation running
    Transition,
    /// Fixed end reached; the next end-of-epoch block rolls the epoch over
    EpochEndBoundary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    epoch: Epoch,
    epoch_start_time: Timestamp,
    fixed_epoch_duration: Timestamp,
    transition_window_length: Timestamp,
    withdraw_disallow_period: Timestamp,
}

impl EpochClock {
    /// Clock for epoch 0 starting at `genesis_time`
    pub fn new(config: &StakingConfig, genesis_time: Timestamp) -> Self {
        Self {
            epoch: 0,
            epoch_start_time: genesis_time,
            fixed_epoch_duration: config.fixed_epoch_duration,
            transition_window_length: config.transition_window_length,
            withdraw_disallow_period: config.withdraw_disallow_period,
        }
    }

    pub fn current_epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn epoch_start_time(&self) -> Timestamp {
        self.epoch_start_time
    }

    /// Scheduled end of the current epoch
    pub fn fixed_epoch_end_time(&self) -> Timestamp {
        self.epoch_start_time.saturating_add(self.fixed_epoch_duration)
    }

    /// When the transition window of the current epoch opens
    pub fn start_time_of_next_transition(&self) -> Timestamp {
        self.fixed_epoch_end_time()
            .saturating_sub(self.transition_window_length)
    }

    pub fn current_phase(&self, now: Timestamp) -> Phase {
        if now >= self.fixed_epoch_end_time() {
            Phase::EpochEndBoundary
        } else if now >= self.start_time_of_next_transition() {
            Phase::Transition
        } else {
            Phase::RegularBlockCreation
        }
    }

    /// Seconds until the transition window opens (0 once it has)
    pub fn time_to_transition(&self, now: Timestamp) -> Timestamp {
        self.start_time_of_next_transition().saturating_sub(now)
    }

    /// Seconds until the fixed epoch end (0 once reached)
    pub fn time_to_epoch_end(&self, now: Timestamp) -> Timestamp {
        self.fixed_epoch_end_time().saturating_sub(now)
    }

    /// Withdrawals are refused from `end - disallow_period` until the epoch rolls over
    pub fn is_withdraw_disallowed(&self, now: Timestamp) -> bool {
        now >= self
            .fixed_epoch_end_time()
            .saturating_sub(self.withdraw_disallow_period)
    }

    /// Roll over to the next epoch, which starts at `now`
    ///
    /// `now` is the timestamp of the block that ended the epoch; it is never
    /// earlier than the scheduled end.
    pub(crate) fn advance(&mut self, now: Timestamp) -> Epoch {
        debug_assert!(now >= self.fixed_epoch_end_time());
        self.epoch += 1;
        self.epoch_start_time = now.max(self.fixed_epoch_end_time());
        self.epoch
    }
}
