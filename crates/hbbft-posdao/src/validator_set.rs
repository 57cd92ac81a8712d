//! Validator set rotation
//!
//! Two-phase commit of the next committee:
//!
//! ```text
//!   Idle ──begin_election──► ElectionPending ──keygen done──► Finalizing
//!    ▲                             │                              │
//!    └──────── finalize ───────────┴──────────── finalize ────────┘
//!         (retain current)                    (current := pending)
//! ```
//!
//! `finalize` runs once per epoch. A second call for the same epoch (or an
//! older one) returns `AlreadyFinalized` and touches nothing.

use crate::config::{ElectionPolicy, ShortfallRule};
use crate::election::{select_committee, Candidate};
use crate::types::{Address, Epoch};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Where the rotation of the current epoch stands
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationState {
    /// No pending committee
    #[default]
    Idle,
    /// Pending committee published, key generation running
    ElectionPending { epoch: Epoch, pending: Vec<Address> },
    /// Key generation done; the pending committee takes over at epoch end
    Finalizing { epoch: Epoch, pending: Vec<Address> },
}

impl RotationState {
    pub fn pending(&self) -> &[Address] {
        match self {
            RotationState::Idle => &[],
            RotationState::ElectionPending { pending, .. }
            | RotationState::Finalizing { pending, .. } => pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetainReason {
    /// No pending set was published this epoch
    NoElection,
    /// Key generation did not finish before the epoch ended
    KeyGenIncomplete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationOutcome {
    Rotated { previous: Vec<Address> },
    Retained { reason: RetainReason },
    AlreadyFinalized,
}

/// Owner of the current and pending committees
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetManager {
    policy: ElectionPolicy,
    current: Vec<Address>,
    state: RotationState,

    /// Epoch in which an election last ran
    last_election: Option<Epoch>,

    /// Epoch whose rotation was last finalized
    last_finalized: Option<Epoch>,
}

impl ValidatorSetManager {
    pub fn new(policy: ElectionPolicy, genesis_validators: Vec<Address>) -> Self {
        Self {
            policy,
            current: genesis_validators,
            state: RotationState::Idle,
            last_election: None,
            last_finalized: None,
        }
    }

    /// Elect the next committee from `candidates` (eligible pools in insertion order)
    ///
    /// Acts only from `Idle` and at most once per epoch. Returns the pending
    /// set when one was published; the caller starts key generation for it.
    pub fn begin_election(&mut self, epoch: Epoch, candidates: &[Candidate]) -> Option<Vec<Address>> {
        if self.state != RotationState::Idle || self.has_elected(epoch) {
            return None;
        }
        self.last_election = Some(epoch);

        let pending = match select_committee(candidates, &self.policy) {
            Some(committee) => committee,
            None => match self.policy.shortfall {
                ShortfallRule::RetainCurrent => {
                    warn!(
                        epoch,
                        eligible = candidates.len(),
                        min = self.policy.min_committee_size,
                        "too few eligible pools, current committee retained"
                    );
                    return None;
                }
                ShortfallRule::RepublishCurrent if !self.current.is_empty() => {
                    warn!(
                        epoch,
                        eligible = candidates.len(),
                        "too few eligible pools, current committee republished"
                    );
                    self.current.clone()
                }
                ShortfallRule::RepublishCurrent => return None,
            },
        };

        info!(epoch, size = pending.len(), "pending validator set published");
        self.state = RotationState::ElectionPending {
            epoch,
            pending: pending.clone(),
        };
        Some(pending)
    }

    /// Key generation for the pending set finished
    ///
    /// Returns whether the state moved to `Finalizing`.
    pub fn mark_key_gen_complete(&mut self, epoch: Epoch) -> bool {
        match std::mem::take(&mut self.state) {
            RotationState::ElectionPending { epoch: e, pending } if e == epoch => {
                info!(epoch, "key generation complete, rotation ready");
                self.state = RotationState::Finalizing { epoch, pending };
                true
            }
            other => {
                self.state = other;
                false
            }
        }
    }

    /// Close the rotation for `epoch`
    pub fn finalize(&mut self, epoch: Epoch) -> RotationOutcome {
        if self.last_finalized.map_or(false, |done| done >= epoch) {
            return RotationOutcome::AlreadyFinalized;
        }
        self.last_finalized = Some(epoch);

        match std::mem::take(&mut self.state) {
            RotationState::Finalizing { epoch: e, pending } if e == epoch => {
                let previous = std::mem::replace(&mut self.current, pending);
                info!(epoch, size = self.current.len(), "validator set rotated");
                RotationOutcome::Rotated { previous }
            }
            RotationState::Idle => {
                info!(epoch, "no election this epoch, validator set retained");
                RotationOutcome::Retained {
                    reason: RetainReason::NoElection,
                }
            }
            _ => {
                warn!(epoch, "key generation incomplete, validator set retained");
                RotationOutcome::Retained {
                    reason: RetainReason::KeyGenIncomplete,
                }
            }
        }
    }

    pub fn has_elected(&self, epoch: Epoch) -> bool {
        self.last_election == Some(epoch)
    }

    pub fn current_validators(&self) -> &[Address] {
        &self.current
    }

    pub fn pending_validators(&self) -> &[Address] {
        self.state.pending()
    }

    pub fn is_validator(&self, mining: &Address) -> bool {
        self.current.contains(mining)
    }

    pub fn is_pending_validator(&self, mining: &Address) -> bool {
        self.state.pending().contains(mining)
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }
}
