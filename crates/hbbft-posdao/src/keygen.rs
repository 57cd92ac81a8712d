//! Key generation ceremony tracking
//!
//! The engine never inspects key material. It starts a ceremony for the
//! elected participants when the transition window opens and polls for
//! completion on every block until the epoch ends.

use crate::types::{Address, Epoch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Source of "DKG finished for epoch E" signals
pub trait KeyGenCoordinator {
    /// Begin (or restart) the ceremony for `epoch` among `participants`
    fn start_ceremony(&mut self, epoch: Epoch, participants: &[Address]);

    /// Whether the ceremony for `epoch` has produced keys
    fn is_complete(&self, epoch: Epoch) -> bool;

    /// Forget ceremonies for epochs before `epoch`
    fn prune_before(&mut self, _epoch: Epoch) {}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyGenError {
    #[error("No ceremony running for epoch {0}")]
    UnknownEpoch(Epoch),

    #[error("{address} is not a participant in the epoch {epoch} ceremony")]
    NotParticipant { epoch: Epoch, address: Address },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Ceremony {
    participants: BTreeSet<Address>,
    parts: BTreeMap<Address, Vec<u8>>,
    acks: BTreeMap<Address, Vec<Vec<u8>>>,
}

impl Ceremony {
    fn is_complete(&self) -> bool {
        !self.participants.is_empty()
            && self.participants.len() == self.parts.len()
            && self.participants.len() == self.acks.len()
    }
}

/// In-memory record of submitted parts and acks per epoch
///
/// Payloads are stored opaquely; a ceremony is complete once every
/// participant has written both its part and its acks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyGenHistory {
    ceremonies: BTreeMap<Epoch, Ceremony>,
}

impl KeyGenHistory {
    pub fn new() -> Self {
        Self::default()
    }

    fn participant_ceremony(
        &mut self,
        epoch: Epoch,
        address: &Address,
    ) -> Result<&mut Ceremony, KeyGenError> {
        let ceremony = self
            .ceremonies
            .get_mut(&epoch)
            .ok_or(KeyGenError::UnknownEpoch(epoch))?;
        if !ceremony.participants.contains(address) {
            return Err(KeyGenError::NotParticipant {
                epoch,
                address: *address,
            });
        }
        Ok(ceremony)
    }

    /// Record `address`'s part for `epoch`; a later write replaces an earlier one
    pub fn write_part(&mut self, epoch: Epoch, address: Address, part: Vec<u8>) -> Result<(), KeyGenError> {
        let ceremony = self.participant_ceremony(epoch, &address)?;
        ceremony.parts.insert(address, part);
        debug!(epoch, %address, "keygen part written");
        Ok(())
    }

    /// Record `address`'s acks for `epoch`
    pub fn write_acks(
        &mut self,
        epoch: Epoch,
        address: Address,
        acks: Vec<Vec<u8>>,
    ) -> Result<(), KeyGenError> {
        let ceremony = self.participant_ceremony(epoch, &address)?;
        ceremony.acks.insert(address, acks);
        debug!(epoch, %address, "keygen acks written");
        Ok(())
    }

    pub fn participants(&self, epoch: Epoch) -> Vec<Address> {
        self.ceremonies
            .get(&epoch)
            .map(|c| c.participants.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Participants that have not yet written both part and acks
    pub fn missing(&self, epoch: Epoch) -> Vec<Address> {
        self.ceremonies
            .get(&epoch)
            .map(|c| {
                c.participants
                    .iter()
                    .filter(|p| !c.parts.contains_key(p) || !c.acks.contains_key(p))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn ceremony_count(&self) -> usize {
        self.ceremonies.len()
    }
}

impl KeyGenCoordinator for KeyGenHistory {
    fn start_ceremony(&mut self, epoch: Epoch, participants: &[Address]) {
        let ceremony = Ceremony {
            participants: participants.iter().copied().collect(),
            ..Ceremony::default()
        };
        info!(epoch, participants = participants.len(), "keygen ceremony started");
        self.ceremonies.insert(epoch, ceremony);
    }

    fn is_complete(&self, epoch: Epoch) -> bool {
        self.ceremonies
            .get(&epoch)
            .map_or(false, Ceremony::is_complete)
    }

    fn prune_before(&mut self, epoch: Epoch) {
        let kept = self.ceremonies.split_off(&epoch);
        let dropped = std::mem::replace(&mut self.ceremonies, kept).len();
        if dropped > 0 {
            debug!(before = epoch, dropped, "keygen ceremonies pruned");
        }
    }
}
