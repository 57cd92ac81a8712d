//! Committee selection
//!
//! Deterministic: the same candidates in the same order always produce the
//! same committee.

use crate::config::{ElectionPolicy, SelectionRule};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Eligible pool offered to the election
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub staking_address: Address,
    pub mining_address: Address,
    pub total_stake: Amount,
}

/// Pick up to `committee_size` mining addresses from `candidates`
///
/// `candidates` must be in the order the pools became eligible. Returns
/// `None` when fewer than `min_committee_size` candidates are available.
pub fn select_committee(candidates: &[Candidate], policy: &ElectionPolicy) -> Option<Vec<Address>> {
    if candidates.is_empty() || candidates.len() < policy.min_committee_size {
        return None;
    }

    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    if policy.rule == SelectionRule::TopStake {
        // stable sort keeps insertion order among equal stakes
        ordered.sort_by(|a, b| b.total_stake.cmp(&a.total_stake));
    }

    Some(
        ordered
            .into_iter()
            .take(policy.committee_size)
            .map(|c| c.mining_address)
            .collect(),
    )
}
