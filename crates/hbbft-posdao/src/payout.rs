//! Outgoing native transfers
//!
//! Push payments can fail (a treasury contract may refuse funds), so the
//! ledger only ever talks to payees through [`Payout`] and branches on the
//! result.

use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("Payee {0} rejected the transfer")]
    Rejected(Address),
}

/// Capability to move native value out of the ledger
pub trait Payout {
    fn transfer(&mut self, to: &Address, amount: Amount) -> Result<(), PayoutError>;
}

/// Account balances kept in memory
///
/// Addresses marked with [`InMemoryBank::reject`] refuse every transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryBank {
    balances: BTreeMap<Address, Amount>,
    rejecting: BTreeSet<Address>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, address: Address) {
        self.rejecting.insert(address);
    }

    pub fn accept(&mut self, address: &Address) {
        self.rejecting.remove(address);
    }

    pub fn balance(&self, address: &Address) -> Amount {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// Sum of all balances received
    pub fn total(&self) -> Amount {
        self.balances.values().sum()
    }
}

impl Payout for InMemoryBank {
    fn transfer(&mut self, to: &Address, amount: Amount) -> Result<(), PayoutError> {
        if self.rejecting.contains(to) {
            return Err(PayoutError::Rejected(*to));
        }
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!(%to, amount, "transfer credited");
        Ok(())
    }
}
