//! Scenario files
//!
//! A scenario is the engine configuration, the genesis committee and a list of
//! actions applied at the start of given epochs. Amounts are base units.

use anyhow::{Context, Result};
use hbbft_posdao::{Address, Amount, EngineConfig, Epoch, Genesis, GenesisValidator, COIN};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    FundDelta { amount: Amount },
    FundReinsert { amount: Amount },
    Transfer { from: Address, amount: Amount },
    Stake { staker: Address, pool: Address, amount: Amount },
    StakeNewPool { staking: Address, mining: Address, amount: Amount },
    Withdraw { staker: Address, pool: Address, amount: Amount },
    Claim { address: Address },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Applied right after this epoch starts
    pub epoch: Epoch,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: EngineConfig,
    pub genesis: Genesis,
    #[serde(default)]
    pub actions: Vec<ScheduledAction>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing scenario {}", path.display()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing scenario")
    }

    /// Three validators with one coin self-stake and three one-coin
    /// delegators each; the delta pot gets 60 coins once the first rotation
    /// has snapshotted the delegations, and a fourth candidate joins in epoch 2.
    pub fn reference() -> Self {
        let staking = |v: u64| Address::from_index(v);
        let mining = |v: u64| Address::from_index(100 + v);
        let delegator = |v: u64, d: u64| Address::from_index(1_000 + v * 10 + d);

        let genesis = Genesis {
            start_time: 0,
            validators: (1..=3)
                .map(|v| GenesisValidator {
                    staking_address: staking(v),
                    mining_address: mining(v),
                    self_stake: COIN,
                })
                .collect(),
        };

        let mut actions = Vec::new();
        for v in 1..=3 {
            for d in 1..=3 {
                actions.push(ScheduledAction {
                    epoch: 0,
                    action: Action::Stake {
                        staker: delegator(v, d),
                        pool: staking(v),
                        amount: COIN,
                    },
                });
            }
        }
        actions.push(ScheduledAction {
            epoch: 1,
            action: Action::FundDelta { amount: 60 * COIN },
        });
        actions.push(ScheduledAction {
            epoch: 2,
            action: Action::StakeNewPool {
                staking: staking(4),
                mining: mining(4),
                amount: 2 * COIN,
            },
        });
        actions.push(ScheduledAction {
            epoch: 3,
            action: Action::Claim {
                address: delegator(1, 1),
            },
        });

        Self {
            config: EngineConfig::default(),
            genesis,
            actions,
        }
    }
}
