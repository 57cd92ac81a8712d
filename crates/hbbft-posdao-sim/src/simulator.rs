//! Single-process block production
//!
//! Produces blocks at a fixed interval and calls the engine's reward entry
//! point from the system address. Pending validators complete key generation
//! immediately unless the epoch is listed as failing.

use crate::scenario::{Action, Scenario, ScheduledAction};
use anyhow::{bail, Result};
use hbbft_posdao::{
    Address, Amount, BlockContext, BlockNumber, BlockOutcome, Epoch, EpochTransition,
    InMemoryBank, KeyGenHistory, PosdaoEngine, Timestamp,
};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// State after one simulated epoch
#[derive(Debug, Clone, Serialize)]
pub struct EpochSummary {
    pub transition: EpochTransition,
    pub blocks: u64,
    pub validators: Vec<Address>,
    pub delta_pot: Amount,
    pub reinsert_pot: Amount,
    pub undistributed: Amount,
    pub paid_out: Amount,
    pub digest: String,
}

pub struct Simulator {
    engine: PosdaoEngine<KeyGenHistory, InMemoryBank>,
    system: Address,
    height: BlockNumber,
    now: Timestamp,
    block_time: Timestamp,
    fail_keygen: BTreeSet<Epoch>,
    actions: Vec<ScheduledAction>,
}

impl Simulator {
    pub fn new(scenario: Scenario, block_time: Timestamp, fail_keygen: BTreeSet<Epoch>) -> Result<Self> {
        if block_time == 0 {
            bail!("block time must be non-zero");
        }
        let system = scenario.config.system_address;
        let now = scenario.genesis.start_time;
        let engine = PosdaoEngine::new(
            scenario.config,
            scenario.genesis,
            KeyGenHistory::new(),
            InMemoryBank::new(),
        )?;

        Ok(Self {
            engine,
            system,
            height: 0,
            now,
            block_time,
            fail_keygen,
            actions: scenario.actions,
        })
    }

    pub fn engine(&self) -> &PosdaoEngine<KeyGenHistory, InMemoryBank> {
        &self.engine
    }

    /// Apply the current epoch's actions, then produce blocks until it ends
    pub fn run_epoch(&mut self) -> Result<EpochSummary> {
        let epoch = self.engine.current_epoch();
        self.apply_actions(epoch);

        let first_block = self.height;
        loop {
            self.height += 1;
            self.now += self.block_time;
            let end = self.engine.clock().fixed_epoch_end_time();

            let block = BlockContext {
                number: self.height,
                timestamp: self.now,
                is_epoch_end_block: self.now >= end,
            };
            match self.engine.reward(&self.system, block)? {
                BlockOutcome::EpochEnded(transition) => {
                    return Ok(self.summary(transition, self.height - first_block));
                }
                BlockOutcome::Regular {
                    election_started: true,
                    ..
                } => self.submit_keygen(epoch),
                BlockOutcome::Regular { .. } | BlockOutcome::AlreadyProcessed => {}
            }
        }
    }

    fn apply_actions(&mut self, epoch: Epoch) {
        let due: Vec<Action> = self
            .actions
            .iter()
            .filter(|a| a.epoch == epoch)
            .map(|a| a.action.clone())
            .collect();

        for action in due {
            let result = match &action {
                Action::FundDelta { amount } => self.engine.add_to_delta_pot(*amount),
                Action::FundReinsert { amount } => self.engine.add_to_reinsert_pot(*amount),
                Action::Transfer { from, amount } => self.engine.receive_transfer(from, *amount),
                Action::Stake { staker, pool, amount } => self.engine.stake(*staker, *pool, *amount),
                Action::StakeNewPool {
                    staking,
                    mining,
                    amount,
                } => self.engine.stake_new_pool(*staking, *mining, *amount),
                Action::Withdraw { staker, pool, amount } => {
                    self.engine.withdraw(*staker, *pool, *amount, self.now)
                }
                Action::Claim { address } => self.engine.claim_reward(address).map(|_| ()),
            };

            match result {
                Ok(()) => debug!(epoch, ?action, "action applied"),
                Err(e) => warn!(epoch, ?action, error = %e, "action rejected"),
            }
        }
    }

    /// Every pending validator writes its part and acks
    fn submit_keygen(&mut self, epoch: Epoch) {
        if self.fail_keygen.contains(&epoch) {
            info!(epoch, "withholding key generation");
            return;
        }

        let target = epoch + 1;
        let pending = self.engine.pending_validators().to_vec();
        for mining in pending {
            let keygen = self.engine.keygen_mut();
            let written = keygen
                .write_part(target, mining, mining.as_bytes().to_vec())
                .and_then(|()| keygen.write_acks(target, mining, vec![mining.as_bytes().to_vec()]));
            if let Err(e) = written {
                warn!(epoch, %mining, error = %e, "key generation write failed");
            }
        }
    }

    fn summary(&self, transition: EpochTransition, blocks: u64) -> EpochSummary {
        let ledger = self.engine.ledger();
        EpochSummary {
            transition,
            blocks,
            validators: self.engine.current_validators().to_vec(),
            delta_pot: ledger.delta_pot(),
            reinsert_pot: ledger.reinsert_pot(),
            undistributed: ledger.native_reward_undistributed(),
            paid_out: ledger.total_paid_out(),
            digest: hex::encode(self.engine.state_digest()),
        }
    }
}
