//! Per-block entry point
//!
//! The consensus engine calls [`PosdaoEngine::reward`] once per block from the
//! system address. Everything else (elections, key generation polling,
//! reward distribution, epoch rollover) happens inside that call:
//!
//! ```text
//! reward(block)
//!   ├─ phase >= Transition, not yet elected ─► elect, start keygen
//!   ├─ ElectionPending, keygen done ─────────► Finalizing
//!   └─ end-of-epoch block at EpochEndBoundary
//!        ├─ distribute rewards for the ending epoch
//!        ├─ finalize rotation (or retain current)
//!        ├─ advance clock
//!        ├─ snapshot the committee for the new epoch
//!        └─ prune emptied pools and old keygen ceremonies
//! ```

use crate::clock::{EpochClock, Phase};
use crate::config::{ConfigError, EngineConfig};
use crate::keygen::KeyGenCoordinator;
use crate::ledger::{
    ClaimError, CommitteeMember, EpochRewardRecord, FundingError, RewardPotLedger, StakeSnapshot,
};
use crate::payout::Payout;
use crate::registry::{StakePoolRegistry, StakingError};
use crate::types::{Address, Amount, BlockNumber, Epoch, Hash, Timestamp};
use crate::validator_set::{RotationOutcome, RotationState, ValidatorSetManager};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Caller {0} is not the system address")]
    Unauthorized(Address),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Staking error: {0}")]
    Staking(#[from] StakingError),

    #[error("Claim error: {0}")]
    Claim(#[from] ClaimError),

    #[error("Funding error: {0}")]
    Funding(#[from] FundingError),
}

/// Validator present at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisValidator {
    pub staking_address: Address,
    pub mining_address: Address,
    #[serde(default)]
    pub self_stake: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genesis {
    pub start_time: Timestamp,
    pub validators: Vec<GenesisValidator>,
}

/// What the consensus engine reports about the block being produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub number: BlockNumber,
    pub timestamp: Timestamp,
    pub is_epoch_end_block: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochTransition {
    pub ended_epoch: Epoch,
    pub new_epoch: Epoch,
    pub rotation: RotationOutcome,
    pub rewards: EpochRewardRecord,
    pub snapshots_written: usize,
    pub pruned: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockOutcome {
    /// Block number already seen; nothing changed
    AlreadyProcessed,
    Regular {
        phase: Phase,
        election_started: bool,
        key_gen_completed: bool,
    },
    EpochEnded(EpochTransition),
}

/// Epoch lifecycle and reward accounting for one chain
pub struct PosdaoEngine<K, P> {
    config: EngineConfig,
    clock: EpochClock,
    registry: StakePoolRegistry,
    validators: ValidatorSetManager,
    ledger: RewardPotLedger,
    keygen: K,
    payout: P,
    last_block: Option<BlockNumber>,
}

impl<K: KeyGenCoordinator, P: Payout> PosdaoEngine<K, P> {
    /// Build the engine at epoch 0 with the genesis committee in place
    pub fn new(config: EngineConfig, genesis: Genesis, keygen: K, payout: P) -> Result<Self, EngineError> {
        config.validate()?;

        let mut registry = StakePoolRegistry::new(config.staking.clone());
        for v in &genesis.validators {
            registry.register_pool(v.staking_address, v.mining_address)?;
            if v.self_stake > 0 {
                registry.stake(v.staking_address, v.staking_address, v.self_stake)?;
            }
        }

        let committee = genesis.validators.iter().map(|v| v.mining_address).collect();
        let mut engine = Self {
            clock: EpochClock::new(&config.staking, genesis.start_time),
            validators: ValidatorSetManager::new(config.election.clone(), committee),
            ledger: RewardPotLedger::new(config.rewards.clone()),
            registry,
            config,
            keygen,
            payout,
            last_block: None,
        };
        let written = engine.snapshot_committee(0);
        info!(
            validators = written,
            start_time = genesis.start_time,
            "engine initialized at genesis"
        );
        Ok(engine)
    }

    /// Per-block entry point, restricted to the system address
    pub fn reward(&mut self, caller: &Address, block: BlockContext) -> Result<BlockOutcome, EngineError> {
        if *caller != self.config.system_address {
            return Err(EngineError::Unauthorized(*caller));
        }
        if self.last_block.map_or(false, |last| block.number <= last) {
            debug!(block = block.number, "block already processed");
            return Ok(BlockOutcome::AlreadyProcessed);
        }
        self.last_block = Some(block.number);

        let epoch = self.clock.current_epoch();
        let phase = self.clock.current_phase(block.timestamp);

        let mut election_started = false;
        if phase >= Phase::Transition && !self.validators.has_elected(epoch) {
            let candidates = self.registry.candidates();
            if let Some(pending) = self.validators.begin_election(epoch, &candidates) {
                self.keygen.start_ceremony(epoch + 1, &pending);
                election_started = true;
            }
        }

        let mut key_gen_completed = false;
        if matches!(self.validators.state(), RotationState::ElectionPending { .. })
            && self.keygen.is_complete(epoch + 1)
        {
            key_gen_completed = self.validators.mark_key_gen_complete(epoch);
        }

        if block.is_epoch_end_block {
            if phase == Phase::EpochEndBoundary {
                let transition = self.end_epoch(block.timestamp);
                return Ok(BlockOutcome::EpochEnded(transition));
            }
            warn!(
                block = block.number,
                timestamp = block.timestamp,
                epoch_end = self.clock.fixed_epoch_end_time(),
                "end-of-epoch flag before the fixed epoch end, treated as a regular block"
            );
        }

        Ok(BlockOutcome::Regular {
            phase,
            election_started,
            key_gen_completed,
        })
    }

    fn end_epoch(&mut self, now: Timestamp) -> EpochTransition {
        let ended_epoch = self.clock.current_epoch();

        let committee: Vec<CommitteeMember> = self
            .validators
            .current_validators()
            .iter()
            .map(|mining| CommitteeMember {
                mining_address: *mining,
                staking_address: self.registry.staking_by_mining(mining).unwrap_or(*mining),
            })
            .collect();
        let rewards = self
            .ledger
            .distribute(ended_epoch, &committee, &mut self.payout)
            .unwrap_or_default();

        let rotation = self.validators.finalize(ended_epoch);
        let new_epoch = self.clock.advance(now);
        let snapshots_written = self.snapshot_committee(new_epoch);
        let pruned = self.prune_empty_pools();
        // the next ceremony is keyed by new_epoch + 1
        self.keygen.prune_before(new_epoch);

        info!(
            ended_epoch,
            new_epoch,
            validators = self.validators.current_validators().len(),
            rotated = matches!(rotation, RotationOutcome::Rotated { .. }),
            "epoch advanced"
        );

        EpochTransition {
            ended_epoch,
            new_epoch,
            rotation,
            rewards,
            snapshots_written,
            pruned,
        }
    }

    /// Record the current committee's stakes for `epoch`
    fn snapshot_committee(&mut self, epoch: Epoch) -> usize {
        let mut written = 0;
        for mining in self.validators.current_validators() {
            let Some(pool) = self.registry.pool_by_mining(mining) else {
                warn!(epoch, %mining, "validator without pool, no snapshot");
                continue;
            };
            if self.ledger.record_snapshot(epoch, *mining, pool.snapshot()) {
                written += 1;
            }
        }
        written
    }

    fn prune_empty_pools(&mut self) -> Vec<Address> {
        let empty: Vec<Address> = self
            .registry
            .pools()
            .filter(|pool| pool.total_stake == 0)
            .filter(|pool| {
                !self.validators.is_validator(&pool.mining_address)
                    && !self.validators.is_pending_validator(&pool.mining_address)
            })
            .map(|pool| pool.staking_address)
            .collect();

        empty
            .into_iter()
            .filter(|staking| self.registry.prune(staking))
            .collect()
    }

    pub fn stake(&mut self, staker: Address, pool: Address, amount: Amount) -> Result<(), EngineError> {
        Ok(self.registry.stake(staker, pool, amount)?)
    }

    pub fn stake_new_pool(&mut self, staking: Address, mining: Address, amount: Amount) -> Result<(), EngineError> {
        self.registry.stake_new_pool(staking, mining, amount)?;
        info!(%staking, %mining, amount, "pool created");
        Ok(())
    }

    /// Withdraw at block time `now`
    ///
    /// A pool whose validator is in the current or pending committee cannot
    /// drop its own stake below the candidate minimum.
    pub fn withdraw(
        &mut self,
        staker: Address,
        pool: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<(), EngineError> {
        if staker == pool && amount > 0 {
            self.check_validator_stake(&pool, amount)?;
        }
        Ok(self.registry.withdraw(staker, pool, amount, &self.clock, now)?)
    }

    fn check_validator_stake(&self, staking: &Address, amount: Amount) -> Result<(), StakingError> {
        let Some(pool) = self.registry.pool(staking) else {
            return Ok(());
        };
        let serving = self.validators.is_validator(&pool.mining_address)
            || self.validators.is_pending_validator(&pool.mining_address);
        // over-withdrawals are left to the registry's balance check
        let Some(remaining) = pool.self_stake.checked_sub(amount) else {
            return Ok(());
        };
        if serving && remaining < self.config.staking.candidate_min_stake {
            warn!(%staking, amount, remaining, "validator self-stake withdrawal refused");
            return Err(StakingError::ValidatorStakeLocked(*staking));
        }
        Ok(())
    }

    pub fn add_to_delta_pot(&mut self, amount: Amount) -> Result<(), EngineError> {
        Ok(self.ledger.add_to_delta_pot(amount)?)
    }

    pub fn add_to_reinsert_pot(&mut self, amount: Amount) -> Result<(), EngineError> {
        Ok(self.ledger.add_to_reinsert_pot(amount)?)
    }

    pub fn receive_transfer(&mut self, from: &Address, amount: Amount) -> Result<(), EngineError> {
        Ok(self.ledger.receive_transfer(from, amount)?)
    }

    pub fn claim_reward(&mut self, address: &Address) -> Result<Amount, EngineError> {
        Ok(self.ledger.claim(address, &mut self.payout)?)
    }

    pub fn current_epoch(&self) -> Epoch {
        self.clock.current_epoch()
    }

    pub fn current_phase(&self, now: Timestamp) -> Phase {
        self.clock.current_phase(now)
    }

    pub fn current_validators(&self) -> &[Address] {
        self.validators.current_validators()
    }

    pub fn pending_validators(&self) -> &[Address] {
        self.validators.pending_validators()
    }

    pub fn snapshot(&self, epoch: Epoch, mining: &Address) -> Option<&StakeSnapshot> {
        self.ledger.snapshot(epoch, mining)
    }

    pub fn validator_reward(&self, epoch: Epoch, mining: &Address) -> Amount {
        self.ledger.validator_reward(epoch, mining)
    }

    pub fn delta_pot(&self) -> Amount {
        self.ledger.delta_pot()
    }

    pub fn reinsert_pot(&self) -> Amount {
        self.ledger.reinsert_pot()
    }

    pub fn last_block(&self) -> Option<BlockNumber> {
        self.last_block
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    pub fn registry(&self) -> &StakePoolRegistry {
        &self.registry
    }

    pub fn validator_set(&self) -> &ValidatorSetManager {
        &self.validators
    }

    pub fn ledger(&self) -> &RewardPotLedger {
        &self.ledger
    }

    pub fn keygen(&self) -> &K {
        &self.keygen
    }

    /// Ceremony participants submit their parts and acks through this
    pub fn keygen_mut(&mut self) -> &mut K {
        &mut self.keygen
    }

    pub fn payout(&self) -> &P {
        &self.payout
    }

    pub fn payout_mut(&mut self) -> &mut P {
        &mut self.payout
    }

    /// Digest over epoch, committees, pools and ledger
    ///
    /// Replicas fed the same blocks produce the same digest. The last
    /// processed block number is not included.
    pub fn state_digest(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(self.clock.current_epoch().to_be_bytes());
        hasher.update(self.clock.epoch_start_time().to_be_bytes());

        for (tag, set) in [
            (b'c', self.validators.current_validators()),
            (b'p', self.validators.pending_validators()),
        ] {
            hasher.update([tag]);
            hasher.update((set.len() as u64).to_be_bytes());
            for mining in set {
                hasher.update(mining.as_bytes());
            }
        }

        for pool in self.registry.pools() {
            hasher.update(pool.staking_address.as_bytes());
            hasher.update(pool.mining_address.as_bytes());
            hasher.update(pool.self_stake.to_be_bytes());
            for (delegator, stake) in &pool.delegators {
                hasher.update(delegator.as_bytes());
                hasher.update(stake.to_be_bytes());
            }
        }
        for staking in self.registry.pools_to_be_elected() {
            hasher.update(staking.as_bytes());
        }

        self.ledger.hash_into(&mut hasher);
        hasher.finalize().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ShortfallRule, StakingConfig};
    use crate::keygen::KeyGenHistory;
    use crate::payout::InMemoryBank;
    use crate::types::COIN;

    const SYSTEM: Address = Address::repeat_byte(0xff);

    fn addr(i: u64) -> Address {
        Address::from_index(i)
    }

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.staking = StakingConfig {
            fixed_epoch_duration: 100,
            transition_window_length: 20,
            withdraw_disallow_period: 5,
            ..StakingConfig::default()
        };
        config.election.committee_size = 2;
        config
    }

    fn engine() -> PosdaoEngine<KeyGenHistory, InMemoryBank> {
        let genesis = Genesis {
            start_time: 0,
            validators: vec![GenesisValidator {
                staking_address: addr(1),
                mining_address: addr(101),
                self_stake: COIN,
            }],
        };
        PosdaoEngine::new(config(), genesis, KeyGenHistory::new(), InMemoryBank::new()).unwrap()
    }

    fn block(number: BlockNumber, timestamp: Timestamp, end: bool) -> BlockContext {
        BlockContext {
            number,
            timestamp,
            is_epoch_end_block: end,
        }
    }

    #[test]
    fn test_genesis_snapshots() {
        let engine = engine();
        assert_eq!(engine.current_validators(), &[addr(101)]);
        assert_eq!(engine.snapshot(0, &addr(101)).unwrap().validator_stake, COIN);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut bad = config();
        bad.rewards.delta_pot_payout_divisor = 0;
        let result = PosdaoEngine::new(bad, Genesis::default(), KeyGenHistory::new(), InMemoryBank::new());
        assert!(matches!(result, Err(EngineError::Config(ConfigError::ZeroDivisor))));
    }

    #[test]
    fn test_unauthorized_caller() {
        let mut engine = engine();
        assert_eq!(
            engine.reward(&addr(5), block(1, 10, false)),
            Err(EngineError::Unauthorized(addr(5)))
        );
        assert_eq!(engine.last_block(), None);
    }

    #[test]
    fn test_same_block_processed_once() {
        let mut engine = engine();
        assert!(matches!(
            engine.reward(&SYSTEM, block(1, 10, false)),
            Ok(BlockOutcome::Regular { .. })
        ));
        assert_eq!(
            engine.reward(&SYSTEM, block(1, 10, false)),
            Ok(BlockOutcome::AlreadyProcessed)
        );
    }

    #[test]
    fn test_rotation_after_keygen() {
        let mut engine = engine();
        engine.stake_new_pool(addr(2), addr(102), COIN).unwrap();

        let outcome = engine.reward(&SYSTEM, block(1, 80, false)).unwrap();
        assert!(matches!(
            outcome,
            BlockOutcome::Regular {
                phase: Phase::Transition,
                election_started: true,
                ..
            }
        ));
        assert_eq!(engine.pending_validators(), &[addr(101), addr(102)]);

        for mining in [addr(101), addr(102)] {
            engine.keygen_mut().write_part(1, mining, vec![1]).unwrap();
            engine.keygen_mut().write_acks(1, mining, vec![]).unwrap();
        }
        let outcome = engine.reward(&SYSTEM, block(2, 90, false)).unwrap();
        assert!(matches!(
            outcome,
            BlockOutcome::Regular {
                key_gen_completed: true,
                ..
            }
        ));

        let BlockOutcome::EpochEnded(transition) = engine.reward(&SYSTEM, block(3, 100, true)).unwrap() else {
            panic!("expected epoch end");
        };
        assert_eq!(transition.new_epoch, 1);
        assert!(matches!(transition.rotation, RotationOutcome::Rotated { .. }));
        assert_eq!(transition.snapshots_written, 2);
        assert_eq!(engine.current_validators(), &[addr(101), addr(102)]);
        assert_eq!(engine.clock().epoch_start_time(), 100);
    }

    #[test]
    fn test_early_end_flag_is_regular_block() {
        let mut engine = engine();
        let outcome = engine.reward(&SYSTEM, block(1, 50, true)).unwrap();
        assert!(matches!(
            outcome,
            BlockOutcome::Regular {
                phase: Phase::RegularBlockCreation,
                ..
            }
        ));
        assert_eq!(engine.current_epoch(), 0);
    }

    #[test]
    fn test_keygen_timeout_retains_committee() {
        let mut engine = engine();
        engine.stake_new_pool(addr(2), addr(102), COIN).unwrap();
        engine.reward(&SYSTEM, block(1, 80, false)).unwrap();

        let BlockOutcome::EpochEnded(transition) = engine.reward(&SYSTEM, block(2, 101, true)).unwrap() else {
            panic!("expected epoch end");
        };
        assert!(matches!(transition.rotation, RotationOutcome::Retained { .. }));
        assert_eq!(engine.current_epoch(), 1);
        assert_eq!(engine.current_validators(), &[addr(101)]);
        assert!(engine.pending_validators().is_empty());
    }

    #[test]
    fn test_shortfall_republish_runs_new_ceremony() {
        let mut config = config();
        config.election.min_committee_size = 2;
        config.election.shortfall = ShortfallRule::RepublishCurrent;
        let genesis = Genesis {
            start_time: 0,
            validators: vec![GenesisValidator {
                staking_address: addr(1),
                mining_address: addr(101),
                self_stake: COIN,
            }],
        };
        let mut engine =
            PosdaoEngine::new(config, genesis, KeyGenHistory::new(), InMemoryBank::new()).unwrap();

        engine.reward(&SYSTEM, block(1, 85, false)).unwrap();
        assert_eq!(engine.pending_validators(), &[addr(101)]);
        assert_eq!(engine.keygen().participants(1), vec![addr(101)]);
    }

    #[test]
    fn test_withdraw_gated_by_clock() {
        let mut engine = engine();
        engine.stake(addr(50), addr(1), 2 * COIN).unwrap();
        assert!(matches!(
            engine.withdraw(addr(50), addr(1), COIN, 95),
            Err(EngineError::Staking(StakingError::WithdrawalDisallowed { .. }))
        ));
        engine.withdraw(addr(50), addr(1), COIN, 94).unwrap();
    }

    #[test]
    fn test_emptied_pool_pruned_at_epoch_end() {
        let mut engine = engine();
        engine.stake_new_pool(addr(2), addr(102), COIN).unwrap();
        engine.withdraw(addr(2), addr(2), COIN, 10).unwrap();

        let BlockOutcome::EpochEnded(transition) = engine.reward(&SYSTEM, block(1, 100, true)).unwrap() else {
            panic!("expected epoch end");
        };
        assert_eq!(transition.pruned, vec![addr(2)]);
        assert!(engine.registry().pool(&addr(2)).is_none());
        // the validator's own pool is never pruned
        assert!(engine.registry().pool(&addr(1)).is_some());
    }

    #[test]
    fn test_digest_tracks_state() {
        let mut a = engine();
        let b = engine();
        assert_eq!(a.state_digest(), b.state_digest());

        a.add_to_delta_pot(COIN).unwrap();
        assert_ne!(a.state_digest(), b.state_digest());
    }

    #[test]
    fn test_funding_overflow_leaves_state() {
        let mut engine = engine();
        engine.add_to_reinsert_pot(10).unwrap();
        let digest = engine.state_digest();

        assert!(matches!(
            engine.add_to_delta_pot(Amount::MAX),
            Err(EngineError::Funding(FundingError::Overflow { .. }))
        ));
        assert!(matches!(
            engine.receive_transfer(&addr(7), Amount::MAX),
            Err(EngineError::Funding(_))
        ));
        assert_eq!(engine.state_digest(), digest);
        assert!(engine.ledger().is_conserved());
    }

    /// Elect pool 2 at the transition and complete its keygen
    fn elect_second_pool(engine: &mut PosdaoEngine<KeyGenHistory, InMemoryBank>) {
        engine.stake_new_pool(addr(2), addr(102), COIN).unwrap();
        engine.reward(&SYSTEM, block(1, 80, false)).unwrap();
        for mining in [addr(101), addr(102)] {
            engine.keygen_mut().write_part(1, mining, vec![1]).unwrap();
            engine.keygen_mut().write_acks(1, mining, vec![]).unwrap();
        }
        engine.reward(&SYSTEM, block(2, 81, false)).unwrap();
    }

    #[test]
    fn test_pending_validator_keeps_self_stake() {
        let mut engine = engine();
        elect_second_pool(&mut engine);
        assert!(engine.validator_set().is_pending_validator(&addr(102)));

        assert_eq!(
            engine.withdraw(addr(2), addr(2), COIN, 85),
            Err(EngineError::Staking(StakingError::ValidatorStakeLocked(addr(2))))
        );
        assert_eq!(engine.registry().stake_amount(&addr(2), &addr(2)), COIN);

        // delegators stay free to leave
        engine.stake(addr(50), addr(2), COIN).unwrap();
        engine.withdraw(addr(50), addr(2), COIN, 85).unwrap();

        let BlockOutcome::EpochEnded(_) = engine.reward(&SYSTEM, block(3, 100, true)).unwrap() else {
            panic!("expected epoch end");
        };
        let snapshot = engine.snapshot(1, &addr(102)).unwrap();
        assert_eq!(snapshot.validator_stake, COIN);
        assert_eq!(snapshot.total_stake, COIN);
    }

    #[test]
    fn test_current_validator_withdraws_down_to_minimum() {
        let mut engine = engine();
        engine.stake(addr(1), addr(1), COIN).unwrap();

        assert_eq!(
            engine.withdraw(addr(1), addr(1), 2 * COIN, 10),
            Err(EngineError::Staking(StakingError::ValidatorStakeLocked(addr(1))))
        );
        engine.withdraw(addr(1), addr(1), COIN, 10).unwrap();
        assert_eq!(engine.registry().stake_amount(&addr(1), &addr(1)), COIN);
        assert!(matches!(
            engine.withdraw(addr(1), addr(1), 3 * COIN, 10),
            Err(EngineError::Staking(StakingError::InsufficientStake { .. }))
        ));
    }

    #[test]
    fn test_keygen_history_stays_bounded() {
        let mut engine = engine();
        engine.stake_new_pool(addr(2), addr(102), COIN).unwrap();

        let mut height = 0;
        for epoch in 0..10u64 {
            let start = engine.clock().epoch_start_time();
            height += 1;
            engine.reward(&SYSTEM, block(height, start + 80, false)).unwrap();
            for mining in engine.pending_validators().to_vec() {
                let keygen = engine.keygen_mut();
                keygen.write_part(epoch + 1, mining, vec![0; 1024]).unwrap();
                keygen.write_acks(epoch + 1, mining, vec![vec![0; 1024]]).unwrap();
            }
            height += 1;
            let end = engine.clock().fixed_epoch_end_time();
            let BlockOutcome::EpochEnded(t) = engine.reward(&SYSTEM, block(height, end, true)).unwrap() else {
                panic!("expected epoch end");
            };
            assert!(matches!(t.rotation, RotationOutcome::Rotated { .. }));
            assert!(engine.keygen().ceremony_count() <= 1);
        }
        assert_eq!(engine.current_epoch(), 10);
        assert_eq!(engine.keygen().participants(10), vec![addr(101), addr(102)]);
    }
}
