//! Property tests for pot conservation, idempotent regular blocks,
//! write-once snapshots and deterministic elections

use hbbft_posdao::{
    select_committee, Address, BlockContext, Candidate, ElectionPolicy, EngineConfig, Genesis,
    GenesisValidator, InMemoryBank, KeyGenHistory, PosdaoEngine, SelectionRule, ShortfallRule,
    StakeSnapshot, StakingConfig, COIN,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

type Engine = PosdaoEngine<KeyGenHistory, InMemoryBank>;

const EPOCH: u64 = 1_000;
const WINDOW: u64 = 100;
const VALIDATORS: u64 = 3;
const PROPTEST_CASES: u32 = 64;

fn addr(i: u64) -> Address {
    Address::from_index(i)
}

fn engine() -> Engine {
    let mut config = EngineConfig::default();
    config.staking = StakingConfig {
        fixed_epoch_duration: EPOCH,
        transition_window_length: WINDOW,
        withdraw_disallow_period: 10,
        ..StakingConfig::default()
    };
    // small divisors so every epoch moves value
    config.rewards.delta_pot_payout_divisor = 7;
    config.rewards.reinsert_pot_payout_divisor = 3;

    let genesis = Genesis {
        start_time: 0,
        validators: (1..=VALIDATORS)
            .map(|v| GenesisValidator {
                staking_address: addr(v),
                mining_address: addr(100 + v),
                self_stake: COIN,
            })
            .collect(),
    };
    PosdaoEngine::new(config, genesis, KeyGenHistory::new(), InMemoryBank::new()).unwrap()
}

/// Operation applied to the engine between blocks
#[derive(Debug, Clone)]
enum Op {
    FundDelta(u128),
    FundReinsert(u128),
    DirectTransfer(u128),
    Delegate { validator: u64, delegator: u64, coins: u128 },
    RejectPayee(u64),
    Claim(u64),
    EndEpoch,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u128..1_000_000_000).prop_map(Op::FundDelta),
        (0u128..1_000_000_000).prop_map(Op::FundReinsert),
        (1u128..1_000_000).prop_map(Op::DirectTransfer),
        (1..=VALIDATORS, 0u64..4, 1u128..5).prop_map(|(validator, delegator, coins)| {
            Op::Delegate {
                validator,
                delegator,
                coins,
            }
        }),
        (1..=VALIDATORS).prop_map(Op::RejectPayee),
        (0u64..4).prop_map(Op::Claim),
        Just(Op::EndEpoch),
    ]
}

fn delegator_addr(validator: u64, delegator: u64) -> Address {
    addr(1_000 + validator * 10 + delegator)
}

fn end_epoch(engine: &mut Engine, height: &mut u64) {
    let system = engine.config().system_address;
    *height += 1;
    let timestamp = engine.clock().fixed_epoch_end_time();
    engine
        .reward(
            &system,
            BlockContext {
                number: *height,
                timestamp,
                is_epoch_end_block: true,
            },
        )
        .unwrap();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// balance == delta + reinsert + undistributed, and funded == held + paid out
    #[test]
    fn prop_pot_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut engine = engine();
        let mut height = 0;
        let mut funded: u128 = 0;

        for op in ops {
            match op {
                Op::FundDelta(a) => {
                    engine.add_to_delta_pot(a).unwrap();
                    funded += a;
                }
                Op::FundReinsert(a) => {
                    engine.add_to_reinsert_pot(a).unwrap();
                    funded += a;
                }
                Op::DirectTransfer(a) => {
                    engine.receive_transfer(&addr(999), a).unwrap();
                    funded += a;
                }
                Op::Delegate { validator, delegator, coins } => {
                    let _ = engine.stake(delegator_addr(validator, delegator), addr(validator), coins * COIN);
                }
                Op::RejectPayee(v) => engine.payout_mut().reject(addr(v)),
                Op::Claim(d) => {
                    for v in 1..=VALIDATORS {
                        let _ = engine.claim_reward(&delegator_addr(v, d));
                    }
                }
                Op::EndEpoch => end_epoch(&mut engine, &mut height),
            }

            let ledger = engine.ledger();
            prop_assert!(ledger.is_conserved());
            prop_assert_eq!(
                ledger.balance(),
                ledger.delta_pot() + ledger.reinsert_pot() + ledger.native_reward_undistributed()
            );
            prop_assert_eq!(ledger.balance() + ledger.total_paid_out(), funded);
            prop_assert_eq!(engine.payout().total(), ledger.total_paid_out());
        }
    }

    /// Any number of regular blocks leaves the same state as one
    #[test]
    fn prop_regular_blocks_idempotent(
        fund in 0u128..1_000_000_000_000,
        gaps in prop::collection::vec(1u64..20, 1..30),
    ) {
        let system = EngineConfig::default().system_address;
        let mut once = engine();
        let mut many = engine();
        once.add_to_delta_pot(fund).unwrap();
        many.add_to_delta_pot(fund).unwrap();

        let first = BlockContext { number: 1, timestamp: 1, is_epoch_end_block: false };
        once.reward(&system, first).unwrap();
        many.reward(&system, first).unwrap();

        let mut timestamp = 1;
        for (i, gap) in gaps.iter().enumerate() {
            // stay inside RegularBlockCreation
            timestamp = (timestamp + gap).min(EPOCH - WINDOW - 1);
            let block = BlockContext {
                number: i as u64 + 2,
                timestamp,
                is_epoch_end_block: false,
            };
            many.reward(&system, block).unwrap();
        }

        prop_assert_eq!(once.state_digest(), many.state_digest());
        prop_assert_eq!(once.current_epoch(), many.current_epoch());
        prop_assert_eq!(once.current_validators(), many.current_validators());
        prop_assert_eq!(once.delta_pot(), many.delta_pot());
    }

    /// A snapshot, once written, never changes as stakes move later
    #[test]
    fn prop_snapshot_written_once(
        rounds in prop::collection::vec((1..=VALIDATORS, 0u64..4, 1u128..5), 1..12),
    ) {
        let mut engine = engine();
        let mut height = 0;
        let mut seen: BTreeMap<(u64, Address), StakeSnapshot> = BTreeMap::new();

        for (validator, delegator, coins) in rounds {
            let _ = engine.stake(delegator_addr(validator, delegator), addr(validator), coins * COIN);
            end_epoch(&mut engine, &mut height);

            let epoch = engine.current_epoch();
            for mining in engine.current_validators().to_vec() {
                let snapshot = engine.snapshot(epoch, &mining).cloned();
                prop_assert!(snapshot.is_some());
                seen.insert((epoch, mining), snapshot.unwrap());
            }

            for ((e, mining), snapshot) in &seen {
                prop_assert_eq!(engine.snapshot(*e, mining), Some(snapshot));
            }
        }
        prop_assert_eq!(engine.ledger().snapshot_count(), seen.len() + VALIDATORS as usize);
    }

    /// Same candidates in the same order always yield the same committee
    #[test]
    fn prop_election_deterministic(
        stakes in prop::collection::vec(1u128..10, 0..40),
        size in 1usize..10,
        top_stake in any::<bool>(),
    ) {
        let candidates: Vec<Candidate> = stakes
            .iter()
            .enumerate()
            .map(|(i, stake)| Candidate {
                staking_address: addr(i as u64),
                mining_address: addr(500 + i as u64),
                total_stake: *stake,
            })
            .collect();
        let policy = ElectionPolicy {
            committee_size: size,
            min_committee_size: 1,
            rule: if top_stake { SelectionRule::TopStake } else { SelectionRule::InsertionOrder },
            shortfall: ShortfallRule::RetainCurrent,
        };

        let first = select_committee(&candidates, &policy);
        let second = select_committee(&candidates, &policy);
        prop_assert_eq!(&first, &second);

        if let Some(committee) = first {
            prop_assert_eq!(committee.len(), size.min(candidates.len()));
            let mut dedup = committee.clone();
            dedup.sort();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), committee.len());
        } else {
            prop_assert!(candidates.is_empty());
        }
    }
}
