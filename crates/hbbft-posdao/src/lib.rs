//! Proof-of-stake validator committee for an HBBFT consensus engine
//!
//! Tracks staking pools, rotates the validator set once per epoch behind a
//! distributed key generation ceremony, and pays epoch rewards out of
//! amortized pots.
//!
//! ## Epoch lifecycle
//!
//! ```text
//!  epoch N                                                        epoch N+1
//!  ├── RegularBlockCreation ──┼──── Transition ────┼ end block ─►├── ...
//!                             │ elect pending set  │ distribute rewards
//!                             │ run keygen         │ rotate (or retain)
//!                             │                    │ snapshot stakes
//! ```
//!
//! ## Guarantees
//!
//! - **Deterministic**: replicas fed the same blocks compute the same state
//!   (see [`PosdaoEngine::state_digest`])
//! - **Exactly once**: one distribution and one snapshot per (epoch, validator)
//! - **Conservation**: `balance == delta + reinsert + undistributed`
//! - **Liveness over freshness**: failed key generation keeps the current
//!   committee for another epoch
//!
//! ## Example
//!
//! ```
//! use hbbft_posdao::{
//!     Address, BlockContext, EngineConfig, Genesis, GenesisValidator, InMemoryBank,
//!     KeyGenHistory, PosdaoEngine, COIN,
//! };
//!
//! let config = EngineConfig::default();
//! let system = config.system_address;
//! let genesis = Genesis {
//!     start_time: 0,
//!     validators: vec![GenesisValidator {
//!         staking_address: Address::from_index(1),
//!         mining_address: Address::from_index(101),
//!         self_stake: COIN,
//!     }],
//! };
//! let mut engine =
//!     PosdaoEngine::new(config, genesis, KeyGenHistory::new(), InMemoryBank::new()).unwrap();
//!
//! engine.add_to_delta_pot(60 * COIN).unwrap();
//! let block = BlockContext { number: 1, timestamp: 5, is_epoch_end_block: false };
//! engine.reward(&system, block).unwrap();
//! assert_eq!(engine.current_epoch(), 0);
//! ```

pub mod clock;
pub mod config;
pub mod election;
pub mod engine;
pub mod keygen;
pub mod ledger;
pub mod payout;
pub mod registry;
pub mod types;
pub mod validator_set;

pub use clock::{EpochClock, Phase};
pub use config::{
    ConfigError, ElectionPolicy, EngineConfig, RewardConfig, SelectionRule, ShortfallRule,
    StakingConfig,
};
pub use election::{select_committee, Candidate};
pub use engine::{
    BlockContext, BlockOutcome, EngineError, EpochTransition, Genesis, GenesisValidator,
    PosdaoEngine,
};
pub use keygen::{KeyGenCoordinator, KeyGenError, KeyGenHistory};
pub use ledger::{
    draw_from_pot, mul_div, ClaimError, CommitteeMember, EpochRewardRecord, FundingError,
    RewardPotLedger, StakeSnapshot,
};
pub use payout::{InMemoryBank, Payout, PayoutError};
pub use registry::{Pool, StakePoolRegistry, StakingError};
pub use types::{Address, AddressParseError, Amount, BlockNumber, Epoch, Hash, Timestamp, COIN};
pub use validator_set::{RetainReason, RotationOutcome, RotationState, ValidatorSetManager};
