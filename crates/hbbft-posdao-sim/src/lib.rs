//! Deterministic simulator for the hbbft-posdao epoch engine
//!
//! Replays a JSON scenario block by block in one process. Two runs of the
//! same scenario with the same flags produce identical state digests.

pub mod scenario;
pub mod simulator;

pub use scenario::{Action, Scenario, ScheduledAction};
pub use simulator::{EpochSummary, Simulator};
