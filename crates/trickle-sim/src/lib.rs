//! # trickle-sim
//! Scenario runner for the Trickle streaming ledger.
//!
//! A [`Scenario`] is a JSON script of timed pool actions. The [`Simulator`]
//! replays it against a fresh [`FundingPool`](trickle_pool::FundingPool) on a
//! virtual block clock, checks per-step expectations and verifies that funds
//! are conserved.

pub mod config;
pub mod scenario;
pub mod simulator;

pub use config::SimConfig;
pub use scenario::{Action, Scenario, Step};
pub use simulator::{Conservation, SimReport, Simulator, StepOutcome};
