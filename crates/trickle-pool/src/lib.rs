//! # trickle-pool — Continuous fund-streaming engine.
//!
//! All calculations use integer arithmetic only, so balances are exact and
//! replayable from any pair of block numbers.
//!
//! - **Receiver weights**: per-sender linked list over a map with O(1)
//!   writes and compaction of removed entries during enumeration.
//! - **Cycle-delta scheduling**: a rate over any block range is installed as
//!   four signed additions to the receivers' per-cycle delta tables.
//! - **Funding periods**: a sender's balance at any block is derived from
//!   its start block, start balance and effective rate.
//! - **Lazy collection**: receivers fold their delta tables forward only when
//!   read or collected, and only over fully elapsed cycles.

pub mod config;
pub mod pool;
pub mod receiver;
pub mod receiver_weights;
pub mod schedule;
pub mod sender;

pub use config::PoolConfig;
pub use pool::FundingPool;
pub use receiver::{ReceiverAccount, ReceiverLedger};
pub use receiver_weights::ReceiverWeights;
pub use sender::SenderAccount;
