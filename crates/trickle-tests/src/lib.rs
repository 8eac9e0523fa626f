//! Invariant test suite for the Trickle streaming ledger.
//!
//! Integration tests that drive [`FundingPool`](trickle_pool::FundingPool)
//! through randomized and hand-built histories and check conservation,
//! monotonic collection, rate accuracy and collection latency.
pub mod helpers;
