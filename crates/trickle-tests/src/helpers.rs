//! Shared test helpers for integration tests.

use trickle_core::traits::StreamingPool;
use trickle_core::types::{AccountId, Amount, BlockNumber, SenderUpdate};
use trickle_pool::{FundingPool, PoolConfig};
use trickle_sim::{Scenario, SimConfig, Simulator};

/// Account id from a seed byte.
pub fn acct(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

/// Amount from a small literal.
pub fn amt(value: u128) -> Amount {
    Amount::new(value)
}

/// Empty pool with the given cycle length.
pub fn pool(cycle_blocks: u64) -> FundingPool {
    FundingPool::new(PoolConfig::new(cycle_blocks).unwrap()).unwrap()
}

/// Pool where `sender` streams `balance` at `rate` per block to `receivers`,
/// all configured in one update at block `at`.
pub fn streaming_pool(
    cycle_blocks: u64,
    sender: AccountId,
    balance: u128,
    rate: u128,
    receivers: &[(AccountId, u32)],
    at: BlockNumber,
) -> FundingPool {
    let mut p = pool(cycle_blocks);
    let update = SenderUpdate {
        top_up: amt(balance),
        amt_per_block: Some(amt(rate)),
        receivers: receivers.to_vec(),
        ..SenderUpdate::default()
    };
    p.update_sender(&sender, update, at).unwrap();
    p
}

/// Simulator over an empty scenario, for driving actions one at a time.
pub fn simulator(cycle_blocks: u64) -> Simulator {
    let scenario = Scenario {
        cycle_blocks: Some(cycle_blocks),
        steps: Vec::new(),
    };
    Simulator::new(&SimConfig::default(), &scenario).unwrap()
}
