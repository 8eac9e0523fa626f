//! Error types for the Trickle ledger.
use thiserror::Error;

use crate::types::{AccountId, Amount};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },
    #[error("amount overflow: {0} exceeds the maximum balance")]
    AmountOverflow(Amount),
    #[error("weight sum overflow: {sum} > {max}")]
    WeightSumOverflow { sum: u32, max: u32 },
    #[error("too many receivers: {count} > {max}")]
    TooManyReceivers { count: u32, max: u32 },
    #[error("block regression: {got} is before {latest}")]
    BlockRegression { got: u64, latest: u64 },
    #[error("block out of range: {0}")]
    BlockOutOfRange(u64),
    #[error("negative balance for receiver {0}")]
    NegativeBalance(AccountId),
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid cycle length: {got} (must be 1..={max})")]
    InvalidCycleBlocks { got: u64, max: u64 },
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum TrickleError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("scenario: {0}")]
    Scenario(String),
}
