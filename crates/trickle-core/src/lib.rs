//! # trickle-core
//! Foundation types and traits for the Trickle streaming ledger.

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;
