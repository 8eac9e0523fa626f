//! Protocol constants. All monetary values are in base units.

use crate::types::Amount;

/// Largest balance or per-block rate a sender may hold: 192 bits.
///
/// A per-block rate times a full cycle length (at most [`MAX_CYCLE_BLOCKS`])
/// times a receiver weight (at most [`MAX_WEIGHT_SUM`]) stays well inside a
/// signed 256-bit delta.
///
/// # Examples
///
/// ```
/// use trickle_core::constants::MAX_AMOUNT;
/// use trickle_core::types::Amount;
/// assert_eq!(MAX_AMOUNT, (Amount::ONE << 192u32) - Amount::ONE);
/// ```
pub const MAX_AMOUNT: Amount = Amount::from_words(u64::MAX as u128, u128::MAX);

/// Scheduling horizon. End blocks past this are clamped to it.
pub const MAX_BLOCK: u64 = i64::MAX as u64;

/// Upper bound on the sum of all receiver weights of one sender.
///
/// Also bounds the per-block rounding loss: at most `MAX_WEIGHT_SUM - 1`
/// units per block stay unspent.
pub const MAX_WEIGHT_SUM: u32 = 1000;

/// Upper bound on the number of receivers with non-zero weight per sender.
pub const MAX_RECEIVERS: u32 = 100;

/// Cycle length used when none is configured.
pub const DEFAULT_CYCLE_BLOCKS: u64 = 10;

/// Longest supported cycle, in blocks.
pub const MAX_CYCLE_BLOCKS: u64 = 1 << 30;
