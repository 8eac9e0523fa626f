//! Cycle-delta scheduling.
//!
//! A rate of `d` units per block over `[from, to)` is written as two
//! [`set_delta`] calls, `+d` at `from` and `-d` at `to`. Each call touches at
//! most two cycles of the receiver's delta table, so a pulse of any length
//! costs four additions to install.
//!
//! With `L` blocks per cycle, a change at block `b` affects the cycle holding
//! `b` (index `b / L + 1`) pro-rated by the blocks of that cycle from `b`
//! onward, and the following cycle with the remainder, so that from the next
//! cycle on the full `L * d` per cycle applies.

use std::collections::BTreeMap;

use tracing::debug;
use trickle_core::error::PoolError;
use trickle_core::types::{AmountDelta, BlockNumber, Cycle};

use crate::receiver::ReceiverAccount;

/// Cycle index whose funds become collectable once `block` has been reached,
/// i.e. the 1-based index of the cycle containing `block`.
pub fn cycle_of(block: BlockNumber, cycle_blocks: u64) -> Cycle {
    block / cycle_blocks + 1
}

/// Add a per-block rate change effective from `block` onward to `deltas`.
pub fn set_delta(
    deltas: &mut BTreeMap<Cycle, AmountDelta>,
    block: BlockNumber,
    per_block_delta: AmountDelta,
    cycle_blocks: u64,
) -> Result<(), PoolError> {
    if per_block_delta == AmountDelta::ZERO {
        return Ok(());
    }
    let rem = block % cycle_blocks;
    let head = cycle_blocks - rem;
    let this_cycle = cycle_of(block, cycle_blocks);

    let head_amt = blocks(head)
        .checked_mul(per_block_delta)
        .ok_or(PoolError::ArithmeticOverflow)?;
    let rem_amt = blocks(rem)
        .checked_mul(per_block_delta)
        .ok_or(PoolError::ArithmeticOverflow)?;

    add_to_cycle(deltas, this_cycle, head_amt)?;
    add_to_cycle(deltas, this_cycle + 1, rem_amt)
}

fn blocks(count: u64) -> AmountDelta {
    AmountDelta::from(i128::from(count))
}

fn add_to_cycle(
    deltas: &mut BTreeMap<Cycle, AmountDelta>,
    cycle: Cycle,
    amount: AmountDelta,
) -> Result<(), PoolError> {
    if amount == AmountDelta::ZERO {
        return Ok(());
    }
    let updated = deltas
        .get(&cycle)
        .copied()
        .unwrap_or(AmountDelta::ZERO)
        .checked_add(amount)
        .ok_or(PoolError::ArithmeticOverflow)?;
    if updated == AmountDelta::ZERO {
        deltas.remove(&cycle);
    } else {
        deltas.insert(cycle, updated);
    }
    Ok(())
}

/// Schedule a rectangular pulse of `per_block_delta` over `[from, to)`.
///
/// A positive pulse on a receiver that never received anything also sets its
/// first collectable cycle. Empty ranges are ignored.
pub fn schedule_rate_change(
    account: &mut ReceiverAccount,
    per_block_delta: AmountDelta,
    from: BlockNumber,
    to: BlockNumber,
    cycle_blocks: u64,
) -> Result<(), PoolError> {
    if from >= to || per_block_delta == AmountDelta::ZERO {
        return Ok(());
    }
    let cancel = per_block_delta
        .checked_neg()
        .ok_or(PoolError::ArithmeticOverflow)?;
    if per_block_delta > AmountDelta::ZERO && account.next_collected_cycle == 0 {
        account.next_collected_cycle = cycle_of(from, cycle_blocks);
    }
    debug!(%per_block_delta, from, to, "schedule: rate change");
    set_delta(&mut account.amt_deltas, from, per_block_delta, cycle_blocks)?;
    set_delta(&mut account.amt_deltas, to, cancel, cycle_blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(v: i128) -> AmountDelta {
        AmountDelta::from(v)
    }

    fn ds(values: &[i128]) -> Vec<AmountDelta> {
        values.iter().copied().map(d).collect()
    }

    /// Per-cycle amounts for cycles 1..=n obtained by a running sum.
    fn realize(deltas: &BTreeMap<Cycle, AmountDelta>, n: u64) -> Vec<AmountDelta> {
        let mut rate = AmountDelta::ZERO;
        (1..=n)
            .map(|c| {
                rate += deltas.get(&c).copied().unwrap_or(AmountDelta::ZERO);
                rate
            })
            .collect()
    }

    #[test]
    fn aligned_start_fills_whole_cycle() {
        let mut deltas = BTreeMap::new();
        set_delta(&mut deltas, 20, d(3), 10).unwrap();
        assert_eq!(deltas.get(&3), Some(&d(30)));
        assert_eq!(deltas.get(&4), None);
    }

    #[test]
    fn unaligned_start_splits_across_two_cycles() {
        let mut deltas = BTreeMap::new();
        set_delta(&mut deltas, 23, d(2), 10).unwrap();
        // 7 blocks of cycle 3 (blocks 23..30), the other 3 from cycle 4 on.
        assert_eq!(deltas.get(&3), Some(&d(14)));
        assert_eq!(deltas.get(&4), Some(&d(6)));
    }

    #[test]
    fn pulse_realizes_exact_amounts() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(5), 13, 37, 10).unwrap();
        // blocks 13..20 → 7, 20..30 → 10, 30..37 → 7
        assert_eq!(realize(&acct.amt_deltas, 5), ds(&[0, 35, 50, 35, 0]));
        assert_eq!(acct.next_collected_cycle, 2);
    }

    #[test]
    fn pulse_within_one_cycle() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(4), 12, 15, 10).unwrap();
        assert_eq!(realize(&acct.amt_deltas, 3), ds(&[0, 12, 0]));
    }

    #[test]
    fn opposite_pulses_cancel_to_empty_table() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(4), 12, 95, 10).unwrap();
        schedule_rate_change(&mut acct, d(-4), 12, 95, 10).unwrap();
        assert!(acct.amt_deltas.is_empty());
    }

    #[test]
    fn empty_range_is_ignored() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(4), 50, 50, 10).unwrap();
        assert!(acct.amt_deltas.is_empty());
        assert_eq!(acct.next_collected_cycle, 0);
    }

    #[test]
    fn negative_pulse_does_not_initialize() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(-4), 10, 20, 10).unwrap();
        assert_eq!(acct.next_collected_cycle, 0);
    }

    #[test]
    fn existing_start_cycle_is_kept() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(1), 5, 50, 10).unwrap();
        schedule_rate_change(&mut acct, d(1), 45, 60, 10).unwrap();
        assert_eq!(acct.next_collected_cycle, 1);
    }

    #[test]
    fn single_block_cycles() {
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, d(7), 3, 6, 1).unwrap();
        assert_eq!(realize(&acct.amt_deltas, 7), ds(&[0, 0, 0, 7, 7, 7, 0]));
    }

    #[test]
    fn rates_beyond_128_bits_are_exact() {
        let rate = AmountDelta::ONE << 150u32;
        let mut acct = ReceiverAccount::default();
        schedule_rate_change(&mut acct, rate, 5, 25, 10).unwrap();
        let per_cycle = realize(&acct.amt_deltas, 4);
        assert_eq!(per_cycle[0], rate * d(5));
        assert_eq!(per_cycle[1], rate * d(10));
        assert_eq!(per_cycle[2], rate * d(5));
        assert_eq!(per_cycle[3], AmountDelta::ZERO);
    }

    #[test]
    fn overflow_is_reported() {
        let mut deltas = BTreeMap::new();
        assert_eq!(
            set_delta(&mut deltas, 0, AmountDelta::MAX, 10),
            Err(PoolError::ArithmeticOverflow)
        );
    }

    // --- proptest ---

    proptest! {
        #[test]
        fn pulse_total_matches_block_count(
            rate in 1i128..1_000_000,
            from in 0u64..500,
            len in 0u64..500,
            cycle_blocks in 1u64..40,
        ) {
            let to = from + len;
            let mut acct = ReceiverAccount::default();
            schedule_rate_change(&mut acct, d(rate), from, to, cycle_blocks).unwrap();
            let cycles = to / cycle_blocks + 2;
            let per_cycle = realize(&acct.amt_deltas, cycles);
            prop_assert!(per_cycle.iter().all(|v| *v >= AmountDelta::ZERO));
            let total = per_cycle.iter().fold(AmountDelta::ZERO, |acc, v| acc + *v);
            prop_assert_eq!(total, d(rate * i128::from(len)));
            prop_assert_eq!(*per_cycle.last().unwrap(), AmountDelta::ZERO);
        }

        #[test]
        fn cycle_amounts_count_blocks_in_cycle(
            from in 0u64..300,
            len in 1u64..300,
            cycle_blocks in 1u64..25,
        ) {
            let to = from + len;
            let mut acct = ReceiverAccount::default();
            schedule_rate_change(&mut acct, d(1), from, to, cycle_blocks).unwrap();
            let per_cycle = realize(&acct.amt_deltas, to / cycle_blocks + 2);
            for (i, amt) in per_cycle.iter().enumerate() {
                let start = i as u64 * cycle_blocks;
                let end = start + cycle_blocks;
                let covered = to.min(end).saturating_sub(from.max(start));
                prop_assert_eq!(*amt, d(i128::from(covered)));
            }
        }
    }
}
