//! Sender accounts: the funding-period model and the stop/start bracket.
//!
//! A sender stores the balance it had at `start_block` and derives every
//! later balance arithmetically. While active it spends
//! `effective_amt_per_block` each block until the balance can no longer
//! cover a full block.

use tracing::debug;
use trickle_core::constants::{MAX_AMOUNT, MAX_BLOCK, MAX_RECEIVERS, MAX_WEIGHT_SUM};
use trickle_core::error::PoolError;
use trickle_core::types::{AccountId, Amount, AmountDelta, BlockNumber, SenderSnapshot};

use crate::receiver::ReceiverLedger;
use crate::receiver_weights::ReceiverWeights;
use crate::schedule::schedule_rate_change;

/// Sending side of the ledger for one identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SenderAccount {
    /// Block at which the current funding period began.
    pub(crate) start_block: BlockNumber,
    /// Unsent balance as of `start_block`.
    pub(crate) start_balance: Amount,
    /// Target per-block spend. Rounded down to a multiple of `weight_sum` when used.
    pub(crate) amt_per_block: Amount,
    pub(crate) weight_sum: u32,
    pub(crate) weight_count: u32,
    pub(crate) receivers: ReceiverWeights,
}

impl SenderAccount {
    /// Amount each unit of weight receives per block.
    pub fn amt_per_weight(&self) -> Amount {
        if self.weight_sum == 0 {
            return Amount::ZERO;
        }
        self.amt_per_block / Amount::from(self.weight_sum)
    }

    /// Rate actually spent per block: `amt_per_block` rounded down to a
    /// multiple of `weight_sum`.
    pub fn effective_amt_per_block(&self) -> Amount {
        self.amt_per_weight() * Amount::from(self.weight_sum)
    }

    /// No outflow regardless of balance.
    pub fn is_inert(&self) -> bool {
        self.weight_sum == 0 || self.amt_per_block < Amount::from(self.weight_sum)
    }

    /// Block at which funding runs out, clamped to [`MAX_BLOCK`].
    ///
    /// `None` when inert or unable to fund even one block.
    pub fn end_block(&self) -> Option<BlockNumber> {
        if self.is_inert() {
            return None;
        }
        let blocks = self.start_balance / self.effective_amt_per_block();
        if blocks == Amount::ZERO {
            return None;
        }
        let end = (Amount::from(self.start_block) + blocks).min(Amount::from(MAX_BLOCK));
        let (_, low) = end.into_words();
        Some(low as BlockNumber)
    }

    /// Unsent balance as of `now` (`now >= start_block`).
    pub fn withdrawable(&self, now: BlockNumber) -> Amount {
        if self.is_inert() {
            return self.start_balance;
        }
        let Some(end) = self.end_block() else {
            return self.start_balance;
        };
        let elapsed = now.min(end).saturating_sub(self.start_block);
        self.start_balance - Amount::from(elapsed) * self.effective_amt_per_block()
    }

    /// Balance left once funding has ended: what a sender can withdraw at
    /// any block from `end_block` on.
    pub fn residual(&self) -> Amount {
        self.withdrawable(BlockNumber::MAX)
    }

    pub fn amt_per_block(&self) -> Amount {
        self.amt_per_block
    }

    pub fn weight_sum(&self) -> u32 {
        self.weight_sum
    }

    pub fn weight_count(&self) -> u32 {
        self.weight_count
    }

    /// Live receivers in list order, without compacting.
    pub fn receivers(&self) -> &ReceiverWeights {
        &self.receivers
    }

    pub fn snapshot(&self) -> SenderSnapshot {
        SenderSnapshot {
            start_block: self.start_block,
            start_balance: self.start_balance,
            amt_per_block: self.amt_per_block,
            effective_amt_per_block: self.effective_amt_per_block(),
            weight_sum: self.weight_sum,
            weight_count: self.weight_count,
            end_block: self.end_block(),
        }
    }

    /// Add `amount` to the (already stopped) balance.
    pub(crate) fn add_balance(&mut self, amount: Amount) -> Result<(), PoolError> {
        self.start_balance = self
            .start_balance
            .checked_add(amount)
            .filter(|b| *b <= MAX_AMOUNT)
            .ok_or(PoolError::AmountOverflow(amount))?;
        Ok(())
    }

    /// Remove `amount` from the (already stopped) balance.
    pub(crate) fn sub_balance(&mut self, amount: Amount) -> Result<(), PoolError> {
        self.start_balance = self
            .start_balance
            .checked_sub(amount)
            .ok_or(PoolError::InsufficientBalance {
                have: self.start_balance,
                need: amount,
            })?;
        Ok(())
    }

    pub(crate) fn set_amt_per_block(&mut self, amt_per_block: Amount) -> Result<(), PoolError> {
        if amt_per_block > MAX_AMOUNT {
            return Err(PoolError::AmountOverflow(amt_per_block));
        }
        self.amt_per_block = amt_per_block;
        Ok(())
    }

    /// Change a receiver's weight, enforcing the weight-sum and receiver-count bounds.
    pub(crate) fn set_receiver_weight(
        &mut self,
        receiver: AccountId,
        weight: u32,
    ) -> Result<(), PoolError> {
        let previous = self.receivers.weight(&receiver);
        let sum = u64::from(self.weight_sum) - u64::from(previous) + u64::from(weight);
        if sum > u64::from(MAX_WEIGHT_SUM) {
            return Err(PoolError::WeightSumOverflow {
                sum: u32::try_from(sum).unwrap_or(u32::MAX),
                max: MAX_WEIGHT_SUM,
            });
        }
        let count = match (previous, weight) {
            (0, w) if w > 0 => self.weight_count + 1,
            (p, 0) if p > 0 => self.weight_count - 1,
            _ => self.weight_count,
        };
        if count > MAX_RECEIVERS {
            return Err(PoolError::TooManyReceivers {
                count,
                max: MAX_RECEIVERS,
            });
        }
        self.receivers.set_weight(receiver, weight);
        self.weight_sum = sum as u32;
        self.weight_count = count;
        Ok(())
    }

    /// Suspend the funding period at `now`.
    ///
    /// Writes the current balance back to `start_balance` and cancels the
    /// part of the running schedule that lies after `now`.
    pub(crate) fn stop(
        &mut self,
        now: BlockNumber,
        ledger: &mut ReceiverLedger,
        cycle_blocks: u64,
    ) -> Result<(), PoolError> {
        let end = self.end_block();
        let per_weight = self.amt_per_weight();
        self.start_balance = self.withdrawable(now);
        self.start_block = now;
        match end {
            Some(end) if end > now => {
                debug!(now, end, %per_weight, "sender: stop");
                self.schedule(ledger, -to_delta(per_weight)?, now, end, cycle_blocks)
            }
            _ => Ok(()),
        }
    }

    /// Resume the funding period at `now` from the current state.
    pub(crate) fn start(
        &mut self,
        now: BlockNumber,
        ledger: &mut ReceiverLedger,
        cycle_blocks: u64,
    ) -> Result<(), PoolError> {
        self.start_block = now;
        let Some(end) = self.end_block() else {
            return Ok(());
        };
        let per_weight = self.amt_per_weight();
        debug!(now, end, %per_weight, "sender: start");
        self.schedule(ledger, to_delta(per_weight)?, now, end, cycle_blocks)
    }

    fn schedule(
        &mut self,
        ledger: &mut ReceiverLedger,
        per_weight_delta: AmountDelta,
        from: BlockNumber,
        to: BlockNumber,
        cycle_blocks: u64,
    ) -> Result<(), PoolError> {
        for (receiver, weight) in self.receivers.iter_compact() {
            let delta = per_weight_delta
                .checked_mul(AmountDelta::from(i128::from(weight)))
                .ok_or(PoolError::ArithmeticOverflow)?;
            schedule_rate_change(ledger.touch(receiver), delta, from, to, cycle_blocks)?;
        }
        Ok(())
    }
}

fn to_delta(amount: Amount) -> Result<AmountDelta, PoolError> {
    if amount > AmountDelta::MAX.as_u256() {
        return Err(PoolError::ArithmeticOverflow);
    }
    Ok(amount.as_i256())
}
