//! Trait interfaces for the Trickle ledger.
//!
//! - [`StreamingPool`] — the user-facing operation surface (trickle-pool implements)

use crate::error::PoolError;
use crate::types::{AccountId, Amount, BlockNumber, SenderUpdate};

/// Continuous fund streaming between senders and weighted receivers.
///
/// Every method takes the current block number explicitly. There is no
/// background clock: projections are recomputed from `now` on each call.
/// Mutating methods are atomic: on `Err` no state has changed.
pub trait StreamingPool {
    /// Apply a batched sender update. Returns the amount withdrawn.
    fn update_sender(
        &mut self,
        sender: &AccountId,
        update: SenderUpdate,
        now: BlockNumber,
    ) -> Result<Amount, PoolError>;

    /// Add `amount` to the sender's balance.
    fn top_up(
        &mut self,
        sender: &AccountId,
        amount: Amount,
        now: BlockNumber,
    ) -> Result<(), PoolError> {
        let update = SenderUpdate {
            top_up: amount,
            ..SenderUpdate::default()
        };
        self.update_sender(sender, update, now).map(|_| ())
    }

    /// Remove `amount` from the sender's unsent balance and return it.
    fn withdraw(
        &mut self,
        sender: &AccountId,
        amount: Amount,
        now: BlockNumber,
    ) -> Result<Amount, PoolError> {
        let update = SenderUpdate {
            withdraw: amount,
            ..SenderUpdate::default()
        };
        self.update_sender(sender, update, now)
    }

    /// Set the sender's target per-block spend across all receivers.
    fn set_amount_per_block(
        &mut self,
        sender: &AccountId,
        amt_per_block: Amount,
        now: BlockNumber,
    ) -> Result<(), PoolError> {
        let update = SenderUpdate {
            amt_per_block: Some(amt_per_block),
            ..SenderUpdate::default()
        };
        self.update_sender(sender, update, now).map(|_| ())
    }

    /// Add, update or (with weight 0) remove a receiver of the sender.
    fn set_receiver_weight(
        &mut self,
        sender: &AccountId,
        receiver: &AccountId,
        weight: u32,
        now: BlockNumber,
    ) -> Result<(), PoolError> {
        let update = SenderUpdate {
            receivers: vec![(*receiver, weight)],
            ..SenderUpdate::default()
        };
        self.update_sender(sender, update, now).map(|_| ())
    }

    /// Unsent balance of the sender as of `now`.
    fn withdrawable(&self, sender: &AccountId, now: BlockNumber) -> Result<Amount, PoolError>;

    /// Amount the receiver could collect at `now` (fully elapsed cycles only).
    fn collectable(&self, receiver: &AccountId, now: BlockNumber) -> Result<Amount, PoolError>;

    /// Collect everything collectable and return it. Zero is not an error.
    fn collect(&mut self, receiver: &AccountId, now: BlockNumber) -> Result<Amount, PoolError>;
}
