//! The funding pool: senders, receivers and the stop/start bracket.
//!
//! Every sender mutation runs inside [`FundingPool::with_sender`], which
//!
//! 1. stops the sender at `now` (balance written back, future schedule cancelled),
//! 2. applies the mutation to a working copy of the sender,
//! 3. starts the sender again from the new state.
//!
//! Receiver accounts touched along the way are journaled; if any step fails,
//! the working copy is discarded and the journal rolled back, so a rejected
//! call leaves no trace.

use std::collections::HashMap;

use tracing::{debug, info, warn};
use trickle_core::constants::MAX_BLOCK;
use trickle_core::error::{ConfigError, PoolError};
use trickle_core::traits::StreamingPool;
use trickle_core::types::{
    AccountId, Amount, BlockNumber, PoolEvent, SenderSnapshot, SenderUpdate,
};

use crate::config::PoolConfig;
use crate::receiver::{ReceiverAccount, ReceiverLedger};
use crate::sender::SenderAccount;

/// In-memory streaming ledger driven by an externally supplied block number.
#[derive(Debug, Clone)]
pub struct FundingPool {
    config: PoolConfig,
    senders: HashMap<AccountId, SenderAccount>,
    receivers: ReceiverLedger,
    /// Highest block number any mutating call has been applied at.
    latest_block: BlockNumber,
    events: Vec<PoolEvent>,
}

impl FundingPool {
    /// Create an empty pool after validating `config`.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            senders: HashMap::new(),
            receivers: ReceiverLedger::new(),
            latest_block: 0,
            events: Vec::new(),
        })
    }

    pub fn cycle_blocks(&self) -> u64 {
        self.config.cycle_blocks
    }

    pub fn latest_block(&self) -> BlockNumber {
        self.latest_block
    }

    /// Stored sender state, if the sender ever wrote anything.
    pub fn sender(&self, sender: &AccountId) -> Option<&SenderAccount> {
        self.senders.get(sender)
    }

    /// Stored receiver state, if the receiver was ever scheduled funds.
    pub fn receiver(&self, receiver: &AccountId) -> Option<&ReceiverAccount> {
        self.receivers.get(receiver)
    }

    pub fn sender_snapshot(&self, sender: &AccountId) -> Option<SenderSnapshot> {
        self.senders.get(sender).map(SenderAccount::snapshot)
    }

    /// Target per-block rate as configured (not rounded).
    pub fn amt_per_block(&self, sender: &AccountId) -> Amount {
        self.senders
            .get(sender)
            .map_or(Amount::ZERO, SenderAccount::amt_per_block)
    }

    /// Balance the sender keeps once its current funding period has ended.
    pub fn residual(&self, sender: &AccountId) -> Amount {
        self.senders
            .get(sender)
            .map_or(Amount::ZERO, SenderAccount::residual)
    }

    /// Everything scheduled to the receiver and not yet collected, including
    /// cycles that have not elapsed.
    pub fn outstanding(&self, receiver: &AccountId) -> Result<Amount, PoolError> {
        match self.receivers.get(receiver) {
            Some(account) => account.outstanding(receiver),
            None => Ok(Amount::ZERO),
        }
    }

    /// Live receivers of `sender` in list order. Compacts the stored list.
    pub fn receivers(&mut self, sender: &AccountId) -> Vec<(AccountId, u32)> {
        self.senders
            .get_mut(sender)
            .map(|s| s.receivers.iter_compact().collect())
            .unwrap_or_default()
    }

    /// Ids of every sender with stored state.
    pub fn sender_ids(&self) -> impl Iterator<Item = &AccountId> {
        self.senders.keys()
    }

    /// Ids of every receiver with stored state.
    pub fn receiver_ids(&self) -> impl Iterator<Item = &AccountId> {
        self.receivers.ids()
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<PoolEvent> {
        std::mem::take(&mut self.events)
    }

    /// Reject blocks that precede the latest mutation or exceed the horizon.
    fn check_block(&self, now: BlockNumber) -> Result<(), PoolError> {
        if now >= MAX_BLOCK {
            return Err(PoolError::BlockOutOfRange(now));
        }
        if now < self.latest_block {
            return Err(PoolError::BlockRegression {
                got: now,
                latest: self.latest_block,
            });
        }
        Ok(())
    }

    /// Run `mutate` on `sender` inside the stop/start bracket, atomically.
    fn with_sender<T>(
        &mut self,
        sender: &AccountId,
        now: BlockNumber,
        mutate: impl FnOnce(&mut SenderAccount) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        self.check_block(now)?;
        let cycle_blocks = self.config.cycle_blocks;
        let mut account = self.senders.get(sender).cloned().unwrap_or_default();

        self.receivers.begin();
        let result = account
            .stop(now, &mut self.receivers, cycle_blocks)
            .and_then(|()| mutate(&mut account))
            .and_then(|out| {
                account
                    .start(now, &mut self.receivers, cycle_blocks)
                    .map(|()| out)
            });

        match result {
            Ok(out) => {
                self.receivers.commit();
                self.events.push(PoolEvent::SenderUpdated {
                    sender: *sender,
                    block: now,
                    balance: account.start_balance,
                    amt_per_block: account.amt_per_block,
                });
                info!(
                    sender = %sender.short(),
                    block = now,
                    balance = %account.start_balance,
                    amt_per_block = %account.amt_per_block,
                    receivers = account.weight_count,
                    "pool: sender updated"
                );
                self.senders.insert(*sender, account);
                self.latest_block = now;
                Ok(out)
            }
            Err(e) => {
                self.receivers.rollback();
                warn!(
                    sender = %sender.short(),
                    block = now,
                    error = %e,
                    "pool: sender update rejected"
                );
                Err(e)
            }
        }
    }
}

impl StreamingPool for FundingPool {
    fn update_sender(
        &mut self,
        sender: &AccountId,
        update: SenderUpdate,
        now: BlockNumber,
    ) -> Result<Amount, PoolError> {
        debug!(sender = %sender.short(), block = now, ?update, "pool: update_sender");
        self.with_sender(sender, now, |account| {
            if update.top_up > Amount::ZERO {
                account.add_balance(update.top_up)?;
            }
            if update.withdraw > Amount::ZERO {
                account.sub_balance(update.withdraw)?;
            }
            if let Some(amt_per_block) = update.amt_per_block {
                account.set_amt_per_block(amt_per_block)?;
            }
            for (receiver, weight) in &update.receivers {
                account.set_receiver_weight(*receiver, *weight)?;
            }
            Ok(update.withdraw)
        })
    }

    fn withdrawable(&self, sender: &AccountId, now: BlockNumber) -> Result<Amount, PoolError> {
        self.check_block(now)?;
        Ok(self
            .senders
            .get(sender)
            .map_or(Amount::ZERO, |s| s.withdrawable(now)))
    }

    fn collectable(&self, receiver: &AccountId, now: BlockNumber) -> Result<Amount, PoolError> {
        self.check_block(now)?;
        match self.receivers.get(receiver) {
            Some(account) => account.collectable(receiver, now, self.config.cycle_blocks),
            None => Ok(Amount::ZERO),
        }
    }

    fn collect(&mut self, receiver: &AccountId, now: BlockNumber) -> Result<Amount, PoolError> {
        self.check_block(now)?;
        if self.receivers.get(receiver).is_none() {
            self.latest_block = now;
            return Ok(Amount::ZERO);
        }
        let cycle_blocks = self.config.cycle_blocks;
        let amount = self
            .receivers
            .touch(*receiver)
            .collect(receiver, now, cycle_blocks)
            .inspect_err(|e| {
                warn!(receiver = %receiver.short(), block = now, error = %e, "pool: collect failed")
            })?;
        self.latest_block = now;
        if amount > Amount::ZERO {
            self.events.push(PoolEvent::Collected {
                receiver: *receiver,
                block: now,
                amount,
            });
            info!(receiver = %receiver.short(), block = now, amount = %amount, "pool: collected");
        }
        Ok(amount)
    }
}
