//! Receiver accounts and the journaled receiver table.
//!
//! A receiver's balance is never stored. It is the running sum of its delta
//! table, folded lazily up to the last fully elapsed cycle whenever the
//! receiver is read or collects.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;
use trickle_core::error::PoolError;
use trickle_core::types::{AccountId, Amount, AmountDelta, BlockNumber, Cycle};

/// Receiving side of the ledger for one identity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiverAccount {
    /// First cycle not yet folded into `last_funds_per_cycle`. 0 = never funded.
    pub(crate) next_collected_cycle: Cycle,
    /// Per-cycle amount as of the last folded cycle.
    pub(crate) last_funds_per_cycle: AmountDelta,
    /// Signed per-cycle rate adjustments, keyed by the cycle they take effect.
    pub(crate) amt_deltas: BTreeMap<Cycle, AmountDelta>,
}

/// Outcome of folding a receiver's deltas up to some cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Fold {
    total: Amount,
    last_funds_per_cycle: AmountDelta,
    /// Last cycle included in `total`.
    through: Cycle,
}

impl ReceiverAccount {
    /// First cycle that has not been collected yet (0 if never funded).
    pub fn next_collected_cycle(&self) -> Cycle {
        self.next_collected_cycle
    }

    /// Number of pending entries in the delta table.
    pub fn pending_deltas(&self) -> usize {
        self.amt_deltas.len()
    }

    /// Fold cycles `next_collected_cycle..=through`.
    ///
    /// Runs of cycles without a delta share one multiplication, so the cost
    /// is proportional to the number of pending deltas in range.
    fn fold(&self, owner: &AccountId, through: Cycle) -> Result<Option<Fold>, PoolError> {
        let start = self.next_collected_cycle;
        if start == 0 || start > through {
            return Ok(None);
        }

        let mut rate = self.last_funds_per_cycle;
        let mut total = AmountDelta::ZERO;
        let mut cycle = start;
        for (&delta_cycle, &delta) in self.amt_deltas.range(start..=through) {
            total = accumulate(total, rate, delta_cycle - cycle)?;
            rate = rate.checked_add(delta).ok_or(PoolError::ArithmeticOverflow)?;
            if rate < AmountDelta::ZERO {
                return Err(PoolError::NegativeBalance(*owner));
            }
            cycle = delta_cycle;
        }
        total = accumulate(total, rate, through + 1 - cycle)?;
        if total < AmountDelta::ZERO {
            return Err(PoolError::NegativeBalance(*owner));
        }

        Ok(Some(Fold {
            total: total.as_u256(),
            last_funds_per_cycle: rate,
            through,
        }))
    }

    /// Amount collectable at `now` without changing any state.
    pub fn collectable(
        &self,
        owner: &AccountId,
        now: BlockNumber,
        cycle_blocks: u64,
    ) -> Result<Amount, PoolError> {
        let fold = self.fold(owner, now / cycle_blocks)?;
        Ok(fold.map_or(Amount::ZERO, |f| f.total))
    }

    /// Everything scheduled to this receiver and not yet collected, including
    /// cycles that have not elapsed yet.
    ///
    /// Every schedule is a bounded pulse, so the running rate is back at zero
    /// after the last pending delta.
    pub fn outstanding(&self, owner: &AccountId) -> Result<Amount, PoolError> {
        let Some((&last, _)) = self.amt_deltas.last_key_value() else {
            return Ok(Amount::ZERO);
        };
        let fold = self.fold(owner, last)?;
        Ok(fold.map_or(Amount::ZERO, |f| f.total))
    }

    /// Fold, persist the new running rate and drop consumed deltas.
    pub fn collect(
        &mut self,
        owner: &AccountId,
        now: BlockNumber,
        cycle_blocks: u64,
    ) -> Result<Amount, PoolError> {
        let Some(fold) = self.fold(owner, now / cycle_blocks)? else {
            return Ok(Amount::ZERO);
        };
        self.last_funds_per_cycle = fold.last_funds_per_cycle;
        self.next_collected_cycle = fold.through + 1;
        self.amt_deltas = self.amt_deltas.split_off(&self.next_collected_cycle);
        Ok(fold.total)
    }
}

fn accumulate(
    total: AmountDelta,
    rate: AmountDelta,
    cycles: u64,
) -> Result<AmountDelta, PoolError> {
    rate.checked_mul(AmountDelta::from(i128::from(cycles)))
        .and_then(|amt| total.checked_add(amt))
        .ok_or(PoolError::ArithmeticOverflow)
}

/// All receiver accounts, with an undo journal for atomic multi-account updates.
///
/// Between [`begin`](Self::begin) and [`commit`](Self::commit) every account
/// handed out by [`touch`](Self::touch) is snapshotted on first access, so a
/// failed operation can be reverted with [`rollback`](Self::rollback).
#[derive(Clone, Debug, Default)]
pub struct ReceiverLedger {
    accounts: HashMap<AccountId, ReceiverAccount>,
    journal: Vec<(AccountId, Option<ReceiverAccount>)>,
    journaled: HashSet<AccountId>,
    in_tx: bool,
}

impl ReceiverLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an account.
    pub fn get(&self, id: &AccountId) -> Option<&ReceiverAccount> {
        self.accounts.get(id)
    }

    /// Iterate over all receiver ids.
    pub fn ids(&self) -> impl Iterator<Item = &AccountId> {
        self.accounts.keys()
    }

    /// Start journaling. Any previous journal is discarded.
    pub fn begin(&mut self) {
        self.journal.clear();
        self.journaled.clear();
        self.in_tx = true;
    }

    /// Mutable access to an account, creating it on first write.
    pub fn touch(&mut self, id: AccountId) -> &mut ReceiverAccount {
        if self.in_tx && self.journaled.insert(id) {
            self.journal.push((id, self.accounts.get(&id).cloned()));
        }
        self.accounts.entry(id).or_default()
    }

    /// Keep all changes made since [`begin`](Self::begin).
    pub fn commit(&mut self) {
        self.journal.clear();
        self.journaled.clear();
        self.in_tx = false;
    }

    /// Restore every account touched since [`begin`](Self::begin).
    pub fn rollback(&mut self) {
        let restored = self.journal.len();
        for (id, snapshot) in self.journal.drain(..).rev() {
            match snapshot {
                Some(account) => {
                    self.accounts.insert(id, account);
                }
                None => {
                    self.accounts.remove(&id);
                }
            }
        }
        self.journaled.clear();
        self.in_tx = false;
        debug!(restored, "receivers: rolled back");
    }
}
