//! Drives a [`FundingPool`] through a [`Scenario`] on a virtual block clock.
//!
//! The simulator tracks every unit entering (top-ups) and leaving
//! (withdrawals, collections) the pool so that a run can be checked for
//! conservation at the end. The check uses eventual balances: what each
//! sender keeps once its stream ends and everything scheduled to each
//! receiver, elapsed or not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trickle_core::error::{PoolError, TrickleError};
use trickle_core::traits::StreamingPool;
use trickle_core::types::{serde_amount, AccountId, Amount, BlockNumber, SenderUpdate};
use trickle_pool::FundingPool;

use crate::config::SimConfig;
use crate::scenario::{account, Action, Scenario};

/// Result of one scenario step.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    pub block: BlockNumber,
    pub action: String,
    /// Amount returned by the step, if it succeeded.
    #[serde(with = "serde_amount::option")]
    pub amount: Option<Amount>,
    /// Rejection reason, if it failed.
    pub error: Option<String>,
    /// Set when the step carried an expectation that was not met.
    #[serde(with = "serde_amount::option")]
    pub mismatch: Option<Amount>,
}

/// Flow totals and eventual balances for a conservation check.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Conservation {
    /// First block at which every scheduled cycle has elapsed. Saturates, so
    /// it may lie past the block horizon; cycles that never elapse are still
    /// counted in `outstanding`.
    pub settled_at: BlockNumber,
    #[serde(with = "serde_amount")]
    pub topped_up: Amount,
    #[serde(with = "serde_amount")]
    pub withdrawn: Amount,
    #[serde(with = "serde_amount")]
    pub collected: Amount,
    /// Sum of sender balances left once every stream has ended.
    #[serde(with = "serde_amount")]
    pub unsent: Amount,
    /// Sum of everything scheduled to receivers and not yet collected.
    #[serde(with = "serde_amount")]
    pub outstanding: Amount,
}

impl Conservation {
    /// Every unit topped up is either still held, paid out, or owed.
    pub fn is_balanced(&self) -> bool {
        [self.unsent, self.outstanding, self.withdrawn, self.collected]
            .into_iter()
            .try_fold(Amount::ZERO, Amount::checked_add)
            == Some(self.topped_up)
    }
}

/// Summary of a finished run.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SimReport {
    pub cycle_blocks: u64,
    pub outcomes: Vec<StepOutcome>,
    pub rejected: usize,
    pub mismatches: usize,
    /// Per-label balances at the last scenario block.
    #[serde(with = "serde_amount::map")]
    pub senders: BTreeMap<String, Amount>,
    #[serde(with = "serde_amount::map")]
    pub receivers: BTreeMap<String, Amount>,
    pub conservation: Conservation,
}

impl SimReport {
    /// No expectation failed and funds were conserved.
    pub fn passed(&self) -> bool {
        self.mismatches == 0 && self.conservation.is_balanced()
    }
}

/// Scenario runner owning the pool under test.
pub struct Simulator {
    pool: FundingPool,
    strict: bool,
    senders: BTreeMap<String, AccountId>,
    receivers: BTreeMap<String, AccountId>,
    totals: Conservation,
}

impl Simulator {
    /// Create a simulator. A cycle length in `scenario` overrides `config`.
    pub fn new(config: &SimConfig, scenario: &Scenario) -> Result<Self, TrickleError> {
        let config = SimConfig {
            cycle_blocks: scenario.cycle_blocks.unwrap_or(config.cycle_blocks),
            ..config.clone()
        };
        Ok(Self {
            pool: FundingPool::new(config.pool_config()?)?,
            strict: config.strict,
            senders: BTreeMap::new(),
            receivers: BTreeMap::new(),
            totals: Conservation::default(),
        })
    }

    pub fn pool(&self) -> &FundingPool {
        &self.pool
    }

    fn sender(&mut self, label: &str) -> AccountId {
        *self
            .senders
            .entry(label.to_string())
            .or_insert_with(|| account(label))
    }

    fn receiver(&mut self, label: &str) -> AccountId {
        *self
            .receivers
            .entry(label.to_string())
            .or_insert_with(|| account(label))
    }

    /// Apply one action at `now` and account for funds moving in or out.
    pub fn apply(&mut self, action: &Action, now: BlockNumber) -> Result<Amount, PoolError> {
        match action {
            Action::TopUp { sender, amount } => {
                let id = self.sender(sender);
                self.pool.top_up(&id, *amount, now)?;
                self.totals.topped_up += *amount;
                Ok(*amount)
            }
            Action::Withdraw { sender, amount } => {
                let id = self.sender(sender);
                let out = self.pool.withdraw(&id, *amount, now)?;
                self.totals.withdrawn += out;
                Ok(out)
            }
            Action::SetAmountPerBlock { sender, amt_per_block } => {
                let id = self.sender(sender);
                self.pool.set_amount_per_block(&id, *amt_per_block, now)?;
                Ok(Amount::ZERO)
            }
            Action::SetReceiverWeight { sender, receiver, weight } => {
                let id = self.sender(sender);
                let to = self.receiver(receiver);
                self.pool.set_receiver_weight(&id, &to, *weight, now)?;
                Ok(Amount::ZERO)
            }
            Action::Update { sender, top_up, withdraw, amt_per_block, receivers } => {
                let id = self.sender(sender);
                let receivers = receivers
                    .iter()
                    .map(|(label, weight)| (self.receiver(label), *weight))
                    .collect();
                let update = SenderUpdate {
                    top_up: *top_up,
                    withdraw: *withdraw,
                    amt_per_block: *amt_per_block,
                    receivers,
                };
                let out = self.pool.update_sender(&id, update, now)?;
                self.totals.topped_up += *top_up;
                self.totals.withdrawn += out;
                Ok(out)
            }
            Action::Collect { receiver } => {
                let id = self.receiver(receiver);
                let out = self.pool.collect(&id, now)?;
                self.totals.collected += out;
                Ok(out)
            }
            Action::Withdrawable { sender } => {
                let id = self.sender(sender);
                self.pool.withdrawable(&id, now)
            }
            Action::Collectable { receiver } => {
                let id = self.receiver(receiver);
                self.pool.collectable(&id, now)
            }
        }
    }

    /// Run every step of `scenario` and build a report.
    pub fn run(&mut self, scenario: &Scenario) -> Result<SimReport, TrickleError> {
        scenario.validate()?;
        let mut outcomes = Vec::with_capacity(scenario.steps.len());
        for step in &scenario.steps {
            let mut outcome = StepOutcome {
                block: step.block,
                action: step.action.to_string(),
                amount: None,
                error: None,
                mismatch: None,
            };
            match self.apply(&step.action, step.block) {
                Ok(amount) => {
                    debug!(block = step.block, action = %step.action, %amount, "sim: step");
                    outcome.amount = Some(amount);
                    if step.expect.is_some_and(|e| e != amount) {
                        warn!(
                            block = step.block,
                            action = %step.action,
                            %amount,
                            expected = ?step.expect,
                            "sim: expectation failed"
                        );
                        outcome.mismatch = step.expect;
                    }
                }
                Err(e) => {
                    if self.strict {
                        return Err(e.into());
                    }
                    outcome.error = Some(e.to_string());
                    if step.expect.is_some() {
                        outcome.mismatch = step.expect;
                    }
                }
            }
            outcomes.push(outcome);
        }

        let now = scenario.last_block().max(self.pool.latest_block());
        let senders = self.balances(&self.senders, now, |p, id| p.withdrawable(id, now))?;
        let receivers = self.balances(&self.receivers, now, |p, id| p.collectable(id, now))?;
        let conservation = self.conservation()?;

        let report = SimReport {
            cycle_blocks: self.pool.cycle_blocks(),
            rejected: outcomes.iter().filter(|o| o.error.is_some()).count(),
            mismatches: outcomes.iter().filter(|o| o.mismatch.is_some()).count(),
            outcomes,
            senders,
            receivers,
            conservation,
        };
        info!(
            steps = report.outcomes.len(),
            rejected = report.rejected,
            mismatches = report.mismatches,
            balanced = report.conservation.is_balanced(),
            "sim: run complete"
        );
        Ok(report)
    }

    fn balances(
        &self,
        labels: &BTreeMap<String, AccountId>,
        now: BlockNumber,
        read: impl Fn(&FundingPool, &AccountId) -> Result<Amount, PoolError>,
    ) -> Result<BTreeMap<String, Amount>, TrickleError> {
        debug!(now, accounts = labels.len(), "sim: reading balances");
        labels
            .iter()
            .map(|(label, id)| Ok((label.clone(), read(&self.pool, id)?)))
            .collect()
    }

    /// Flow totals plus the balances every account ends up with once all
    /// running streams have finished.
    pub fn conservation(&self) -> Result<Conservation, TrickleError> {
        let cycle_blocks = self.pool.cycle_blocks();
        let last_end = self
            .pool
            .sender_ids()
            .filter_map(|id| self.pool.sender(id).and_then(|s| s.end_block()))
            .max()
            .unwrap_or(0);
        let settled_at = last_end
            .max(self.pool.latest_block())
            .div_ceil(cycle_blocks)
            .saturating_mul(cycle_blocks);

        let mut totals = Conservation {
            settled_at,
            ..self.totals.clone()
        };
        for id in self.pool.sender_ids() {
            totals.unsent += self.pool.residual(id);
        }
        for id in self.pool.receiver_ids() {
            totals.outstanding += self.pool.outstanding(id)?;
        }
        debug!(
            settled_at,
            unsent = %totals.unsent,
            outstanding = %totals.outstanding,
            "sim: conservation"
        );
        Ok(totals)
    }
}
