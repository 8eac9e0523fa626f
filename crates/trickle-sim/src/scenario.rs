//! Scenario scripts: timed sender/receiver actions with optional expectations.
//!
//! Accounts are named by label. A label that is 64 hex characters is taken as
//! a raw [`AccountId`]; anything else is hashed with
//! [`AccountId::from_label`].

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use trickle_core::error::TrickleError;
use trickle_core::types::{serde_amount, AccountId, Amount, BlockNumber};

/// One operation against the pool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    TopUp {
        sender: String,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    Withdraw {
        sender: String,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
    SetAmountPerBlock {
        sender: String,
        #[serde(with = "serde_amount")]
        amt_per_block: Amount,
    },
    SetReceiverWeight { sender: String, receiver: String, weight: u32 },
    /// Batched sender update in a single stop/start bracket.
    Update {
        sender: String,
        #[serde(default, with = "serde_amount")]
        top_up: Amount,
        #[serde(default, with = "serde_amount")]
        withdraw: Amount,
        #[serde(default, with = "serde_amount::option")]
        amt_per_block: Option<Amount>,
        #[serde(default)]
        receivers: Vec<(String, u32)>,
    },
    Collect { receiver: String },
    /// Read-only: sender's unsent balance.
    Withdrawable { sender: String },
    /// Read-only: receiver's claimable balance.
    Collectable { receiver: String },
}

impl Action {
    /// Whether the action only reads state.
    pub fn is_query(&self) -> bool {
        matches!(self, Self::Withdrawable { .. } | Self::Collectable { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopUp { sender, amount } => write!(f, "{sender} top_up {amount}"),
            Self::Withdraw { sender, amount } => write!(f, "{sender} withdraw {amount}"),
            Self::SetAmountPerBlock { sender, amt_per_block } => {
                write!(f, "{sender} set_amount_per_block {amt_per_block}")
            }
            Self::SetReceiverWeight { sender, receiver, weight } => {
                write!(f, "{sender} set_receiver_weight {receiver}={weight}")
            }
            Self::Update { sender, receivers, .. } => {
                write!(f, "{sender} update ({} receivers)", receivers.len())
            }
            Self::Collect { receiver } => write!(f, "{receiver} collect"),
            Self::Withdrawable { sender } => write!(f, "{sender} withdrawable"),
            Self::Collectable { receiver } => write!(f, "{receiver} collectable"),
        }
    }
}

/// An action at a given block, optionally asserting its returned amount.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Step {
    pub block: BlockNumber,
    pub action: Action,
    /// Expected amount returned by the action (withdrawn, collected or queried).
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_amount::option")]
    pub expect: Option<Amount>,
}

/// A full script. Steps must be ordered by non-decreasing block.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Scenario {
    /// Overrides the configured cycle length when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_blocks: Option<u64>,
    pub steps: Vec<Step>,
}

/// Resolve a scenario label to an account id.
pub fn account(label: &str) -> AccountId {
    if label.len() == 64 {
        if let Ok(id) = label.parse() {
            return id;
        }
    }
    AccountId::from_label(label)
}

impl Scenario {
    /// Parse a scenario from JSON.
    pub fn from_json(json: &str) -> Result<Self, TrickleError> {
        let scenario: Self =
            serde_json::from_str(json).map_err(|e| TrickleError::Scenario(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn to_json_pretty(&self) -> Result<String, TrickleError> {
        serde_json::to_string_pretty(self).map_err(|e| TrickleError::Scenario(e.to_string()))
    }

    /// Check block ordering.
    pub fn validate(&self) -> Result<(), TrickleError> {
        for (i, pair) in self.steps.windows(2).enumerate() {
            if pair[1].block < pair[0].block {
                return Err(TrickleError::Scenario(format!(
                    "step {} at block {} precedes step {} at block {}",
                    i + 1,
                    pair[1].block,
                    i,
                    pair[0].block
                )));
            }
        }
        Ok(())
    }

    /// Last block referenced by any step.
    pub fn last_block(&self) -> BlockNumber {
        self.steps.last().map_or(0, |s| s.block)
    }

    /// The reference example: 1000 units at 10/block to a single receiver.
    pub fn example() -> Self {
        let step = |block, action, expect: Option<u128>| Step {
            block,
            action,
            expect: expect.map(Amount::new),
        };
        let alice = || String::from("alice");
        let bob = || String::from("bob");
        Self {
            cycle_blocks: Some(10),
            steps: vec![
                step(0, Action::TopUp { sender: alice(), amount: Amount::new(1_000) }, None),
                step(
                    0,
                    Action::SetAmountPerBlock { sender: alice(), amt_per_block: Amount::new(10) },
                    None,
                ),
                step(
                    0,
                    Action::SetReceiverWeight { sender: alice(), receiver: bob(), weight: 1 },
                    None,
                ),
                step(25, Action::Withdrawable { sender: alice() }, Some(750)),
                step(31, Action::Collectable { receiver: bob() }, Some(300)),
                step(31, Action::Collect { receiver: bob() }, Some(300)),
                step(31, Action::Collect { receiver: bob() }, Some(0)),
            ],
        }
    }

    /// A reproducible random scenario over `senders` senders and `receivers`
    /// receivers, `steps` mutating steps long.
    pub fn random(seed: u64, senders: usize, receivers: usize, steps: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let senders = senders.max(1);
        let receivers = receivers.max(1);
        let mut block = 0;
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            block += rng.gen_range(0..15);
            let sender = format!("sender-{}", rng.gen_range(0..senders));
            let receiver = format!("receiver-{}", rng.gen_range(0..receivers));
            let action = match rng.gen_range(0..6) {
                0 | 1 => Action::TopUp { sender, amount: Amount::new(rng.gen_range(0..10_000)) },
                2 => Action::Withdraw { sender, amount: Amount::new(rng.gen_range(0..2_000)) },
                3 => {
                    let amt_per_block = Amount::new(rng.gen_range(0..200));
                    Action::SetAmountPerBlock { sender, amt_per_block }
                }
                4 => Action::SetReceiverWeight { sender, receiver, weight: rng.gen_range(0..30) },
                _ => Action::Collect { receiver },
            };
            out.push(Step { block, action, expect: None });
        }
        Self { cycle_blocks: Some(rng.gen_range(1..20)), steps: out }
    }
}
