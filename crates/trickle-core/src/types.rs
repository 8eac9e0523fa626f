//! Core ledger types: identities, amounts, sender updates and events.
//!
//! Amounts are unsigned base units bounded by [`MAX_AMOUNT`](crate::constants::MAX_AMOUNT).
//! Per-cycle deltas are signed because a schedule is always written as a
//! matched positive/negative pair and the halves may land out of order.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub use ethnum::{I256, U256};

use crate::error::ConfigError;

/// Height of a block in the shared block sequence.
pub type BlockNumber = u64;

/// Index of a cycle. Cycle `c` (1-based) covers blocks `[(c-1)*L, c*L)`.
pub type Cycle = u64;

/// A non-negative amount of funds in base units.
pub type Amount = U256;

/// A signed adjustment to a per-cycle receiving rate.
pub type AmountDelta = I256;

/// A 32-byte account identity used for both senders and receivers.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct AccountId(pub [u8; 32]);

impl AccountId {
    /// Derive a stable identity from a human-readable label (BLAKE3 of the label).
    ///
    /// # Examples
    ///
    /// ```
    /// use trickle_core::types::AccountId;
    /// assert_eq!(AccountId::from_label("alice"), AccountId::from_label("alice"));
    /// assert_ne!(AccountId::from_label("alice"), AccountId::from_label("bob"));
    /// ```
    pub fn from_label(label: &str) -> Self {
        Self(*blake3::hash(label.as_bytes()).as_bytes())
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for AccountId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| ConfigError::InvalidAccountId(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ConfigError::InvalidAccountId(format!("{} bytes, expected 32", v.len()))
        })?;
        Ok(Self(arr))
    }
}

/// Wire form of an [`Amount`]: a JSON integer when it fits in `u64`, a
/// decimal string otherwise. Both forms are accepted when reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmountRepr(pub Amount);

impl Serialize for AmountRepr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (high, low) = self.0.into_words();
        if high == 0 && low <= u128::from(u64::MAX) {
            serializer.serialize_u64(low as u64)
        } else {
            serializer.collect_str(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for AmountRepr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor).map(AmountRepr)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer or a decimal string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount::from(v))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
        Ok(Amount::new(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        u64::try_from(v)
            .map(Amount::from)
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::from_str_radix(v, 10).map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }
}

/// `#[serde(with = ..)]` adapters for amount fields.
pub mod serde_amount {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{Amount, AmountRepr};

    pub fn serialize<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        AmountRepr(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        AmountRepr::deserialize(deserializer).map(|r| r.0)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Amount>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            value.map(AmountRepr).serialize(serializer)
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Amount>, D::Error> {
            Option::<AmountRepr>::deserialize(deserializer).map(|o| o.map(|r| r.0))
        }
    }

    pub mod map {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &BTreeMap<String, Amount>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.collect_map(value.iter().map(|(k, v)| (k, AmountRepr(*v))))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<BTreeMap<String, Amount>, D::Error> {
            let raw = BTreeMap::<String, AmountRepr>::deserialize(deserializer)?;
            Ok(raw.into_iter().map(|(k, r)| (k, r.0)).collect())
        }
    }
}

/// A batched change to one sender, applied inside a single stop/start bracket.
///
/// Order of application: top-up, withdrawal, rate, receiver weights.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SenderUpdate {
    /// Amount added to the sender's balance.
    #[serde(default, with = "serde_amount")]
    pub top_up: Amount,
    /// Amount removed from the sender's balance and returned to the caller.
    #[serde(default, with = "serde_amount")]
    pub withdraw: Amount,
    /// New target per-block rate. `None` leaves the rate unchanged.
    #[serde(default, with = "serde_amount::option")]
    pub amt_per_block: Option<Amount>,
    /// Receiver weight changes, applied in order. Weight 0 removes a receiver.
    #[serde(default)]
    pub receivers: Vec<(AccountId, u32)>,
}

impl SenderUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.top_up == Amount::ZERO
            && self.withdraw == Amount::ZERO
            && self.amt_per_block.is_none()
            && self.receivers.is_empty()
    }
}

/// Read-only copy of a sender's stored state plus derived projections.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct SenderSnapshot {
    pub start_block: BlockNumber,
    #[serde(with = "serde_amount")]
    pub start_balance: Amount,
    #[serde(with = "serde_amount")]
    pub amt_per_block: Amount,
    #[serde(with = "serde_amount")]
    pub effective_amt_per_block: Amount,
    pub weight_sum: u32,
    pub weight_count: u32,
    /// Block at which the current funding period runs dry, if active.
    pub end_block: Option<BlockNumber>,
}

/// Something observable that happened in the pool.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    /// A sender's state was changed by any mutating operation.
    SenderUpdated {
        sender: AccountId,
        block: BlockNumber,
        #[serde(with = "serde_amount")]
        balance: Amount,
        #[serde(with = "serde_amount")]
        amt_per_block: Amount,
    },
    /// A receiver collected funds.
    Collected {
        receiver: AccountId,
        block: BlockNumber,
        #[serde(with = "serde_amount")]
        amount: Amount,
    },
}
