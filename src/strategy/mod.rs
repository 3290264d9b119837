//! Charge strategies.
//!
//! Each strategy runs against a single, already-open connection. Opening and
//! releasing that connection is the ledger's job.

pub mod naive;
pub mod optimistic;
pub mod pessimistic;

use std::str::FromStr;

use serde::Deserialize;

use crate::domain::{Balance, Connection, LedgerError, StoreError};

pub use optimistic::RetryPolicy;
pub use pessimistic::LockPolicy;

/// How concurrent charges against one account are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Unsynchronized read-modify-write. Loses updates under concurrency.
    Naive,
    /// Watch the balance and commit with a conditional transaction.
    #[default]
    #[serde(alias = "cas")]
    Optimistic,
    /// Take a TTL'd lock key before touching the balance.
    #[serde(alias = "lock")]
    Pessimistic,
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(Strategy::Naive),
            "optimistic" | "cas" => Ok(Strategy::Optimistic),
            "pessimistic" | "lock" => Ok(Strategy::Pessimistic),
            other => Err(other.to_string()),
        }
    }
}

impl core::fmt::Display for Strategy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Strategy::Naive => "naive",
            Strategy::Optimistic => "optimistic",
            Strategy::Pessimistic => "pessimistic",
        };
        f.write_str(name)
    }
}

/// Reads the balance stored at `key`. A missing key reads as zero.
pub(crate) async fn read_balance<C: Connection>(
    conn: &mut C,
    key: &str,
) -> Result<Balance, LedgerError> {
    match conn.get(key).await? {
        None => Ok(Balance::zero()),
        Some(raw) => Balance::from_store_str(&raw).ok_or_else(|| {
            LedgerError::Store(StoreError::InvalidValue {
                key: key.to_string(),
                value: raw,
            })
        }),
    }
}
