use serde::Serialize;

use crate::domain::Balance;

/// Typed outcome of one charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOutcome {
    /// The debit committed. `remaining_balance` is re-read after the commit.
    Authorized {
        remaining_balance: Balance,
        charges: i64,
    },
    /// The balance observed at read time could not cover the charge.
    Insufficient { balance: Balance },
    /// Every attempt lost to a concurrent writer or lock holder.
    ContentionExhausted { attempts: u32 },
}

impl ChargeOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, ChargeOutcome::Authorized { .. })
    }
}

/// Wire shape returned to callers of `/charge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResult {
    pub is_authorized: bool,
    pub remaining_balance: Balance,
    pub charges: i64,
}

impl From<ChargeOutcome> for ChargeResult {
    fn from(outcome: ChargeOutcome) -> Self {
        match outcome {
            ChargeOutcome::Authorized {
                remaining_balance,
                charges,
            } => Self {
                is_authorized: true,
                remaining_balance,
                charges,
            },
            ChargeOutcome::Insufficient { balance } => Self {
                is_authorized: false,
                remaining_balance: balance,
                charges: 0,
            },
            // The balance is unknown here; the wire keeps the historical zero.
            ChargeOutcome::ContentionExhausted { .. } => Self {
                is_authorized: false,
                remaining_balance: Balance::zero(),
                charges: 0,
            },
        }
    }
}
