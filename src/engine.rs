use tracing::{debug, warn};

use crate::domain::{AccountKeys, Balance, ChargeOutcome, Connection, LedgerError, Store};
use crate::strategy::{
    LockPolicy, RetryPolicy, Strategy, naive, optimistic, pessimistic, read_balance,
};

/// Tunables shared by every operation of a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Balance written by `reset`.
    pub default_balance: Balance,
    pub retry: RetryPolicy,
    pub lock: LockPolicy,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_balance: Balance(100),
            retry: RetryPolicy::default(),
            lock: LockPolicy::default(),
        }
    }
}

/// Balance operations on accounts held in a shared store.
///
/// Every operation opens its own connection and releases it when it returns,
/// whichever way it returns. All coordination between concurrent operations
/// happens in the store.
#[derive(Debug)]
pub struct Ledger<S>
where
    S: Store,
{
    store: S,
    settings: LedgerSettings,
}

impl<S> Ledger<S>
where
    S: Store,
{
    pub fn new(store: S, settings: LedgerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &LedgerSettings {
        &self.settings
    }

    /// Overwrites the balance with the default. Not synchronized with charges.
    pub async fn reset(&self, account: &str) -> Result<(), LedgerError> {
        let keys = AccountKeys::new(account);
        let mut conn = self.store.connect().await?;

        conn.set(&keys.balance, &self.settings.default_balance.to_store_string())
            .await?;

        Ok(())
    }

    pub async fn balance(&self, account: &str) -> Result<Balance, LedgerError> {
        let keys = AccountKeys::new(account);
        let mut conn = self.store.connect().await?;
        read_balance(&mut conn, &keys.balance).await
    }

    pub async fn charge(
        &self,
        strategy: Strategy,
        account: &str,
        amount: i64,
    ) -> Result<ChargeOutcome, LedgerError> {
        if amount < 0 {
            return Err(LedgerError::NegativeCharge(amount));
        }

        let keys = AccountKeys::new(account);
        let mut conn = self.store.connect().await?;

        let outcome = match strategy {
            Strategy::Naive => naive::charge(&mut conn, &keys, amount).await?,
            Strategy::Optimistic => {
                optimistic::charge(&mut conn, &keys, amount, &self.settings.retry).await?
            }
            Strategy::Pessimistic => {
                pessimistic::charge(&mut conn, &keys, amount, &self.settings.lock).await?
            }
        };

        match outcome {
            ChargeOutcome::ContentionExhausted { attempts } => {
                warn!(account, %strategy, attempts, "gave up charging under contention")
            }
            _ => debug!(account, %strategy, ?outcome, "charge finished"),
        }

        Ok(outcome)
    }

    pub async fn charge_naive(
        &self,
        account: &str,
        amount: i64,
    ) -> Result<ChargeOutcome, LedgerError> {
        self.charge(Strategy::Naive, account, amount).await
    }

    pub async fn charge_optimistic(
        &self,
        account: &str,
        amount: i64,
    ) -> Result<ChargeOutcome, LedgerError> {
        self.charge(Strategy::Optimistic, account, amount).await
    }

    pub async fn charge_pessimistic(
        &self,
        account: &str,
        amount: i64,
    ) -> Result<ChargeOutcome, LedgerError> {
        self.charge(Strategy::Pessimistic, account, amount).await
    }
}
