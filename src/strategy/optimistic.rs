use std::time::Duration;

use rand::Rng;
use tracing::debug;

use crate::domain::{AccountKeys, ChargeOutcome, Connection, LedgerError, Transaction};
use crate::strategy::read_balance;

/// Retry budget for the compare-and-swap loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// `None` retries until the transaction commits.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Upper bound of the wait after the `attempt`-th conflict.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1 << doublings)
            .min(self.max_delay)
    }

    /// Full jitter: uniform in `[0, backoff_ceiling(attempt)]`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_micros() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=ceiling))
    }
}

/// Watch the balance, read it, and commit the debit in a transaction that the
/// store discards if the balance changed in between. Conflicts restart the
/// loop; store errors end it.
pub async fn charge<C: Connection>(
    conn: &mut C,
    keys: &AccountKeys,
    amount: i64,
    policy: &RetryPolicy,
) -> Result<ChargeOutcome, LedgerError> {
    let mut attempts = 0;

    loop {
        attempts += 1;

        conn.watch(&keys.balance).await?;
        let balance = read_balance(conn, &keys.balance).await?;

        if !balance.covers(amount) {
            conn.unwatch().await?;
            return Ok(ChargeOutcome::Insufficient { balance });
        }

        let debit =
            Transaction::new().set(&keys.balance, balance.after_charge(amount).to_store_string());

        if conn.exec(debit).await?.is_some() {
            let remaining_balance = read_balance(conn, &keys.balance).await?;
            return Ok(ChargeOutcome::Authorized {
                remaining_balance,
                charges: amount,
            });
        }

        if policy.exhausted(attempts) {
            return Ok(ChargeOutcome::ContentionExhausted { attempts });
        }

        let delay = policy.backoff(attempts);
        debug!(key = %keys.balance, attempts, ?delay, "balance changed before commit, retrying");
        tokio::time::sleep(delay).await;
    }
}
