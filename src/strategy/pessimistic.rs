use std::time::Duration;

use tracing::debug;

use crate::domain::{
    AccountKeys, Balance, ChargeOutcome, Connection, LOCK_SENTINEL, LedgerError, Reply,
    Transaction,
};
use crate::strategy::read_balance;

/// Lock acquisition budget for the pessimistic strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Lifetime of the lock key; frees the account if a holder dies.
    pub ttl: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            ttl: Duration::from_secs(10),
        }
    }
}

/// What a failed attempt saw.
#[derive(Debug, Clone, Copy)]
enum Blocked {
    Insufficient(Balance),
    Contended,
}

/// Take `<account>/lock`, debit the balance, release the lock.
///
/// An attempt fails when the balance cannot cover the charge, when the lock
/// is already held, or when the lock or balance key changes while acquiring
/// the lock. Failed attempts wait `retry_delay` and try again, up to
/// `max_attempts`.
///
/// When the last attempt saw too small a balance the outcome is
/// `Insufficient` carrying that balance, so the wire result reports it
/// instead of a zero `remainingBalance`.
pub async fn charge<C: Connection>(
    conn: &mut C,
    keys: &AccountKeys,
    amount: i64,
    policy: &LockPolicy,
) -> Result<ChargeOutcome, LedgerError> {
    let mut last_blocked = Blocked::Contended;

    for attempt in 1..=policy.max_attempts {
        conn.watch(&keys.lock).await?;
        conn.watch(&keys.balance).await?;
        let balance = read_balance(conn, &keys.balance).await?;

        if balance.covers(amount) {
            let acquire =
                Transaction::new().set_if_absent(&keys.lock, LOCK_SENTINEL, Some(policy.ttl));

            match conn.exec(acquire).await? {
                Some(replies) if replies.first().and_then(Reply::as_bool) == Some(true) => {
                    return debit_and_release(conn, keys, amount).await;
                }
                Some(_) => debug!(key = %keys.lock, attempt, "lock held elsewhere"),
                None => debug!(key = %keys.balance, attempt, "account changed while locking"),
            }
            last_blocked = Blocked::Contended;
        } else {
            conn.unwatch().await?;
            last_blocked = Blocked::Insufficient(balance);
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    Ok(match last_blocked {
        Blocked::Insufficient(balance) => ChargeOutcome::Insufficient { balance },
        Blocked::Contended => ChargeOutcome::ContentionExhausted {
            attempts: policy.max_attempts,
        },
    })
}

/// Runs with the lock held. Writers that skip the lock can still move the
/// balance, so the debit is committed against a watched, freshly read value.
async fn debit_and_release<C: Connection>(
    conn: &mut C,
    keys: &AccountKeys,
    amount: i64,
) -> Result<ChargeOutcome, LedgerError> {
    loop {
        conn.watch(&keys.balance).await?;
        let balance = read_balance(conn, &keys.balance).await?;

        if !balance.covers(amount) {
            conn.unwatch().await?;
            conn.del(&keys.lock).await?;
            return Ok(ChargeOutcome::Insufficient { balance });
        }

        let remaining_balance = balance.after_charge(amount);
        let debit = Transaction::new()
            .set(&keys.balance, remaining_balance.to_store_string())
            .del(&keys.lock);

        if conn.exec(debit).await?.is_some() {
            return Ok(ChargeOutcome::Authorized {
                remaining_balance,
                charges: amount,
            });
        }
        debug!(key = %keys.balance, "balance written around the lock, re-reading");
    }
}
