use crate::domain::{AccountKeys, ChargeOutcome, Connection, LedgerError};
use crate::strategy::read_balance;

/// Plain read, compare, write.
///
/// Nothing isolates the read from the write: two callers that read the same
/// balance both pass the check and the second write overwrites the first.
pub async fn charge<C: Connection>(
    conn: &mut C,
    keys: &AccountKeys,
    amount: i64,
) -> Result<ChargeOutcome, LedgerError> {
    let balance = read_balance(conn, &keys.balance).await?;

    if !balance.covers(amount) {
        return Ok(ChargeOutcome::Insufficient { balance });
    }

    conn.set(&keys.balance, &balance.after_charge(amount).to_store_string())
        .await?;
    let remaining_balance = read_balance(conn, &keys.balance).await?;

    Ok(ChargeOutcome::Authorized {
        remaining_balance,
        charges: amount,
    })
}
