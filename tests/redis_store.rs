//! Runs the charge protocols against a real Redis server.
//!
//! Skipped unless `LEDGER_TEST_REDIS_URL` points at a server the tests may
//! write to, e.g. `redis://localhost:6379`.

use std::sync::Arc;

use balance_ledger::domain::{Connection, Store};
use balance_ledger::{Balance, ChargeOutcome, Ledger, LedgerSettings, RedisStore, Strategy};
use futures::future::join_all;

fn ledger() -> Option<Arc<Ledger<RedisStore>>> {
    let url = std::env::var("LEDGER_TEST_REDIS_URL").ok()?;
    let store = RedisStore::open(&url).expect("valid redis url");
    Some(Arc::new(Ledger::new(store, LedgerSettings::default())))
}

fn account(name: &str) -> String {
    format!("ledger-test-{}-{name}", std::process::id())
}

async fn charge_concurrently(
    ledger: &Arc<Ledger<RedisStore>>,
    account: &str,
    strategies: &[Strategy],
    amount: i64,
) -> Vec<ChargeOutcome> {
    let handles = strategies.iter().map(|&strategy| {
        let ledger = Arc::clone(ledger);
        let account = account.to_string();
        tokio::spawn(async move { ledger.charge(strategy, &account, amount).await })
    });

    join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect()
}

#[tokio::test]
async fn optimistic_charges_commit_against_redis() {
    let Some(ledger) = ledger() else { return };
    let account = account("optimistic");
    ledger.reset(&account).await.unwrap();

    let outcomes =
        charge_concurrently(&ledger, &account, &[Strategy::Optimistic; 9], 10).await;

    assert!(outcomes.iter().all(ChargeOutcome::is_authorized));
    assert_eq!(ledger.balance(&account).await.unwrap(), Balance(10));
}

#[tokio::test]
async fn mixed_strategies_keep_the_books_balanced_against_redis() {
    let Some(ledger) = ledger() else { return };
    let account = account("mixed");
    ledger.reset(&account).await.unwrap();

    let strategies = [
        Strategy::Pessimistic,
        Strategy::Optimistic,
        Strategy::Pessimistic,
        Strategy::Optimistic,
    ];
    let outcomes = charge_concurrently(&ledger, &account, &strategies, 20).await;

    let authorized = outcomes.iter().filter(|o| o.is_authorized()).count() as i64;
    assert_eq!(
        ledger.balance(&account).await.unwrap(),
        Balance(100 - 20 * authorized)
    );
}

#[tokio::test]
async fn pessimistic_charge_releases_the_lock_on_redis() {
    let Some(ledger) = ledger() else { return };
    let account = account("lock");
    ledger.reset(&account).await.unwrap();

    let outcome = ledger.charge_pessimistic(&account, 10).await.unwrap();

    assert!(outcome.is_authorized());
    assert_eq!(ledger.balance(&account).await.unwrap(), Balance(90));
    let mut conn = ledger.store().connect().await.unwrap();
    assert_eq!(conn.get(&format!("{account}/lock")).await.unwrap(), None);
}
