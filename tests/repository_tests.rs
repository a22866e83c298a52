mod common;

use point_ledger::models::TransactionKind;
use point_ledger::repositories::{BalanceStore, HistoryStore, PostgresBalanceStore, PostgresHistoryStore};
use point_ledger::services::AccountLedger;
use std::sync::Arc;

// Ids in the upper range keep these tests clear of manual data.
const BALANCE_ACCOUNT: i64 = 900_001;
const HISTORY_ACCOUNT: i64 = 900_002;
const LEDGER_ACCOUNT: i64 = 900_003;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_balance_store_upsert() {
    let pool = common::setup_test_db().await;
    common::cleanup_account(&pool, BALANCE_ACCOUNT).await;

    let store = PostgresBalanceStore::new(pool.clone());

    let unseen = store.get(BALANCE_ACCOUNT).await.expect("Failed to read balance");
    assert_eq!(unseen.balance, 0);

    let first = store.put(BALANCE_ACCOUNT, 1_500).await.expect("Failed to insert");
    assert_eq!(first.balance, 1_500);

    let second = store.put(BALANCE_ACCOUNT, 700).await.expect("Failed to update");
    assert_eq!(second.balance, 700);
    assert!(second.updated_at >= first.updated_at);

    let found = store.get(BALANCE_ACCOUNT).await.unwrap();
    assert_eq!(found.balance, 700);

    common::cleanup_account(&pool, BALANCE_ACCOUNT).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_balance_store_rejects_negative_balance() {
    let pool = common::setup_test_db().await;
    common::cleanup_account(&pool, BALANCE_ACCOUNT).await;

    let store = PostgresBalanceStore::new(pool.clone());
    let err = store.put(BALANCE_ACCOUNT, -1).await.unwrap_err();
    assert_eq!(err.code(), "DATABASE_ERROR");

    common::cleanup_account(&pool, BALANCE_ACCOUNT).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_history_store_append_and_list() {
    let pool = common::setup_test_db().await;
    common::cleanup_account(&pool, HISTORY_ACCOUNT).await;

    let store = PostgresHistoryStore::new(pool.clone());
    assert!(store.list(HISTORY_ACCOUNT).await.unwrap().is_empty());

    let now = chrono::Utc::now();
    let charge = store
        .append(HISTORY_ACCOUNT, 1_000, TransactionKind::Charge, now)
        .await
        .expect("Failed to append charge");
    let spend = store
        .append(HISTORY_ACCOUNT, 400, TransactionKind::Use, now)
        .await
        .expect("Failed to append use");
    assert!(spend.id > charge.id);

    let records = store.list(HISTORY_ACCOUNT).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, TransactionKind::Charge);
    assert_eq!(records[1].kind, TransactionKind::Use);
    assert_eq!(records[1].amount, 400);

    common::cleanup_account(&pool, HISTORY_ACCOUNT).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn test_ledger_over_postgres_under_contention() {
    let pool = common::setup_test_db().await;
    common::cleanup_account(&pool, LEDGER_ACCOUNT).await;

    let ledger = Arc::new(AccountLedger::new(
        Arc::new(PostgresBalanceStore::new(pool.clone())),
        Arc::new(PostgresHistoryStore::new(pool.clone())),
    ));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.charge(LEDGER_ACCOUNT, 100).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().expect("Failed to charge");
    }

    let report = ledger.reconcile(LEDGER_ACCOUNT).await.unwrap();
    assert_eq!(report.stored_balance, 5_000);
    assert_eq!(report.record_count, 50);
    assert!(report.consistent);

    common::cleanup_account(&pool, LEDGER_ACCOUNT).await;
}
