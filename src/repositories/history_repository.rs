use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{AccountId, TransactionKind, TransactionRecord};

/// Append-only log of committed balance changes keyed by account id.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a record and returns it with its assigned sequence id.
    async fn append(
        &self,
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<TransactionRecord>;

    /// Returns the account's records in commit order.
    async fn list(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>>;
}

/// In-memory history log.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    records: DashMap<AccountId, Vec<TransactionRecord>>,
    sequence: AtomicI64,
    latency: Option<Duration>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: (!latency.is_zero()).then_some(latency),
            ..Self::default()
        }
    }

    /// Total number of records across all accounts.
    pub fn total_records(&self) -> usize {
        self.records.iter().map(|entry| entry.value().len()).sum()
    }

    async fn throttle(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        self.throttle().await;
        let mut entries = self.records.entry(account_id).or_default();
        // Assigned under the shard lock so per-account order matches id order.
        let id = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let record = TransactionRecord::new(id, account_id, amount, kind, recorded_at);
        entries.push(record.clone());
        Ok(record)
    }

    async fn list(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>> {
        self.throttle().await;
        Ok(self
            .records
            .get(&account_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

/// PostgreSQL-backed history log (`point_histories`).
pub struct PostgresHistoryStore {
    pool: PgPool,
}

impl PostgresHistoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryStore for PostgresHistoryStore {
    async fn append(
        &self,
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<TransactionRecord> {
        let row = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO point_histories (account_id, amount, kind, recorded_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, amount, kind, recorded_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(kind)
        .bind(recorded_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }

    async fn list(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, amount, kind, recorded_at
            FROM point_histories
            WHERE account_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_unknown_account_is_empty() {
        let store = InMemoryHistoryStore::new();
        assert!(store.list(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = InMemoryHistoryStore::new();
        let now = Utc::now();
        let first = store.append(1, 100, TransactionKind::Charge, now).await.unwrap();
        let other = store.append(2, 300, TransactionKind::Charge, now).await.unwrap();
        let second = store.append(1, 50, TransactionKind::Use, now).await.unwrap();

        assert!(first.id < other.id);
        assert!(other.id < second.id);

        let records = store.list(1).await.unwrap();
        assert_eq!(records, vec![first, second]);
        assert_eq!(store.total_records(), 3);
    }
}
