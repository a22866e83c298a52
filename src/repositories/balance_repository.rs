use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::{Account, AccountId};

/// Durable key→balance table keyed by account id.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Returns the stored account, or a zero balance for an unseen id.
    async fn get(&self, account_id: AccountId) -> Result<Account>;

    /// Stores `balance` and returns the stored value with a fresh timestamp.
    /// The timestamp never moves backwards for a given account.
    async fn put(&self, account_id: AccountId, balance: i64) -> Result<Account>;
}

/// In-memory balance table.
#[derive(Debug, Default)]
pub struct InMemoryBalanceStore {
    points: DashMap<AccountId, Account>,
    latency: Option<Duration>,
}

impl InMemoryBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every read and write by `latency`, mimicking a slow table.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            points: DashMap::new(),
            latency: (!latency.is_zero()).then_some(latency),
        }
    }

    /// Number of accounts that have been written at least once.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    async fn throttle(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn get(&self, account_id: AccountId) -> Result<Account> {
        self.throttle().await;
        Ok(self
            .points
            .get(&account_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Account::empty(account_id)))
    }

    async fn put(&self, account_id: AccountId, balance: i64) -> Result<Account> {
        self.throttle().await;
        let now = Utc::now();
        let stored = match self.points.entry(account_id) {
            Entry::Occupied(mut entry) => {
                let updated_at = now.max(entry.get().updated_at);
                let account = Account::with_balance(account_id, balance, updated_at);
                entry.insert(account.clone());
                account
            }
            Entry::Vacant(entry) => {
                let account = Account::with_balance(account_id, balance, now);
                entry.insert(account.clone());
                account
            }
        };
        Ok(stored)
    }
}

/// PostgreSQL-backed balance table (`account_points`).
pub struct PostgresBalanceStore {
    pool: PgPool,
}

impl PostgresBalanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceStore for PostgresBalanceStore {
    async fn get(&self, account_id: AccountId) -> Result<Account> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT account_id, balance, updated_at
            FROM account_points
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row.unwrap_or_else(|| Account::empty(account_id)))
    }

    async fn put(&self, account_id: AccountId, balance: i64) -> Result<Account> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO account_points (account_id, balance, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (account_id) DO UPDATE
            SET balance = EXCLUDED.balance,
                updated_at = GREATEST(NOW(), account_points.updated_at)
            RETURNING account_id, balance, updated_at
            "#,
        )
        .bind(account_id)
        .bind(balance)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;

        Ok(row)
    }
}
