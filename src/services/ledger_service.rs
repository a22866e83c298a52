use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::LedgerConfig;
use crate::error::{AppError, Result};
use crate::models::{replay_balance, Account, AccountId, TransactionKind, TransactionRecord};
use crate::observability::{get_metrics, LatencyTimer};
use crate::repositories::{BalanceStore, HistoryStore};

use super::lock_registry::{AccountLock, AccountLockRegistry};
use super::validation;

/// Result of replaying an account's history against its stored balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub account_id: AccountId,
    pub stored_balance: i64,
    pub replayed_balance: i64,
    pub record_count: usize,
    pub consistent: bool,
}

/// The point ledger: validates requests, serializes mutations per account and
/// keeps the balance table and the history log in step.
pub struct AccountLedger {
    balances: Arc<dyn BalanceStore>,
    histories: Arc<dyn HistoryStore>,
    locks: AccountLockRegistry,
    config: LedgerConfig,
}

impl AccountLedger {
    pub fn new(balances: Arc<dyn BalanceStore>, histories: Arc<dyn HistoryStore>) -> Self {
        Self::with_config(balances, histories, LedgerConfig::default())
    }

    pub fn with_config(
        balances: Arc<dyn BalanceStore>,
        histories: Arc<dyn HistoryStore>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            balances,
            histories,
            locks: AccountLockRegistry::with_timeout(config.lock_timeout()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn lock_registry(&self) -> &AccountLockRegistry {
        &self.locks
    }

    /// Returns the current balance without locking. The value may already be
    /// stale relative to a concurrent writer.
    #[instrument(skip(self))]
    pub async fn find_balance(&self, account_id: AccountId) -> Result<Account> {
        validation::validate_account_id(account_id)
            .inspect_err(|e| self.rejected("find_balance", e))?;
        self.balances.get(account_id).await
    }

    /// Returns the account's committed records in commit order.
    #[instrument(skip(self))]
    pub async fn find_history(&self, account_id: AccountId) -> Result<Vec<TransactionRecord>> {
        validation::validate_account_id(account_id)
            .inspect_err(|e| self.rejected("find_history", e))?;
        self.histories.list(account_id).await
    }

    /// Adds `amount` points to the account.
    #[instrument(skip(self))]
    pub async fn charge(&self, account_id: AccountId, amount: i64) -> Result<Account> {
        let timer = LatencyTimer::new();
        let result = self.apply_charge(account_id, amount).await;
        self.observe("charge", TransactionKind::Charge, amount, &result, &timer);
        result
    }

    /// Spends `amount` points from the account.
    #[instrument(skip(self))]
    pub async fn use_point(&self, account_id: AccountId, amount: i64) -> Result<Account> {
        let timer = LatencyTimer::new();
        let result = self.apply_use(account_id, amount).await;
        self.observe("use", TransactionKind::Use, amount, &result, &timer);
        result
    }

    /// Replays the account's history from zero and compares it with the stored
    /// balance. Holds the account lock so no mutation interleaves.
    #[instrument(skip(self))]
    pub async fn reconcile(&self, account_id: AccountId) -> Result<ReconciliationReport> {
        validation::validate_account_id(account_id)
            .inspect_err(|e| self.rejected("reconcile", e))?;

        let lock = self.acquire(account_id).await?;
        let account = self.balances.get(account_id).await?;
        let records = self.histories.list(account_id).await?;
        lock.release();

        let replayed_balance = replay_balance(&records);
        let report = ReconciliationReport {
            account_id,
            stored_balance: account.balance,
            replayed_balance,
            record_count: records.len(),
            consistent: replayed_balance == account.balance,
        };

        if !report.consistent {
            error!(
                account_id,
                stored = report.stored_balance,
                replayed = report.replayed_balance,
                "Balance does not match history"
            );
        }

        Ok(report)
    }

    async fn apply_charge(&self, account_id: AccountId, amount: i64) -> Result<Account> {
        validation::validate_charge_request(account_id, amount, self.config.charge_unit)?;

        let lock = self.acquire(account_id).await?;
        let current = self.balances.get(account_id).await?;
        let next = validation::check_charge_limit(current.balance, amount, self.config.max_balance)?;
        let account = self.commit(lock, TransactionKind::Charge, amount, next).await?;

        info!(account_id, amount, balance = account.balance, "Points charged");
        Ok(account)
    }

    async fn apply_use(&self, account_id: AccountId, amount: i64) -> Result<Account> {
        validation::validate_use_request(account_id, amount)?;

        let lock = self.acquire(account_id).await?;
        let current = self.balances.get(account_id).await?;
        let next = validation::check_usable(account_id, current.balance, amount)?;
        let account = self.commit(lock, TransactionKind::Use, amount, next).await?;

        info!(account_id, amount, balance = account.balance, "Points used");
        Ok(account)
    }

    async fn acquire(&self, account_id: AccountId) -> Result<AccountLock> {
        let lock = self.locks.acquire(account_id).await?;
        let metrics = get_metrics();
        metrics.record_lock_wait(lock.waited().as_secs_f64() * 1000.0);
        metrics.set_active_locks(self.locks.active_slots());
        Ok(lock)
    }

    /// Writes the balance, then appends the matching record, still holding
    /// `lock`. The pair runs on its own task: dropping the caller's future
    /// cannot leave a balance write without its record, and the account stays
    /// locked until both writes have settled.
    async fn commit(
        &self,
        lock: AccountLock,
        kind: TransactionKind,
        amount: i64,
        balance: i64,
    ) -> Result<Account> {
        let balances = Arc::clone(&self.balances);
        let histories = Arc::clone(&self.histories);

        let task = tokio::spawn(async move {
            let result =
                write_pair(balances.as_ref(), histories.as_ref(), &lock, kind, amount, balance).await;
            lock.release();
            result
        });

        task.await.map_err(|e| {
            error!(%kind, amount, error = %e, "Commit task did not complete");
            AppError::Store(format!("commit task failed: {}", e))
        })?
    }

    fn observe(
        &self,
        operation: &'static str,
        kind: TransactionKind,
        amount: i64,
        result: &Result<Account>,
        timer: &LatencyTimer,
    ) {
        let metrics = get_metrics();
        metrics.record_operation_latency(operation, timer.elapsed_ms());
        metrics.set_active_locks(self.locks.active_slots());
        match result {
            Ok(_) => {}
            // Logged and counted where the append failed.
            Err(AppError::LedgerInconsistency { .. }) => {}
            Err(e) if e.is_validation() || matches!(e, AppError::Busy { .. }) => {
                self.rejected(operation, e)
            }
            Err(e) => warn!(operation, %kind, amount, error = %e, "Ledger operation failed"),
        }
    }

    fn rejected(&self, operation: &'static str, err: &AppError) {
        debug!(operation, code = err.code(), error = %err, "Request rejected");
        get_metrics().record_rejected(operation, err.code());
    }
}

async fn write_pair(
    balances: &dyn BalanceStore,
    histories: &dyn HistoryStore,
    lock: &AccountLock,
    kind: TransactionKind,
    amount: i64,
    balance: i64,
) -> Result<Account> {
    let account_id = lock.account_id();
    let stored = balances.put(account_id, balance).await?;

    if let Err(e) = histories
        .append(account_id, amount, kind, stored.updated_at)
        .await
    {
        error!(
            account_id,
            %kind,
            amount,
            committed_balance = stored.balance,
            error = %e,
            "History append failed after balance write"
        );
        get_metrics().record_inconsistency(kind);
        return Err(AppError::LedgerInconsistency {
            account_id,
            kind,
            amount,
            committed_balance: stored.balance,
            reason: e.to_string(),
        });
    }

    get_metrics().record_committed(kind, amount);
    Ok(stored)
}
