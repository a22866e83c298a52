use crate::models::TransactionKind;
use thiserror::Error;

/// Result type used across the ledger.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the point ledger and its collaborators.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid account id: {0}")]
    InvalidAccount(i64),

    #[error("Invalid amount: {0} (must be at least 1)")]
    InvalidAmount(i64),

    #[error("Charge amount {amount} is not a multiple of {unit}")]
    UnitMismatch { amount: i64, unit: i64 },

    #[error("Balance limit exceeded: {balance} + {amount} > {max}")]
    LimitExceeded { balance: i64, amount: i64, max: i64 },

    #[error("Account {0} has no points to use")]
    NoBalance(i64),

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Account {account_id} is busy (waited {waited_ms} ms for lock)")]
    Busy { account_id: i64, waited_ms: u64 },

    /// The balance write committed but the paired history append did not.
    /// Requires operator reconciliation.
    #[error("Ledger inconsistency on account {account_id}: balance {committed_balance} committed without {kind} record of {amount}: {reason}")]
    LedgerInconsistency {
        account_id: i64,
        kind: TransactionKind,
        amount: i64,
        committed_balance: i64,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidAccount(_) => "INVALID_ACCOUNT",
            AppError::InvalidAmount(_) => "INVALID_AMOUNT",
            AppError::UnitMismatch { .. } => "UNIT_MISMATCH",
            AppError::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            AppError::NoBalance(_) => "NO_BALANCE",
            AppError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            AppError::Busy { .. } => "BUSY",
            AppError::LedgerInconsistency { .. } => "LEDGER_INCONSISTENCY",
            AppError::Store(_) => "STORE_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true for caller-side failures that never touch the stores.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            AppError::InvalidAccount(_)
                | AppError::InvalidAmount(_)
                | AppError::UnitMismatch { .. }
                | AppError::LimitExceeded { .. }
                | AppError::NoBalance(_)
                | AppError::InsufficientBalance { .. }
        )
    }
}
