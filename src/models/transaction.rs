use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use super::account::AccountId;

/// Kind of balance-changing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "point_transaction_kind", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    /// Points added to the balance.
    Charge,
    /// Points spent from the balance.
    Use,
}

impl TransactionKind {
    /// Signed effect of `amount` on a balance.
    pub fn signed(&self, amount: i64) -> i64 {
        match self {
            TransactionKind::Charge => amount,
            TransactionKind::Use => -amount,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Charge => "CHARGE",
            TransactionKind::Use => "USE",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one committed balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    /// Sequence id assigned by the history store.
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub kind: TransactionKind,
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        id: i64,
        account_id: AccountId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            account_id,
            amount,
            kind,
            recorded_at,
        }
    }

    /// Signed effect of this record on the account balance.
    pub fn delta(&self) -> i64 {
        self.kind.signed(self.amount)
    }
}

/// Replays records from a zero balance.
pub fn replay_balance<'a, I>(records: I) -> i64
where
    I: IntoIterator<Item = &'a TransactionRecord>,
{
    records.into_iter().map(TransactionRecord::delta).sum()
}
