use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Upper bound any account's point balance may reach.
pub const MAX_BALANCE: i64 = 1_000_000;

/// Charges must be a multiple of this unit.
pub const CHARGE_UNIT: i64 = 100;

/// Identifier of a point account. Valid ids are positive.
pub type AccountId = i64;

/// Point balance of a single account.
/// Created implicitly with a zero balance the first time it is read or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    #[sqlx(rename = "account_id")]
    pub id: AccountId,
    pub balance: i64,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates an account that has never been charged.
    pub fn empty(id: AccountId) -> Self {
        Self {
            id,
            balance: 0,
            updated_at: Utc::now(),
        }
    }

    /// Creates an account snapshot with the given balance.
    pub fn with_balance(id: AccountId, balance: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            id,
            balance,
            updated_at,
        }
    }

    /// Returns true if the account holds no points.
    pub fn is_empty(&self) -> bool {
        self.balance == 0
    }

    /// Headroom left before reaching `max_balance`.
    pub fn remaining_capacity(&self, max_balance: i64) -> i64 {
        (max_balance - self.balance).max(0)
    }
}
