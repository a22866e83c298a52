use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Account, TransactionKind, TransactionRecord};

/// Standard API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorResponse>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorResponse) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

/// Error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub active_locks: usize,
}

/// Point balance DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointResponse {
    pub id: i64,
    pub point: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<Account> for PointResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            point: account.balance,
            updated_at: account.updated_at,
        }
    }
}

/// Point history DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointHistoryResponse {
    pub id: i64,
    pub user_id: i64,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub updated_at: DateTime<Utc>,
}

impl From<TransactionRecord> for PointHistoryResponse {
    fn from(record: TransactionRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.account_id,
            amount: record.amount,
            kind: record.kind,
            updated_at: record.recorded_at,
        }
    }
}
