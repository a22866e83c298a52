pub mod balance_repository;
pub mod history_repository;

pub use balance_repository::{BalanceStore, InMemoryBalanceStore, PostgresBalanceStore};
pub use history_repository::{HistoryStore, InMemoryHistoryStore, PostgresHistoryStore};

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
