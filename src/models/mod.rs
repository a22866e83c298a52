pub mod account;
pub mod transaction;

pub use account::{Account, AccountId, CHARGE_UNIT, MAX_BALANCE};
pub use transaction::{replay_balance, TransactionKind, TransactionRecord};
