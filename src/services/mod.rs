pub mod ledger_service;
pub mod lock_registry;
pub mod validation;

pub use ledger_service::{AccountLedger, ReconciliationReport};
pub use lock_registry::{AccountLock, AccountLockRegistry};
