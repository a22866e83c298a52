//! Pure invariant checks shared by the ledger operations.
//!
//! The request checks (`validate_*`) depend only on the caller's input and run
//! before any lock is taken. The balance checks (`check_*`) must only be fed a
//! balance that was read while holding the account's lock.

use crate::error::{AppError, Result};
use crate::models::AccountId;

pub fn validate_account_id(account_id: AccountId) -> Result<()> {
    if account_id < 1 {
        return Err(AppError::InvalidAccount(account_id));
    }
    Ok(())
}

pub fn validate_amount(amount: i64) -> Result<()> {
    if amount < 1 {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(())
}

/// A unit of 1 (or less) disables the check.
pub fn validate_charge_unit(amount: i64, unit: i64) -> Result<()> {
    if unit > 1 && amount % unit != 0 {
        return Err(AppError::UnitMismatch { amount, unit });
    }
    Ok(())
}

/// Balance-independent checks for a charge, in reporting order.
pub fn validate_charge_request(account_id: AccountId, amount: i64, unit: i64) -> Result<()> {
    validate_account_id(account_id)?;
    validate_amount(amount)?;
    validate_charge_unit(amount, unit)
}

/// Balance-independent checks for a use.
pub fn validate_use_request(account_id: AccountId, amount: i64) -> Result<()> {
    validate_account_id(account_id)?;
    validate_amount(amount)
}

/// Returns the balance after charging `amount`, or `LimitExceeded`.
pub fn check_charge_limit(balance: i64, amount: i64, max_balance: i64) -> Result<i64> {
    match balance.checked_add(amount) {
        Some(next) if next <= max_balance => Ok(next),
        _ => Err(AppError::LimitExceeded {
            balance,
            amount,
            max: max_balance,
        }),
    }
}

/// Returns the balance after using `amount`.
pub fn check_usable(account_id: AccountId, balance: i64, amount: i64) -> Result<i64> {
    if balance == 0 {
        return Err(AppError::NoBalance(account_id));
    }
    if amount > balance {
        return Err(AppError::InsufficientBalance {
            requested: amount,
            available: balance,
        });
    }
    Ok(balance - amount)
}
