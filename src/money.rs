//! Money Conversion Module
//!
//! Store balances and withdrawal amounts are `rust_decimal::Decimal` in major
//! units (e.g. `6000.50`). The transfer provider speaks integer minor units
//! (kobo, 1/100). All conversions between the two MUST go through this module.
//!
//! ## Design Principles
//! 1. Explicit Error Handling: no silent truncation of sub-minor amounts
//! 2. Withdrawal amounts are strictly positive
//!
//! ## Usage
//! ```rust
//! use rust_decimal::Decimal;
//! use store_wallet::money::{to_minor_units, MINOR_UNIT_DECIMALS};
//!
//! let kobo = to_minor_units(Decimal::new(15050, 2), MINOR_UNIT_DECIMALS).unwrap();
//! assert_eq!(kobo, 15_050);
//! ```

use rust_decimal::prelude::*;
use thiserror::Error;

/// Decimal places of the settlement currency's minor unit (kobo).
pub const MINOR_UNIT_DECIMALS: u32 = 2;

// ============================================================================
// Error Types
// ============================================================================

/// Money conversion errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Amount too large, would overflow")]
    Overflow,
}

// ============================================================================
// Validation
// ============================================================================

/// Validate a client-supplied withdrawal amount.
///
/// # Errors
/// * `InvalidAmount` - zero or negative
/// * `PrecisionOverflow` - more decimal places than the minor unit allows
pub fn validate_amount(amount: Decimal) -> Result<(), MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }
    // 100.50 and 100.5 are equal; only reject real sub-kobo fractions
    let normalized = amount.normalize();
    if normalized.scale() > MINOR_UNIT_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: normalized.scale(),
            max: MINOR_UNIT_DECIMALS,
        });
    }
    Ok(())
}

// ============================================================================
// Decimal → minor units
// ============================================================================

/// Convert a positive Decimal amount to integer minor units.
///
/// # Errors
/// * `InvalidAmount` - zero or negative
/// * `PrecisionOverflow` - amount has a fractional minor unit
/// * `Overflow` - result does not fit an `i64`
pub fn to_minor_units(amount: Decimal, decimals: u32) -> Result<i64, MoneyError> {
    if amount <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }

    let multiplier = Decimal::from(10u64.pow(decimals));
    let scaled = amount.checked_mul(multiplier).ok_or(MoneyError::Overflow)?;

    // Should not have fractional part after scaling
    if !scaled.fract().is_zero() {
        return Err(MoneyError::PrecisionOverflow {
            provided: amount.normalize().scale(),
            max: decimals,
        });
    }

    scaled.to_i64().ok_or(MoneyError::Overflow)
}

/// Convert integer minor units (as reported by the provider) to a Decimal in
/// major units. Never fails: every i64 fits a Decimal.
pub fn from_minor_units(value: i64, decimals: u32) -> Decimal {
    Decimal::new(value, decimals)
}
