//! Core types used throughout the system
//!
//! Identifier newtypes shared by the ledger, the withdrawal FSM and the
//! persistence layer.

use std::fmt;
use std::str::FromStr;

/// Store ID - primary key of the marketplace `stores` table.
///
/// The store aggregate is owned by the wider marketplace; this crate only
/// reads it and adjusts its two balance columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub i64);

impl StoreId {
    #[inline]
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for StoreId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Withdrawal ID - ULID-based unique identifier
///
/// Using ULID provides:
/// - Monotonic, sortable IDs (creation order is recoverable from the id)
/// - No coordination between API nodes
/// - A stable string usable as the transfer provider's idempotency reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WithdrawalId(ulid::Ulid);

impl WithdrawalId {
    /// Generate a new unique WithdrawalId
    pub fn new() -> Self {
        Self(ulid::Ulid::new())
    }
}

impl Default for WithdrawalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WithdrawalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WithdrawalId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(ulid::Ulid::from_string(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_withdrawal_id_unique() {
        let a = WithdrawalId::new();
        let b = WithdrawalId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_withdrawal_id_parse() {
        let id = WithdrawalId::new();
        let parsed: WithdrawalId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-ulid".parse::<WithdrawalId>().is_err());
    }

    #[test]
    fn test_store_id_display() {
        assert_eq!(StoreId(42).to_string(), "42");
        assert_eq!(StoreId::from(7).get(), 7);
    }
}
