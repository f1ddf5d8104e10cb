//! Ledger Types

use std::fmt;

use rust_decimal::Decimal;

use crate::core_types::StoreId;

/// A store's two balance buckets
///
/// # Invariant
/// Both buckets are >= 0 at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreBalance {
    /// Funds received on the store's dedicated virtual account
    pub external: Decimal,
    /// Funds earned from completed marketplace orders
    pub wallet: Decimal,
}

impl StoreBalance {
    pub fn new(external: Decimal, wallet: Decimal) -> Self {
        Self { external, wallet }
    }

    /// Combined withdrawable amount
    #[inline]
    pub fn total(&self) -> Decimal {
        self.external + self.wallet
    }
}

impl fmt::Display for StoreBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "external={} wallet={}", self.external, self.wallet)
    }
}

/// How a withdrawal amount is distributed across the two buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BalanceSplit {
    pub from_external: Decimal,
    pub from_wallet: Decimal,
}

impl BalanceSplit {
    pub fn new(from_external: Decimal, from_wallet: Decimal) -> Self {
        Self {
            from_external,
            from_wallet,
        }
    }

    #[inline]
    pub fn total(&self) -> Decimal {
        self.from_external + self.from_wallet
    }
}

/// External-first policy: drain the dedicated-account bucket before the
/// order-revenue bucket.
///
/// Returns None when the combined balance cannot cover `amount`.
pub fn split_external_first(balance: &StoreBalance, amount: Decimal) -> Option<BalanceSplit> {
    if amount <= Decimal::ZERO || balance.total() < amount {
        return None;
    }
    let from_external = balance.external.max(Decimal::ZERO).min(amount);
    Some(BalanceSplit {
        from_external,
        from_wallet: amount - from_external,
    })
}

/// The subset of the marketplace store the wallet needs
#[derive(Debug, Clone, PartialEq)]
pub struct StoreProfile {
    pub id: StoreId,
    pub name: String,
    pub email: String,
    /// Dedicated virtual account number (None until provisioned)
    pub dedicated_account_number: Option<String>,
    pub balance: StoreBalance,
}
