//! Balance Ledger
//!
//! Owns the two balance buckets of every store:
//!
//! ```text
//!   external  <- deposits on the store's dedicated virtual account
//!   wallet    <- completed marketplace orders
//! ```
//!
//! Withdrawals drain `external` first, then `wallet`. The split chosen at
//! deduction time travels with the withdrawal so a refund is its exact inverse.
//!
//! # Locking
//! All mutations of one store are serialised on a per-store async mutex.
//! Composite operations (refresh + deduct + insert, status change + refund)
//! take the lock once via [`BalanceLedger::lock_store`] and call the
//! `*_held` variants, which require the [`StoreGuard`] as proof.

pub mod store;
pub mod types;

pub use store::{PgStoreRepository, StoreRepository};
pub use types::{BalanceSplit, StoreBalance, StoreProfile, split_external_first};

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::core_types::StoreId;
use crate::error::WalletError;
use crate::gateway::{TransferGateway, with_timeout};
use crate::money::validate_amount;
use crate::withdrawal::db::WithdrawalRepository;

/// Exclusive access to one store's balances
pub struct StoreGuard {
    store_id: StoreId,
    _guard: OwnedMutexGuard<()>,
}

impl StoreGuard {
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }
}

pub struct BalanceLedger {
    stores: Arc<dyn StoreRepository>,
    withdrawals: Arc<dyn WithdrawalRepository>,
    gateway: Arc<dyn TransferGateway>,
    locks: DashMap<StoreId, Arc<Mutex<()>>>,
    gateway_timeout: Duration,
}

impl BalanceLedger {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        withdrawals: Arc<dyn WithdrawalRepository>,
        gateway: Arc<dyn TransferGateway>,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            stores,
            withdrawals,
            gateway,
            locks: DashMap::new(),
            gateway_timeout,
        }
    }

    /// Wait for exclusive access to a store's balances
    pub async fn lock_store(&self, store_id: StoreId) -> StoreGuard {
        let lock = self
            .locks
            .entry(store_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        StoreGuard {
            store_id,
            _guard: lock.lock_owned().await,
        }
    }

    /// Load the store aggregate, `StoreNotFound` if unknown
    pub async fn store_profile(&self, store_id: StoreId) -> Result<StoreProfile, WalletError> {
        self.stores
            .get(store_id)
            .await?
            .ok_or(WalletError::StoreNotFound(store_id))
    }

    /// Cached balances as last persisted
    pub async fn get_balances(&self, store_id: StoreId) -> Result<StoreBalance, WalletError> {
        Ok(self.store_profile(store_id).await?.balance)
    }

    /// Re-derive the external bucket from the provider and persist it
    pub async fn refresh_external_balance(
        &self,
        store_id: StoreId,
    ) -> Result<Decimal, WalletError> {
        let guard = self.lock_store(store_id).await;
        self.refresh_held(&guard).await
    }

    /// Refresh with the store lock already held.
    ///
    /// external = provider deposit total - external share of every withdrawal
    /// that still holds funds. Stores without a dedicated account keep their
    /// cached figure.
    pub async fn refresh_held(&self, guard: &StoreGuard) -> Result<Decimal, WalletError> {
        let store_id = guard.store_id();
        let profile = self.store_profile(store_id).await?;

        let Some(account) = profile.dedicated_account_number.as_deref() else {
            debug!(store_id = %store_id, "No dedicated account, keeping cached external balance");
            return Ok(profile.balance.external);
        };

        let deposits = with_timeout(
            self.gateway_timeout,
            self.gateway.dedicated_account_transaction_total(account),
        )
        .await?;
        let drawn = self.withdrawals.external_drawn_total(store_id).await?;

        let mut external = deposits - drawn;
        if external < Decimal::ZERO {
            warn!(
                store_id = %store_id,
                deposits = %deposits,
                drawn = %drawn,
                "Provider total below external draws, clamping external balance to zero"
            );
            external = Decimal::ZERO;
        }

        if external != profile.balance.external {
            self.stores.set_external_balance(store_id, external).await?;
            debug!(
                store_id = %store_id,
                old = %profile.balance.external,
                new = %external,
                "External balance refreshed"
            );
        }
        Ok(external)
    }

    /// Deduct `amount` external-first and return the split taken
    pub async fn deduct(
        &self,
        store_id: StoreId,
        amount: Decimal,
    ) -> Result<BalanceSplit, WalletError> {
        let guard = self.lock_store(store_id).await;
        self.deduct_held(&guard, amount).await
    }

    /// Deduct with the store lock already held
    pub async fn deduct_held(
        &self,
        guard: &StoreGuard,
        amount: Decimal,
    ) -> Result<BalanceSplit, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::InvalidAmount);
        }
        let store_id = guard.store_id();
        let balance = self.get_balances(store_id).await?;

        let split =
            split_external_first(&balance, amount).ok_or(WalletError::InsufficientBalance)?;
        let after = self
            .stores
            .adjust_balances(store_id, -split.from_external, -split.from_wallet)
            .await?;

        info!(
            store_id = %store_id,
            amount = %amount,
            from_external = %split.from_external,
            from_wallet = %split.from_wallet,
            balance = %after,
            "Balance deducted"
        );
        Ok(split)
    }

    /// Give back exactly what `split` took
    pub async fn refund(
        &self,
        store_id: StoreId,
        split: &BalanceSplit,
    ) -> Result<StoreBalance, WalletError> {
        let guard = self.lock_store(store_id).await;
        self.refund_held(&guard, split).await
    }

    /// Refund with the store lock already held
    pub async fn refund_held(
        &self,
        guard: &StoreGuard,
        split: &BalanceSplit,
    ) -> Result<StoreBalance, WalletError> {
        let store_id = guard.store_id();
        let after = self
            .stores
            .adjust_balances(store_id, split.from_external, split.from_wallet)
            .await?;

        info!(
            store_id = %store_id,
            to_external = %split.from_external,
            to_wallet = %split.from_wallet,
            balance = %after,
            "Balance refunded"
        );
        Ok(after)
    }

    /// Credit order revenue to the wallet bucket
    pub async fn credit_wallet(
        &self,
        store_id: StoreId,
        amount: Decimal,
    ) -> Result<StoreBalance, WalletError> {
        validate_amount(amount)?;
        let _guard = self.lock_store(store_id).await;
        let after = self
            .stores
            .adjust_balances(store_id, Decimal::ZERO, amount)
            .await?;

        info!(store_id = %store_id, amount = %amount, balance = %after, "Wallet credited");
        Ok(after)
    }
}
