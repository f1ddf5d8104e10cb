//! Store balance persistence
//!
//! The `stores` table belongs to the marketplace; the wallet only touches the
//! two balance columns. Every write is a single guarded UPDATE so a bucket can
//! never be driven below zero, even by a writer in another process.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};

use super::types::{StoreBalance, StoreProfile};
use crate::core_types::StoreId;
use crate::db::money_column;
use crate::error::WalletError;

/// Narrow view of the store aggregate used by the ledger
#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Load store identity, contact info and cached balances
    async fn get(&self, store_id: StoreId) -> Result<Option<StoreProfile>, WalletError>;

    /// Add signed deltas to both buckets in one atomic write.
    ///
    /// Fails with `InsufficientBalance` (and changes nothing) if either
    /// bucket would become negative. Returns the new balances.
    async fn adjust_balances(
        &self,
        store_id: StoreId,
        external_delta: Decimal,
        wallet_delta: Decimal,
    ) -> Result<StoreBalance, WalletError>;

    /// Overwrite the cached external balance with a recomputed figure
    async fn set_external_balance(
        &self,
        store_id: StoreId,
        external: Decimal,
    ) -> Result<(), WalletError>;
}

/// PostgreSQL-backed store repository
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, store_id: StoreId) -> Result<bool, WalletError> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM stores WHERE id = $1")
            .bind(store_id.get())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl StoreRepository for PgStoreRepository {
    async fn get(&self, store_id: StoreId) -> Result<Option<StoreProfile>, WalletError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, email, dedicated_account_number,
                   external_balance, wallet_balance
            FROM stores
            WHERE id = $1
            "#,
        )
        .bind(store_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let external = money_column(&row, "stores", "external_balance")?;
        let wallet = money_column(&row, "stores", "wallet_balance")?;

        Ok(Some(StoreProfile {
            id: StoreId(row.get("id")),
            name: row.get("name"),
            email: row.get("email"),
            dedicated_account_number: row.get("dedicated_account_number"),
            balance: StoreBalance::new(external, wallet),
        }))
    }

    async fn adjust_balances(
        &self,
        store_id: StoreId,
        external_delta: Decimal,
        wallet_delta: Decimal,
    ) -> Result<StoreBalance, WalletError> {
        let row = sqlx::query(
            r#"
            UPDATE stores
            SET external_balance = external_balance + $2,
                wallet_balance = wallet_balance + $3,
                updated_at = NOW()
            WHERE id = $1
              AND external_balance + $2 >= 0
              AND wallet_balance + $3 >= 0
            RETURNING external_balance, wallet_balance
            "#,
        )
        .bind(store_id.get())
        .bind(external_delta)
        .bind(wallet_delta)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(StoreBalance::new(
                row.get("external_balance"),
                row.get("wallet_balance"),
            )),
            // Guard failed or no such store - tell them apart
            None if self.exists(store_id).await? => Err(WalletError::InsufficientBalance),
            None => Err(WalletError::StoreNotFound(store_id)),
        }
    }

    async fn set_external_balance(
        &self,
        store_id: StoreId,
        external: Decimal,
    ) -> Result<(), WalletError> {
        if external < Decimal::ZERO {
            return Err(WalletError::SystemError(format!(
                "refusing negative external balance {} for store {}",
                external, store_id
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE stores
            SET external_balance = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(store_id.get())
        .bind(external)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(WalletError::StoreNotFound(store_id));
        }
        Ok(())
    }
}


#[cfg(test)]
pub use mock::MemoryStoreRepository;
