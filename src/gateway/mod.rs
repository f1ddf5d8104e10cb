//! External Transfer Gateway
//!
//! Contract for the third-party bank-transfer provider. The ledger and the
//! settlement orchestrator only ever see `Ok` or a `GatewayError`; retry
//! policy, if any, belongs to the adapter.

pub mod http;

pub use http::HttpTransferGateway;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Transfer provider errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Provider declined request: {0}")]
    Rejected(String),

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    /// Listing longer than the adapter walks; never answered with a partial sum
    #[error("Provider result truncated: {0}")]
    Truncated(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider call timed out")]
    Timeout,
}

/// Bank-transfer provider surface needed by the wallet
#[async_trait]
pub trait TransferGateway: Send + Sync {
    /// Get gateway name for logging
    fn name(&self) -> &'static str;

    /// Register a payout destination, returning the provider's recipient code
    async fn create_recipient(
        &self,
        account_number: &str,
        bank_code: &str,
        account_name: &str,
    ) -> Result<String, GatewayError>;

    /// Send `amount_minor` (kobo) to a recipient, returning the transfer code.
    ///
    /// # Idempotency
    /// `reference` is unique per withdrawal; the provider refuses a second
    /// transfer with the same reference.
    async fn initiate_transfer(
        &self,
        amount_minor: i64,
        recipient_code: &str,
        reason: &str,
        reference: &str,
    ) -> Result<String, GatewayError>;

    /// Sum of settled deposits ever received on a dedicated virtual account
    async fn dedicated_account_transaction_total(
        &self,
        account_number: &str,
    ) -> Result<Decimal, GatewayError>;
}

/// Run a provider call under a deadline; expiry becomes `GatewayError::Timeout`
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout),
    }
}


#[cfg(test)]
pub use mock::MockGateway;
