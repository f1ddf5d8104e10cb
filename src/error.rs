//! Wallet Error Types
//!
//! One error type shared by the balance ledger, the withdrawal FSM and the
//! settlement orchestrator.

use thiserror::Error;

use crate::core_types::{StoreId, WithdrawalId};
use crate::gateway::GatewayError;
use crate::money::MoneyError;
use crate::withdrawal::state::WithdrawalStatus;

/// Wallet error types
///
/// Error codes are stable strings for API responses.
#[derive(Error, Debug, Clone)]
pub enum WalletError {
    // === Validation Errors ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid amount: {0}")]
    InvalidAmountPrecision(String),

    #[error("Invalid bank details: {0}")]
    InvalidBankDetails(String),

    // === Balance Errors ===
    #[error("Insufficient balance")]
    InsufficientBalance,

    // === Lookup Errors ===
    #[error("Store not found: {0}")]
    StoreNotFound(StoreId),

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(WithdrawalId),

    // === FSM Errors ===
    #[error("Cannot {action} withdrawal {id} in status {status}")]
    InvalidStatus {
        id: WithdrawalId,
        status: WithdrawalStatus,
        action: &'static str,
    },

    // === External Errors ===
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    // === System Errors ===
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal system error: {0}")]
    SystemError(String),
}

impl WalletError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::InvalidAmount => "INVALID_AMOUNT",
            WalletError::InvalidAmountPrecision(_) => "INVALID_AMOUNT",
            WalletError::InvalidBankDetails(_) => "INVALID_BANK_DETAILS",
            WalletError::InsufficientBalance => "INSUFFICIENT_BALANCE",
            WalletError::StoreNotFound(_) => "STORE_NOT_FOUND",
            WalletError::WithdrawalNotFound(_) => "WITHDRAWAL_NOT_FOUND",
            WalletError::InvalidStatus { .. } => "INVALID_STATUS",
            WalletError::Gateway(_) => "GATEWAY_ERROR",
            WalletError::DatabaseError(_) => "DATABASE_ERROR",
            WalletError::SystemError(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            WalletError::InvalidAmount
            | WalletError::InvalidAmountPrecision(_)
            | WalletError::InvalidBankDetails(_) => 400,
            WalletError::StoreNotFound(_) | WalletError::WithdrawalNotFound(_) => 404,
            WalletError::InvalidStatus { .. } => 409,
            WalletError::InsufficientBalance => 422,
            WalletError::Gateway(_) => 502,
            WalletError::DatabaseError(_) | WalletError::SystemError(_) => 500,
        }
    }
}

impl From<sqlx::Error> for WalletError {
    fn from(e: sqlx::Error) -> Self {
        WalletError::DatabaseError(e.to_string())
    }
}

impl From<MoneyError> for WalletError {
    fn from(e: MoneyError) -> Self {
        match e {
            MoneyError::InvalidAmount => WalletError::InvalidAmount,
            other => WalletError::InvalidAmountPrecision(other.to_string()),
        }
    }
}
