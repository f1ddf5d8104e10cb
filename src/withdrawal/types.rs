//! Withdrawal Core Types
//!
//! Type definitions for the withdrawal FSM.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::state::WithdrawalStatus;
use crate::core_types::{StoreId, WithdrawalId};
use crate::error::WalletError;
use crate::ledger::BalanceSplit;

/// Destination bank account for a payout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankDetails {
    /// Display name, e.g. "Access Bank"
    pub bank_name: String,
    /// Provider bank code, e.g. "044" (needed to create a transfer recipient)
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

impl BankDetails {
    pub fn new(
        bank_name: impl Into<String>,
        bank_code: impl Into<String>,
        account_number: impl Into<String>,
        account_name: impl Into<String>,
    ) -> Self {
        Self {
            bank_name: bank_name.into(),
            bank_code: bank_code.into(),
            account_number: account_number.into(),
            account_name: account_name.into(),
        }
    }

    /// Reject blank fields and non-numeric account numbers
    pub fn validate(&self) -> Result<(), WalletError> {
        let fields = [
            ("bank_name", &self.bank_name),
            ("bank_code", &self.bank_code),
            ("account_number", &self.account_number),
            ("account_name", &self.account_name),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(WalletError::InvalidBankDetails(format!("{} is empty", name)));
            }
        }
        if !self.account_number.chars().all(|c| c.is_ascii_digit()) {
            return Err(WalletError::InvalidBankDetails(
                "account_number must be digits only".to_string(),
            ));
        }
        Ok(())
    }
}

/// Withdrawal request from the service boundary
#[derive(Debug, Clone)]
pub struct WithdrawalRequest {
    pub store_id: StoreId,
    /// Amount in major units, must be > 0
    pub amount: Decimal,
    pub bank: BankDetails,
}

impl WithdrawalRequest {
    pub fn new(store_id: StoreId, amount: Decimal, bank: BankDetails) -> Self {
        Self {
            store_id,
            amount,
            bank,
        }
    }
}

/// Withdrawal record stored in PostgreSQL
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub id: WithdrawalId,
    pub store_id: StoreId,
    pub amount: Decimal,
    pub status: WithdrawalStatus,
    pub bank: BankDetails,
    /// How `amount` was taken from the two balance buckets at creation
    pub split: BalanceSplit,
    /// Present only when status = rejected
    pub rejection_reason: Option<String>,
    /// Provider transfer code, present only when status = completed
    pub external_transfer_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    /// Create a new withdrawal record in PENDING state
    pub fn new_pending(request: &WithdrawalRequest, split: BalanceSplit) -> Self {
        Self {
            id: WithdrawalId::new(),
            store_id: request.store_id,
            amount: request.amount,
            status: WithdrawalStatus::Pending,
            bank: request.bank.clone(),
            split,
            rejection_reason: None,
            external_transfer_ref: None,
            created_at: Utc::now(),
            approved_at: None,
            completed_at: None,
        }
    }

    /// Whether the withdrawal has been pending for at least `threshold`
    pub fn is_stale(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
        now - self.created_at >= threshold
    }
}

impl fmt::Display for Withdrawal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Withdrawal[{}] store={} amount={} status={} bank={}/{}",
            self.id,
            self.store_id,
            self.amount,
            self.status,
            self.bank.bank_name,
            self.bank.account_number
        )
    }
}

/// Write-set of one FSM transition, applied with compare-and-swap on `from`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: WithdrawalStatus,
    pub to: WithdrawalStatus,
    pub at: DateTime<Utc>,
    pub rejection_reason: Option<String>,
    pub external_transfer_ref: Option<String>,
}

impl StatusChange {
    pub fn approve(at: DateTime<Utc>) -> Self {
        Self {
            from: WithdrawalStatus::Pending,
            to: WithdrawalStatus::Approved,
            at,
            rejection_reason: None,
            external_transfer_ref: None,
        }
    }

    pub fn reject(from: WithdrawalStatus, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            from,
            to: WithdrawalStatus::Rejected,
            at,
            rejection_reason: Some(reason.into()),
            external_transfer_ref: None,
        }
    }

    pub fn complete(transfer_ref: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            from: WithdrawalStatus::Approved,
            to: WithdrawalStatus::Completed,
            at,
            rejection_reason: None,
            external_transfer_ref: Some(transfer_ref.into()),
        }
    }

    /// Apply to an in-memory record (caller has already checked `from`)
    pub fn apply(&self, record: &mut Withdrawal) {
        record.status = self.to;
        match self.to {
            WithdrawalStatus::Approved => record.approved_at = Some(self.at),
            WithdrawalStatus::Completed => {
                record.completed_at = Some(self.at);
                record.external_transfer_ref = self.external_transfer_ref.clone();
            }
            WithdrawalStatus::Rejected => {
                record.rejection_reason = self.rejection_reason.clone();
            }
            WithdrawalStatus::Pending => {}
        }
    }
}
