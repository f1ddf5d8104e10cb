//! Withdrawal notifications
//!
//! Best-effort side channel: every FSM transition emits a notice for the
//! operator or the store owner. Delivery failures are logged by the caller
//! and never undo a transition.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use crate::core_types::{StoreId, WithdrawalId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("No recipient address for {0}")]
    MissingRecipient(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Which template to render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    /// To the operator: a store asked for a payout
    WithdrawalRequested,
    /// To the store: payout picked up
    WithdrawalApproved,
    /// To the store: payout refused or failed, funds returned
    WithdrawalRejected,
    /// To the store: money is on its way
    WithdrawalCompleted,
}

impl NoticeKind {
    /// Template identifier understood by the mail service
    pub fn template(&self) -> &'static str {
        match self {
            NoticeKind::WithdrawalRequested => "withdrawal_requested",
            NoticeKind::WithdrawalApproved => "withdrawal_approved",
            NoticeKind::WithdrawalRejected => "withdrawal_rejected",
            NoticeKind::WithdrawalCompleted => "withdrawal_completed",
        }
    }
}

/// Template fields for one notification
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalNotice {
    pub kind: NoticeKind,
    /// Destination email address
    pub recipient: String,
    pub withdrawal_id: WithdrawalId,
    pub store_id: StoreId,
    pub store_name: String,
    pub amount: Decimal,
    pub wallet_balance: Decimal,
    pub external_balance: Decimal,
    pub reason: Option<String>,
    pub transfer_ref: Option<String>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &WithdrawalNotice) -> Result<(), NotifyError>;
}

/// Notifier that only emits a structured log line per notice.
///
/// Used where no mail relay is wired in; the log pipeline picks these up.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &WithdrawalNotice) -> Result<(), NotifyError> {
        if notice.recipient.trim().is_empty() {
            return Err(NotifyError::MissingRecipient(notice.store_name.clone()));
        }
        info!(
            template = notice.kind.template(),
            to = %notice.recipient,
            withdrawal_id = %notice.withdrawal_id,
            store_id = %notice.store_id,
            amount = %notice.amount,
            wallet_balance = %notice.wallet_balance,
            external_balance = %notice.external_balance,
            reason = notice.reason.as_deref().unwrap_or(""),
            transfer_ref = notice.transfer_ref.as_deref().unwrap_or(""),
            "notification"
        );
        Ok(())
    }
}

/// Recording notifier for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<WithdrawalNotice>>,
        fail: Mutex<bool>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        pub fn sent(&self) -> Vec<WithdrawalNotice> {
            self.sent.lock().unwrap().clone()
        }

        pub fn kinds(&self) -> Vec<NoticeKind> {
            self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notice: &WithdrawalNotice) -> Result<(), NotifyError> {
            if *self.fail.lock().unwrap() {
                return Err(NotifyError::Delivery("smtp unavailable".to_string()));
            }
            self.sent.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
pub use mock::RecordingNotifier;
