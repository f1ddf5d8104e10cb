//! Withdrawal State Machine
//!
//! The only code allowed to change a withdrawal's status. Every transition is
//! a CAS on the current status, so a concurrent caller that loses the race
//! sees `InvalidStatus` instead of a double transition.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use super::db::WithdrawalRepository;
use super::state::WithdrawalStatus;
use super::types::{StatusChange, Withdrawal, WithdrawalRequest};
use crate::core_types::WithdrawalId;
use crate::error::WalletError;
use crate::ledger::BalanceLedger;
use crate::money::validate_amount;
use crate::notify::{NoticeKind, Notifier, WithdrawalNotice};

pub struct WithdrawalStateMachine {
    ledger: Arc<BalanceLedger>,
    repo: Arc<dyn WithdrawalRepository>,
    notifier: Arc<dyn Notifier>,
    /// Recipient of "withdrawal requested" notices
    operator_email: String,
}

impl WithdrawalStateMachine {
    pub fn new(
        ledger: Arc<BalanceLedger>,
        repo: Arc<dyn WithdrawalRepository>,
        notifier: Arc<dyn Notifier>,
        operator_email: impl Into<String>,
    ) -> Self {
        Self {
            ledger,
            repo,
            notifier,
            operator_email: operator_email.into(),
        }
    }

    pub fn ledger(&self) -> &Arc<BalanceLedger> {
        &self.ledger
    }

    /// Load a withdrawal, `WithdrawalNotFound` if unknown
    pub async fn load(&self, id: WithdrawalId) -> Result<Withdrawal, WalletError> {
        self.repo
            .get(id)
            .await?
            .ok_or(WalletError::WithdrawalNotFound(id))
    }

    /// Create a PENDING withdrawal and take the funds from the store.
    ///
    /// The external balance is refreshed first; a failed refresh fails the
    /// request. If the record cannot be persisted the deduction is reverted.
    pub async fn create(&self, request: WithdrawalRequest) -> Result<Withdrawal, WalletError> {
        validate_amount(request.amount)?;
        request.bank.validate()?;

        let guard = self.ledger.lock_store(request.store_id).await;
        self.ledger.refresh_held(&guard).await?;
        let split = self.ledger.deduct_held(&guard, request.amount).await?;

        let record = Withdrawal::new_pending(&request, split);
        if let Err(e) = self.repo.insert(&record).await {
            error!(
                withdrawal_id = %record.id,
                store_id = %record.store_id,
                error = %e,
                "Failed to persist withdrawal, reverting deduction"
            );
            if let Err(refund_err) = self.ledger.refund_held(&guard, &split).await {
                error!(
                    store_id = %record.store_id,
                    from_external = %split.from_external,
                    from_wallet = %split.from_wallet,
                    error = %refund_err,
                    "CRITICAL: deduction not reverted, manual reconciliation required"
                );
            }
            return Err(e);
        }
        drop(guard);

        info!(
            withdrawal_id = %record.id,
            store_id = %record.store_id,
            amount = %record.amount,
            "Withdrawal created"
        );
        self.notify(NoticeKind::WithdrawalRequested, &record).await;
        Ok(record)
    }

    /// PENDING -> APPROVED
    pub async fn approve(&self, id: WithdrawalId) -> Result<Withdrawal, WalletError> {
        let mut record = self.load(id).await?;
        let change = StatusChange::approve(Utc::now());
        self.transition(&mut record, &change, "approve").await?;

        info!(withdrawal_id = %id, store_id = %record.store_id, "Withdrawal approved");
        self.refresh_best_effort(&record).await;
        self.notify(NoticeKind::WithdrawalApproved, &record).await;
        Ok(record)
    }

    /// PENDING -> REJECTED, returning the funds to the store.
    ///
    /// An APPROVED withdrawal may already have a transfer in flight, so
    /// operators cannot reject it; only the settlement orchestrator can, and
    /// only after the transfer failed.
    pub async fn reject(
        &self,
        id: WithdrawalId,
        reason: impl Into<String>,
    ) -> Result<Withdrawal, WalletError> {
        self.reject_from(id, WithdrawalStatus::Pending, reason.into())
            .await
    }

    /// APPROVED -> REJECTED after the bank transfer failed
    pub(crate) async fn reject_after_failed_transfer(
        &self,
        id: WithdrawalId,
        reason: impl Into<String>,
    ) -> Result<Withdrawal, WalletError> {
        self.reject_from(id, WithdrawalStatus::Approved, reason.into())
            .await
    }

    async fn reject_from(
        &self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        reason: String,
    ) -> Result<Withdrawal, WalletError> {
        let mut record = self.load(id).await?;
        let change = StatusChange::reject(from, reason, Utc::now());

        // Status first: only the CAS winner may refund
        let guard = self.ledger.lock_store(record.store_id).await;
        self.transition(&mut record, &change, "reject").await?;

        if let Err(e) = self.ledger.refund_held(&guard, &record.split).await {
            error!(
                withdrawal_id = %id,
                store_id = %record.store_id,
                from_external = %record.split.from_external,
                from_wallet = %record.split.from_wallet,
                error = %e,
                "CRITICAL: withdrawal rejected but refund failed, manual reconciliation required"
            );
            return Err(e);
        }
        drop(guard);

        info!(
            withdrawal_id = %id,
            store_id = %record.store_id,
            reason = record.rejection_reason.as_deref().unwrap_or(""),
            "Withdrawal rejected"
        );
        self.notify(NoticeKind::WithdrawalRejected, &record).await;
        Ok(record)
    }

    /// APPROVED -> COMPLETED
    pub async fn complete(
        &self,
        id: WithdrawalId,
        transfer_ref: impl Into<String>,
    ) -> Result<Withdrawal, WalletError> {
        let mut record = self.load(id).await?;
        let change = StatusChange::complete(transfer_ref, Utc::now());
        self.transition(&mut record, &change, "complete").await?;

        info!(
            withdrawal_id = %id,
            store_id = %record.store_id,
            transfer_ref = record.external_transfer_ref.as_deref().unwrap_or(""),
            "Withdrawal completed"
        );
        self.refresh_best_effort(&record).await;
        self.notify(NoticeKind::WithdrawalCompleted, &record).await;
        Ok(record)
    }

    /// Check the transition table, CAS the record, then mirror it in memory
    async fn transition(
        &self,
        record: &mut Withdrawal,
        change: &StatusChange,
        action: &'static str,
    ) -> Result<(), WalletError> {
        if record.status != change.from || !record.status.can_transition_to(change.to) {
            return Err(WalletError::InvalidStatus {
                id: record.id,
                status: record.status,
                action,
            });
        }

        if !self.repo.update_status_if(record.id, change).await? {
            // Someone else moved it; report what they moved it to
            let current = self
                .repo
                .get(record.id)
                .await?
                .map(|r| r.status)
                .unwrap_or(record.status);
            debug!(
                withdrawal_id = %record.id,
                expected = %change.from,
                current = %current,
                "Lost status CAS"
            );
            return Err(WalletError::InvalidStatus {
                id: record.id,
                status: current,
                action,
            });
        }

        change.apply(record);
        Ok(())
    }

    async fn refresh_best_effort(&self, record: &Withdrawal) {
        if let Err(e) = self.ledger.refresh_external_balance(record.store_id).await {
            warn!(
                withdrawal_id = %record.id,
                store_id = %record.store_id,
                error = %e,
                "External balance refresh failed"
            );
        }
    }

    async fn notify(&self, kind: NoticeKind, record: &Withdrawal) {
        let profile = match self.ledger.store_profile(record.store_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(
                    withdrawal_id = %record.id,
                    error = %e,
                    "Skipping notification, store unavailable"
                );
                return;
            }
        };

        let recipient = match kind {
            NoticeKind::WithdrawalRequested => self.operator_email.clone(),
            _ => profile.email.clone(),
        };
        let notice = WithdrawalNotice {
            kind,
            recipient,
            withdrawal_id: record.id,
            store_id: record.store_id,
            store_name: profile.name,
            amount: record.amount,
            wallet_balance: profile.balance.wallet,
            external_balance: profile.balance.external,
            reason: record.rejection_reason.clone(),
            transfer_ref: record.external_transfer_ref.clone(),
        };

        if let Err(e) = self.notifier.notify(&notice).await {
            warn!(
                withdrawal_id = %record.id,
                template = kind.template(),
                error = %e,
                "Notification failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::StoreId;
    use crate::gateway::MockGateway;
    use crate::ledger::StoreBalance;
    use crate::ledger::store::MemoryStoreRepository;
    use crate::notify::RecordingNotifier;
    use crate::withdrawal::db::MemoryWithdrawalRepository;
    use crate::withdrawal::types::BankDetails;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn d(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn bank() -> BankDetails {
        BankDetails::new("Access Bank", "044", "0123456789", "Ada Stores")
    }

    struct Fixture {
        stores: Arc<MemoryStoreRepository>,
        repo: Arc<MemoryWithdrawalRepository>,
        gateway: Arc<MockGateway>,
        notifier: Arc<RecordingNotifier>,
        fsm: WithdrawalStateMachine,
    }

    /// Store 1 with the given balances, provider total matching `external`
    fn fixture(external: i64, wallet: i64) -> Fixture {
        let stores = Arc::new(MemoryStoreRepository::new());
        let repo = Arc::new(MemoryWithdrawalRepository::new());
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());

        stores.insert_store(StoreId(1), d(external), d(wallet));
        gateway.set_total(&stores.account_number(StoreId(1)), d(external));

        let ledger = Arc::new(BalanceLedger::new(
            stores.clone(),
            repo.clone(),
            gateway.clone(),
            Duration::from_secs(1),
        ));
        let fsm = WithdrawalStateMachine::new(
            ledger,
            repo.clone(),
            notifier.clone(),
            "ops@example.com",
        );
        Fixture {
            stores,
            repo,
            gateway,
            notifier,
            fsm,
        }
    }

    fn request(amount: Decimal) -> WithdrawalRequest {
        WithdrawalRequest::new(StoreId(1), amount, bank())
    }

    #[tokio::test]
    async fn test_create_rejects_bad_amounts() {
        let f = fixture(100, 100);

        for amount in [d(0), d(-10)] {
            let result = f.fsm.create(request(amount)).await;
            assert!(matches!(result, Err(WalletError::InvalidAmount)));
        }
        let result = f.fsm.create(request(Decimal::new(1005, 3))).await;
        assert!(matches!(result, Err(WalletError::InvalidAmountPrecision(_))));

        assert_eq!(f.repo.len(), 0);
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(100), d(100)));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_bank_details() {
        let f = fixture(100, 100);
        let mut req = request(d(10));
        req.bank.bank_code = String::new();

        let result = f.fsm.create(req).await;
        assert!(matches!(result, Err(WalletError::InvalidBankDetails(_))));
        assert_eq!(f.repo.len(), 0);
    }

    #[tokio::test]
    async fn test_create_insufficient_balance() {
        let f = fixture(100, 100);

        let result = f.fsm.create(request(d(201))).await;
        assert!(matches!(result, Err(WalletError::InsufficientBalance)));
        assert_eq!(f.repo.len(), 0);
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(100), d(100)));
    }

    #[tokio::test]
    async fn test_create_unknown_store() {
        let f = fixture(100, 100);
        let req = WithdrawalRequest::new(StoreId(77), d(10), bank());
        assert!(matches!(
            f.fsm.create(req).await,
            Err(WalletError::StoreNotFound(StoreId(77)))
        ));
    }

    #[tokio::test]
    async fn test_create_uses_refreshed_external_balance() {
        let f = fixture(0, 50);
        // A deposit landed that the cached figure doesn't know about yet
        f.gateway.set_total(&f.stores.account_number(StoreId(1)), d(500));

        let w = f.fsm.create(request(d(520))).await.unwrap();
        assert_eq!(w.split.from_external, d(500));
        assert_eq!(w.split.from_wallet, d(20));
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(0), d(30)));
    }

    #[tokio::test]
    async fn test_create_fails_when_refresh_fails() {
        let f = fixture(100, 100);
        f.gateway.set_fail_totals(true);

        let result = f.fsm.create(request(d(10))).await;
        assert!(matches!(result, Err(WalletError::Gateway(_))));
        assert_eq!(f.repo.len(), 0);
    }

    #[tokio::test]
    async fn test_create_insert_failure_reverts_deduction() {
        let f = fixture(100, 100);
        f.repo.set_fail_inserts(true);

        let result = f.fsm.create(request(d(150))).await;
        assert!(matches!(result, Err(WalletError::DatabaseError(_))));
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(100), d(100)));
    }

    #[tokio::test]
    async fn test_create_notifies_operator() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(150))).await.unwrap();

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NoticeKind::WithdrawalRequested);
        assert_eq!(sent[0].recipient, "ops@example.com");
        assert_eq!(sent[0].withdrawal_id, w.id);
        assert_eq!(sent[0].store_name, "Store 1");
        assert_eq!(sent[0].wallet_balance, d(50));
        assert_eq!(sent[0].external_balance, d(0));
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_create() {
        let f = fixture(100, 100);
        f.notifier.set_fail(true);

        let w = f.fsm.create(request(d(10))).await.unwrap();
        assert_eq!(w.status, WithdrawalStatus::Pending);
        assert_eq!(f.repo.len(), 1);
    }

    #[tokio::test]
    async fn test_approve_twice_is_invalid_status() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(10))).await.unwrap();

        let approved = f.fsm.approve(w.id).await.unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert!(approved.approved_at.is_some());

        let err = f.fsm.approve(w.id).await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::InvalidStatus {
                status: WithdrawalStatus::Approved,
                action: "approve",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_unknown_withdrawal() {
        let f = fixture(100, 100);
        let id = WithdrawalId::new();
        assert!(matches!(
            f.fsm.approve(id).await,
            Err(WalletError::WithdrawalNotFound(_))
        ));
        assert!(matches!(
            f.fsm.reject(id, "x").await,
            Err(WalletError::WithdrawalNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_restores_split() {
        let f = fixture(5000, 2000);
        let w = f.fsm.create(request(d(6000))).await.unwrap();
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(0), d(1000)));

        let rejected = f.fsm.reject(w.id, "Manual rejection").await.unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Manual rejection"));
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(5000), d(2000)));

        // Terminal: a second reject neither succeeds nor refunds again
        assert!(matches!(
            f.fsm.reject(w.id, "again").await,
            Err(WalletError::InvalidStatus { .. })
        ));
        assert_eq!(f.stores.balance(StoreId(1)).total(), d(7000));
    }

    #[tokio::test]
    async fn test_operator_reject_refused_once_approved() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(150))).await.unwrap();
        f.fsm.approve(w.id).await.unwrap();

        let err = f.fsm.reject(w.id, "changed my mind").await.unwrap_err();
        assert!(matches!(
            err,
            WalletError::InvalidStatus {
                status: WithdrawalStatus::Approved,
                action: "reject",
                ..
            }
        ));

        let stored = f.fsm.load(w.id).await.unwrap();
        assert_eq!(stored.status, WithdrawalStatus::Approved);
        assert!(stored.rejection_reason.is_none());
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(0), d(50)));
    }

    #[tokio::test]
    async fn test_failed_transfer_rejection_requires_approved() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(150))).await.unwrap();

        // Nothing was sent for a pending withdrawal
        assert!(matches!(
            f.fsm.reject_after_failed_transfer(w.id, "transfer failed").await,
            Err(WalletError::InvalidStatus {
                status: WithdrawalStatus::Pending,
                ..
            })
        ));

        f.fsm.approve(w.id).await.unwrap();
        let rejected = f
            .fsm
            .reject_after_failed_transfer(w.id, "transfer failed")
            .await
            .unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("transfer failed"));
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(100), d(100)));
    }

    #[tokio::test]
    async fn test_complete_requires_approved() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(150))).await.unwrap();

        assert!(matches!(
            f.fsm.complete(w.id, "TRF123").await,
            Err(WalletError::InvalidStatus {
                status: WithdrawalStatus::Pending,
                ..
            })
        ));

        f.fsm.approve(w.id).await.unwrap();
        let done = f.fsm.complete(w.id, "TRF123").await.unwrap();
        assert_eq!(done.status, WithdrawalStatus::Completed);
        assert_eq!(done.external_transfer_ref.as_deref(), Some("TRF123"));
        assert!(done.completed_at.is_some());

        // Completed is terminal
        assert!(f.fsm.reject(w.id, "late").await.is_err());
        assert_eq!(f.stores.balance(StoreId(1)), StoreBalance::new(d(0), d(50)));
    }

    #[tokio::test]
    async fn test_store_notices_follow_transitions() {
        let f = fixture(100, 100);
        let w = f.fsm.create(request(d(10))).await.unwrap();
        f.fsm.approve(w.id).await.unwrap();
        f.fsm.complete(w.id, "TRF9").await.unwrap();

        assert_eq!(
            f.notifier.kinds(),
            vec![
                NoticeKind::WithdrawalRequested,
                NoticeKind::WithdrawalApproved,
                NoticeKind::WithdrawalCompleted,
            ]
        );
        let last = f.notifier.sent().pop().unwrap();
        assert_eq!(last.recipient, "store1@example.com");
        assert_eq!(last.transfer_ref.as_deref(), Some("TRF9"));
    }
}
