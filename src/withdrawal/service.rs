//! Withdrawal Service
//!
//! Entry point for callers outside the crate (HTTP handlers, admin tools,
//! the settlement binary). Wires the ledger, the state machine and the
//! orchestrator over one set of collaborators.

use std::sync::Arc;

use rust_decimal::Decimal;

use super::coordinator::{OrchestratorConfig, SettlementOrchestrator, SettlementReport};
use super::db::WithdrawalRepository;
use super::machine::WithdrawalStateMachine;
use super::types::{BankDetails, Withdrawal, WithdrawalRequest};
use crate::core_types::{StoreId, WithdrawalId};
use crate::error::WalletError;
use crate::gateway::TransferGateway;
use crate::ledger::{BalanceLedger, StoreBalance, StoreRepository};
use crate::notify::Notifier;

pub struct WithdrawalService {
    ledger: Arc<BalanceLedger>,
    machine: Arc<WithdrawalStateMachine>,
    orchestrator: Arc<SettlementOrchestrator>,
    repo: Arc<dyn WithdrawalRepository>,
}

impl WithdrawalService {
    pub fn new(
        stores: Arc<dyn StoreRepository>,
        repo: Arc<dyn WithdrawalRepository>,
        gateway: Arc<dyn TransferGateway>,
        notifier: Arc<dyn Notifier>,
        operator_email: impl Into<String>,
        config: OrchestratorConfig,
    ) -> Self {
        let ledger = Arc::new(BalanceLedger::new(
            stores,
            repo.clone(),
            gateway.clone(),
            config.gateway_timeout,
        ));
        let machine = Arc::new(WithdrawalStateMachine::new(
            ledger.clone(),
            repo.clone(),
            notifier,
            operator_email,
        ));
        let orchestrator = Arc::new(SettlementOrchestrator::new(
            machine.clone(),
            repo.clone(),
            gateway,
            config,
        ));

        Self {
            ledger,
            machine,
            orchestrator,
            repo,
        }
    }

    pub fn orchestrator(&self) -> &Arc<SettlementOrchestrator> {
        &self.orchestrator
    }

    pub async fn create_withdrawal(
        &self,
        store_id: StoreId,
        amount: Decimal,
        bank: BankDetails,
    ) -> Result<Withdrawal, WalletError> {
        self.machine
            .create(WithdrawalRequest::new(store_id, amount, bank))
            .await
    }

    pub async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal, WalletError> {
        self.machine.load(id).await
    }

    /// Newest first; `StoreNotFound` if the store does not exist
    pub async fn list_store_withdrawals(
        &self,
        store_id: StoreId,
    ) -> Result<Vec<Withdrawal>, WalletError> {
        let (_, list) = tokio::try_join!(
            self.ledger.store_profile(store_id),
            self.repo.list_by_store(store_id)
        )?;
        Ok(list)
    }

    /// Every pending withdrawal, oldest first
    pub async fn list_pending_withdrawals(&self) -> Result<Vec<Withdrawal>, WalletError> {
        self.repo.list_pending(usize::MAX).await
    }

    pub async fn process_pending_withdrawals(&self) -> Result<SettlementReport, WalletError> {
        self.orchestrator.process_pending_withdrawals().await
    }

    pub async fn approve_withdrawal(&self, id: WithdrawalId) -> Result<Withdrawal, WalletError> {
        self.machine.approve(id).await
    }

    /// Operator rejection; only a PENDING withdrawal can be rejected here
    pub async fn reject_withdrawal(
        &self,
        id: WithdrawalId,
        reason: &str,
    ) -> Result<Withdrawal, WalletError> {
        self.machine.reject(id, reason).await
    }

    pub async fn complete_withdrawal(
        &self,
        id: WithdrawalId,
        transfer_ref: &str,
    ) -> Result<Withdrawal, WalletError> {
        self.machine.complete(id, transfer_ref).await
    }

    pub async fn get_balances(&self, store_id: StoreId) -> Result<StoreBalance, WalletError> {
        self.ledger.get_balances(store_id).await
    }

    /// Order payment completed: add revenue to the wallet bucket
    pub async fn credit_wallet(
        &self,
        store_id: StoreId,
        amount: Decimal,
    ) -> Result<StoreBalance, WalletError> {
        self.ledger.credit_wallet(store_id, amount).await
    }
}
