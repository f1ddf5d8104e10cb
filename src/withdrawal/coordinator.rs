//! Settlement Orchestrator
//!
//! Drives stale PENDING withdrawals to a terminal state:
//!
//! ```text
//! PENDING (>= stale_after) --approve--> APPROVED --transfer ok----> COMPLETED
//!                                                --transfer error-> REJECTED (+refund)
//! ```
//!
//! Each withdrawal is handled on its own: one failure is logged and counted,
//! never propagated to its siblings.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, warn};

use super::db::WithdrawalRepository;
use super::machine::WithdrawalStateMachine;
use super::types::Withdrawal;
use super::state::WithdrawalStatus;
use crate::config::{ConfigError, SettlementConfig};
use crate::error::WalletError;
use crate::gateway::{TransferGateway, with_timeout};
use crate::money::{MINOR_UNIT_DECIMALS, to_minor_units};

/// Orchestrator tuning
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Minimum age before a pending withdrawal is paid out
    pub stale_after: chrono::Duration,
    /// Deadline for each provider call
    pub gateway_timeout: Duration,
    /// Withdrawals settled in parallel
    pub max_concurrency: usize,
    /// Narration sent with each transfer
    pub transfer_reason: String,
    /// Maximum pending withdrawals loaded per batch
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stale_after: chrono::Duration::hours(24),
            gateway_timeout: Duration::from_secs(5),
            max_concurrency: 4,
            transfer_reason: "Store withdrawal".to_string(),
            batch_size: 500,
        }
    }
}

impl TryFrom<&SettlementConfig> for OrchestratorConfig {
    type Error = ConfigError;

    fn try_from(c: &SettlementConfig) -> Result<Self, Self::Error> {
        let stale_after = i64::try_from(c.stale_after_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "settlement.stale_after_secs out of range: {}",
                    c.stale_after_secs
                ))
            })?;

        Ok(Self {
            stale_after,
            gateway_timeout: Duration::from_millis(c.gateway_timeout_ms),
            max_concurrency: c.max_concurrency.max(1),
            transfer_reason: c.transfer_reason.clone(),
            batch_size: c.batch_size,
        })
    }
}

/// What happened to one withdrawal in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Too young, left pending
    Skipped,
    Completed,
    /// Transfer failed, funds returned
    Rejected,
    /// Left in place for the next run or for an operator
    Failed,
}

/// Per-batch counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementReport {
    pub scanned: usize,
    pub skipped: usize,
    pub completed: usize,
    pub rejected: usize,
    pub failed: usize,
}

impl SettlementReport {
    fn record(&mut self, outcome: SettlementOutcome) {
        match outcome {
            SettlementOutcome::Skipped => self.skipped += 1,
            SettlementOutcome::Completed => self.completed += 1,
            SettlementOutcome::Rejected => self.rejected += 1,
            SettlementOutcome::Failed => self.failed += 1,
        }
    }

    /// Withdrawals that reached a terminal state in this batch
    pub fn settled(&self) -> usize {
        self.completed + self.rejected
    }
}

impl fmt::Display for SettlementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "scanned={} skipped={} completed={} rejected={} failed={}",
            self.scanned, self.skipped, self.completed, self.rejected, self.failed
        )
    }
}

pub struct SettlementOrchestrator {
    machine: Arc<WithdrawalStateMachine>,
    repo: Arc<dyn WithdrawalRepository>,
    gateway: Arc<dyn TransferGateway>,
    config: OrchestratorConfig,
}

impl SettlementOrchestrator {
    pub fn new(
        machine: Arc<WithdrawalStateMachine>,
        repo: Arc<dyn WithdrawalRepository>,
        gateway: Arc<dyn TransferGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            machine,
            repo,
            gateway,
            config,
        }
    }

    /// Settle every pending withdrawal older than the configured threshold
    pub async fn process_pending_withdrawals(&self) -> Result<SettlementReport, WalletError> {
        self.process_pending_at(Utc::now()).await
    }

    /// Same as [`process_pending_withdrawals`](Self::process_pending_withdrawals)
    /// with an explicit clock.
    ///
    /// Only fails if the pending list cannot be loaded.
    pub async fn process_pending_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<SettlementReport, WalletError> {
        let pending = self.repo.list_pending(self.config.batch_size).await?;
        if pending.is_empty() {
            debug!("No pending withdrawals");
            return Ok(SettlementReport::default());
        }

        let report = Mutex::new(SettlementReport {
            scanned: pending.len(),
            ..Default::default()
        });

        futures::stream::iter(pending)
            .for_each_concurrent(self.config.max_concurrency, |withdrawal| {
                let report = &report;
                async move {
                    let outcome = self.settle_one(withdrawal, now).await;
                    if let Ok(mut r) = report.lock() {
                        r.record(outcome);
                    }
                }
            })
            .await;

        let report = report
            .into_inner()
            .map_err(|_| WalletError::SystemError("settlement report poisoned".to_string()))?;
        if report.settled() > 0 || report.failed > 0 {
            info!(%report, "Settlement batch finished");
        } else {
            debug!(%report, "Settlement batch finished");
        }
        Ok(report)
    }

    async fn settle_one(&self, withdrawal: Withdrawal, now: DateTime<Utc>) -> SettlementOutcome {
        let id = withdrawal.id;
        if !withdrawal.is_stale(now, self.config.stale_after) {
            return SettlementOutcome::Skipped;
        }

        let approved = match self.machine.approve(id).await {
            Ok(w) => w,
            Err(e) => {
                warn!(withdrawal_id = %id, error = %e, "Approve failed, leaving withdrawal pending");
                return SettlementOutcome::Failed;
            }
        };

        match self.transfer(&approved).await {
            Ok(transfer_code) => match self.machine.complete(id, &transfer_code).await {
                Ok(_) => SettlementOutcome::Completed,
                Err(e) => {
                    // Money has left; refunding now would pay twice
                    error!(
                        withdrawal_id = %id,
                        transfer_code = %transfer_code,
                        error = %e,
                        "CRITICAL: transfer sent but completion not recorded, manual reconciliation required"
                    );
                    SettlementOutcome::Failed
                }
            },
            Err(cause) => {
                warn!(withdrawal_id = %id, error = %cause, "Transfer failed, rejecting withdrawal");
                let reason = format!("Failed to process transfer: {}", cause);
                match self.machine.reject_after_failed_transfer(id, reason).await {
                    Ok(_) => SettlementOutcome::Rejected,
                    Err(e) => {
                        let current = self.repo.get(id).await.ok().flatten().map(|w| w.status);
                        error!(
                            withdrawal_id = %id,
                            status = current.map(|s| s.as_str()).unwrap_or("unknown"),
                            error = %e,
                            "{}",
                            failed_rejection_message(current)
                        );
                        SettlementOutcome::Failed
                    }
                }
            }
        }
    }

    /// Resolve the recipient and send the money, each call under the deadline
    async fn transfer(&self, withdrawal: &Withdrawal) -> Result<String, WalletError> {
        let amount_minor = to_minor_units(withdrawal.amount, MINOR_UNIT_DECIMALS)?;
        let bank = &withdrawal.bank;

        let recipient = with_timeout(
            self.config.gateway_timeout,
            self.gateway
                .create_recipient(&bank.account_number, &bank.bank_code, &bank.account_name),
        )
        .await?;

        let reference = withdrawal.id.to_string();
        let transfer_code = with_timeout(
            self.config.gateway_timeout,
            self.gateway.initiate_transfer(
                amount_minor,
                &recipient,
                &self.config.transfer_reason,
                &reference,
            ),
        )
        .await?;

        debug!(
            withdrawal_id = %withdrawal.id,
            gateway = self.gateway.name(),
            recipient = %recipient,
            transfer_code = %transfer_code,
            "Transfer accepted"
        );
        Ok(transfer_code)
    }
}

/// Log line for a compensating rejection that did not go through.
///
/// A REJECTED record means the CAS won but the refund did not land.
fn failed_rejection_message(current: Option<WithdrawalStatus>) -> &'static str {
    match current {
        Some(WithdrawalStatus::Rejected) => {
            "CRITICAL: withdrawal rejected but refund not applied, manual reconciliation required"
        }
        Some(WithdrawalStatus::Approved) => {
            "Compensating rejection failed, withdrawal left APPROVED"
        }
        Some(_) => "Compensating rejection lost to another transition",
        None => "Compensating rejection failed, withdrawal status unknown",
    }
}
