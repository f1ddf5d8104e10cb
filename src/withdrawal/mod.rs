//! Store Withdrawal FSM
//!
//! Payouts of store balances to a bank account, tracked as a persistent
//! state machine in PostgreSQL.
//!
//! # State Machine
//!
//! ```text
//! PENDING ──approve──▶ APPROVED ──complete──▶ COMPLETED
//!    │                    │
//!    └──reject──▶ REJECTED ◀──reject (transfer failed)
//! ```
//!
//! # Safety Invariants
//!
//! 1. **Deduct-on-Create**: funds leave the store balance when the request is
//!    recorded, not when the money is sent
//! 2. **CAS Transitions**: every status write is conditional on the expected
//!    current status; exactly one caller wins a race
//! 3. **Refund-on-Reject**: the rejecting caller that won the CAS, and only
//!    that caller, returns the stored split to the store
//! 4. **No Refund after Transfer**: once the provider accepted a transfer the
//!    withdrawal is never rejected

pub mod coordinator;
pub mod db;
pub mod machine;
pub mod service;
pub mod state;
pub mod types;
pub mod worker;


pub use coordinator::{OrchestratorConfig, SettlementOrchestrator, SettlementReport};
pub use db::{PgWithdrawalRepository, WithdrawalRepository};
pub use machine::WithdrawalStateMachine;
pub use service::WithdrawalService;
pub use state::WithdrawalStatus;
pub use types::{BankDetails, StatusChange, Withdrawal, WithdrawalRequest};
pub use worker::{SettlementWorker, WorkerConfig};
