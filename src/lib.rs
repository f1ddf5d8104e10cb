//! Store Wallet - balances and withdrawal settlement for marketplace stores
//!
//! # Modules
//!
//! - [`core_types`] - Identifiers (StoreId, WithdrawalId)
//! - [`money`] - Amount validation and minor-unit conversion
//! - [`ledger`] - Per-store external/wallet balances, external-first deduction
//! - [`withdrawal`] - Withdrawal FSM, settlement orchestrator and worker
//! - [`gateway`] - Bank-transfer provider contract and HTTP adapter
//! - [`notify`] - Best-effort withdrawal notifications
//! - [`db`] - PostgreSQL pool
//! - [`config`] / [`logging`] - Process setup

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod notify;
pub mod withdrawal;

// Convenient re-exports at crate root
pub use core_types::{StoreId, WithdrawalId};
pub use error::WalletError;
pub use gateway::{GatewayError, HttpTransferGateway, TransferGateway};
pub use ledger::{BalanceLedger, BalanceSplit, StoreBalance};
pub use notify::{LogNotifier, Notifier};
pub use withdrawal::{
    BankDetails, SettlementOrchestrator, SettlementReport, SettlementWorker, Withdrawal,
    WithdrawalService, WithdrawalStatus,
};
