//! Settlement Worker
//!
//! Pays out store withdrawals that have been pending for a day:
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐
//! │ Postgres │───▶│ Orchestrator │───▶│   Transfer   │
//! │(pending) │◀───│ (approve/…)  │◀───│   Provider   │
//! └──────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! Usage:
//!   settlement-worker [--env <name>] [--once]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use store_wallet::config::AppConfig;
use store_wallet::db::Database;
use store_wallet::gateway::HttpTransferGateway;
use store_wallet::ledger::PgStoreRepository;
use store_wallet::notify::LogNotifier;
use store_wallet::withdrawal::{
    OrchestratorConfig, PgWithdrawalRepository, SettlementWorker, WithdrawalService, WorkerConfig,
};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn run_once() -> bool {
    std::env::args().any(|a| a == "--once")
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env).with_context(|| format!("loading env '{}'", env))?;
    let _log_guard = store_wallet::logging::init_logging(&app_config);

    info!(env = %env, "Settlement worker starting");

    let postgres_url = app_config
        .postgres_url
        .as_deref()
        .context("postgres_url is not configured")?;
    let db = Database::connect(postgres_url)
        .await
        .context("connecting to PostgreSQL")?;
    db.health_check().await.context("PostgreSQL health check")?;

    let orchestrator_config = OrchestratorConfig::try_from(&app_config.settlement)?;
    let gateway = Arc::new(HttpTransferGateway::new(&app_config.gateway)?);
    let service = WithdrawalService::new(
        Arc::new(PgStoreRepository::new(db.pool().clone())),
        Arc::new(PgWithdrawalRepository::new(db.pool().clone())),
        gateway,
        Arc::new(LogNotifier),
        app_config.notifications.operator_email.clone(),
        orchestrator_config,
    );

    if run_once() {
        let report = service.process_pending_withdrawals().await?;
        info!(%report, "Single settlement batch finished");
        println!("{}", report);
        return Ok(());
    }

    let worker = SettlementWorker::new(
        service.orchestrator().clone(),
        WorkerConfig {
            scan_interval: Duration::from_secs(app_config.settlement.scan_interval_secs),
        },
    );
    worker.run().await
}
