use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for stores and withdrawals
    #[serde(default)]
    pub postgres_url: Option<String>,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

/// Transfer provider connection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    /// Bearer secret; may be left empty in the file and supplied via
    /// `TRANSFER_GATEWAY_SECRET`
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_gateway_timeout_ms() -> u64 {
    5000
}

fn default_currency() -> String {
    "NGN".to_string()
}

/// Settlement batch tuning
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct SettlementConfig {
    /// Pending withdrawals younger than this are left alone
    pub stale_after_secs: u64,
    pub scan_interval_secs: u64,
    /// Deadline for each provider call made while settling
    pub gateway_timeout_ms: u64,
    pub max_concurrency: usize,
    pub transfer_reason: String,
    pub batch_size: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 86_400,
            scan_interval_secs: 300,
            gateway_timeout_ms: 5000,
            max_concurrency: 4,
            transfer_reason: "Store withdrawal".to_string(),
            batch_size: 500,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    pub operator_email: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            operator_email: "operations@localhost".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&content)?;

        if let Ok(secret) = std::env::var("TRANSFER_GATEWAY_SECRET") {
            config.gateway.secret_key = secret;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.postgres_url = Some(url);
        }
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("gateway.base_url is empty".to_string()));
        }
        if self.settlement.gateway_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "settlement.gateway_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.settlement.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "settlement.scan_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
