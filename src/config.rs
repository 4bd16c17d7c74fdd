use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    /// PostgreSQL connection URL for the wallet store
    pub postgres_url: String,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    #[serde(default)]
    pub paystack: PaystackConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconciliationConfig {
    /// Seconds between reconciliation sweeps
    pub interval_secs: u64,
    /// Upper bound on a single gateway verify call, in seconds
    pub verify_timeout_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self { interval_secs: 300, verify_timeout_secs: 10 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    /// Falls back to the PAYSTACK_SECRET_KEY environment variable when empty
    pub secret_key: String,
}

impl Default for PaystackConfig {
    fn default() -> Self {
        Self { base_url: "https://api.paystack.co".to_string(), secret_key: String::new() }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> anyhow::Result<Self> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", config_path, e))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("failed to parse {}: {}", config_path, e))?;
        Ok(config)
    }

    pub fn paystack_secret(&self) -> String {
        if !self.paystack.secret_key.is_empty() {
            return self.paystack.secret_key.clone();
        }
        std::env::var("PAYSTACK_SECRET_KEY").unwrap_or_default()
    }
}
