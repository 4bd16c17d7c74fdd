//! walletd - wallet ledger reconciliation worker
//!
//! Connects to PostgreSQL, bootstraps the wallet schema, then runs the
//! gateway reconciliation sweep on a fixed cadence. Transfers, escrows and
//! ledger appends are library calls made by the embedding service; this
//! binary only settles pending gateway entries.

use std::sync::Arc;
use std::time::Duration;

use wallet_ledger::config::AppConfig;
use wallet_ledger::db::Database;
use wallet_ledger::reconcile::{PaystackClient, ReconciliationJob};
use wallet_ledger::store::PgStore;

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env)?;
    let _log_guard = wallet_ledger::logging::init_logging(&config);

    tracing::info!("starting walletd in {} mode", env);

    let database = Database::connect(&config.postgres_url).await?;
    database.ensure_schema().await?;
    database.health_check().await?;

    let store = Arc::new(PgStore::new(database.pool().clone()));
    let gateway = Arc::new(PaystackClient::new(
        config.paystack.base_url.clone(),
        config.paystack_secret(),
    ));
    let job = ReconciliationJob::new(
        store,
        gateway,
        Duration::from_secs(config.reconciliation.verify_timeout_secs),
    );

    let mut cadence =
        tokio::time::interval(Duration::from_secs(config.reconciliation.interval_secs));
    loop {
        cadence.tick().await;
        if let Err(e) = job.run_once().await {
            tracing::error!(error = %e, "reconciliation sweep failed");
        }
    }
}
