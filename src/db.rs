//! Database connection management and schema bootstrap

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// PostgreSQL connection pool for the wallet store
pub struct Database {
    pool: PgPool,
}

/// Wallet schema. Monetary columns are NUMERIC(18, 2); balances carry a
/// non-negative CHECK as a last line of defense behind the application
/// invariant. Ledger entries are append-only: nothing in the schema or the
/// store issues UPDATEs against committed rows.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS wallet_accounts (
        tenant_id       BIGINT NOT NULL,
        user_id         BIGINT NOT NULL,
        account_number  VARCHAR(20) NOT NULL,
        account_type    SMALLINT NOT NULL,
        currency        VARCHAR(5) NOT NULL,
        balance         NUMERIC(18, 2) NOT NULL DEFAULT 0 CHECK (balance >= 0),
        payout_account  VARCHAR(100),
        created_by      BIGINT,
        is_active       BOOLEAN NOT NULL DEFAULT TRUE,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (tenant_id, user_id),
        CONSTRAINT wallet_accounts_number_key UNIQUE (account_number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        reference          VARCHAR(60) PRIMARY KEY,
        tenant_id          BIGINT NOT NULL,
        user_id            BIGINT NOT NULL,
        direction          SMALLINT NOT NULL,
        amount             NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
        balance_before     NUMERIC(18, 2) NOT NULL,
        balance_after      NUMERIC(18, 2) NOT NULL,
        narration          TEXT NOT NULL DEFAULT '',
        status             SMALLINT NOT NULL,
        external_reference VARCHAR(100),
        created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
        FOREIGN KEY (tenant_id, user_id)
            REFERENCES wallet_accounts (tenant_id, user_id)
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_owner_idx
        ON ledger_entries (tenant_id, user_id, created_at DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_pending_external_idx
        ON ledger_entries (created_at)
        WHERE status = 0 AND external_reference IS NOT NULL
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfers (
        reference        VARCHAR(60) PRIMARY KEY,
        tenant_id        BIGINT NOT NULL,
        source_user_id   BIGINT NOT NULL,
        dest_user_id     BIGINT NOT NULL,
        amount           NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
        narration        TEXT NOT NULL DEFAULT '',
        status           SMALLINT NOT NULL DEFAULT 0,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS escrows (
        order_reference  VARCHAR(100) PRIMARY KEY,
        tenant_id        BIGINT NOT NULL,
        sender_user_id   BIGINT NOT NULL,
        receiver_user_id BIGINT NOT NULL,
        amount           NUMERIC(18, 2) NOT NULL CHECK (amount > 0),
        is_released      BOOLEAN NOT NULL DEFAULT FALSE,
        released_at      TIMESTAMPTZ,
        created_at       TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

impl Database {
    /// Create a new database connection pool
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the wallet tables if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<(), sqlx::Error> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        tracing::info!("wallet schema ready");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
