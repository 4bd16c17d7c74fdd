use thiserror::Error;

use crate::money::MoneyError;

/// Wallet subsystem error taxonomy.
///
/// Business outcomes (`InsufficientFunds`, `DuplicateOwner`, ...) are expected
/// and surfaced to callers as typed failures. `ImmutableEntry` signals an
/// internal bug: no public operation may reach it.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("wallet account not found")]
    AccountNotFound,

    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    #[error("escrow not found: {0}")]
    EscrowNotFound(String),

    #[error("ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("owner already has a wallet account")]
    DuplicateOwner,

    #[error("duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("insufficient funds")]
    InsufficientFunds,

    #[error("source and destination accounts are the same")]
    SameAccount,

    #[error("currency mismatch between accounts")]
    CurrencyMismatch,

    #[error("committed ledger entry is immutable: {0}")]
    ImmutableEntry(String),

    #[error("payment gateway timed out")]
    GatewayTimeout,

    #[error("payment gateway error: {0}")]
    Gateway(String),

    #[error(transparent)]
    Money(#[from] MoneyError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WalletError {
    /// Whether this is an expected business outcome (as opposed to an
    /// infrastructure or internal error).
    pub fn is_business(&self) -> bool {
        matches!(
            self,
            WalletError::AccountNotFound
                | WalletError::TransferNotFound(_)
                | WalletError::EscrowNotFound(_)
                | WalletError::EntryNotFound(_)
                | WalletError::DuplicateOwner
                | WalletError::DuplicateReference(_)
                | WalletError::InsufficientFunds
                | WalletError::SameAccount
                | WalletError::CurrencyMismatch
                | WalletError::Money(_)
        )
    }
}

/// Map a PostgreSQL unique violation (SQLSTATE 23505) to the matching
/// duplicate variant; everything else passes through as a database error.
pub(crate) fn map_unique_violation(err: sqlx::Error, duplicate: WalletError) -> WalletError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return duplicate;
        }
    }
    WalletError::Database(err)
}
