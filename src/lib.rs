//! Wallet Ledger - per-user monetary accounts on an immutable double-entry log
//!
//! Every balance change is a committed [`ledger::LedgerEntry`]; the account's
//! cached balance is a fold of those entries and can never go negative.
//!
//! # Modules
//!
//! - [`money`] - Enforced fixed-point `Amount` and `Balance` types
//! - [`account`] - Wallet accounts and their lifecycle service
//! - [`ledger`] - Immutable entry model and append/read service
//! - [`transfer`] - Atomic wallet-to-wallet transfer engine
//! - [`escrow`] - Hold/release escrow manager
//! - [`store`] - Persistence seam (PostgreSQL and in-memory backends)
//! - [`reconcile`] - Gateway verification and the reconciliation sweep
//! - [`db`] - Connection pool and schema bootstrap
//! - [`config`] / [`logging`] - Runtime wiring for the `walletd` binary

pub mod account;
pub mod config;
pub mod db;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod reconcile;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{AccountService, AccountType, OwnerRef, WalletAccount};
pub use error::WalletError;
pub use escrow::{Escrow, EscrowManager};
pub use ledger::{Direction, EntryFilter, EntryStatus, LedgerEntry, LedgerService};
pub use money::{Amount, Balance};
pub use reconcile::{PaymentGateway, PaystackClient, ReconciliationJob};
pub use store::{MemoryStore, PgStore, WalletStore};
pub use transfer::{Transfer, TransferEngine, TransferStatus};
