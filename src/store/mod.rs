//! Wallet storage seam.
//!
//! [`WalletStore`] is the persistence boundary for the wallet subsystem.
//! Every method that mutates a balance is one atomic unit on the backend:
//! the affected account rows are locked exclusively before the balance is
//! read, and the entry write and balance write commit (or roll back)
//! together. Two backends ship with the crate:
//!
//! - [`PgStore`]: PostgreSQL via sqlx, `SELECT ... FOR UPDATE` row locks.
//! - [`MemoryStore`]: per-account async mutexes, for tests and embedders.
//!
//! The append-only ledger may be read without locking; the cached balance is
//! the only field requiring a locked read-modify-write.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;

use crate::account::{NewAccount, OwnerRef, WalletAccount};
use crate::error::WalletError;
use crate::escrow::Escrow;
use crate::ledger::{Direction, EntryFilter, LedgerEntry};
use crate::money::Amount;
use crate::transfer::Transfer;

/// Request shape for a single ledger entry append.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub reference: String,
    pub owner: OwnerRef,
    pub direction: Direction,
    pub amount: Amount,
    pub narration: String,
    pub external_reference: Option<String>,
}

/// Persistence boundary for accounts, ledger entries, transfers and escrows.
#[async_trait]
pub trait WalletStore: Send + Sync {
    // -- Account Store ------------------------------------------------------

    /// Insert a new account. Uniqueness is enforced by the backend constraint
    /// (not a pre-check): `DuplicateOwner` when the owner already has an
    /// account, `DuplicateReference` when the generated account number
    /// collides (the caller retries with a fresh number).
    async fn create_account(&self, new: NewAccount) -> Result<WalletAccount, WalletError>;

    /// Fetch an active account. `AccountNotFound` if absent or deactivated.
    async fn get_account(&self, owner: OwnerRef) -> Result<WalletAccount, WalletError>;

    /// Soft-deactivate. Balance is neither zeroed nor migrated.
    async fn deactivate_account(&self, owner: OwnerRef) -> Result<(), WalletError>;

    /// Record the gateway-provisioned payout account for an owner.
    async fn set_payout_account(
        &self,
        owner: OwnerRef,
        payout_account: String,
    ) -> Result<(), WalletError>;

    // -- Ledger -------------------------------------------------------------

    /// Append one committed entry and write the new cached balance as one
    /// atomic unit. The only path by which a balance changes.
    async fn append_entry(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError>;

    /// Read entries for an account, newest-first. No side effects.
    async fn list_entries(
        &self,
        owner: OwnerRef,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError>;

    // -- Transfer Engine ----------------------------------------------------

    /// Persist a pending transfer record. Re-inserting an existing reference
    /// returns the stored record unchanged (idempotent initiate).
    async fn insert_transfer(&self, transfer: Transfer) -> Result<Transfer, WalletError>;

    async fn get_transfer(&self, reference: &str) -> Result<Option<Transfer>, WalletError>;

    /// Execute a pending transfer: debit entry on source, credit entry on
    /// destination, both balances and the status flip, all-or-nothing.
    /// Business failures (insufficient funds, deactivated destination) move
    /// the record to `Failed` with no entries committed. Executing a terminal
    /// transfer returns it unchanged.
    async fn execute_transfer(&self, reference: &str) -> Result<Transfer, WalletError>;

    // -- Escrow Manager -----------------------------------------------------

    /// Insert an escrow and debit the hold from the sender atomically.
    /// `DuplicateReference` if an escrow exists for the order reference;
    /// `InsufficientFunds` leaves no escrow behind.
    async fn open_escrow(
        &self,
        escrow: Escrow,
        hold_reference: String,
    ) -> Result<Escrow, WalletError>;

    async fn get_escrow(&self, order_reference: &str) -> Result<Option<Escrow>, WalletError>;

    /// Release an escrow: credit the receiver and flip the flag atomically.
    /// No-op returning the stored record when already released.
    async fn release_escrow(
        &self,
        order_reference: &str,
        release_reference: String,
    ) -> Result<Escrow, WalletError>;

    // -- Reconciliation collaborator surface --------------------------------

    /// Record a provisional gateway-originated entry (no balance effect).
    async fn record_pending_external(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError>;

    /// All pending entries carrying an external reference, oldest-first.
    async fn list_pending_external(&self) -> Result<Vec<LedgerEntry>, WalletError>;

    /// Fold a gateway verdict into the ledger: `success` commits the entry
    /// and applies the balance atomically, otherwise the entry is marked
    /// failed with no balance effect. Guarded on the pending status so a
    /// racing finalize applies at most once.
    async fn finalize_external_entry(
        &self,
        reference: &str,
        success: bool,
    ) -> Result<LedgerEntry, WalletError>;
}
