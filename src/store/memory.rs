//! In-memory wallet store.
//!
//! Backend used by the test suite and by embedders that do not need
//! durability. The concurrency contract matches the PostgreSQL backend:
//! each account's state (cached balance + entry log) sits behind its own
//! async mutex, and operations touching two accounts acquire both mutexes
//! in ascending account-number order.

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

use async_trait::async_trait;

use super::{NewEntry, WalletStore};
use crate::account::{NewAccount, OwnerRef, RecordMeta, WalletAccount};
use crate::error::WalletError;
use crate::escrow::{self, Escrow};
use crate::ledger::{Direction, EntryFilter, EntryStatus, LedgerEntry};
use crate::money::Balance;
use crate::transfer::{Transfer, TransferStatus};

/// Cached balance plus the account's slice of the append-only ledger, all
/// guarded by one mutex so the fold invariant cannot be observed broken.
struct AccountState {
    account: WalletAccount,
    entries: Vec<LedgerEntry>,
}

/// Map value: the immutable account number is kept outside the mutex so lock
/// ordering can be decided without locking.
struct AccountSlot {
    number: String,
    state: Arc<Mutex<AccountState>>,
}

pub struct MemoryStore {
    accounts: DashMap<OwnerRef, AccountSlot>,
    /// account number -> owner, uniqueness guard
    numbers: DashMap<String, OwnerRef>,
    transfers: DashMap<String, Arc<Mutex<Transfer>>>,
    escrows: DashMap<String, Arc<Mutex<Escrow>>>,
    /// pending external entry reference -> owner
    external_index: DashMap<String, OwnerRef>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            numbers: DashMap::new(),
            transfers: DashMap::new(),
            escrows: DashMap::new(),
            external_index: DashMap::new(),
        }
    }

    fn state_of(&self, owner: OwnerRef) -> Result<Arc<Mutex<AccountState>>, WalletError> {
        self.accounts
            .get(&owner)
            .map(|slot| slot.state.clone())
            .ok_or(WalletError::AccountNotFound)
    }

    fn number_of(&self, owner: OwnerRef) -> Result<String, WalletError> {
        self.accounts
            .get(&owner)
            .map(|slot| slot.number.clone())
            .ok_or(WalletError::AccountNotFound)
    }

    /// Lock two distinct account states in ascending account-number order.
    async fn lock_pair<'a>(
        &self,
        first: &'a Arc<Mutex<AccountState>>,
        first_number: &str,
        second: &'a Arc<Mutex<AccountState>>,
        second_number: &str,
    ) -> (MutexGuard<'a, AccountState>, MutexGuard<'a, AccountState>) {
        if first_number <= second_number {
            let a = first.lock().await;
            let b = second.lock().await;
            (a, b)
        } else {
            let b = second.lock().await;
            let a = first.lock().await;
            (a, b)
        }
    }

    /// Commit one entry and the matching balance under an already-held lock.
    fn commit_entry(
        state: &mut AccountState,
        entry: NewEntry,
    ) -> Result<LedgerEntry, WalletError> {
        let (before, after) = entry.direction.apply(state.account.balance, entry.amount)?;
        let committed = LedgerEntry::committed(
            entry.reference,
            entry.owner,
            entry.direction,
            entry.amount,
            before,
            after,
            entry.narration,
            entry.external_reference,
            Utc::now(),
        );
        state.entries.push(committed.clone());
        state.account.balance = after;
        state.account.meta.updated_at = committed.created_at();
        Ok(committed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn create_account(&self, new: NewAccount) -> Result<WalletAccount, WalletError> {
        use dashmap::mapref::entry::Entry;

        // Reserve the account number first; the caller retries with a fresh
        // number on collision.
        match self.numbers.entry(new.account_number.clone()) {
            Entry::Occupied(_) => {
                return Err(WalletError::DuplicateReference(new.account_number));
            }
            Entry::Vacant(slot) => {
                slot.insert(new.owner);
            }
        }

        let account = WalletAccount {
            owner: new.owner,
            account_number: new.account_number.clone(),
            account_type: new.account_type,
            currency: new.currency,
            balance: Balance::zero(),
            payout_account: None,
            meta: RecordMeta::new(new.created_by, Utc::now()),
        };

        match self.accounts.entry(new.owner) {
            Entry::Occupied(_) => {
                self.numbers.remove(&new.account_number);
                Err(WalletError::DuplicateOwner)
            }
            Entry::Vacant(slot) => {
                slot.insert(AccountSlot {
                    number: new.account_number,
                    state: Arc::new(Mutex::new(AccountState {
                        account: account.clone(),
                        entries: Vec::new(),
                    })),
                });
                Ok(account)
            }
        }
    }

    async fn get_account(&self, owner: OwnerRef) -> Result<WalletAccount, WalletError> {
        let state = self.state_of(owner)?;
        let guard = state.lock().await;
        if !guard.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }
        Ok(guard.account.clone())
    }

    async fn deactivate_account(&self, owner: OwnerRef) -> Result<(), WalletError> {
        let state = self.state_of(owner)?;
        let mut guard = state.lock().await;
        guard.account.meta.is_active = false;
        guard.account.meta.updated_at = Utc::now();
        Ok(())
    }

    async fn set_payout_account(
        &self,
        owner: OwnerRef,
        payout_account: String,
    ) -> Result<(), WalletError> {
        let state = self.state_of(owner)?;
        let mut guard = state.lock().await;
        if !guard.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }
        guard.account.payout_account = Some(payout_account);
        guard.account.meta.updated_at = Utc::now();
        Ok(())
    }

    async fn append_entry(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError> {
        let state = self.state_of(entry.owner)?;
        let mut guard = state.lock().await;
        if !guard.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }
        Self::commit_entry(&mut guard, entry)
    }

    async fn list_entries(
        &self,
        owner: OwnerRef,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        let state = self.state_of(owner)?;
        let guard = state.lock().await;
        let iter = guard
            .entries
            .iter()
            .rev()
            .filter(|e| filter.direction.is_none_or(|d| e.direction() == d))
            .filter(|e| filter.status.is_none_or(|s| e.status() == s))
            .cloned();
        Ok(match filter.limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }

    async fn insert_transfer(&self, transfer: Transfer) -> Result<Transfer, WalletError> {
        use dashmap::mapref::entry::Entry;
        match self.transfers.entry(transfer.reference.clone()) {
            Entry::Occupied(existing) => Ok(existing.get().lock().await.clone()),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(transfer.clone())));
                Ok(transfer)
            }
        }
    }

    async fn get_transfer(&self, reference: &str) -> Result<Option<Transfer>, WalletError> {
        match self.transfers.get(reference) {
            Some(arc) => {
                let arc = arc.clone();
                let guard = arc.lock().await;
                Ok(Some(guard.clone()))
            }
            None => Ok(None),
        }
    }

    async fn execute_transfer(&self, reference: &str) -> Result<Transfer, WalletError> {
        let record = self
            .transfers
            .get(reference)
            .map(|r| r.clone())
            .ok_or_else(|| WalletError::TransferNotFound(reference.to_string()))?;

        // Per-transfer serialization: a concurrent retry of the same
        // reference blocks here and observes the terminal state.
        let mut transfer = record.lock().await;
        if transfer.status.is_terminal() {
            return Ok(transfer.clone());
        }
        if transfer.source == transfer.destination {
            return Err(WalletError::SameAccount);
        }

        let src_number = self.number_of(transfer.source)?;
        let dst_number = self.number_of(transfer.destination)?;
        let src_state = self.state_of(transfer.source)?;
        let dst_state = self.state_of(transfer.destination)?;

        let (mut src, mut dst) = self
            .lock_pair(&src_state, &src_number, &dst_state, &dst_number)
            .await;

        // Business failure: record it, commit nothing.
        let failure = if !src.account.meta.is_active {
            Some("source account is deactivated")
        } else if !dst.account.meta.is_active {
            Some("destination account is deactivated")
        } else if src.account.balance.debit(transfer.amount).is_none() {
            Some("insufficient funds")
        } else {
            None
        };
        if let Some(reason) = failure {
            warn!(reference = %transfer.reference, reason, "transfer failed");
            transfer.status = TransferStatus::Failed;
            transfer.updated_at = Utc::now();
            return Ok(transfer.clone());
        }

        Self::commit_entry(
            &mut src,
            NewEntry {
                reference: format!("{}-D", transfer.reference),
                owner: transfer.source,
                direction: Direction::Debit,
                amount: transfer.amount,
                narration: transfer.narration.clone(),
                external_reference: None,
            },
        )?;
        Self::commit_entry(
            &mut dst,
            NewEntry {
                reference: format!("{}-C", transfer.reference),
                owner: transfer.destination,
                direction: Direction::Credit,
                amount: transfer.amount,
                narration: transfer.narration.clone(),
                external_reference: None,
            },
        )?;

        transfer.status = TransferStatus::Success;
        transfer.updated_at = Utc::now();
        Ok(transfer.clone())
    }

    async fn open_escrow(
        &self,
        escrow: Escrow,
        hold_reference: String,
    ) -> Result<Escrow, WalletError> {
        use dashmap::mapref::entry::Entry;

        let sender_state = self.state_of(escrow.sender)?;
        let mut sender = sender_state.lock().await;
        if !sender.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }

        // Validate the debit before reserving the reference so a failed open
        // leaves nothing behind.
        if sender.account.balance.debit(escrow.amount).is_none() {
            return Err(WalletError::InsufficientFunds);
        }

        match self.escrows.entry(escrow.order_reference.clone()) {
            Entry::Occupied(_) => {
                return Err(WalletError::DuplicateReference(escrow.order_reference));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(escrow.clone())));
            }
        }

        Self::commit_entry(
            &mut sender,
            NewEntry {
                reference: hold_reference,
                owner: escrow.sender,
                direction: Direction::Debit,
                amount: escrow.amount,
                narration: escrow::hold_narration(&escrow.order_reference),
                external_reference: None,
            },
        )?;

        Ok(escrow)
    }

    async fn get_escrow(&self, order_reference: &str) -> Result<Option<Escrow>, WalletError> {
        match self.escrows.get(order_reference) {
            Some(arc) => {
                let arc = arc.clone();
                let guard = arc.lock().await;
                Ok(Some(guard.clone()))
            }
            None => Ok(None),
        }
    }

    async fn release_escrow(
        &self,
        order_reference: &str,
        release_reference: String,
    ) -> Result<Escrow, WalletError> {
        let record = self
            .escrows
            .get(order_reference)
            .map(|r| r.clone())
            .ok_or_else(|| WalletError::EscrowNotFound(order_reference.to_string()))?;

        let mut escrow = record.lock().await;
        if escrow.is_released {
            // Idempotent retry: one transition, one timestamp.
            return Ok(escrow.clone());
        }

        let receiver_state = self.state_of(escrow.receiver)?;
        let mut receiver = receiver_state.lock().await;
        if !receiver.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }

        Self::commit_entry(
            &mut receiver,
            NewEntry {
                reference: release_reference,
                owner: escrow.receiver,
                direction: Direction::Credit,
                amount: escrow.amount,
                narration: escrow::release_narration(order_reference),
                external_reference: None,
            },
        )?;

        escrow.is_released = true;
        escrow.released_at = Some(Utc::now());
        Ok(escrow.clone())
    }

    async fn record_pending_external(&self, entry: NewEntry) -> Result<LedgerEntry, WalletError> {
        let external_reference = entry
            .external_reference
            .clone()
            .ok_or_else(|| WalletError::Gateway("missing external reference".to_string()))?;

        let state = self.state_of(entry.owner)?;
        let mut guard = state.lock().await;
        if !guard.account.meta.is_active {
            return Err(WalletError::AccountNotFound);
        }

        let pending = LedgerEntry::pending_external(
            entry.reference.clone(),
            entry.owner,
            entry.direction,
            entry.amount,
            guard.account.balance,
            entry.narration,
            external_reference,
            Utc::now(),
        );
        guard.entries.push(pending.clone());
        self.external_index.insert(entry.reference, entry.owner);
        Ok(pending)
    }

    async fn list_pending_external(&self) -> Result<Vec<LedgerEntry>, WalletError> {
        let mut pending = Vec::new();
        for slot in self.accounts.iter() {
            let guard = slot.state.lock().await;
            pending.extend(
                guard
                    .entries
                    .iter()
                    .filter(|e| e.status() == EntryStatus::Pending && e.external_reference().is_some())
                    .cloned(),
            );
        }
        pending.sort_by_key(|e| e.created_at());
        Ok(pending)
    }

    async fn finalize_external_entry(
        &self,
        reference: &str,
        success: bool,
    ) -> Result<LedgerEntry, WalletError> {
        let owner = self
            .external_index
            .get(reference)
            .map(|o| *o)
            .ok_or_else(|| WalletError::EntryNotFound(reference.to_string()))?;

        let state = self.state_of(owner)?;
        let mut guard = state.lock().await;
        let idx = guard
            .entries
            .iter()
            .position(|e| e.reference() == reference)
            .ok_or_else(|| WalletError::EntryNotFound(reference.to_string()))?;

        let current = guard.entries[idx].clone();
        if current.status().is_terminal() {
            // A racing worker already folded this verdict in.
            warn!(reference, "external entry already finalized");
            return Ok(current);
        }

        let finalized = if success {
            match current.direction().apply(guard.account.balance, current.amount()) {
                Ok((before, after)) => {
                    let done = current.finalize(EntryStatus::Success, before, after)?;
                    guard.account.balance = after;
                    guard.account.meta.updated_at = Utc::now();
                    done
                }
                Err(WalletError::InsufficientFunds) => {
                    // Gateway confirmed a payout the wallet can no longer
                    // cover. Never commit a negative balance: mark failed.
                    error!(reference, "confirmed external debit exceeds balance");
                    let bal = guard.account.balance;
                    current.finalize(EntryStatus::Failed, bal, bal)?
                }
                Err(e) => return Err(e),
            }
        } else {
            let bal = guard.account.balance;
            current.finalize(EntryStatus::Failed, bal, bal)?
        };

        guard.entries[idx] = finalized.clone();
        self.external_index.remove(reference);
        Ok(finalized)
    }
}
