//! Wallet-to-wallet transfer engine
//!
//! `initiate` validates and records a Pending transfer; `execute` applies it
//! as one atomic unit on the store (debit entry, credit entry, both balances,
//! status flip). A transfer that fails a business check lands in `Failed`
//! with no entries committed; re-executing a terminal transfer returns it
//! unchanged.

use std::sync::Arc;

use tracing::info;

use super::{Transfer, TransferStatus};
use crate::account::OwnerRef;
use crate::error::WalletError;
use crate::ledger::new_reference;
use crate::money::Amount;
use crate::store::WalletStore;

pub struct TransferEngine {
    store: Arc<dyn WalletStore>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Validate and record a Pending transfer.
    ///
    /// Transfers are tenant-scoped: a destination outside the source tenant
    /// reads as absent. Currencies must match.
    pub async fn initiate(
        &self,
        source: OwnerRef,
        destination: OwnerRef,
        amount: Amount,
        narration: impl Into<String>,
    ) -> Result<Transfer, WalletError> {
        if source == destination {
            return Err(WalletError::SameAccount);
        }
        if source.tenant_id != destination.tenant_id {
            return Err(WalletError::AccountNotFound);
        }

        let src = self.store.get_account(source).await?;
        let dst = self.store.get_account(destination).await?;
        if src.currency != dst.currency {
            return Err(WalletError::CurrencyMismatch);
        }

        let transfer = Transfer::pending(
            new_reference("TRF"),
            source,
            destination,
            amount,
            narration.into(),
            chrono::Utc::now(),
        );
        let transfer = self.store.insert_transfer(transfer).await?;

        info!(
            reference = %transfer.reference,
            %source,
            %destination,
            amount = %amount,
            "transfer initiated"
        );
        Ok(transfer)
    }

    /// Apply a pending transfer. Exactly-once: terminal transfers come back
    /// unchanged.
    pub async fn execute(&self, reference: &str) -> Result<Transfer, WalletError> {
        let transfer = self.store.execute_transfer(reference).await?;
        if transfer.status == TransferStatus::Success {
            info!(reference, amount = %transfer.amount, "transfer settled");
        }
        Ok(transfer)
    }

    /// Initiate and immediately execute.
    pub async fn transfer(
        &self,
        source: OwnerRef,
        destination: OwnerRef,
        amount: Amount,
        narration: impl Into<String>,
    ) -> Result<Transfer, WalletError> {
        let pending = self.initiate(source, destination, amount, narration).await?;
        self.execute(&pending.reference).await
    }

    pub async fn get(&self, reference: &str) -> Result<Transfer, WalletError> {
        self.store
            .get_transfer(reference)
            .await?
            .ok_or_else(|| WalletError::TransferNotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, NewAccount};
    use crate::ledger::{Direction, EntryFilter, LedgerService};
    use crate::store::MemoryStore;

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    async fn seed_account(store: &Arc<MemoryStore>, user_id: i64, number: &str, opening: &str) -> OwnerRef {
        let owner = OwnerRef::new(1, user_id);
        store
            .create_account(NewAccount {
                owner,
                account_number: number.into(),
                account_type: AccountType::Customer,
                currency: "NGN".into(),
                created_by: None,
            })
            .await
            .unwrap();
        if opening != "0" {
            LedgerService::new(store.clone())
                .credit(owner, amt(opening), "Opening", None)
                .await
                .unwrap();
        }
        owner
    }

    #[tokio::test]
    async fn test_transfer_moves_funds_and_pairs_entries() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_account(&store, 1, "1000000001", "100.00").await;
        let b = seed_account(&store, 2, "1000000002", "0").await;
        let engine = TransferEngine::new(store.clone());

        let done = engine.transfer(a, b, amt("50.00"), "Payout").await.unwrap();
        assert_eq!(done.status, TransferStatus::Success);

        assert_eq!(store.get_account(a).await.unwrap().balance.to_string(), "50.00");
        assert_eq!(store.get_account(b).await.unwrap().balance.to_string(), "50.00");

        let src_entries = store.list_entries(a, EntryFilter::default()).await.unwrap();
        let debit = &src_entries[0];
        assert_eq!(debit.reference(), format!("{}-D", done.reference));
        assert_eq!(debit.direction(), Direction::Debit);

        let dst_entries = store.list_entries(b, EntryFilter::default()).await.unwrap();
        let credit = &dst_entries[0];
        assert_eq!(credit.reference(), format!("{}-C", done.reference));
        assert_eq!(credit.direction(), Direction::Credit);
    }

    #[tokio::test]
    async fn test_same_account_rejected() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_account(&store, 1, "1000000001", "100.00").await;
        let engine = TransferEngine::new(store);

        let err = engine.initiate(a, a, amt("10.00"), "Self").await.unwrap_err();
        assert!(matches!(err, WalletError::SameAccount));
    }

    #[tokio::test]
    async fn test_cross_tenant_rejected() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_account(&store, 1, "1000000001", "100.00").await;
        let engine = TransferEngine::new(store);

        let other = OwnerRef::new(2, 1);
        let err = engine.initiate(a, other, amt("10.00"), "Cross").await.unwrap_err();
        assert!(matches!(err, WalletError::AccountNotFound));
    }

    #[tokio::test]
    async fn test_insufficient_funds_marks_failed_no_entries() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_account(&store, 1, "1000000001", "20.00").await;
        let b = seed_account(&store, 2, "1000000002", "0").await;
        let engine = TransferEngine::new(store.clone());

        let done = engine.transfer(a, b, amt("50.00"), "Too much").await.unwrap();
        assert_eq!(done.status, TransferStatus::Failed);

        assert_eq!(store.get_account(a).await.unwrap().balance.to_string(), "20.00");
        assert_eq!(store.get_account(b).await.unwrap().balance.to_string(), "0.00");
        assert_eq!(store.list_entries(b, EntryFilter::default()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_reexecute_terminal_transfer_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let a = seed_account(&store, 1, "1000000001", "100.00").await;
        let b = seed_account(&store, 2, "1000000002", "0").await;
        let engine = TransferEngine::new(store.clone());

        let done = engine.transfer(a, b, amt("50.00"), "Payout").await.unwrap();
        let again = engine.execute(&done.reference).await.unwrap();
        assert_eq!(again.status, TransferStatus::Success);

        // Applied exactly once.
        assert_eq!(store.get_account(a).await.unwrap().balance.to_string(), "50.00");
        assert_eq!(store.get_account(b).await.unwrap().balance.to_string(), "50.00");
    }
}
