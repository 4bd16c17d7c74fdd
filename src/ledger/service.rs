//! Ledger append and read service
//!
//! All balance movement funnels through [`WalletStore::append_entry`]; this
//! service only shapes requests and stamps references. The `TXN` prefix marks
//! single-account entries; transfers and escrows stamp their own prefixes.

use std::sync::Arc;

use tracing::info;

use super::{Direction, EntryFilter, LedgerEntry, new_reference};
use crate::account::OwnerRef;
use crate::error::WalletError;
use crate::money::Amount;
use crate::store::{NewEntry, WalletStore};

pub struct LedgerService {
    store: Arc<dyn WalletStore>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Credit an account and return the committed entry.
    pub async fn credit(
        &self,
        owner: OwnerRef,
        amount: Amount,
        narration: impl Into<String>,
        external_reference: Option<String>,
    ) -> Result<LedgerEntry, WalletError> {
        self.append(owner, Direction::Credit, amount, narration.into(), external_reference)
            .await
    }

    /// Debit an account, `InsufficientFunds` if the balance cannot cover it.
    pub async fn debit(
        &self,
        owner: OwnerRef,
        amount: Amount,
        narration: impl Into<String>,
        external_reference: Option<String>,
    ) -> Result<LedgerEntry, WalletError> {
        self.append(owner, Direction::Debit, amount, narration.into(), external_reference)
            .await
    }

    async fn append(
        &self,
        owner: OwnerRef,
        direction: Direction,
        amount: Amount,
        narration: String,
        external_reference: Option<String>,
    ) -> Result<LedgerEntry, WalletError> {
        let entry = self
            .store
            .append_entry(NewEntry {
                reference: new_reference("TXN"),
                owner,
                direction,
                amount,
                narration,
                external_reference,
            })
            .await?;

        info!(
            reference = entry.reference(),
            %owner,
            direction = %direction,
            amount = %amount,
            balance_after = %entry.balance_after(),
            "ledger entry committed"
        );
        Ok(entry)
    }

    /// Entries for an account, newest-first.
    pub async fn list_entries(
        &self,
        owner: OwnerRef,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>, WalletError> {
        self.store.list_entries(owner, filter).await
    }

    /// Record a provisional gateway-originated credit. No balance effect
    /// until reconciliation (or the webhook path) finalizes it.
    pub async fn record_external_credit(
        &self,
        owner: OwnerRef,
        amount: Amount,
        narration: impl Into<String>,
        external_reference: String,
    ) -> Result<LedgerEntry, WalletError> {
        let entry = self
            .store
            .record_pending_external(NewEntry {
                reference: new_reference("TXN"),
                owner,
                direction: Direction::Credit,
                amount,
                narration: narration.into(),
                external_reference: Some(external_reference),
            })
            .await?;

        info!(
            reference = entry.reference(),
            external_reference = ?entry.external_reference(),
            %owner,
            amount = %amount,
            "pending external credit recorded"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{AccountType, NewAccount};
    use crate::ledger::EntryStatus;
    use crate::store::MemoryStore;

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    async fn seeded() -> (LedgerService, OwnerRef) {
        let store = Arc::new(MemoryStore::new());
        let owner = OwnerRef::new(1, 100);
        store
            .create_account(NewAccount {
                owner,
                account_number: "1000000001".into(),
                account_type: AccountType::Customer,
                currency: "NGN".into(),
                created_by: None,
            })
            .await
            .unwrap();
        (LedgerService::new(store), owner)
    }

    #[tokio::test]
    async fn test_credit_then_debit_snapshots() {
        let (svc, owner) = seeded().await;

        let credit = svc.credit(owner, amt("100.00"), "Deposit", None).await.unwrap();
        assert_eq!(credit.balance_before().to_string(), "0.00");
        assert_eq!(credit.balance_after().to_string(), "100.00");
        assert_eq!(credit.status(), EntryStatus::Success);

        let debit = svc.debit(owner, amt("30.00"), "Order 55", None).await.unwrap();
        assert_eq!(debit.balance_before().to_string(), "100.00");
        assert_eq!(debit.balance_after().to_string(), "70.00");
    }

    #[tokio::test]
    async fn test_overdraft_rejected_balance_unchanged() {
        let (svc, owner) = seeded().await;
        svc.credit(owner, amt("70.00"), "Deposit", None).await.unwrap();

        let err = svc.debit(owner, amt("80.00"), "Order 56", None).await.unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds));

        let entries = svc.list_entries(owner, EntryFilter::default()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].balance_after().to_string(), "70.00");
    }

    #[tokio::test]
    async fn test_pending_external_has_no_balance_effect() {
        let (svc, owner) = seeded().await;
        svc.credit(owner, amt("10.00"), "Deposit", None).await.unwrap();

        let pending = svc
            .record_external_credit(owner, amt("500.00"), "Card deposit", "PSK-REF-1".into())
            .await
            .unwrap();
        assert_eq!(pending.status(), EntryStatus::Pending);
        assert_eq!(pending.balance_before(), pending.balance_after());

        let latest = svc
            .list_entries(
                owner,
                EntryFilter { status: Some(EntryStatus::Success), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(latest[0].balance_after().to_string(), "10.00");
    }
}
