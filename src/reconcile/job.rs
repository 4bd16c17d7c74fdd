//! Gateway reconciliation job
//!
//! Sweeps the ledger for pending gateway-originated entries and folds the
//! gateway's verdict in. The verify call happens strictly before the
//! store-side finalize, so no network I/O ever runs inside a locked section.
//! Entries the gateway has no verdict for stay pending for the next sweep;
//! per-entry failures are logged and skipped, never retried synchronously.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::gateway::{GatewayVerdict, PaymentGateway};
use crate::error::WalletError;
use crate::store::WalletStore;

/// Counters for one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub checked: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub left_pending: usize,
    pub errors: usize,
}

pub struct ReconciliationJob {
    store: Arc<dyn WalletStore>,
    gateway: Arc<dyn PaymentGateway>,
    verify_timeout: Duration,
}

impl ReconciliationJob {
    pub fn new(
        store: Arc<dyn WalletStore>,
        gateway: Arc<dyn PaymentGateway>,
        verify_timeout: Duration,
    ) -> Self {
        Self { store, gateway, verify_timeout }
    }

    /// One reconciliation sweep over all pending external entries.
    pub async fn run_once(&self) -> Result<ReconcileSummary, WalletError> {
        let pending = self.store.list_pending_external().await?;
        let mut summary = ReconcileSummary { checked: pending.len(), ..Default::default() };

        for entry in pending {
            let Some(external_reference) = entry.external_reference() else {
                // list_pending_external only returns externally-referenced
                // entries; guard anyway.
                continue;
            };

            let verdict = match tokio::time::timeout(
                self.verify_timeout,
                self.gateway.verify(external_reference),
            )
            .await
            {
                Ok(Ok(verdict)) => verdict,
                Ok(Err(WalletError::GatewayTimeout)) | Err(_) => {
                    warn!(
                        reference = entry.reference(),
                        external_reference, "gateway verify timed out, left pending"
                    );
                    summary.left_pending += 1;
                    continue;
                }
                Ok(Err(e)) => {
                    warn!(
                        reference = entry.reference(),
                        external_reference, error = %e, "gateway verify failed, skipping"
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            let success = match verdict {
                GatewayVerdict::Confirmed => true,
                GatewayVerdict::Failed => false,
                GatewayVerdict::Unknown => {
                    summary.left_pending += 1;
                    continue;
                }
            };

            match self
                .store
                .finalize_external_entry(entry.reference(), success)
                .await
            {
                Ok(_) if success => summary.confirmed += 1,
                Ok(_) => summary.failed += 1,
                Err(e) => {
                    warn!(
                        reference = entry.reference(),
                        error = %e, "finalize failed, skipping"
                    );
                    summary.errors += 1;
                }
            }
        }

        info!(
            checked = summary.checked,
            confirmed = summary.confirmed,
            failed = summary.failed,
            left_pending = summary.left_pending,
            errors = summary.errors,
            "reconciliation sweep complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;

    use crate::account::{AccountType, NewAccount, OwnerRef};
    use crate::ledger::{EntryStatus, LedgerService};
    use crate::money::Amount;
    use crate::store::MemoryStore;

    use async_trait::async_trait;

    struct MockGateway {
        verdicts: DashMap<String, GatewayVerdict>,
        calls: DashMap<String, usize>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self { verdicts: DashMap::new(), calls: DashMap::new() }
        }

        fn set(&self, reference: &str, verdict: GatewayVerdict) {
            self.verdicts.insert(reference.to_string(), verdict);
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn verify(&self, reference: &str) -> Result<GatewayVerdict, WalletError> {
            *self.calls.entry(reference.to_string()).or_insert(0) += 1;
            Ok(self
                .verdicts
                .get(reference)
                .map(|v| *v)
                .unwrap_or(GatewayVerdict::Unknown))
        }
    }

    fn amt(s: &str) -> Amount {
        Amount::parse(s).unwrap()
    }

    async fn seeded() -> (Arc<MemoryStore>, LedgerService, OwnerRef) {
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
        (store.clone(), LedgerService::new(store), owner)
    }

    fn job(store: Arc<MemoryStore>, gateway: Arc<MockGateway>) -> ReconciliationJob {
        ReconciliationJob::new(store, gateway, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_confirmed_deposit_credits_once() {
        let (store, ledger, owner) = seeded().await;
        let pending = ledger
            .record_external_credit(owner, amt("500.00"), "Card deposit", "PSK-1".into())
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        gateway.set("PSK-1", GatewayVerdict::Confirmed);
        let job = job(store.clone(), gateway);

        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.confirmed, 1);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "500.00");

        // Second sweep finds nothing pending.
        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.checked, 0);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "500.00");

        let entries = store.list_entries(owner, Default::default()).await.unwrap();
        let entry = entries.iter().find(|e| e.reference() == pending.reference()).unwrap();
        assert_eq!(entry.status(), EntryStatus::Success);
        assert_eq!(entry.balance_after().to_string(), "500.00");
    }

    #[tokio::test]
    async fn test_failed_deposit_no_balance_effect() {
        let (store, ledger, owner) = seeded().await;
        ledger
            .record_external_credit(owner, amt("500.00"), "Card deposit", "PSK-2".into())
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        gateway.set("PSK-2", GatewayVerdict::Failed);

        let summary = job(store.clone(), gateway).run_once().await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "0.00");
    }

    #[tokio::test]
    async fn test_unknown_verdict_left_pending() {
        let (store, ledger, owner) = seeded().await;
        ledger
            .record_external_credit(owner, amt("500.00"), "Card deposit", "PSK-3".into())
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        let job = job(store.clone(), gateway.clone());

        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.left_pending, 1);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "0.00");

        // The entry survives to the next sweep and settles then.
        gateway.set("PSK-3", GatewayVerdict::Confirmed);
        let summary = job.run_once().await.unwrap();
        assert_eq!(summary.confirmed, 1);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "500.00");
    }

    #[tokio::test]
    async fn test_mixed_batch() {
        let (store, ledger, owner) = seeded().await;
        ledger
            .record_external_credit(owner, amt("100.00"), "Deposit A", "PSK-A".into())
            .await
            .unwrap();
        ledger
            .record_external_credit(owner, amt("200.00"), "Deposit B", "PSK-B".into())
            .await
            .unwrap();
        ledger
            .record_external_credit(owner, amt("300.00"), "Deposit C", "PSK-C".into())
            .await
            .unwrap();

        let gateway = Arc::new(MockGateway::new());
        gateway.set("PSK-A", GatewayVerdict::Confirmed);
        gateway.set("PSK-B", GatewayVerdict::Failed);

        let summary = job(store.clone(), gateway).run_once().await.unwrap();
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.confirmed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.left_pending, 1);
        assert_eq!(store.get_account(owner).await.unwrap().balance.to_string(), "100.00");
    }
}
