//! End-to-end wallet flows on the in-memory store: ledger scenarios,
//! transfer atomicity, escrow exactly-once, and concurrency behavior.

use std::sync::Arc;

use wallet_ledger::account::{AccountService, AccountType};
use wallet_ledger::error::WalletError;
use wallet_ledger::ledger::{Direction, EntryFilter, EntryStatus, LedgerService};
use wallet_ledger::money::{Amount, Balance};
use wallet_ledger::store::{MemoryStore, WalletStore};
use wallet_ledger::transfer::{TransferEngine, TransferStatus};
use wallet_ledger::{EscrowManager, OwnerRef};

fn amt(s: &str) -> Amount {
    Amount::parse(s).unwrap()
}

struct Wallet {
    store: Arc<MemoryStore>,
    accounts: AccountService,
    ledger: LedgerService,
    transfers: TransferEngine,
    escrows: EscrowManager,
}

impl Wallet {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: AccountService::new(store.clone()),
            ledger: LedgerService::new(store.clone()),
            transfers: TransferEngine::new(store.clone()),
            escrows: EscrowManager::new(store.clone()),
            store,
        }
    }

    async fn open_funded(&self, user_id: i64, opening: &str) -> OwnerRef {
        let owner = OwnerRef::new(1, user_id);
        self.accounts
            .create_account(owner, AccountType::Customer, None, None)
            .await
            .unwrap();
        if opening != "0" {
            self.ledger
                .credit(owner, amt(opening), "Opening", None)
                .await
                .unwrap();
        }
        owner
    }

    async fn balance(&self, owner: OwnerRef) -> Balance {
        self.store.get_account(owner).await.unwrap().balance
    }

    /// Recompute the balance from committed entries, oldest-first.
    async fn folded_balance(&self, owner: OwnerRef) -> Balance {
        let entries = self
            .store
            .list_entries(owner, EntryFilter { status: Some(EntryStatus::Success), ..Default::default() })
            .await
            .unwrap();
        entries
            .iter()
            .rev()
            .fold(Balance::zero(), |bal, e| match e.direction() {
                Direction::Credit => bal.credit(e.amount()),
                Direction::Debit => bal.debit(e.amount()).unwrap(),
            })
    }
}

#[tokio::test]
async fn debit_writes_snapshots_and_updates_balance() {
    let w = Wallet::new();
    let owner = w.open_funded(1, "100.00").await;

    let entry = w.ledger.debit(owner, amt("30.00"), "Order 991", None).await.unwrap();
    assert_eq!(entry.balance_before().to_string(), "100.00");
    assert_eq!(entry.balance_after().to_string(), "70.00");
    assert_eq!(w.balance(owner).await.to_string(), "70.00");

    let err = w.ledger.debit(owner, amt("80.00"), "Order 992", None).await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));
    assert_eq!(w.balance(owner).await.to_string(), "70.00");
}

#[tokio::test]
async fn transfer_success_and_failure_are_atomic() {
    let w = Wallet::new();
    let a = w.open_funded(1, "100.00").await;
    let b = w.open_funded(2, "0").await;

    let done = w.transfers.transfer(a, b, amt("50.00"), "Settlement").await.unwrap();
    assert_eq!(done.status, TransferStatus::Success);
    assert_eq!(w.balance(a).await.to_string(), "50.00");
    assert_eq!(w.balance(b).await.to_string(), "50.00");

    // Deactivated destination: nothing moves, transfer lands in Failed.
    w.accounts.deactivate(b).await.unwrap();
    let failed = w.transfers.transfer(a, b, amt("10.00"), "Late").await.unwrap();
    assert_eq!(failed.status, TransferStatus::Failed);
    assert_eq!(w.balance(a).await.to_string(), "50.00");

    let entries = w.store.list_entries(a, EntryFilter::default()).await.unwrap();
    assert!(entries.iter().all(|e| e.reference() != format!("{}-D", failed.reference)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_overdraw() {
    let w = Wallet::new();
    let owner = w.open_funded(1, "90.00").await;
    let ledger = Arc::new(LedgerService::new(w.store.clone()));

    // Four racing debits of 30.00 against 90.00: exactly three may land.
    let mut handles = Vec::new();
    for i in 0..4 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger
                .debit(owner, amt("30.00"), format!("Race {i}"), None)
                .await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for h in handles {
        match h.await.unwrap() {
            Ok(_) => ok += 1,
            Err(WalletError::InsufficientFunds) => insufficient += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(insufficient, 1);
    assert_eq!(w.balance(owner).await.to_string(), "0.00");
    assert_eq!(w.folded_balance(owner).await, w.balance(owner).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposing_transfers_complete_without_deadlock() {
    let w = Wallet::new();
    let a = w.open_funded(1, "500.00").await;
    let b = w.open_funded(2, "500.00").await;
    let engine = Arc::new(TransferEngine::new(w.store.clone()));

    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = engine.clone();
        let (src, dst) = if i % 2 == 0 { (a, b) } else { (b, a) };
        handles.push(tokio::spawn(async move {
            engine.transfer(src, dst, amt("10.00"), format!("Ping {i}")).await
        }));
    }
    for h in handles {
        let done = h.await.unwrap().unwrap();
        assert_eq!(done.status, TransferStatus::Success);
    }

    // Equal traffic both ways: balances return to the opening amounts and
    // the cached balances still equal the entry fold.
    assert_eq!(w.balance(a).await.to_string(), "500.00");
    assert_eq!(w.balance(b).await.to_string(), "500.00");
    assert_eq!(w.folded_balance(a).await, w.balance(a).await);
    assert_eq!(w.folded_balance(b).await, w.balance(b).await);
}

#[tokio::test]
async fn escrow_lifecycle_hold_then_release() {
    let w = Wallet::new();
    let buyer = w.open_funded(1, "200.00").await;
    let courier = w.open_funded(2, "0").await;

    w.escrows.open(buyer, courier, amt("80.00"), "ORD-7001").await.unwrap();
    assert_eq!(w.balance(buyer).await.to_string(), "120.00");
    assert_eq!(w.balance(courier).await.to_string(), "0.00");

    // Held funds cannot be spent again.
    let err = w.ledger.debit(buyer, amt("150.00"), "Spend", None).await.unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds));

    let released = w.escrows.release("ORD-7001").await.unwrap();
    assert!(released.is_released);
    assert_eq!(w.balance(courier).await.to_string(), "80.00");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_releases_credit_exactly_once() {
    let w = Wallet::new();
    let buyer = w.open_funded(1, "200.00").await;
    let courier = w.open_funded(2, "0").await;
    w.escrows.open(buyer, courier, amt("80.00"), "ORD-7002").await.unwrap();

    let mgr = Arc::new(EscrowManager::new(w.store.clone()));
    let mut handles = Vec::new();
    for _ in 0..4 {
        let mgr = mgr.clone();
        handles.push(tokio::spawn(async move { mgr.release("ORD-7002").await }));
    }
    for h in handles {
        let escrow = h.await.unwrap().unwrap();
        assert!(escrow.is_released);
    }

    assert_eq!(w.balance(courier).await.to_string(), "80.00");
    let entries = w.store.list_entries(courier, EntryFilter::default()).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn ledger_filters_and_ordering() {
    let w = Wallet::new();
    let owner = w.open_funded(1, "0").await;
    w.ledger.credit(owner, amt("10.00"), "One", None).await.unwrap();
    w.ledger.credit(owner, amt("20.00"), "Two", None).await.unwrap();
    w.ledger.debit(owner, amt("5.00"), "Three", None).await.unwrap();

    let all = w.ledger.list_entries(owner, EntryFilter::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].narration(), "Three"); // newest first

    let debits = w
        .ledger
        .list_entries(owner, EntryFilter { direction: Some(Direction::Debit), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(debits.len(), 1);

    let limited = w
        .ledger
        .list_entries(owner, EntryFilter { limit: Some(2), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn balance_is_fold_of_committed_entries() {
    let w = Wallet::new();
    let a = w.open_funded(1, "300.00").await;
    let b = w.open_funded(2, "100.00").await;

    w.ledger.debit(a, amt("25.00"), "Fee", None).await.unwrap();
    w.transfers.transfer(a, b, amt("75.00"), "Move").await.unwrap();
    w.escrows.open(a, b, amt("50.00"), "ORD-1").await.unwrap();
    w.escrows.release("ORD-1").await.unwrap();
    // Pending external entries must not perturb the fold.
    w.ledger
        .record_external_credit(a, amt("999.00"), "Deposit", "PSK-X".into())
        .await
        .unwrap();

    assert_eq!(w.folded_balance(a).await, w.balance(a).await);
    assert_eq!(w.folded_balance(b).await, w.balance(b).await);
    assert_eq!(w.balance(a).await.to_string(), "150.00");
    assert_eq!(w.balance(b).await.to_string(), "225.00");
}
