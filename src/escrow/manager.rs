//! Escrow lifecycle manager
//!
//! Funds leave the sender the moment the hold opens and credit the receiver
//! on release, so held money can never be spent twice. Release is triggered
//! by an external business event (order completion) and is retry-safe.

use std::sync::Arc;

use tracing::info;

use super::Escrow;
use crate::account::OwnerRef;
use crate::error::WalletError;
use crate::ledger::new_reference;
use crate::money::Amount;
use crate::store::WalletStore;

pub struct EscrowManager {
    store: Arc<dyn WalletStore>,
}

impl EscrowManager {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Open a hold against a business order reference: debit the sender and
    /// record the escrow atomically. `DuplicateReference` if a hold already
    /// exists for the reference; `InsufficientFunds` leaves nothing behind.
    pub async fn open(
        &self,
        sender: OwnerRef,
        receiver: OwnerRef,
        amount: Amount,
        order_reference: impl Into<String>,
    ) -> Result<Escrow, WalletError> {
        if sender == receiver {
            return Err(WalletError::SameAccount);
        }
        if sender.tenant_id != receiver.tenant_id {
            return Err(WalletError::AccountNotFound);
        }

        let src = self.store.get_account(sender).await?;
        let dst = self.store.get_account(receiver).await?;
        if src.currency != dst.currency {
            return Err(WalletError::CurrencyMismatch);
        }

        let escrow = Escrow::open(
            order_reference.into(),
            sender,
            receiver,
            amount,
            chrono::Utc::now(),
        );
        let escrow = self
            .store
            .open_escrow(escrow, new_reference("ESC"))
            .await?;

        info!(
            order_reference = %escrow.order_reference,
            %sender,
            %receiver,
            amount = %amount,
            "escrow hold opened"
        );
        Ok(escrow)
    }

    /// Release a hold to the receiver. Idempotent: releasing an already
    /// released escrow returns the stored record with no new entry.
    pub async fn release(&self, order_reference: &str) -> Result<Escrow, WalletError> {
        let escrow = self
            .store
            .release_escrow(order_reference, new_reference("ESC"))
            .await?;

        info!(
            order_reference,
            receiver = %escrow.receiver,
            amount = %escrow.amount,
            "escrow released"
        );
        Ok(escrow)
    }

    pub async fn get(&self, order_reference: &str) -> Result<Escrow, WalletError> {
        self.store
            .get_escrow(order_reference)
            .await?
            .ok_or_else(|| WalletError::EscrowNotFound(order_reference.to_string()))
    }
}
