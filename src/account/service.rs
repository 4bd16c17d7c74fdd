//! Account lifecycle service

use std::sync::Arc;

use tracing::{info, warn};

use super::{AccountType, NewAccount, OwnerRef, WalletAccount, generate_account_number};
use crate::error::WalletError;
use crate::store::WalletStore;

pub const DEFAULT_CURRENCY: &str = "NGN";

/// Attempts at a fresh account number before giving up on collisions.
const MAX_NUMBER_ATTEMPTS: u32 = 5;

pub struct AccountService {
    store: Arc<dyn WalletStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn WalletStore>) -> Self {
        Self { store }
    }

    /// Create a wallet account with a zero opening balance.
    ///
    /// Owner uniqueness is enforced by the store insert, not a pre-check, so
    /// two concurrent creates for the same owner cannot both succeed. A
    /// generated account number that collides is retried with a fresh one.
    pub async fn create_account(
        &self,
        owner: OwnerRef,
        account_type: AccountType,
        currency: Option<String>,
        created_by: Option<i64>,
    ) -> Result<WalletAccount, WalletError> {
        let currency = currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let mut attempt = 0;
        loop {
            attempt += 1;
            let new = NewAccount {
                owner,
                account_number: generate_account_number(),
                account_type,
                currency: currency.clone(),
                created_by,
            };
            match self.store.create_account(new).await {
                Ok(account) => {
                    info!(
                        owner = %account.owner,
                        account_number = %account.account_number,
                        account_type = %account.account_type,
                        "wallet account created"
                    );
                    return Ok(account);
                }
                Err(WalletError::DuplicateReference(number))
                    if attempt < MAX_NUMBER_ATTEMPTS =>
                {
                    warn!(%owner, number, attempt, "account number collision, regenerating");
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_account(&self, owner: OwnerRef) -> Result<WalletAccount, WalletError> {
        self.store.get_account(owner).await
    }

    /// Soft-deactivate an account. History and balance are retained.
    pub async fn deactivate(&self, owner: OwnerRef) -> Result<(), WalletError> {
        self.store.deactivate_account(owner).await?;
        info!(%owner, "wallet account deactivated");
        Ok(())
    }

    /// Attach the gateway-provisioned payout (virtual) account.
    pub async fn link_payout_account(
        &self,
        owner: OwnerRef,
        payout_account: String,
    ) -> Result<(), WalletError> {
        self.store.set_payout_account(owner, payout_account).await?;
        info!(%owner, "payout account linked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Balance;
    use crate::store::MemoryStore;

    fn service() -> AccountService {
        AccountService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_account_defaults() {
        let svc = service();
        let owner = OwnerRef::new(1, 100);
        let account = svc
            .create_account(owner, AccountType::Customer, None, Some(9))
            .await
            .unwrap();

        assert_eq!(account.owner, owner);
        assert_eq!(account.currency, DEFAULT_CURRENCY);
        assert_eq!(account.balance, Balance::zero());
        assert_eq!(account.account_number.len(), 10);
        assert!(account.meta.is_active);
    }

    #[tokio::test]
    async fn test_one_account_per_owner() {
        let svc = service();
        let owner = OwnerRef::new(1, 100);
        svc.create_account(owner, AccountType::Customer, None, None)
            .await
            .unwrap();

        let err = svc
            .create_account(owner, AccountType::Courier, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::DuplicateOwner));
    }

    #[tokio::test]
    async fn test_link_payout_account() {
        let svc = service();
        let owner = OwnerRef::new(1, 100);
        svc.create_account(owner, AccountType::Courier, None, None)
            .await
            .unwrap();

        svc.link_payout_account(owner, "VA-0099881122".into()).await.unwrap();
        let account = svc.get_account(owner).await.unwrap();
        assert_eq!(account.payout_account.as_deref(), Some("VA-0099881122"));
    }

    #[tokio::test]
    async fn test_deactivated_account_is_not_found() {
        let svc = service();
        let owner = OwnerRef::new(1, 100);
        svc.create_account(owner, AccountType::Customer, None, None)
            .await
            .unwrap();
        svc.deactivate(owner).await.unwrap();

        let err = svc.get_account(owner).await.unwrap_err();
        assert!(matches!(err, WalletError::AccountNotFound));
    }
}
