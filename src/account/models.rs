//! Data models for wallet accounts

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::Balance;

/// Account classification
///
/// Stored as SMALLINT; closed set, one wallet per owner regardless of type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
pub enum AccountType {
    Customer = 1,
    Courier = 2,
    Partner = 3,
    CorporateClient = 4,
    Platform = 5,
}

impl AccountType {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(AccountType::Customer),
            2 => Some(AccountType::Courier),
            3 => Some(AccountType::Partner),
            4 => Some(AccountType::CorporateClient),
            5 => Some(AccountType::Platform),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Customer => "CUSTOMER",
            AccountType::Courier => "COURIER",
            AccountType::Partner => "PARTNER",
            AccountType::CorporateClient => "CORPORATE_CLIENT",
            AccountType::Platform => "PLATFORM",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Account owner key: one wallet per user per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    pub tenant_id: i64,
    pub user_id: i64,
}

impl OwnerRef {
    pub fn new(tenant_id: i64, user_id: i64) -> Self {
        Self { tenant_id, user_id }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}/u{}", self.tenant_id, self.user_id)
    }
}

/// Audit fields carried by every persisted wallet record.
///
/// Explicit composition instead of model mixins: tenant scoping lives in the
/// record key, soft-delete is a flag, nothing is ever hard-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub created_by: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecordMeta {
    pub fn new(created_by: Option<i64>, now: DateTime<Utc>) -> Self {
        Self { created_by, is_active: true, created_at: now, updated_at: now }
    }
}

/// A wallet account.
///
/// `balance` is a cached fold of the account's committed ledger entries; it is
/// only ever written by entry-producing store operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub owner: OwnerRef,
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: String,
    pub balance: Balance,
    /// External payout linkage (dedicated virtual account id at the gateway).
    pub payout_account: Option<String>,
    pub meta: RecordMeta,
}

/// Parameters for account creation.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub owner: OwnerRef,
    pub account_number: String,
    pub account_type: AccountType,
    pub currency: String,
    pub created_by: Option<i64>,
}

/// Generate a candidate 10-digit account number.
///
/// Uniqueness is enforced by the store; callers retry on collision.
pub fn generate_account_number() -> String {
    let n: u64 = rand::thread_rng().gen_range(1_000_000_000..=9_999_999_999);
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        for ty in [
            AccountType::Customer,
            AccountType::Courier,
            AccountType::Partner,
            AccountType::CorporateClient,
            AccountType::Platform,
        ] {
            assert_eq!(AccountType::from_id(ty.id()), Some(ty));
        }
        assert_eq!(AccountType::from_id(0), None);
        assert_eq!(AccountType::from_id(99), None);
    }

    #[test]
    fn test_account_number_shape() {
        for _ in 0..100 {
            let n = generate_account_number();
            assert_eq!(n.len(), 10);
            assert!(n.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(n.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn test_owner_ref_display() {
        assert_eq!(OwnerRef::new(7, 1001).to_string(), "t7/u1001");
    }
}
