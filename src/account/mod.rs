pub mod models;
pub mod service;

pub use models::{
    AccountType, NewAccount, OwnerRef, RecordMeta, WalletAccount, generate_account_number,
};
pub use service::{AccountService, DEFAULT_CURRENCY};
