pub mod models;
pub mod service;

pub use models::{Direction, EntryFilter, EntryStatus, LedgerEntry, new_reference};
pub use service::LedgerService;
