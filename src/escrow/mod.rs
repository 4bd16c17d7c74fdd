pub mod manager;
pub mod models;

pub use manager::EscrowManager;
pub use models::Escrow;

pub(crate) use models::{hold_narration, release_narration};
