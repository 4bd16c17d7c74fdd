//! Escrow models
//!
//! An escrow is a recorded hold of funds against a business (order)
//! reference. Release transitions `is_released` false -> true exactly once;
//! once released it is terminal. Escrows are kept forever for audit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::OwnerRef;
use crate::money::Amount;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escrow {
    pub order_reference: String,
    pub sender: OwnerRef,
    pub receiver: OwnerRef,
    pub amount: Amount,
    pub is_released: bool,
    pub released_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Escrow {
    pub(crate) fn open(
        order_reference: String,
        sender: OwnerRef,
        receiver: OwnerRef,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            order_reference,
            sender,
            receiver,
            amount,
            is_released: false,
            released_at: None,
            created_at: now,
        }
    }
}

/// Narration stamped on the sender's hold entry.
pub(crate) fn hold_narration(order_reference: &str) -> String {
    format!("Escrow hold for {order_reference}")
}

/// Narration stamped on the receiver's release entry.
pub(crate) fn release_narration(order_reference: &str) -> String {
    format!("Escrow release for {order_reference}")
}

impl fmt::Display for Escrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Escrow[{}] {} -> {} amount={} released={}",
            self.order_reference, self.sender, self.receiver, self.amount, self.is_released
        )
    }
}
