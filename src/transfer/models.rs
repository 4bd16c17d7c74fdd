//! Transfer models
//!
//! A transfer is a paired debit+credit across two accounts, applied as one
//! atomic unit. State machine: `Pending -> Success` or `Pending -> Failed`,
//! no other transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::OwnerRef;
use crate::money::Amount;

/// Transfer status, stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum TransferStatus {
    Pending = 0,
    Success = 1,
    Failed = -1,
}

impl TransferStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(TransferStatus::Pending),
            1 => Some(TransferStatus::Success),
            -1 => Some(TransferStatus::Failed),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Success | TransferStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Success => "SUCCESS",
            TransferStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A wallet-to-wallet transfer record.
///
/// On success, exactly two ledger entries exist for this record's reference:
/// one debit on `source`, one credit on `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub reference: String,
    pub source: OwnerRef,
    pub destination: OwnerRef,
    pub amount: Amount,
    pub narration: String,
    pub status: TransferStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transfer {
    pub(crate) fn pending(
        reference: String,
        source: OwnerRef,
        destination: OwnerRef,
        amount: Amount,
        narration: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            source,
            destination,
            amount,
            narration,
            status: TransferStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Transfer[{}] {} -> {} amount={} status={}",
            self.reference, self.source, self.destination, self.amount, self.status
        )
    }
}
