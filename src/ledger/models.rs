//! Ledger entry models
//!
//! A [`LedgerEntry`] is one immutable record of a single-account balance
//! movement. Fields are private with read accessors: once a store has
//! committed an entry there is deliberately no code path that can alter it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::OwnerRef;
use crate::error::WalletError;
use crate::money::{Amount, Balance};

/// Entry direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum Direction {
    Credit = 1,
    Debit = 2,
}

impl Direction {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Direction::Credit),
            2 => Some(Direction::Debit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "CREDIT",
            Direction::Debit => "DEBIT",
        }
    }

    /// Apply a movement to a balance. This is the single place where the
    /// before/after arithmetic lives; both store backends call it inside
    /// their locked section.
    pub fn apply(&self, balance: Balance, amount: Amount) -> Result<(Balance, Balance), WalletError> {
        let after = match self {
            Direction::Credit => balance.credit(amount),
            Direction::Debit => balance.debit(amount).ok_or(WalletError::InsufficientFunds)?,
        };
        Ok((balance, after))
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry status
///
/// `Pending` is only used for gateway-originated entries awaiting
/// confirmation; entries created by `append_entry` commit directly as
/// `Success`. `Success` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum EntryStatus {
    Pending = 0,
    Success = 1,
    Failed = -1,
}

impl EntryStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(EntryStatus::Pending),
            1 => Some(EntryStatus::Success),
            -1 => Some(EntryStatus::Failed),
            _ => None,
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Success | EntryStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "PENDING",
            EntryStatus::Success => "SUCCESS",
            EntryStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable balance movement on a single account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    reference: String,
    owner: OwnerRef,
    direction: Direction,
    amount: Amount,
    balance_before: Balance,
    balance_after: Balance,
    narration: String,
    status: EntryStatus,
    external_reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Build a committed (`Success`) entry. Store backends call this inside
    /// the same atomic unit that writes the new cached balance.
    pub(crate) fn committed(
        reference: String,
        owner: OwnerRef,
        direction: Direction,
        amount: Amount,
        balance_before: Balance,
        balance_after: Balance,
        narration: String,
        external_reference: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            owner,
            direction,
            amount,
            balance_before,
            balance_after,
            narration,
            status: EntryStatus::Success,
            external_reference,
            created_at,
        }
    }

    /// Build a provisional gateway-originated entry. Carries no balance
    /// effect until finalized; before/after snapshot the balance at record
    /// time and are rewritten once, at finalization.
    pub(crate) fn pending_external(
        reference: String,
        owner: OwnerRef,
        direction: Direction,
        amount: Amount,
        balance_at_record: Balance,
        narration: String,
        external_reference: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            owner,
            direction,
            amount,
            balance_before: balance_at_record,
            balance_after: balance_at_record,
            narration,
            status: EntryStatus::Pending,
            external_reference: Some(external_reference),
            created_at,
        }
    }

    /// Consume a pending entry into its terminal form. Exactly-once: calling
    /// this on an already-terminal entry is a programming error surfaced as
    /// `ImmutableEntry`.
    pub(crate) fn finalize(
        self,
        status: EntryStatus,
        balance_before: Balance,
        balance_after: Balance,
    ) -> Result<Self, WalletError> {
        if self.status.is_terminal() {
            return Err(WalletError::ImmutableEntry(self.reference));
        }
        debug_assert!(status.is_terminal());
        Ok(Self { status, balance_before, balance_after, ..self })
    }

    /// Rehydrate a persisted row. Trusts the store.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        reference: String,
        owner: OwnerRef,
        direction: Direction,
        amount: Amount,
        balance_before: Balance,
        balance_after: Balance,
        narration: String,
        status: EntryStatus,
        external_reference: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            reference,
            owner,
            direction,
            amount,
            balance_before,
            balance_after,
            narration,
            status,
            external_reference,
            created_at,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
    pub fn owner(&self) -> OwnerRef {
        self.owner
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
    pub fn amount(&self) -> Amount {
        self.amount
    }
    pub fn balance_before(&self) -> Balance {
        self.balance_before
    }
    pub fn balance_after(&self) -> Balance {
        self.balance_after
    }
    pub fn narration(&self) -> &str {
        &self.narration
    }
    pub fn status(&self) -> EntryStatus {
        self.status
    }
    pub fn external_reference(&self) -> Option<&str> {
        self.external_reference.as_deref()
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Read filter for `list_entries`. Results are newest-first.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub direction: Option<Direction>,
    pub status: Option<EntryStatus>,
    pub limit: Option<usize>,
}

/// Generate a prefixed, collision-free reference string (ULID body).
pub fn new_reference(prefix: &str) -> String {
    format!("{}-{}", prefix, ulid::Ulid::new())
}
