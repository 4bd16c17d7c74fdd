//! Fixed-point money types.
//!
//! All monetary values in the wallet subsystem are `rust_decimal::Decimal`
//! at scale 2. Floating point is never used for amount math. The two wrapper
//! types enforce the invariants at construction time so downstream code
//! cannot hold an invalid value:
//!
//! - [`Amount`]: a strictly positive movement amount.
//! - [`Balance`]: a non-negative account balance. All balance mutations go
//!   through [`Balance::credit`] / [`Balance::debit`], both checked.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fractional digits carried by every monetary value.
pub const MONEY_SCALE: u32 = 2;

/// Money validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("amount has more than {MONEY_SCALE} decimal places")]
    PrecisionOverflow,

    #[error("balance cannot be negative")]
    NegativeBalance,

    #[error("invalid amount format: {0}")]
    InvalidFormat(String),
}

/// A strictly positive monetary amount at scale 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Validate and normalize a decimal into an `Amount`.
    ///
    /// Rejects non-positive values and values carrying more than two
    /// fractional digits (no silent truncation).
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NonPositiveAmount);
        }
        let normalized = value.normalize();
        if normalized.scale() > MONEY_SCALE {
            return Err(MoneyError::PrecisionOverflow);
        }
        let mut rescaled = normalized;
        rescaled.rescale(MONEY_SCALE);
        Ok(Self(rescaled))
    }

    /// Parse a client-provided amount string (e.g. "30.00").
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let value =
            Decimal::from_str(s.trim()).map_err(|_| MoneyError::InvalidFormat(s.to_string()))?;
        Self::new(value)
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative cached account balance at scale 2.
///
/// The inner value is private: the only mutations are `credit` and `debit`,
/// both of which return a new `Balance` and cannot produce a negative value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(Decimal);

impl Balance {
    pub fn zero() -> Self {
        let mut z = Decimal::ZERO;
        z.rescale(MONEY_SCALE);
        Self(z)
    }

    /// Construct from a stored value. Negative input is rejected: a negative
    /// persisted balance means the store invariant was already broken.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::NegativeBalance);
        }
        let mut rescaled = value;
        rescaled.rescale(MONEY_SCALE);
        Ok(Self(rescaled))
    }

    /// Balance after receiving `amount`.
    pub fn credit(self, amount: Amount) -> Balance {
        Balance(self.0 + amount.as_decimal())
    }

    /// Balance after paying out `amount`. `None` when the debit would breach
    /// the non-negative invariant; the caller maps this to `InsufficientFunds`.
    pub fn debit(self, amount: Amount) -> Option<Balance> {
        let after = self.0 - amount.as_decimal();
        if after < Decimal::ZERO { None } else { Some(Balance(after)) }
    }

    #[inline]
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
