//! Amount - Non-negative integer wrapper for financial amounts
//!
//! All amounts in LevelBank are whole units of the smallest currency unit
//! (paise for INR). Non-negativity is guaranteed by the unsigned
//! representation; arithmetic is checked so balances never wrap.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Denominator for basis-point rates (1 bps = 0.01%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// A non-negative amount for ledger operations.
///
/// # Example
/// ```
/// use levelbank_core::Amount;
///
/// let balance = Amount::new(1_000);
/// // 1% of the balance
/// assert_eq!(balance.fraction_bps(100), Amount::new(10));
///
/// // Zero is a valid balance but not a valid posting
/// assert!(Amount::ZERO.ensure_positive().is_err());
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero amount constant
    pub const ZERO: Self = Self(0);

    /// Create a new Amount
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the inner value
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Check if the amount is zero
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Reject zero amounts for postings and requests.
    pub fn ensure_positive(self) -> Result<Self, EngineError> {
        if self.is_zero() {
            Err(EngineError::InvalidAmount("amount must be greater than zero".into()))
        } else {
            Ok(self)
        }
    }

    /// Checked addition - returns None on overflow
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction - returns None if result would be negative
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Portion of this amount at a basis-point rate, rounded down.
    pub fn fraction_bps(&self, bps: u32) -> Amount {
        let scaled = self.0 as u128 * bps as u128 / BPS_DENOMINATOR as u128;
        Amount(scaled.min(u64::MAX as u128) as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_zero() {
        assert!(Amount::ZERO.is_zero());
        assert!(matches!(
            Amount::ZERO.ensure_positive(),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_checked_sub_prevents_negative() {
        let a = Amount::new(50);
        let b = Amount::new(100);
        assert!(a.checked_sub(&b).is_none());
        assert_eq!(b.checked_sub(&a), Some(Amount::new(50)));
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Amount::new(u64::MAX);
        assert!(max.checked_add(&Amount::new(1)).is_none());
    }

    #[test]
    fn test_fraction_bps_rounds_down() {
        assert_eq!(Amount::new(1_000).fraction_bps(100), Amount::new(10));
        assert_eq!(Amount::new(150).fraction_bps(100), Amount::new(1));
        assert_eq!(Amount::new(99).fraction_bps(100), Amount::ZERO);
        assert_eq!(Amount::new(u64::MAX).fraction_bps(10_000), Amount::new(u64::MAX));
    }

    #[test]
    fn test_serde_is_plain_integer() {
        let json = serde_json::to_string(&Amount::new(12345)).unwrap();
        assert_eq!(json, "12345");
        let parsed: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, Amount::new(12345));
    }
}
