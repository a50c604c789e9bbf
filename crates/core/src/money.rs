//! Monetary amounts and rates.
//!
//! Amounts are integers in the smallest currency unit (e.g. piastres, cents),
//! so totals, balances and differences add up exactly. Rates are basis points.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Amount in minor currency units. May be negative (differences, refunds).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Whole currency units (`Money::from_major(12)` is 12.00).
    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(100))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Line subtotal: unit amount times a quantity. Saturates; documents
    /// accept a line only after [`Money::checked_times`] succeeds.
    pub fn times(self, quantity: i64) -> Self {
        Self(self.0.saturating_mul(quantity))
    }

    pub fn checked_times(self, quantity: i64) -> DomainResult<Self> {
        self.0
            .checked_mul(quantity)
            .map(Self)
            .ok_or_else(|| DomainError::invariant(format!("amount overflow: {self} x {quantity}")))
    }

    pub fn checked_add(self, rhs: Money) -> DomainResult<Self> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or_else(|| DomainError::invariant(format!("amount overflow: {self} + {rhs}")))
    }

    /// Checked sum, for totals a document must be able to hold.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> DomainResult<Self> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |total, amount| total.checked_add(amount))
    }

    /// Integer division by a positive divisor, truncating toward zero.
    pub fn whole_units_of(self, divisor: Money) -> i64 {
        if divisor.0 <= 0 {
            return 0;
        }
        self.0 / divisor.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(self.0.saturating_neg())
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// A percentage expressed in basis points (1 % = 100 bps), 0..=100 %.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(u32);

impl Rate {
    pub const ZERO: Rate = Rate(0);
    pub const FULL: Rate = Rate(10_000);

    /// Validated constructor.
    pub fn from_bps(bps: u32) -> DomainResult<Self> {
        if bps > Self::FULL.0 {
            return Err(DomainError::validation(format!(
                "rate must be between 0 and 100% (got {bps} bps)"
            )));
        }
        Ok(Self(bps))
    }

    pub fn from_percent(percent: u32) -> DomainResult<Self> {
        Self::from_bps(percent.saturating_mul(100))
    }

    pub const fn bps(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Portion of `amount`, rounded half away from zero.
    pub fn of(self, amount: Money) -> Money {
        let scaled = amount.minor() as i128 * self.0 as i128;
        let half = if scaled < 0 { -5_000 } else { 5_000 };
        Money::from_minor(((scaled + half) / 10_000) as i64)
    }
}

impl core::fmt::Display for Rate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_formats_minor_units() {
        assert_eq!(Money::from_minor(123_456).to_string(), "1234.56");
        assert_eq!(Money::from_minor(-5).to_string(), "-0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn rate_rejects_more_than_full() {
        assert!(Rate::from_bps(10_000).is_ok());
        assert!(matches!(
            Rate::from_bps(10_001),
            Err(DomainError::Validation(_))
        ));
        assert!(Rate::from_percent(101).is_err());
    }

    #[test]
    fn rate_rounds_half_away_from_zero() {
        let ten_percent = Rate::from_percent(10).unwrap();
        assert_eq!(ten_percent.of(Money::from_minor(1_005)), Money::from_minor(101));
        assert_eq!(ten_percent.of(Money::from_minor(-1_005)), Money::from_minor(-101));
        assert_eq!(Rate::ZERO.of(Money::from_major(50)), Money::ZERO);
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let price = Money::from_major(50);
        assert_eq!(price.checked_times(3).unwrap(), Money::from_major(150));
        assert!(matches!(
            price.checked_times(i64::MAX / 100),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(Money::from_minor(i64::MAX).checked_add(Money::from_minor(1)).is_err());
        assert!(Money::checked_sum([Money::from_minor(i64::MAX), Money::from_minor(1)]).is_err());
        assert_eq!(
            Money::checked_sum([price, price]).unwrap(),
            Money::from_major(100)
        );
        assert_eq!(Money::from_minor(i64::MAX) + Money::from_minor(1), Money::from_minor(i64::MAX));
    }

    #[test]
    fn whole_units_truncates_and_ignores_bad_divisor() {
        let per_point = Money::from_major(100);
        assert_eq!(Money::from_minor(25_999).whole_units_of(per_point), 2);
        assert_eq!(Money::from_major(10).whole_units_of(Money::ZERO), 0);
    }

    proptest! {
        /// Property: a rate never yields more than the amount it is taken of.
        #[test]
        fn rate_portion_is_bounded(amount in 0i64..1_000_000_000, bps in 0u32..=10_000) {
            let rate = Rate::from_bps(bps).unwrap();
            let portion = rate.of(Money::from_minor(amount));
            prop_assert!(portion >= Money::ZERO);
            prop_assert!(portion <= Money::from_minor(amount));
        }

        #[test]
        fn sum_matches_fold(values in prop::collection::vec(-1_000_000i64..1_000_000, 0..50)) {
            let total: Money = values.iter().map(|v| Money::from_minor(*v)).sum();
            prop_assert_eq!(total.minor(), values.iter().sum::<i64>());
        }
    }
}
