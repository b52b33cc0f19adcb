//! # Money Module
//!
//! Provides the `Money` type and the single rounding policy shared by the
//! calculator and the accounting engine.
//!
//! ## Why Exact Decimals?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE ROUNDING PROBLEM                                                   │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  In integer cents, line values lose their tail too early:               │
//! │    10 × 19.99 × 0.90 × 0.95 = 170.9145 → 17091 cents at LINE time      │
//! │    Several such lines rounded one by one drift from the group total.   │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal + one Precision                             │
//! │    Lines keep 170.9145. Group subtotals round ONCE → 170.91.           │
//! │    Document totals are sums of already-rounded group values.           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use abaco_core::money::{Money, Precision};
//! use rust_decimal::Decimal;
//!
//! let price = Money::new(Decimal::new(1999, 2)); // 19.99
//! let line = price * Decimal::from(10);          // 199.90
//! assert_eq!(line.round(Precision::new(2)).to_string(), "199.90");
//! ```

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use crate::DEFAULT_DECIMALS;

// =============================================================================
// Precision
// =============================================================================

/// Number of decimal places every rounded amount is reduced to.
///
/// ## Design Decisions
/// - Built once from configuration and copied by value into every context
/// - Half-away-from-zero: 0.005 → 0.01, -0.005 → -0.01
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precision(u32);

impl Precision {
    /// Creates a precision of `decimals` places.
    #[inline]
    pub const fn new(decimals: u32) -> Self {
        Precision(decimals)
    }

    /// Returns the number of decimal places.
    #[inline]
    pub const fn decimals(&self) -> u32 {
        self.0
    }

    /// Rounds a raw decimal under this precision.
    #[inline]
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.0, RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Default for Precision {
    fn default() -> Self {
        Precision(DEFAULT_DECIMALS)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value with exact decimal arithmetic.
///
/// ## Design Decisions
/// - **Decimal (signed)**: negative values for credit notes and refunds
/// - **Unrounded by default**: rounding is an explicit step, see [`Money::round`]
/// - **Serialized as string**: `"170.9145"`, never as a JSON float
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  DocumentLine.unit_price ──► price_without_discount ──► total_price     │
/// │                                                        (unrounded)      │
/// │                                                             │           │
/// │                                                             ▼           │
/// │  TaxGroup.net (rounded) ──► Document.net / total_tax / total            │
/// │                                                             │           │
/// │                                                             ▼           │
/// │  JournalLine.debit / credit (rounded, must balance exactly)            │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a Money value from a decimal.
    #[inline]
    pub const fn new(amount: Decimal) -> Self {
        Money(amount)
    }

    /// Creates a Money value from a whole number of currency units.
    #[inline]
    pub fn from_units(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    /// Returns the underlying decimal.
    #[inline]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money::ZERO
    }

    /// Checks if the value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns the absolute value.
    #[inline]
    pub fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Rounds under the shared precision.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::money::{Money, Precision};
    /// use rust_decimal::Decimal;
    ///
    /// let m = Money::new(Decimal::new(1709145, 4));
    /// assert_eq!(m.round(Precision::new(2)).amount(), Decimal::new(17091, 2));
    /// ```
    #[inline]
    pub fn round(&self, precision: Precision) -> Money {
        Money(precision.round(self.0))
    }

    /// Returns `rate` percent of this amount, unrounded.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let base = Money::from_units(100);
    /// assert_eq!(base.percent(Decimal::from(21)), Money::from_units(21));
    /// ```
    #[inline]
    pub fn percent(&self, rate: Decimal) -> Money {
        Money(self.0 * rate / Decimal::ONE_HUNDRED)
    }

    /// Applies a percentage discount, unrounded: `self × (100 − pct) / 100`.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::money::Money;
    /// use rust_decimal::Decimal;
    ///
    /// let subtotal = Money::from_units(100);
    /// let discounted = subtotal.discount(Decimal::from(10));
    /// assert_eq!(discounted, Money::from_units(90));
    /// ```
    #[inline]
    pub fn discount(&self, pct: Decimal) -> Money {
        Money(self.0 * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED)
    }

    /// Applies two sequential percentage discounts.
    #[inline]
    pub fn discount2(&self, first: Decimal, second: Decimal) -> Money {
        self.discount(first).discount(second)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim()).map(Money)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Money(value)
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Multiplication by a quantity or factor.
impl Mul<Decimal> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Decimal) -> Self {
        Money(self.0 * factor)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + *m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_half_away_from_zero() {
        let p = Precision::new(2);
        assert_eq!(Money::new(dec!(0.005)).round(p).amount(), dec!(0.01));
        assert_eq!(Money::new(dec!(-0.005)).round(p).amount(), dec!(-0.01));
        assert_eq!(Money::new(dec!(170.9145)).round(p).amount(), dec!(170.91));
    }

    #[test]
    fn test_sequential_discounts_are_not_rounded() {
        let gross = Money::new(dec!(19.99)) * dec!(10);
        let net = gross.discount2(dec!(10), dec!(5));
        assert_eq!(net.amount(), dec!(170.9145));
    }

    #[test]
    fn test_percent() {
        assert_eq!(Money::new(dec!(50)).percent(dec!(10)).amount(), dec!(5));
        assert_eq!(Money::new(dec!(300)).percent(dec!(21)).amount(), dec!(63));
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::new(dec!(10.50));
        let b = Money::new(dec!(0.25));
        assert_eq!((a + b).amount(), dec!(10.75));
        assert_eq!((a - b).amount(), dec!(10.25));
        assert_eq!((-a).amount(), dec!(-10.50));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.amount(), dec!(11.00));
    }

    #[test]
    fn test_parse_and_display() {
        let m: Money = " 170.9145 ".parse().unwrap();
        assert_eq!(m.to_string(), "170.9145");
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::new(dec!(12.30))).unwrap();
        assert_eq!(json, "\"12.30\"");
    }

    #[test]
    fn test_zero_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::new(dec!(1)).is_positive());
        assert!(Money::new(dec!(-1)).is_negative());
        assert_eq!(Money::new(dec!(-3)).abs(), Money::new(dec!(3)));
    }
}
