//! # Line Calculator
//!
//! ```text
//!   price_without_discount = quantity × unit_price
//!   total_price            = price_without_discount × (100 − d1)/100 × (100 − d2)/100
//! ```
//!
//! Neither value is rounded here. Rounding happens once per tax group.

use crate::types::DocumentLine;

/// Pure per-line pricing.
pub struct LineCalculator;

impl LineCalculator {
    /// Writes `price_without_discount` and `total_price` back to the line.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::calculator::LineCalculator;
    /// use abaco_core::{DocumentLine, Money};
    /// use rust_decimal::Decimal;
    ///
    /// let mut line = DocumentLine::new("l1", "d1", Decimal::from(10), Money::new(Decimal::new(1999, 2)));
    /// line.discount1 = Decimal::from(10);
    /// line.discount2 = Decimal::from(5);
    /// LineCalculator::calculate(&mut line);
    /// assert_eq!(line.total_price.amount(), Decimal::new(1709145, 4));
    /// ```
    pub fn calculate(line: &mut DocumentLine) {
        line.price_without_discount = line.unit_price * line.quantity;
        line.total_price = line
            .price_without_discount
            .discount2(line.discount1, line.discount2);
    }
}
