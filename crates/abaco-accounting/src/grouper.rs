//! # Goods Line Grouping
//!
//! Collapses document lines into one goods posting per sub-account.
//!
//! ```text
//!   lines ──► goods()      net per product, unrounded, supplied lines out
//!         ──► (resolver)   product ──► sub-account code
//!         ──► postings()   merge equal codes, round, residual on largest
//! ```

use abaco_core::balance::distribute;
use abaco_core::{Document, DocumentLine, Money, Precision};

use crate::error::AccountingResult;

/// Net goods amount of one product reference.
#[derive(Debug, Clone, PartialEq)]
pub struct GoodsAmount {
    pub product_ref: Option<String>,
    pub amount: Money,
}

/// Groups document lines for the goods postings of an invoice entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineGrouper;

impl LineGrouper {
    pub fn new() -> Self {
        LineGrouper
    }

    /// Net amount per product after header discounts, first-seen order.
    ///
    /// Supplied lines are excluded; amounts are not rounded.
    pub fn goods(&self, doc: &Document, lines: &[DocumentLine]) -> Vec<GoodsAmount> {
        let mut grouped: Vec<GoodsAmount> = Vec::new();
        for line in lines.iter().filter(|l| !l.supplied) {
            let net = doc.apply_header_discounts(line.total_price);
            match grouped.iter_mut().find(|g| g.product_ref == line.product_ref) {
                Some(group) => group.amount += net,
                None => grouped.push(GoodsAmount {
                    product_ref: line.product_ref.clone(),
                    amount: net,
                }),
            }
        }
        grouped
    }

    /// Merges amounts posted to the same sub-account and rounds them so
    /// they sum exactly to `target`.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_accounting::LineGrouper;
    /// use abaco_core::{Money, Precision};
    /// use rust_decimal::Decimal;
    ///
    /// let resolved = vec![
    ///     ("7000000000".to_string(), Money::new(Decimal::new(33335, 3))),
    ///     ("7000000001".to_string(), Money::new(Decimal::new(16665, 3))),
    ///     ("7000000000".to_string(), Money::new(Decimal::new(10, 0))),
    /// ];
    /// let postings = LineGrouper::new()
    ///     .postings(resolved, Money::from_units(60), Precision::new(2))
    ///     .unwrap();
    /// assert_eq!(postings.len(), 2);
    /// assert_eq!(postings.iter().map(|(_, m)| *m).sum::<Money>(), Money::from_units(60));
    /// ```
    pub fn postings(
        &self,
        resolved: Vec<(String, Money)>,
        target: Money,
        precision: Precision,
    ) -> AccountingResult<Vec<(String, Money)>> {
        let mut merged: Vec<(String, Money)> = Vec::new();
        for (code, amount) in resolved {
            match merged.iter_mut().find(|(c, _)| *c == code) {
                Some((_, total)) => *total += amount,
                None => merged.push((code, amount)),
            }
        }

        let amounts: Vec<Money> = merged.iter().map(|(_, m)| *m).collect();
        let rounded = distribute(&amounts, target, precision)?;
        Ok(merged
            .into_iter()
            .zip(rounded)
            .map(|((code, _), amount)| (code, amount))
            .filter(|(_, amount)| !amount.is_zero())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abaco_core::{DocumentKind, TradeSide};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn line(product: Option<&str>, total: Money, supplied: bool) -> DocumentLine {
        let mut line = DocumentLine::new("l", "d", dec!(1), total);
        line.product_ref = product.map(str::to_string);
        line.total_price = total;
        line.supplied = supplied;
        line
    }

    #[test]
    fn test_goods_groups_by_product_and_skips_supplied() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut doc = Document::new("d", TradeSide::Sale, DocumentKind::Invoice, "F1", date);
        doc.discount1 = dec!(10);
        let lines = vec![
            line(Some("A"), Money::from_units(100), false),
            line(None, Money::from_units(20), false),
            line(Some("A"), Money::from_units(50), false),
            line(None, Money::from_units(30), true),
        ];

        let goods = LineGrouper::new().goods(&doc, &lines);
        assert_eq!(goods.len(), 2);
        assert_eq!(goods[0].product_ref.as_deref(), Some("A"));
        assert_eq!(goods[0].amount, Money::from_units(135));
        assert_eq!(goods[1].amount, Money::from_units(18));
    }

    #[test]
    fn test_postings_match_target_exactly() {
        let resolved = vec![
            ("700".to_string(), Money::new(dec!(33.333))),
            ("701".to_string(), Money::new(dec!(33.333))),
            ("702".to_string(), Money::new(dec!(33.334))),
        ];
        let postings = LineGrouper::new()
            .postings(resolved, Money::from_units(100), Precision::new(2))
            .unwrap();
        let sum: Money = postings.iter().map(|(_, m)| *m).sum();
        assert_eq!(sum, Money::from_units(100));
    }

    #[test]
    fn test_postings_without_goods() {
        let postings = LineGrouper::new()
            .postings(Vec::new(), Money::ZERO, Precision::new(2))
            .unwrap();
        assert!(postings.is_empty());
        assert!(LineGrouper::new()
            .postings(Vec::new(), Money::from_units(1), Precision::new(2))
            .is_err());
    }
}
