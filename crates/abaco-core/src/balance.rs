//! # Balance Arithmetic
//!
//! Trial balance accumulation and the line plans of the period-end entries.
//!
//! ## Period-End Plans
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  TrialBalance (all lines of the period)                                 │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  regularization_lines: income/expense sub-accounts → 0,                 │
//! │                        net result → profit & loss sub-account           │
//! │        │  apply()                                                       │
//! │        ▼                                                                │
//! │  closing_lines:        balance-sheet sub-accounts → 0                   │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  opening_lines:        mirror of closing, posted in the next period     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accounting::LineDraft;
use crate::error::{CoreError, CoreResult};
use crate::money::{Money, Precision};

/// Accumulated movements of one sub-account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccountBalance {
    pub subaccount_code: String,
    pub debit: Money,
    pub credit: Money,
}

impl SubAccountBalance {
    /// `debit − credit`
    #[inline]
    pub fn balance(&self) -> Money {
        self.debit - self.credit
    }
}

/// Sub-account balances keyed by code.
#[derive(Debug, Clone, Default)]
pub struct TrialBalance {
    rows: BTreeMap<String, SubAccountBalance>,
}

impl TrialBalance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one movement.
    pub fn add(&mut self, subaccount_code: &str, debit: Money, credit: Money) {
        let row = self
            .rows
            .entry(subaccount_code.to_string())
            .or_insert_with(|| SubAccountBalance {
                subaccount_code: subaccount_code.to_string(),
                debit: Money::ZERO,
                credit: Money::ZERO,
            });
        row.debit += debit;
        row.credit += credit;
    }

    /// Adds planned lines as if they had been posted.
    pub fn apply(&mut self, lines: &[LineDraft]) {
        for line in lines {
            self.add(&line.subaccount_code, line.debit, line.credit);
        }
    }

    /// Balance of one sub-account (zero when unseen).
    pub fn balance(&self, subaccount_code: &str) -> Money {
        self.rows
            .get(subaccount_code)
            .map(SubAccountBalance::balance)
            .unwrap_or_default()
    }

    /// Rows in code order.
    pub fn rows(&self) -> impl Iterator<Item = &SubAccountBalance> {
        self.rows.values()
    }

    /// Whether any sub-account under `prefixes` carries a balance.
    pub fn has_balance(&self, prefixes: &[String]) -> bool {
        self.non_zero_with_prefix(prefixes).next().is_some()
    }

    fn non_zero_with_prefix<'a>(
        &'a self,
        prefixes: &'a [String],
    ) -> impl Iterator<Item = &'a SubAccountBalance> + 'a {
        self.rows.values().filter(move |row| {
            !row.balance().is_zero()
                && prefixes.iter().any(|p| row.subaccount_code.starts_with(p.as_str()))
        })
    }

    /// Lines that zero every income/expense sub-account against `profit_loss`.
    ///
    /// Empty when no such sub-account has a balance.
    pub fn regularization_lines(
        &self,
        result_prefixes: &[String],
        profit_loss: &str,
        concept: &str,
    ) -> Vec<LineDraft> {
        let mut lines: Vec<LineDraft> = self
            .non_zero_with_prefix(result_prefixes)
            .map(|row| {
                LineDraft::posting(&row.subaccount_code, concept, -row.balance())
                    .with_counterpart(Some(profit_loss.to_string()))
            })
            .collect();
        if lines.is_empty() {
            return lines;
        }

        let result: Money = lines.iter().map(|l| -l.signed()).sum();
        if !result.is_zero() {
            lines.push(LineDraft::posting(profit_loss, concept, result));
        }
        lines
    }

    /// Lines that zero every balance-sheet sub-account.
    pub fn closing_lines(&self, balance_prefixes: &[String], concept: &str) -> Vec<LineDraft> {
        self.non_zero_with_prefix(balance_prefixes)
            .map(|row| LineDraft::posting(&row.subaccount_code, concept, -row.balance()))
            .collect()
    }
}

/// Mirror of a closing entry: restores each balance in the next period.
pub fn opening_lines(closing: &[LineDraft], concept: &str) -> Vec<LineDraft> {
    closing
        .iter()
        .map(|line| LineDraft::posting(&line.subaccount_code, concept, -line.signed()))
        .collect()
}

// =============================================================================
// Rounding Distribution
// =============================================================================

/// Rounds `amounts` so they sum exactly to `target`.
///
/// The residual left by rounding is added to the amount with the largest
/// absolute value.
///
/// ## Example
/// ```rust
/// use abaco_core::balance::distribute;
/// use abaco_core::{Money, Precision};
/// use rust_decimal::Decimal;
///
/// let parts = [Money::new(Decimal::new(3333, 3)), Money::new(Decimal::new(6667, 3))];
/// let rounded = distribute(&parts, Money::from_units(10), Precision::new(2)).unwrap();
/// assert_eq!(rounded.iter().copied().sum::<Money>(), Money::from_units(10));
/// ```
pub fn distribute(amounts: &[Money], target: Money, precision: Precision) -> CoreResult<Vec<Money>> {
    if amounts.is_empty() {
        if target.is_zero() {
            return Ok(Vec::new());
        }
        return Err(CoreError::EmptyDistribution {
            amount: target.to_string(),
        });
    }

    let mut rounded: Vec<Money> = amounts.iter().map(|a| a.round(precision)).collect();
    let residual = target.round(precision) - rounded.iter().sum::<Money>();
    if !residual.is_zero() {
        let largest = rounded
            .iter()
            .enumerate()
            .max_by_key(|(_, m)| m.abs())
            .map(|(i, _)| i)
            .unwrap_or(0);
        rounded[largest] += residual;
    }
    Ok(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounting::is_balanced;
    use rust_decimal_macros::dec;

    fn prefixes(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> TrialBalance {
        let mut tb = TrialBalance::new();
        // Sale of 100 + 21 VAT on credit, purchase of 40 paid in cash
        tb.add("4300000001", Money::new(dec!(121)), Money::ZERO);
        tb.add("4770000000", Money::ZERO, Money::new(dec!(21)));
        tb.add("7000000000", Money::ZERO, Money::new(dec!(100)));
        tb.add("6000000000", Money::new(dec!(40)), Money::ZERO);
        tb.add("5700000000", Money::ZERO, Money::new(dec!(40)));
        tb
    }

    #[test]
    fn test_regularization_moves_result_to_profit_and_loss() {
        let tb = sample();
        let lines = tb.regularization_lines(&prefixes(&["6", "7"]), "1290000000", "Reg");
        assert_eq!(lines.len(), 3);
        assert!(is_balanced(&lines));

        let pl = lines.last().unwrap();
        assert_eq!(pl.subaccount_code, "1290000000");
        assert_eq!(pl.credit.amount(), dec!(60));
    }

    #[test]
    fn test_closing_and_opening_mirror() {
        let mut tb = sample();
        let reg = tb.regularization_lines(&prefixes(&["6", "7"]), "1290000000", "Reg");
        tb.apply(&reg);
        assert!(tb.balance("7000000000").is_zero());

        let closing = tb.closing_lines(&prefixes(&["1", "2", "3", "4", "5"]), "Close");
        assert!(is_balanced(&closing));
        assert_eq!(closing.len(), 4);

        let opening = opening_lines(&closing, "Open");
        assert!(is_balanced(&opening));
        for (c, o) in closing.iter().zip(&opening) {
            assert_eq!(c.subaccount_code, o.subaccount_code);
            assert_eq!(c.signed(), -o.signed());
        }

        tb.apply(&closing);
        assert!(tb.rows().all(|r| r.balance().is_zero()));
    }

    #[test]
    fn test_nothing_to_regularize() {
        let mut tb = TrialBalance::new();
        tb.add("5700000000", Money::from_units(5), Money::from_units(5));
        assert!(tb
            .regularization_lines(&prefixes(&["6", "7"]), "129", "Reg")
            .is_empty());
    }

    #[test]
    fn test_has_balance_by_prefix() {
        let mut tb = crate::TrialBalance::new();
        tb.add("7000000000", Money::from_units(10), Money::from_units(10));
        tb.add("4300000001", Money::from_units(3), Money::ZERO);
        assert!(!tb.has_balance(&prefixes(&["6", "7"])));
        assert!(tb.has_balance(&prefixes(&["43"])));
    }

    #[test]
    fn test_distribute_places_residual_on_largest() {
        let parts = [
            Money::new(dec!(33.335)),
            Money::new(dec!(33.335)),
            Money::new(dec!(33.33)),
        ];
        let rounded = distribute(&parts, Money::new(dec!(100)), Precision::new(2)).unwrap();
        assert_eq!(rounded.iter().copied().sum::<Money>().amount(), dec!(100));
        // ties resolve to the last of the largest
        assert_eq!(rounded[0].amount(), dec!(33.34));
        assert_eq!(rounded[1].amount(), dec!(33.33));
    }

    #[test]
    fn test_distribute_empty() {
        assert!(distribute(&[], Money::ZERO, Precision::new(2)).unwrap().is_empty());
        assert!(distribute(&[], Money::from_units(1), Precision::new(2)).is_err());
    }
}
