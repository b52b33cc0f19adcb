//! # Ledger
//!
//! Read-only listings of posted journal lines over a date range.
//!
//! ```text
//!   Detailed        one row per journal line, ordered by sub-account,
//!                   date and entry number
//!   ByAccount       one row per account with period totals
//!   BySubAccount    one row per sub-account with period totals
//! ```
//!
//! Every running balance starts from what was posted before `date_from`
//! under the same channel and code filters.

use std::collections::BTreeMap;

use abaco_core::Money;
use abaco_db::{Database, JournalRepository, LedgerFilter, PostedLine};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::error::{keys, AccountingError, AccountingResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerMode {
    #[default]
    Detailed,
    ByAccount,
    BySubAccount,
}

/// Filters and options of a ledger listing. Code ranges are inclusive;
/// an upper bound matches every code it prefixes.
#[derive(Debug, Clone, Default)]
pub struct LedgerParams {
    pub mode: LedgerMode,
    pub channel: Option<i64>,
    pub account_from: Option<String>,
    pub account_to: Option<String>,
    pub subaccount_from: Option<String>,
    pub subaccount_to: Option<String>,
    pub entry_from: Option<i64>,
    pub entry_to: Option<i64>,
    /// Only read in detailed mode; grouped modes always carry a balance.
    pub running_balance: bool,
}

/// One listing row. Entry number, date and concept are only set in
/// detailed mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub entry_number: Option<i64>,
    pub date: Option<NaiveDate>,
    /// Account code in `ByAccount` mode, sub-account code otherwise.
    pub account: String,
    pub concept: Option<String>,
    pub debit: Money,
    pub credit: Money,
    pub running_balance: Option<Money>,
}

pub struct Ledger<'a> {
    db: &'a Database,
}

impl<'a> Ledger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Ledger { db }
    }

    pub async fn generate(
        &self,
        company_id: i64,
        date_from: NaiveDate,
        date_to: NaiveDate,
        params: &LedgerParams,
    ) -> AccountingResult<Vec<LedgerRow>> {
        if date_from > date_to {
            return Err(AccountingError::validation(keys::INVALID_DATA)
                .with("date_from", date_from)
                .with("date_to", date_to));
        }

        let base = LedgerFilter {
            company_id: Some(company_id),
            channel: params.channel,
            account_from: params.account_from.clone(),
            account_to: params.account_to.clone(),
            subaccount_from: params.subaccount_from.clone(),
            subaccount_to: params.subaccount_to.clone(),
            ..Default::default()
        };
        let in_range = LedgerFilter {
            date_from: Some(date_from),
            date_to: Some(date_to),
            entry_from: params.entry_from,
            entry_to: params.entry_to,
            ..base.clone()
        };

        let mut conn = self.db.acquire().await?;
        let mut journal = JournalRepository::new(&mut conn);
        let lines = journal.posted_lines(&in_range).await?;
        let prior = match date_from.pred_opt() {
            Some(day_before) => {
                let before = LedgerFilter {
                    date_to: Some(day_before),
                    ..base
                };
                journal.posted_lines(&before).await?
            }
            None => Vec::new(),
        };

        let mode = params.mode;
        let mut opening: BTreeMap<String, Money> = BTreeMap::new();
        for line in &prior {
            *opening.entry(group_key(mode, line)).or_default() += line.debit - line.credit;
        }

        let rows = match mode {
            LedgerMode::Detailed => detailed(lines, &opening, params.running_balance),
            LedgerMode::ByAccount | LedgerMode::BySubAccount => grouped(mode, &lines, &opening),
        };
        debug!(company_id, %date_from, %date_to, ?mode, rows = rows.len(), "Ledger generated");
        Ok(rows)
    }
}

fn group_key(mode: LedgerMode, line: &PostedLine) -> String {
    match mode {
        LedgerMode::ByAccount => line
            .account_code
            .clone()
            .unwrap_or_else(|| line.subaccount_code.clone()),
        LedgerMode::Detailed | LedgerMode::BySubAccount => line.subaccount_code.clone(),
    }
}

fn detailed(
    mut lines: Vec<PostedLine>,
    opening: &BTreeMap<String, Money>,
    running_balance: bool,
) -> Vec<LedgerRow> {
    lines.sort_by(|a, b| {
        (&a.subaccount_code, a.date, a.entry_number, a.line_id)
            .cmp(&(&b.subaccount_code, b.date, b.entry_number, b.line_id))
    });

    let mut current: Option<String> = None;
    let mut balance = Money::ZERO;
    lines
        .into_iter()
        .map(|line| {
            if current.as_deref() != Some(line.subaccount_code.as_str()) {
                balance = opening.get(&line.subaccount_code).copied().unwrap_or_default();
                current = Some(line.subaccount_code.clone());
            }
            balance += line.debit - line.credit;
            LedgerRow {
                entry_number: Some(line.entry_number),
                date: Some(line.date),
                running_balance: running_balance.then_some(balance),
                account: line.subaccount_code,
                concept: Some(line.concept),
                debit: line.debit,
                credit: line.credit,
            }
        })
        .collect()
}

fn grouped(mode: LedgerMode, lines: &[PostedLine], opening: &BTreeMap<String, Money>) -> Vec<LedgerRow> {
    let mut totals: BTreeMap<String, (Money, Money)> = BTreeMap::new();
    for line in lines {
        let (debit, credit) = totals.entry(group_key(mode, line)).or_default();
        *debit += line.debit;
        *credit += line.credit;
    }

    totals
        .into_iter()
        .map(|(account, (debit, credit))| {
            let seed = opening.get(&account).copied().unwrap_or_default();
            LedgerRow {
                entry_number: None,
                date: None,
                concept: None,
                running_balance: Some(seed + debit - credit),
                account,
                debit,
                credit,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use abaco_core::EntryOperation;

    fn posted(line_id: i64, number: i64, day: u32, sub: &str, debit: i64, credit: i64) -> PostedLine {
        PostedLine {
            line_id,
            entry_id: number,
            entry_number: number,
            period_code: "2025".into(),
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            channel: None,
            operation: EntryOperation::Normal,
            subaccount_code: sub.into(),
            account_code: Some(sub[..3].to_string()),
            concept: format!("entry {number}"),
            debit: Money::from_units(debit),
            credit: Money::from_units(credit),
        }
    }

    #[test]
    fn test_detailed_running_balance_restarts_per_subaccount() {
        let lines = vec![
            posted(1, 1, 1, "4300000001", 121, 0),
            posted(2, 1, 1, "7000000000", 0, 100),
            posted(3, 2, 5, "4300000001", 0, 21),
        ];
        let mut opening = BTreeMap::new();
        opening.insert("4300000001".to_string(), Money::from_units(10));

        let rows = detailed(lines, &opening, true);
        let balances: Vec<_> = rows
            .iter()
            .map(|r| (r.account.as_str(), r.running_balance.unwrap()))
            .collect();
        assert_eq!(
            balances,
            vec![
                ("4300000001", Money::from_units(131)),
                ("4300000001", Money::from_units(110)),
                ("7000000000", Money::from_units(-100)),
            ]
        );
    }

    #[test]
    fn test_detailed_without_running_balance() {
        let rows = detailed(vec![posted(1, 1, 1, "5700000000", 5, 0)], &BTreeMap::new(), false);
        assert_eq!(rows[0].running_balance, None);
        assert_eq!(rows[0].entry_number, Some(1));
    }

    #[test]
    fn test_grouped_by_account_merges_subaccounts() {
        let lines = vec![
            posted(1, 1, 1, "4300000001", 121, 0),
            posted(2, 2, 2, "4300000002", 50, 0),
            posted(3, 3, 3, "4300000001", 0, 21),
        ];
        let rows = grouped(LedgerMode::ByAccount, &lines, &BTreeMap::new());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].account, "430");
        assert_eq!(rows[0].debit, Money::from_units(171));
        assert_eq!(rows[0].credit, Money::from_units(21));
        assert_eq!(rows[0].running_balance, Some(Money::from_units(150)));
        assert_eq!(rows[0].concept, None);
    }
}
