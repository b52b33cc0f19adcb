//! # Accounting Types
//!
//! Chart of accounts, fiscal periods and journal entries.
//!
//! ## Double Entry
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  JournalEntry  #42  2025-03-01  "Invoice FAC2025A1 - ACME"              │
//! │                                                                         │
//! │   sub-account    debit      credit                                      │
//! │   4300000001     121.00               ◄── subject (customer)            │
//! │   4770000000                 21.00    ◄── output VAT                    │
//! │   7000000000                100.00    ◄── goods (sales)                 │
//! │                 ───────    ───────                                      │
//! │                  121.00     121.00    Σ debit == Σ credit               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

/// Hard upper bound for generated sub-account codes.
pub const MAX_SUBACCOUNT_LENGTH: usize = 32;

// =============================================================================
// Special Accounts
// =============================================================================

/// Well-known roles a chart node can be tagged with for automatic resolution.
///
/// Persisted by their short codes (`CLIENT`, `IVAREP`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
pub enum SpecialAccount {
    #[serde(rename = "CLIENT")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CLIENT"))]
    Customer,
    #[serde(rename = "PROVEE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PROVEE"))]
    Supplier,
    #[serde(rename = "IVAREP")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IVAREP"))]
    VatOutput,
    #[serde(rename = "IVASOP")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IVASOP"))]
    VatInput,
    #[serde(rename = "IVARRE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IVARRE"))]
    SurchargeOutput,
    #[serde(rename = "IVASRE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IVASRE"))]
    SurchargeInput,
    /// Withholdings customers retain from our sales.
    #[serde(rename = "IRPF")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IRPF"))]
    WithholdingSales,
    /// Withholdings we retain from supplier invoices.
    #[serde(rename = "IRPFPR")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "IRPFPR"))]
    WithholdingPurchases,
    #[serde(rename = "SUPLI")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "SUPLI"))]
    Supplied,
    #[serde(rename = "VENTAS")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "VENTAS"))]
    Sales,
    #[serde(rename = "COMPRA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "COMPRA"))]
    Purchases,
    #[serde(rename = "DEVVEN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "DEVVEN"))]
    SalesReturns,
    #[serde(rename = "DEVCOM")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "DEVCOM"))]
    PurchaseReturns,
    #[serde(rename = "PYG")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PYG"))]
    ProfitLoss,
    #[serde(rename = "CAJA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CAJA"))]
    Cash,
    #[serde(rename = "GTOBAN")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "GTOBAN"))]
    BankFees,
}

impl SpecialAccount {
    /// Every tag, in chart order.
    pub const ALL: [SpecialAccount; 16] = [
        SpecialAccount::Customer,
        SpecialAccount::Supplier,
        SpecialAccount::VatOutput,
        SpecialAccount::VatInput,
        SpecialAccount::SurchargeOutput,
        SpecialAccount::SurchargeInput,
        SpecialAccount::WithholdingSales,
        SpecialAccount::WithholdingPurchases,
        SpecialAccount::Supplied,
        SpecialAccount::Sales,
        SpecialAccount::Purchases,
        SpecialAccount::SalesReturns,
        SpecialAccount::PurchaseReturns,
        SpecialAccount::ProfitLoss,
        SpecialAccount::Cash,
        SpecialAccount::BankFees,
    ];

    /// Short persisted code.
    pub const fn code(&self) -> &'static str {
        match self {
            SpecialAccount::Customer => "CLIENT",
            SpecialAccount::Supplier => "PROVEE",
            SpecialAccount::VatOutput => "IVAREP",
            SpecialAccount::VatInput => "IVASOP",
            SpecialAccount::SurchargeOutput => "IVARRE",
            SpecialAccount::SurchargeInput => "IVASRE",
            SpecialAccount::WithholdingSales => "IRPF",
            SpecialAccount::WithholdingPurchases => "IRPFPR",
            SpecialAccount::Supplied => "SUPLI",
            SpecialAccount::Sales => "VENTAS",
            SpecialAccount::Purchases => "COMPRA",
            SpecialAccount::SalesReturns => "DEVVEN",
            SpecialAccount::PurchaseReturns => "DEVCOM",
            SpecialAccount::ProfitLoss => "PYG",
            SpecialAccount::Cash => "CAJA",
            SpecialAccount::BankFees => "GTOBAN",
        }
    }
}

impl fmt::Display for SpecialAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SpecialAccount {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpecialAccount::ALL
            .iter()
            .copied()
            .find(|tag| tag.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "special_account".to_string(),
                allowed: SpecialAccount::ALL.iter().map(|t| t.code().to_string()).collect(),
            })
    }
}

// =============================================================================
// Chart of Accounts
// =============================================================================

/// Inner node of the chart of accounts (`430`, `4770`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub code: String,
    pub period_code: String,
    pub description: String,
    pub parent_code: Option<String>,
    pub special: Option<SpecialAccount>,
}

/// Leaf of the chart of accounts; journal lines post here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubAccount {
    pub code: String,
    pub period_code: String,
    pub account_code: String,
    pub description: String,
    pub special: Option<SpecialAccount>,
}

// =============================================================================
// Fiscal Period
// =============================================================================

/// Whether journal entries may still be posted into a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PeriodStatus {
    #[default]
    Open,
    Closed,
}

/// A fiscal year (ejercicio).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    /// Period code, conventionally the start year (`"2025"`).
    pub code: String,
    pub company_id: i64,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: PeriodStatus,
    /// Length of generated sub-account codes; may only grow.
    pub subaccount_length: usize,
}

impl FiscalPeriod {
    /// Open period covering a calendar year, coded by the year.
    ///
    /// Returns `None` for years chrono cannot represent.
    pub fn calendar_year(company_id: i64, year: i32, subaccount_length: usize) -> Option<Self> {
        Some(FiscalPeriod {
            code: year.to_string(),
            company_id,
            name: year.to_string(),
            start_date: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end_date: NaiveDate::from_ymd_opt(year, 12, 31)?,
            status: PeriodStatus::Open,
            subaccount_length,
        })
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Whether `date` falls inside the period (both ends inclusive).
    #[inline]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

// =============================================================================
// Journal
// =============================================================================

/// Kind of a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EntryOperation {
    #[default]
    Normal,
    Opening,
    Closing,
    Regularization,
}

/// Journal entry header (asiento).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    /// Sequential number inside its period.
    pub number: i64,
    pub period_code: String,
    pub journal_id: Option<i64>,
    pub channel: Option<i64>,
    pub date: NaiveDate,
    pub concept: String,
    /// Code of the originating document or payment.
    pub document: Option<String>,
    pub operation: EntryOperation,
    /// Sum of debits.
    pub amount: Money,
    pub editable: bool,
}

/// Journal line (partida). Exactly one of debit/credit is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: i64,
    pub entry_id: i64,
    pub subaccount_code: String,
    pub concept: String,
    pub debit: Money,
    pub credit: Money,
    pub counterpart: Option<String>,
    pub document: Option<String>,
    /// Tax register fields, filled on VAT and surcharge lines.
    pub tax_id: Option<String>,
    pub tax_base: Option<Money>,
    pub vat: Option<Decimal>,
    pub surcharge: Option<Decimal>,
}

/// A line to be posted, before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDraft {
    pub subaccount_code: String,
    pub concept: String,
    pub debit: Money,
    pub credit: Money,
    pub counterpart: Option<String>,
    pub tax_id: Option<String>,
    pub tax_base: Option<Money>,
    pub vat: Option<Decimal>,
    pub surcharge: Option<Decimal>,
}

impl LineDraft {
    /// Builds a line from a signed amount: positive debits, negative credits.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::{LineDraft, Money};
    ///
    /// let line = LineDraft::posting("4770000000", "VAT", -Money::from_units(21));
    /// assert!(line.debit.is_zero());
    /// assert_eq!(line.credit, Money::from_units(21));
    /// ```
    pub fn posting(
        subaccount_code: impl Into<String>,
        concept: impl Into<String>,
        amount: Money,
    ) -> Self {
        let (debit, credit) = if amount.is_negative() {
            (Money::ZERO, -amount)
        } else {
            (amount, Money::ZERO)
        };
        LineDraft {
            subaccount_code: subaccount_code.into(),
            concept: concept.into(),
            debit,
            credit,
            counterpart: None,
            tax_id: None,
            tax_base: None,
            vat: None,
            surcharge: None,
        }
    }

    /// Signed amount: `debit − credit`.
    #[inline]
    pub fn signed(&self) -> Money {
        self.debit - self.credit
    }

    pub fn with_counterpart(mut self, code: Option<String>) -> Self {
        self.counterpart = code;
        self
    }

    /// Fills the tax register fields.
    pub fn with_tax_register(
        mut self,
        tax_id: Option<String>,
        base: Money,
        vat: Decimal,
        surcharge: Decimal,
    ) -> Self {
        self.tax_id = tax_id;
        self.tax_base = Some(base);
        self.vat = Some(vat);
        self.surcharge = Some(surcharge);
        self
    }
}

/// Totals of a set of lines.
pub fn totals<'a>(lines: impl IntoIterator<Item = &'a LineDraft>) -> (Money, Money) {
    lines
        .into_iter()
        .fold((Money::ZERO, Money::ZERO), |(d, c), l| (d + l.debit, c + l.credit))
}

/// Whether a set of lines balances exactly.
pub fn is_balanced<'a>(lines: impl IntoIterator<Item = &'a LineDraft>) -> bool {
    let (debit, credit) = totals(lines);
    debit == credit
}

// =============================================================================
// Code Filling
// =============================================================================

/// Builds a sub-account code as `prefix` + zeros + `suffix`.
///
/// The result is `length` digits long, or longer when `prefix` and `suffix`
/// do not fit; callers grow the period's sub-account length in that case.
///
/// ## Example
/// ```rust
/// use abaco_core::fill_to_length;
///
/// assert_eq!(fill_to_length(10, "430", "12").unwrap(), "4300000012");
/// assert_eq!(fill_to_length(6, "430", "1234").unwrap(), "4301234");
/// ```
pub fn fill_to_length(length: usize, prefix: &str, suffix: &str) -> CoreResult<String> {
    let used = prefix.len() + suffix.len();
    if used > MAX_SUBACCOUNT_LENGTH {
        return Err(CoreError::SubAccountTooLong {
            code: format!("{prefix}{suffix}"),
            max: MAX_SUBACCOUNT_LENGTH,
        });
    }
    let zeros = length.saturating_sub(used);
    Ok(format!("{prefix}{}{suffix}", "0".repeat(zeros)))
}
