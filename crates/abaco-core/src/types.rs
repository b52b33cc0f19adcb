//! # Domain Types
//!
//! Commercial-side types: documents, lines, taxes, subjects and payments.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Document     │   │  DocumentLine   │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  side / kind    │──►│  quantity       │   │  amount / fee   │       │
//! │  │  discount1/2    │   │  unit_price     │   │  method         │       │
//! │  │  totals         │   │  vat / surch.   │   │  entry ref      │       │
//! │  │  entry ref      │   │  total_price    │   └─────────────────┘       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Tax        │   │    Subject      │   │  TaxRegime      │       │
//! │  │  rate, type     │   │ customer or     │   │  General        │       │
//! │  │  VAT accounts   │   │ supplier        │   │  Exempt         │       │
//! │  └─────────────────┘   └─────────────────┘   │  Surcharge      │       │
//! │                                              │  UsedGoods      │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::DEFAULT_COMPANY_ID;

// =============================================================================
// Enumerations
// =============================================================================

/// Which side of a trade a document or payment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    /// Customer-facing document (we sell).
    Sale,
    /// Supplier-facing document (we buy).
    Purchase,
}

/// Document lifecycle kind. Only invoices are accounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Estimate,
    Order,
    DeliveryNote,
    Invoice,
}

/// VAT regime of a subject (copied onto its documents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaxRegime {
    #[default]
    General,
    /// No VAT is charged at all.
    Exempt,
    /// Retailers: VAT plus an equivalence surcharge.
    EquivalenceSurcharge,
    /// Margin scheme: VAT only on sale price minus cost.
    UsedGoods,
}

/// Fiscal nature of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    Domestic,
    /// Sales are zero-rated; purchases self-assess VAT.
    IntraCommunity,
    /// Sales are zero-rated.
    Export,
}

/// How a tax amount is derived from its rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TaxType {
    /// `net × rate / 100`
    #[default]
    Percentage,
    /// `quantity × rate`: the rate is an amount per unit.
    FixedValue,
}

// =============================================================================
// Master Data
// =============================================================================

/// A tax code with its rates and the sub-accounts it posts to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub code: String,
    pub description: String,
    /// VAT rate (percentage) or per-unit amount for fixed-value taxes.
    pub rate: Decimal,
    /// Equivalence surcharge rate (percentage).
    pub surcharge: Decimal,
    pub tax_type: TaxType,
    pub input_subaccount: Option<String>,
    pub output_subaccount: Option<String>,
    pub input_surcharge_subaccount: Option<String>,
    pub output_surcharge_subaccount: Option<String>,
}

/// Remaps a tax code for documents addressed to a country or province.
///
/// `replacement_tax_code = None` means the zone is not taxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxZone {
    pub id: i64,
    pub tax_code: String,
    pub country: String,
    pub province: Option<String>,
    pub replacement_tax_code: Option<String>,
}

impl TaxZone {
    /// Whether this override applies to the given tax code and address.
    pub fn matches(&self, tax_code: &str, country: &str, province: Option<&str>) -> bool {
        if self.tax_code != tax_code || !self.country.eq_ignore_ascii_case(country) {
            return false;
        }
        match (&self.province, province) {
            (None, _) => true,
            (Some(p), Some(q)) => p.eq_ignore_ascii_case(q),
            (Some(_), None) => false,
        }
    }
}

/// A withholding (income tax retained at source) percentage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withholding {
    pub code: String,
    pub description: String,
    pub rate: Decimal,
    pub sales_subaccount: Option<String>,
    pub purchase_subaccount: Option<String>,
}

/// Document numbering series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub code: String,
    pub description: String,
    /// Documents in this series never carry tax.
    pub tax_exempt: bool,
    /// Series reserved for credit and debit notes.
    pub rectifying: bool,
}

/// A customer (sale side) or supplier (purchase side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub side: TradeSide,
    pub code: String,
    pub name: String,
    pub tax_id: Option<String>,
    /// Explicit sub-account code, if assigned.
    pub subaccount: Option<String>,
    /// Customer group (customers only).
    pub group_code: Option<String>,
    pub tax_regime: TaxRegime,
    /// Exemption article code that zero-rates every line.
    pub tax_exception: Option<String>,
}

/// Customer group; may carry a shared sub-account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerGroup {
    pub code: String,
    pub name: String,
    pub subaccount: Option<String>,
}

/// Product family; may carry goods sub-accounts for its products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub code: String,
    pub name: String,
    pub sales_subaccount: Option<String>,
    pub purchase_subaccount: Option<String>,
}

/// A product referenced by document lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub reference: String,
    pub description: String,
    pub family_code: Option<String>,
    pub sales_subaccount: Option<String>,
    pub purchase_subaccount: Option<String>,
}

/// Payment method with the bank/cash and fee sub-accounts it settles through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub code: String,
    pub description: String,
    pub bank_subaccount: Option<String>,
    pub fee_subaccount: Option<String>,
}

// =============================================================================
// Document
// =============================================================================

/// Header of a commercial document (estimate, order, delivery note, invoice).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub company_id: i64,
    pub side: TradeSide,
    pub kind: DocumentKind,
    /// Human-readable code, e.g. `FAC2025A12`.
    pub code: String,
    pub series_code: String,
    pub subject_code: String,
    pub subject_name: String,
    pub subject_tax_id: Option<String>,
    pub date: NaiveDate,
    /// Accrual date; the accounting entry uses it when present.
    pub accrual_date: Option<NaiveDate>,
    pub country: String,
    pub province: Option<String>,
    pub tax_regime: TaxRegime,
    pub operation: Operation,
    pub tax_exception: Option<String>,
    pub payment_method: Option<String>,
    pub channel: Option<i64>,
    /// Header discounts (percentages), applied sequentially on every line.
    pub discount1: Decimal,
    pub discount2: Decimal,

    // Totals, always written by the calculator.
    pub net: Money,
    pub net_without_discount: Money,
    pub total: Money,
    pub total_tax: Money,
    pub total_surcharge: Money,
    pub total_withholding: Money,
    pub total_supplied: Money,
    pub total_cost: Money,
    pub total_profit: Money,

    /// Journal entry generated from this document, if any.
    pub accounting_entry_id: Option<i64>,
    /// Document this one rectifies (credit/debit notes).
    pub rectified_id: Option<String>,
    pub editable: bool,
}

impl Document {
    /// Creates an empty editable document with zeroed totals.
    pub fn new(
        id: impl Into<String>,
        side: TradeSide,
        kind: DocumentKind,
        code: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Document {
            id: id.into(),
            company_id: DEFAULT_COMPANY_ID,
            side,
            kind,
            code: code.into(),
            series_code: String::new(),
            subject_code: String::new(),
            subject_name: String::new(),
            subject_tax_id: None,
            date,
            accrual_date: None,
            country: String::new(),
            province: None,
            tax_regime: TaxRegime::General,
            operation: Operation::Domestic,
            tax_exception: None,
            payment_method: None,
            channel: None,
            discount1: Decimal::ZERO,
            discount2: Decimal::ZERO,
            net: Money::ZERO,
            net_without_discount: Money::ZERO,
            total: Money::ZERO,
            total_tax: Money::ZERO,
            total_surcharge: Money::ZERO,
            total_withholding: Money::ZERO,
            total_supplied: Money::ZERO,
            total_cost: Money::ZERO,
            total_profit: Money::ZERO,
            accounting_entry_id: None,
            rectified_id: None,
            editable: true,
        }
    }

    /// Date the accounting entry is posted on.
    #[inline]
    pub fn accounting_date(&self) -> NaiveDate {
        self.accrual_date.unwrap_or(self.date)
    }

    /// Applies both header discounts to an amount, unrounded.
    #[inline]
    pub fn apply_header_discounts(&self, amount: Money) -> Money {
        amount.discount2(self.discount1, self.discount2)
    }

    /// Resets every total to zero.
    pub fn reset_totals(&mut self) {
        self.net = Money::ZERO;
        self.net_without_discount = Money::ZERO;
        self.total = Money::ZERO;
        self.total_tax = Money::ZERO;
        self.total_surcharge = Money::ZERO;
        self.total_withholding = Money::ZERO;
        self.total_supplied = Money::ZERO;
        self.total_cost = Money::ZERO;
        self.total_profit = Money::ZERO;
    }
}

// =============================================================================
// Document Line
// =============================================================================

/// A line of a commercial document.
///
/// ## Invariant
/// `total_price = quantity × unit_price × (100 − d1)/100 × (100 − d2)/100`,
/// kept at full scale. Rounding happens when lines are grouped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub id: String,
    pub document_id: String,
    pub position: i64,
    pub product_ref: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub discount1: Decimal,
    pub discount2: Decimal,
    pub tax_code: Option<String>,
    pub vat: Decimal,
    pub surcharge: Decimal,
    pub withholding: Decimal,
    pub tax_exception: Option<String>,
    /// Reimbursable expense paid on the subject's behalf: never taxed.
    pub supplied: bool,
    /// Unit cost.
    pub cost: Money,
    /// `quantity × unit_price`
    pub price_without_discount: Money,
    /// Net line price after both line discounts.
    pub total_price: Money,
}

impl DocumentLine {
    /// Creates a line with no discounts and no tax.
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
    ) -> Self {
        DocumentLine {
            id: id.into(),
            document_id: document_id.into(),
            position: 0,
            product_ref: None,
            description: String::new(),
            quantity,
            unit_price,
            discount1: Decimal::ZERO,
            discount2: Decimal::ZERO,
            tax_code: None,
            vat: Decimal::ZERO,
            surcharge: Decimal::ZERO,
            withholding: Decimal::ZERO,
            tax_exception: None,
            supplied: false,
            cost: Money::ZERO,
            price_without_discount: Money::ZERO,
            total_price: Money::ZERO,
        }
    }

    /// Sets tax code and rates from a tax definition.
    pub fn with_tax(mut self, tax: &Tax) -> Self {
        self.tax_code = Some(tax.code.clone());
        self.vat = tax.rate;
        self.surcharge = tax.surcharge;
        self
    }

    /// Total cost of the line (`quantity × cost`).
    #[inline]
    pub fn total_cost(&self) -> Money {
        self.cost * self.quantity
    }

    /// Removes every tax from the line.
    pub fn zero_taxes(&mut self) {
        self.vat = Decimal::ZERO;
        self.surcharge = Decimal::ZERO;
    }
}

// =============================================================================
// Payment
// =============================================================================

/// A collection (sale side) or disbursement (purchase side).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub company_id: i64,
    pub side: TradeSide,
    pub document_id: Option<String>,
    /// Code of the document paid, for the entry concept.
    pub document_code: Option<String>,
    pub subject_code: String,
    pub amount: Money,
    /// Bank fee charged on the movement.
    pub fee: Money,
    pub date: NaiveDate,
    pub payment_method: String,
    pub channel: Option<i64>,
    pub accounting_entry_id: Option<i64>,
}

// =============================================================================
// Unit Tests
// =============================================================================
