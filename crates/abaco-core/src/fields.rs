//! # Form-Bound Fields
//!
//! Explicit field sets for the values a form may write on a line or a
//! document header, with typed set/get dispatch.
//!
//! ```text
//!   "discount1" ──FromStr──► LineField::Discount1
//!   "12.5"      ──parse────► Decimal ──validate──► line.discount1
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Document, DocumentLine};
use crate::validation::{validate_discount, validate_rate, ValidationResult};

// =============================================================================
// Line Fields
// =============================================================================

/// Editable fields of a document line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    ProductRef,
    Description,
    Quantity,
    UnitPrice,
    Discount1,
    Discount2,
    TaxCode,
    Vat,
    Surcharge,
    Withholding,
    Supplied,
    Cost,
}

impl LineField {
    pub const ALL: [LineField; 12] = [
        LineField::ProductRef,
        LineField::Description,
        LineField::Quantity,
        LineField::UnitPrice,
        LineField::Discount1,
        LineField::Discount2,
        LineField::TaxCode,
        LineField::Vat,
        LineField::Surcharge,
        LineField::Withholding,
        LineField::Supplied,
        LineField::Cost,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            LineField::ProductRef => "product_ref",
            LineField::Description => "description",
            LineField::Quantity => "quantity",
            LineField::UnitPrice => "unit_price",
            LineField::Discount1 => "discount1",
            LineField::Discount2 => "discount2",
            LineField::TaxCode => "tax_code",
            LineField::Vat => "vat",
            LineField::Surcharge => "surcharge",
            LineField::Withholding => "withholding",
            LineField::Supplied => "supplied",
            LineField::Cost => "cost",
        }
    }
}

impl FromStr for LineField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineField::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Writes a raw form value into a line field.
///
/// ## Example
/// ```rust
/// use abaco_core::fields::{set_line_field, LineField};
/// use abaco_core::{DocumentLine, Money};
/// use rust_decimal::Decimal;
///
/// let mut line = DocumentLine::new("l1", "d1", Decimal::ONE, Money::ZERO);
/// set_line_field(&mut line, LineField::Discount1, "12.5").unwrap();
/// assert_eq!(line.discount1, Decimal::new(125, 1));
/// assert!(set_line_field(&mut line, LineField::Discount1, "120").is_err());
/// ```
pub fn set_line_field(line: &mut DocumentLine, field: LineField, raw: &str) -> ValidationResult<()> {
    let name = field.name();
    match field {
        LineField::ProductRef => line.product_ref = optional(raw),
        LineField::Description => line.description = raw.trim().to_string(),
        LineField::Quantity => line.quantity = decimal(name, raw)?,
        LineField::UnitPrice => line.unit_price = Money::new(decimal(name, raw)?),
        LineField::Discount1 => {
            let value = decimal(name, raw)?;
            validate_discount(name, value)?;
            line.discount1 = value;
        }
        LineField::Discount2 => {
            let value = decimal(name, raw)?;
            validate_discount(name, value)?;
            line.discount2 = value;
        }
        LineField::TaxCode => line.tax_code = optional(raw),
        LineField::Vat => {
            let value = decimal(name, raw)?;
            validate_rate(name, value)?;
            line.vat = value;
        }
        LineField::Surcharge => {
            let value = decimal(name, raw)?;
            validate_rate(name, value)?;
            line.surcharge = value;
        }
        LineField::Withholding => {
            let value = decimal(name, raw)?;
            validate_rate(name, value)?;
            line.withholding = value;
        }
        LineField::Supplied => line.supplied = boolean(name, raw)?,
        LineField::Cost => line.cost = Money::new(decimal(name, raw)?),
    }
    Ok(())
}

/// Reads a line field as its form representation.
pub fn line_field_value(line: &DocumentLine, field: LineField) -> String {
    match field {
        LineField::ProductRef => line.product_ref.clone().unwrap_or_default(),
        LineField::Description => line.description.clone(),
        LineField::Quantity => line.quantity.to_string(),
        LineField::UnitPrice => line.unit_price.to_string(),
        LineField::Discount1 => line.discount1.to_string(),
        LineField::Discount2 => line.discount2.to_string(),
        LineField::TaxCode => line.tax_code.clone().unwrap_or_default(),
        LineField::Vat => line.vat.to_string(),
        LineField::Surcharge => line.surcharge.to_string(),
        LineField::Withholding => line.withholding.to_string(),
        LineField::Supplied => line.supplied.to_string(),
        LineField::Cost => line.cost.to_string(),
    }
}

// =============================================================================
// Document Fields
// =============================================================================

/// Editable header fields of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentField {
    SeriesCode,
    SubjectCode,
    Date,
    AccrualDate,
    Country,
    Province,
    PaymentMethod,
    Discount1,
    Discount2,
}

impl DocumentField {
    pub const ALL: [DocumentField; 9] = [
        DocumentField::SeriesCode,
        DocumentField::SubjectCode,
        DocumentField::Date,
        DocumentField::AccrualDate,
        DocumentField::Country,
        DocumentField::Province,
        DocumentField::PaymentMethod,
        DocumentField::Discount1,
        DocumentField::Discount2,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            DocumentField::SeriesCode => "series_code",
            DocumentField::SubjectCode => "subject_code",
            DocumentField::Date => "date",
            DocumentField::AccrualDate => "accrual_date",
            DocumentField::Country => "country",
            DocumentField::Province => "province",
            DocumentField::PaymentMethod => "payment_method",
            DocumentField::Discount1 => "discount1",
            DocumentField::Discount2 => "discount2",
        }
    }
}

impl FromStr for DocumentField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentField::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| ValidationError::UnknownField(s.to_string()))
    }
}

/// Writes a raw form value into a document header field.
pub fn set_document_field(doc: &mut Document, field: DocumentField, raw: &str) -> ValidationResult<()> {
    let name = field.name();
    match field {
        DocumentField::SeriesCode => doc.series_code = required(name, raw)?,
        DocumentField::SubjectCode => doc.subject_code = required(name, raw)?,
        DocumentField::Date => doc.date = date(name, raw)?,
        DocumentField::AccrualDate => {
            doc.accrual_date = match optional(raw) {
                Some(value) => Some(date(name, &value)?),
                None => None,
            }
        }
        DocumentField::Country => doc.country = raw.trim().to_string(),
        DocumentField::Province => doc.province = optional(raw),
        DocumentField::PaymentMethod => doc.payment_method = optional(raw),
        DocumentField::Discount1 => {
            let value = decimal(name, raw)?;
            validate_discount(name, value)?;
            doc.discount1 = value;
        }
        DocumentField::Discount2 => {
            let value = decimal(name, raw)?;
            validate_discount(name, value)?;
            doc.discount2 = value;
        }
    }
    Ok(())
}

/// Reads a document header field as its form representation.
pub fn document_field_value(doc: &Document, field: DocumentField) -> String {
    match field {
        DocumentField::SeriesCode => doc.series_code.clone(),
        DocumentField::SubjectCode => doc.subject_code.clone(),
        DocumentField::Date => doc.date.to_string(),
        DocumentField::AccrualDate => doc.accrual_date.map(|d| d.to_string()).unwrap_or_default(),
        DocumentField::Country => doc.country.clone(),
        DocumentField::Province => doc.province.clone().unwrap_or_default(),
        DocumentField::PaymentMethod => doc.payment_method.clone().unwrap_or_default(),
        DocumentField::Discount1 => doc.discount1.to_string(),
        DocumentField::Discount2 => doc.discount2.to_string(),
    }
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn decimal(field: &str, raw: &str) -> ValidationResult<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(raw).map_err(|e| ValidationError::invalid(field, e.to_string()))
}

fn boolean(field: &str, raw: &str) -> ValidationResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "" | "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ValidationError::invalid(field, "expected a boolean")),
    }
}

fn date(field: &str, raw: &str) -> ValidationResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| ValidationError::invalid(field, e.to_string()))
}

fn optional(raw: &str) -> Option<String> {
    let raw = raw.trim();
    (!raw.is_empty()).then(|| raw.to_string())
}

fn required(field: &str, raw: &str) -> ValidationResult<String> {
    optional(raw).ok_or_else(|| ValidationError::Required {
        field: field.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentKind, TradeSide};
    use rust_decimal_macros::dec;

    #[test]
    fn test_line_field_names_parse() {
        for field in LineField::ALL {
            assert_eq!(field.name().parse::<LineField>().unwrap(), field);
        }
        assert!(matches!(
            "pvpunitario".parse::<LineField>(),
            Err(ValidationError::UnknownField(_))
        ));
    }

    #[test]
    fn test_set_and_read_line_fields() {
        let mut line = DocumentLine::new("l1", "d1", dec!(1), Money::ZERO);
        set_line_field(&mut line, LineField::Quantity, "3").unwrap();
        set_line_field(&mut line, LineField::UnitPrice, " 19.99 ").unwrap();
        set_line_field(&mut line, LineField::Supplied, "on").unwrap();
        set_line_field(&mut line, LineField::TaxCode, "").unwrap();

        assert_eq!(line.quantity, dec!(3));
        assert_eq!(line_field_value(&line, LineField::UnitPrice), "19.99");
        assert!(line.supplied);
        assert!(line.tax_code.is_none());
        assert!(set_line_field(&mut line, LineField::Vat, "abc").is_err());
        assert!(set_line_field(&mut line, LineField::Supplied, "maybe").is_err());
    }

    #[test]
    fn test_set_document_fields() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut doc = Document::new("d1", TradeSide::Sale, DocumentKind::Invoice, "F1", date);

        set_document_field(&mut doc, DocumentField::Date, "2025-02-14").unwrap();
        set_document_field(&mut doc, DocumentField::Discount2, "5").unwrap();
        set_document_field(&mut doc, DocumentField::AccrualDate, "").unwrap();

        assert_eq!(document_field_value(&doc, DocumentField::Date), "2025-02-14");
        assert_eq!(doc.discount2, dec!(5));
        assert!(doc.accrual_date.is_none());
        assert!(set_document_field(&mut doc, DocumentField::SeriesCode, " ").is_err());
        assert!(set_document_field(&mut doc, DocumentField::Date, "14/02/2025").is_err());
    }
}
