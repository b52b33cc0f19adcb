//! # Validation Module
//!
//! Business-rule validation for values arriving from forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Form binding (fields.rs)                                     │
//! │  ├── Field name → typed field                                          │
//! │  └── Raw string → Decimal / bool / code                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Ranges, code formats, date ordering                               │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE constraints                                     │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::accounting::MAX_SUBACCOUNT_LENGTH;
use crate::error::ValidationError;
use crate::types::{Document, DocumentLine};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a discount percentage.
///
/// ## Rules
/// - Between 0 and 100, both inclusive
///
/// ## Example
/// ```rust
/// use abaco_core::validation::validate_discount;
/// use rust_decimal::Decimal;
///
/// assert!(validate_discount("discount1", Decimal::from(15)).is_ok());
/// assert!(validate_discount("discount1", Decimal::from(101)).is_err());
/// ```
pub fn validate_discount(field: &str, value: Decimal) -> ValidationResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "100".to_string(),
        });
    }
    Ok(())
}

/// Validates a tax, surcharge or withholding percentage (non-negative).
pub fn validate_rate(field: &str, value: Decimal) -> ValidationResult<()> {
    if value < Decimal::ZERO {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: "0".to_string(),
            max: "∞".to_string(),
        });
    }
    Ok(())
}

/// Validates the discounts and rates of a document and its lines before
/// they reach the calculator.
pub fn validate_document(doc: &Document, lines: &[DocumentLine]) -> ValidationResult<()> {
    validate_discount("discount1", doc.discount1)?;
    validate_discount("discount2", doc.discount2)?;
    for (index, line) in lines.iter().enumerate() {
        let field = |name: &str| format!("lines[{index}].{name}");
        validate_discount(&field("discount1"), line.discount1)?;
        validate_discount(&field("discount2"), line.discount2)?;
        validate_rate(&field("vat"), line.vat)?;
        validate_rate(&field("surcharge"), line.surcharge)?;
        validate_rate(&field("withholding"), line.withholding)?;
    }
    Ok(())
}

/// Validates an account or sub-account code.
///
/// ## Rules
/// - Not empty
/// - Digits only
/// - At most 32 digits
pub fn validate_account_code(field: &str, code: &str) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if code.len() > MAX_SUBACCOUNT_LENGTH {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_SUBACCOUNT_LENGTH,
        });
    }
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::invalid(field, "only digits are allowed"));
    }
    Ok(())
}

/// Validates a master-data code (subject, series, tax...).
pub fn validate_code(field: &str, code: &str, max: usize) -> ValidationResult<()> {
    let code = code.trim();
    if code.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if code.len() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid(
            field,
            "only letters, numbers, hyphens, and underscores allowed",
        ));
    }
    Ok(())
}

/// Validates the date range of a fiscal period.
pub fn validate_period_dates(start: NaiveDate, end: NaiveDate) -> ValidationResult<()> {
    if end < start {
        return Err(ValidationError::invalid(
            "end_date",
            format!("{end} is before start date {start}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_bounds() {
        assert!(validate_discount("d", dec!(0)).is_ok());
        assert!(validate_discount("d", dec!(100)).is_ok());
        assert!(validate_discount("d", dec!(-0.01)).is_err());
        assert!(validate_discount("d", dec!(100.01)).is_err());
    }

    #[test]
    fn test_account_codes() {
        assert!(validate_account_code("code", "4300000001").is_ok());
        assert!(validate_account_code("code", "").is_err());
        assert!(validate_account_code("code", "43A").is_err());
        assert!(validate_account_code("code", &"1".repeat(33)).is_err());
    }

    #[test]
    fn test_codes() {
        assert!(validate_code("code", "IVA21", 10).is_ok());
        assert!(validate_code("code", "IVA 21", 10).is_err());
        assert!(validate_code("code", "ABCDEFGHIJK", 10).is_err());
    }

    #[test]
    fn test_period_dates() {
        let jan = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let dec = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert!(validate_period_dates(jan, dec).is_ok());
        assert!(validate_period_dates(dec, jan).is_err());
    }

    #[test]
    fn test_document_discounts_and_line_rates() {
        use crate::money::Money;
        use crate::types::{DocumentKind, TradeSide};

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut doc = Document::new("", TradeSide::Sale, DocumentKind::Invoice, "F1", date);
        let mut line = DocumentLine::new("", "", dec!(1), Money::from_units(10));
        line.vat = dec!(21);
        assert!(validate_document(&doc, &[line.clone()]).is_ok());

        line.discount2 = dec!(150);
        let err = validate_document(&doc, &[line.clone()]).unwrap_err();
        assert!(err.to_string().contains("lines[0].discount2"));

        line.discount2 = dec!(0);
        line.withholding = dec!(-15);
        assert!(validate_document(&doc, &[line]).is_err());

        doc.discount1 = dec!(-5);
        assert!(validate_document(&doc, &[]).is_err());
    }

    #[test]
    fn test_rates() {
        assert!(validate_rate("vat", dec!(21)).is_ok());
        assert!(validate_rate("vat", dec!(-1)).is_err());
    }
}
