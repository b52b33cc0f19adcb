//! Everything a calculation reads besides the document itself.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::calculator::modifier::CalculatorModifier;
use crate::money::Precision;
use crate::types::{Document, Series, Subject, Tax, TaxType, TaxZone};

/// Per-run calculation context.
///
/// Holds the modifier registry, so two calculations never share hooks by
/// accident.
///
/// ## Example
/// ```rust
/// use abaco_core::calculator::CalculationContext;
/// use abaco_core::Precision;
///
/// let ctx = CalculationContext::new(Precision::new(2));
/// assert_eq!(ctx.precision().decimals(), 2);
/// ```
#[derive(Clone, Default)]
pub struct CalculationContext {
    precision: Precision,
    taxes: HashMap<String, Tax>,
    tax_zones: Vec<TaxZone>,
    series: HashMap<String, Series>,
    subject: Option<Subject>,
    modifiers: Vec<Arc<dyn CalculatorModifier>>,
}

impl CalculationContext {
    pub fn new(precision: Precision) -> Self {
        CalculationContext {
            precision,
            ..Default::default()
        }
    }

    pub fn with_taxes(mut self, taxes: impl IntoIterator<Item = Tax>) -> Self {
        self.taxes
            .extend(taxes.into_iter().map(|tax| (tax.code.clone(), tax)));
        self
    }

    pub fn with_tax_zones(mut self, zones: impl IntoIterator<Item = TaxZone>) -> Self {
        self.tax_zones.extend(zones);
        self
    }

    pub fn with_series(mut self, series: impl IntoIterator<Item = Series>) -> Self {
        self.series
            .extend(series.into_iter().map(|s| (s.code.clone(), s)));
        self
    }

    pub fn with_subject(mut self, subject: Option<Subject>) -> Self {
        self.subject = subject;
        self
    }

    /// Appends a modifier; modifiers run in registration order.
    pub fn register(mut self, modifier: Arc<dyn CalculatorModifier>) -> Self {
        self.modifiers.push(modifier);
        self
    }

    #[inline]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    pub fn tax(&self, code: &str) -> Option<&Tax> {
        self.taxes.get(code)
    }

    pub fn series(&self, code: &str) -> Option<&Series> {
        self.series.get(code)
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn modifiers(&self) -> &[Arc<dyn CalculatorModifier>] {
        &self.modifiers
    }

    /// How the tax behind `code` is computed; unknown codes are percentages.
    pub fn tax_type(&self, code: Option<&str>) -> TaxType {
        code.and_then(|c| self.tax(c))
            .map(|t| t.tax_type)
            .unwrap_or_default()
    }

    /// Zone override for a tax code at an address.
    ///
    /// A province-level zone wins over a country-level one.
    pub fn zone_for(&self, tax_code: &str, country: &str, province: Option<&str>) -> Option<&TaxZone> {
        let mut matching = self
            .tax_zones
            .iter()
            .filter(|z| z.matches(tax_code, country, province));
        let first = matching.next()?;
        if first.province.is_some() {
            return Some(first);
        }
        Some(matching.find(|z| z.province.is_some()).unwrap_or(first))
    }

    /// Credit/debit notes: rectification series or an explicit rectified document.
    pub fn is_rectifying(&self, doc: &Document) -> bool {
        doc.rectified_id.is_some()
            || self
                .series(&doc.series_code)
                .map(|s| s.rectifying)
                .unwrap_or(false)
    }

    /// Whether the document's series forces zero tax.
    pub fn is_tax_exempt_series(&self, doc: &Document) -> bool {
        self.series(&doc.series_code)
            .map(|s| s.tax_exempt)
            .unwrap_or(false)
    }
}

impl fmt::Debug for CalculationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationContext")
            .field("precision", &self.precision)
            .field("taxes", &self.taxes.len())
            .field("tax_zones", &self.tax_zones.len())
            .field("series", &self.series.len())
            .field("subject", &self.subject.as_ref().map(|s| &s.code))
            .field(
                "modifiers",
                &self.modifiers.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
