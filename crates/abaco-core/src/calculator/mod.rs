//! # Document Calculator
//!
//! Turns a document and its lines into reconciled totals.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. clear       modifiers.clear ──Stop──► return false                  │
//! │                 reset document and line totals                          │
//! │  2. apply       regime / exception / series / zone / surcharge rules    │
//! │                 then modifiers.apply                                    │
//! │  3. lines       per line: modifiers.calculate_line ──Stop──► skip       │
//! │                           LineCalculator::calculate                     │
//! │  4. group       group_lines (round once per group)                      │
//! │  5. adjust      modifiers.adjust_subtotals                              │
//! │  6. write       subtotals ──► document totals                           │
//! │  7. finalize    modifiers.finalize                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence is not handled here; the accounting crate's calculation
//! service saves lines and document inside one transaction.

mod context;
mod line;
mod modifier;
mod subtotals;

pub use context::CalculationContext;
pub use line::LineCalculator;
pub use modifier::{CalculatorModifier, ModifierFlow};
pub use subtotals::{group_lines, GroupKey, Subtotals, TaxGroup};

use crate::money::Money;
use crate::types::{Document, DocumentLine, Operation, TaxRegime, TradeSide};
use modifier::run_chain;

/// Document aggregator.
pub struct Calculator;

impl Calculator {
    /// Recomputes every total of `doc` and `lines` in place.
    ///
    /// Returns `false` when a modifier aborted the calculation during the
    /// clear phase; nothing is reset in that case.
    pub fn calculate(ctx: &CalculationContext, doc: &mut Document, lines: &mut [DocumentLine]) -> bool {
        Self::run(ctx, doc, lines).is_some()
    }

    /// Computes subtotals without touching the caller's document or lines.
    ///
    /// ## Example
    /// ```rust
    /// use abaco_core::calculator::{Calculator, CalculationContext};
    /// use abaco_core::{Document, DocumentKind, DocumentLine, Money, TradeSide};
    /// use chrono::NaiveDate;
    /// use rust_decimal::Decimal;
    ///
    /// let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    /// let doc = Document::new("d1", TradeSide::Sale, DocumentKind::Invoice, "F1", date);
    /// let mut line = DocumentLine::new("l1", "d1", Decimal::ONE, Money::from_units(100));
    /// line.vat = Decimal::from(21);
    ///
    /// let ctx = CalculationContext::default();
    /// let subtotals = Calculator::subtotals(&ctx, &doc, &[line]).unwrap();
    /// assert_eq!(subtotals.total, Money::from_units(121));
    /// ```
    pub fn subtotals(ctx: &CalculationContext, doc: &Document, lines: &[DocumentLine]) -> Option<Subtotals> {
        let mut doc = doc.clone();
        let mut lines = lines.to_vec();
        Self::run(ctx, &mut doc, &mut lines)
    }

    fn run(ctx: &CalculationContext, doc: &mut Document, lines: &mut [DocumentLine]) -> Option<Subtotals> {
        let modifiers = ctx.modifiers();

        if run_chain(modifiers, |m| m.clear(doc, lines)).is_stop() {
            return None;
        }
        Self::clear(doc, lines);

        Self::apply(ctx, doc, lines);
        run_chain(modifiers, |m| m.apply(doc, lines));

        for line in lines.iter_mut() {
            if run_chain(modifiers, |m| m.calculate_line(doc, line)).is_stop() {
                continue;
            }
            LineCalculator::calculate(line);
        }

        let mut subtotals = group_lines(ctx, doc, lines);
        run_chain(modifiers, |m| m.adjust_subtotals(doc, &mut subtotals));

        Self::write_totals(doc, &subtotals);
        run_chain(modifiers, |m| m.finalize(doc, lines));

        Some(subtotals)
    }

    /// Resets document and line totals to zero.
    pub fn clear(doc: &mut Document, lines: &mut [DocumentLine]) {
        doc.reset_totals();
        for line in lines.iter_mut() {
            line.price_without_discount = Money::ZERO;
            line.total_price = Money::ZERO;
        }
    }

    /// Applies subject, series and zone rules to the document and its lines.
    pub fn apply(ctx: &CalculationContext, doc: &mut Document, lines: &mut [DocumentLine]) {
        if let Some(subject) = ctx.subject() {
            doc.tax_regime = subject.tax_regime;
            if subject.tax_exception.is_some() {
                doc.tax_exception = subject.tax_exception.clone();
            }
        }

        let regime = doc.tax_regime;
        let zero_rated = ctx.is_tax_exempt_series(doc)
            || regime == TaxRegime::Exempt
            || doc.tax_exception.is_some()
            || (doc.side == TradeSide::Sale
                && matches!(doc.operation, Operation::IntraCommunity | Operation::Export));
        let used_goods_purchase = doc.side == TradeSide::Purchase && regime == TaxRegime::UsedGoods;

        for line in lines.iter_mut() {
            if let Some(code) = line.tax_code.clone() {
                if let Some(zone) = ctx.zone_for(&code, &doc.country, doc.province.as_deref()) {
                    match zone.replacement_tax_code.as_deref().map(|c| ctx.tax(c)) {
                        None => {
                            line.tax_code = None;
                            line.zero_taxes();
                        }
                        Some(Some(tax)) => {
                            line.tax_code = Some(tax.code.clone());
                            line.vat = tax.rate;
                            line.surcharge = tax.surcharge;
                        }
                        Some(None) => {}
                    }
                }
            }

            if regime == TaxRegime::EquivalenceSurcharge {
                if let Some(tax) = line.tax_code.as_deref().and_then(|c| ctx.tax(c)) {
                    line.surcharge = tax.surcharge;
                }
            } else {
                line.surcharge = rust_decimal::Decimal::ZERO;
            }

            if zero_rated || line.supplied || line.tax_exception.is_some() || used_goods_purchase {
                line.zero_taxes();
                if line.tax_exception.is_none() {
                    line.tax_exception = doc.tax_exception.clone();
                }
            }
        }
    }

    fn write_totals(doc: &mut Document, subtotals: &Subtotals) {
        doc.net = subtotals.net;
        doc.net_without_discount = subtotals.net_without_discount;
        doc.total_tax = subtotals.total_tax;
        doc.total_surcharge = subtotals.total_surcharge;
        doc.total_withholding = subtotals.total_withholding;
        doc.total_supplied = subtotals.total_supplied;
        doc.total_cost = subtotals.total_cost;
        doc.total_profit = subtotals.total_profit;
        doc.total = subtotals.total;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Precision;
    use crate::types::{DocumentKind, Series, Subject, Tax, TaxType, TaxZone};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn tax(code: &str, rate: Decimal, surcharge: Decimal) -> Tax {
        Tax {
            code: code.to_string(),
            description: code.to_string(),
            rate,
            surcharge,
            tax_type: TaxType::Percentage,
            input_subaccount: None,
            output_subaccount: None,
            input_surcharge_subaccount: None,
            output_surcharge_subaccount: None,
        }
    }

    fn ctx() -> CalculationContext {
        CalculationContext::new(Precision::new(2))
            .with_taxes([
                tax("IVA21", dec!(21), dec!(5.2)),
                tax("IVA10", dec!(10), dec!(1.4)),
                tax("IGIC7", dec!(7), dec!(0)),
            ])
            .with_series([
                Series {
                    code: "A".to_string(),
                    description: "General".to_string(),
                    tax_exempt: false,
                    rectifying: false,
                },
                Series {
                    code: "X".to_string(),
                    description: "Exempt".to_string(),
                    tax_exempt: true,
                    rectifying: false,
                },
                Series {
                    code: "R".to_string(),
                    description: "Rectifying".to_string(),
                    tax_exempt: false,
                    rectifying: true,
                },
            ])
    }

    fn doc(side: TradeSide) -> Document {
        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut doc = Document::new("d1", side, DocumentKind::Invoice, "F1", date);
        doc.series_code = "A".to_string();
        doc.country = "ESP".to_string();
        doc
    }

    fn line(id: &str, qty: Decimal, price: Decimal, tax: &Tax) -> DocumentLine {
        DocumentLine::new(id, "d1", qty, Money::new(price)).with_tax(tax)
    }

    #[test]
    fn test_discounted_line_rounds_once_at_group_level() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        let mut l = line("l1", dec!(10), dec!(19.99), ctx.tax("IVA21").unwrap());
        l.discount1 = dec!(10);
        l.discount2 = dec!(5);
        let mut lines = vec![l];

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(lines[0].total_price.amount(), dec!(170.9145));
        assert_eq!(doc.net.amount(), dec!(170.91));
        // 170.9145 × 21% = 35.892045
        assert_eq!(doc.total_tax.amount(), dec!(35.89));
        assert_eq!(doc.total.amount(), dec!(206.80));
    }

    #[test]
    fn test_two_vat_groups() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        let mut lines = vec![
            line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap()),
            line("l2", dec!(1), dec!(50), ctx.tax("IVA10").unwrap()),
        ];

        let subtotals = Calculator::subtotals(&ctx, &doc, &lines).unwrap();
        assert_eq!(subtotals.groups.len(), 2);

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.net.amount(), dec!(150));
        assert_eq!(doc.total_tax.amount(), dec!(26.00));
        assert_eq!(doc.total_surcharge, Money::ZERO);
        assert_eq!(doc.total.amount(), dec!(176.00));
    }

    #[test]
    fn test_calculate_is_idempotent() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        doc.discount1 = dec!(3);
        let mut lines = vec![
            line("l1", dec!(3), dec!(33.333), ctx.tax("IVA21").unwrap()),
            line("l2", dec!(7), dec!(0.99), ctx.tax("IVA10").unwrap()),
        ];
        lines[0].withholding = dec!(15);

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        let first = (doc.clone(), lines.clone());
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(first.0, doc);
        assert_eq!(first.1, lines);
    }

    #[test]
    fn test_used_goods_margin() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        doc.tax_regime = TaxRegime::UsedGoods;
        let mut l = line("l1", dec!(1), dec!(1000), ctx.tax("IVA21").unwrap());
        l.cost = Money::new(dec!(700));
        let mut lines = vec![l];

        let subtotals = Calculator::subtotals(&ctx, &doc, &lines).unwrap();
        let taxed = &subtotals.groups[&(dec!(21), dec!(0))];
        assert_eq!(taxed.net.amount(), dec!(300));
        assert_eq!(taxed.tax.amount(), dec!(63.00));
        let zero = &subtotals.groups[&(dec!(0), dec!(0))];
        assert_eq!(zero.net.amount(), dec!(700));
        assert!(zero.tax.is_zero());

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.net.amount(), dec!(1000));
        assert_eq!(doc.total.amount(), dec!(1063.00));
        assert_eq!(doc.total_profit.amount(), dec!(300));
    }

    #[test]
    fn test_used_goods_loss_goes_to_zero_group() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        doc.tax_regime = TaxRegime::UsedGoods;
        let mut l = line("l1", dec!(1), dec!(500), ctx.tax("IVA21").unwrap());
        l.cost = Money::new(dec!(700));
        let mut lines = vec![l];

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert!(doc.total_tax.is_zero());
        assert_eq!(doc.total.amount(), dec!(500));
    }

    #[test]
    fn test_used_goods_purchase_is_zero_rated() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Purchase);
        doc.tax_regime = TaxRegime::UsedGoods;
        let mut lines = vec![line("l1", dec!(1), dec!(700), ctx.tax("IVA21").unwrap())];

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert!(lines[0].vat.is_zero());
        assert_eq!(doc.total.amount(), dec!(700));
    }

    #[test]
    fn test_exempt_series_and_regime_zero_taxes() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        doc.series_code = "X".to_string();
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.total.amount(), dec!(100));

        let subject = Subject {
            side: TradeSide::Sale,
            code: "1".to_string(),
            name: "Exempt Org".to_string(),
            tax_id: None,
            subaccount: None,
            group_code: None,
            tax_regime: TaxRegime::Exempt,
            tax_exception: None,
        };
        let ctx = ctx.with_subject(Some(subject));
        let mut doc = self::doc(TradeSide::Sale);
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.tax_regime, TaxRegime::Exempt);
        assert!(doc.total_tax.is_zero());
    }

    #[test]
    fn test_surcharge_only_under_equivalence_regime() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert!(doc.total_surcharge.is_zero());

        doc.tax_regime = TaxRegime::EquivalenceSurcharge;
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.total_surcharge.amount(), dec!(5.20));
        assert_eq!(doc.total.amount(), dec!(126.20));
    }

    #[test]
    fn test_tax_zone_override() {
        let ctx = ctx().with_tax_zones([
            TaxZone {
                id: 1,
                tax_code: "IVA21".to_string(),
                country: "ESP".to_string(),
                province: None,
                replacement_tax_code: None,
            },
            TaxZone {
                id: 2,
                tax_code: "IVA21".to_string(),
                country: "ESP".to_string(),
                province: Some("Las Palmas".to_string()),
                replacement_tax_code: Some("IGIC7".to_string()),
            },
        ]);

        let mut doc = doc(TradeSide::Sale);
        doc.province = Some("Las Palmas".to_string());
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(lines[0].tax_code.as_deref(), Some("IGIC7"));
        assert_eq!(doc.total_tax.amount(), dec!(7));

        let mut doc = self::doc(TradeSide::Sale);
        doc.province = Some("Madrid".to_string());
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert!(lines[0].tax_code.is_none());
        assert!(doc.total_tax.is_zero());
    }

    #[test]
    fn test_supplied_withholding_and_header_discount() {
        let ctx = ctx();
        let mut doc = doc(TradeSide::Sale);
        doc.discount1 = dec!(10);
        let mut service = line("l1", dec!(1), dec!(1000), ctx.tax("IVA21").unwrap());
        service.withholding = dec!(15);
        let mut fee = line("l2", dec!(1), dec!(50), ctx.tax("IVA21").unwrap());
        fee.supplied = true;
        let mut lines = vec![service, fee];

        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.net.amount(), dec!(900));
        assert_eq!(doc.net_without_discount.amount(), dec!(1000));
        assert_eq!(doc.total_supplied.amount(), dec!(45));
        assert_eq!(doc.total_tax.amount(), dec!(189));
        assert_eq!(doc.total_withholding.amount(), dec!(135));
        // 900 + 45 + 189 − 135
        assert_eq!(doc.total.amount(), dec!(999));
        assert!(lines[1].vat.is_zero());
    }

    #[test]
    fn test_intra_community() {
        let ctx = ctx();
        let mut sale = doc(TradeSide::Sale);
        sale.operation = Operation::IntraCommunity;
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut sale, &mut lines));
        assert_eq!(sale.total.amount(), dec!(100));

        let mut purchase = doc(TradeSide::Purchase);
        purchase.operation = Operation::IntraCommunity;
        let mut lines = vec![line("l1", dec!(1), dec!(100), ctx.tax("IVA21").unwrap())];
        let subtotals = Calculator::subtotals(&ctx, &purchase, &lines).unwrap();
        let group = &subtotals.groups[&(dec!(21), dec!(0))];
        assert!(group.self_assessed);
        assert_eq!(group.tax.amount(), dec!(21));

        assert!(Calculator::calculate(&ctx, &mut purchase, &mut lines));
        assert!(purchase.total_tax.is_zero());
        assert_eq!(purchase.total.amount(), dec!(100));
    }

    #[test]
    fn test_fixed_value_tax() {
        let mut eco = tax("ECO", dec!(0.10), dec!(0));
        eco.tax_type = TaxType::FixedValue;
        let ctx = ctx().with_taxes([eco.clone()]);
        let mut doc = doc(TradeSide::Sale);
        let mut lines = vec![line("l1", dec!(30), dec!(2), &eco)];

        // The rate applies to the net as is, without the percent scaling.
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.net.amount(), dec!(60.00));
        assert_eq!(doc.total_tax.amount(), dec!(6.00));
        assert_eq!(doc.total.amount(), dec!(66.00));
    }

    // =========================================================================
    // Modifier pipeline
    // =========================================================================

    struct Recorder {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        stop_on_clear: bool,
        stop_on_apply: bool,
    }

    impl CalculatorModifier for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn clear(&self, _doc: &mut Document, _lines: &mut [DocumentLine]) -> ModifierFlow {
            if self.stop_on_clear {
                ModifierFlow::Stop
            } else {
                ModifierFlow::Continue
            }
        }

        fn apply(&self, _doc: &mut Document, _lines: &mut [DocumentLine]) -> ModifierFlow {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stop_on_apply {
                ModifierFlow::Stop
            } else {
                ModifierFlow::Continue
            }
        }
    }

    fn recorder(name: &'static str, calls: &Arc<AtomicUsize>, stop_on_clear: bool, stop_on_apply: bool) -> Arc<dyn CalculatorModifier> {
        Arc::new(Recorder {
            name,
            calls: calls.clone(),
            stop_on_clear,
            stop_on_apply,
        })
    }

    #[test]
    fn test_stop_in_apply_skips_later_modifiers() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let ctx = ctx()
            .register(recorder("first", &first, false, true))
            .register(recorder("second", &second, false, false));

        let mut doc = doc(TradeSide::Sale);
        let mut lines = vec![line("l1", dec!(1), dec!(10), ctx.tax("IVA21").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 0);
        assert_eq!(doc.total.amount(), dec!(12.10));
    }

    #[test]
    fn test_stop_in_clear_aborts_calculation() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = ctx().register(recorder("veto", &calls, true, false));

        let mut doc = doc(TradeSide::Sale);
        doc.total = Money::from_units(999);
        let mut lines = vec![line("l1", dec!(1), dec!(10), ctx.tax("IVA21").unwrap())];
        assert!(!Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.total, Money::from_units(999));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(Calculator::subtotals(&ctx, &doc, &lines).is_none());
    }

    struct FlatPrice;

    impl CalculatorModifier for FlatPrice {
        fn name(&self) -> &str {
            "flat-price"
        }

        fn calculate_line(&self, _doc: &Document, line: &mut DocumentLine) -> ModifierFlow {
            line.price_without_discount = Money::from_units(1);
            line.total_price = Money::from_units(1);
            ModifierFlow::Stop
        }
    }

    #[test]
    fn test_line_modifier_replaces_default_formula() {
        let ctx = ctx().register(Arc::new(FlatPrice));
        let mut doc = doc(TradeSide::Sale);
        let mut lines = vec![line("l1", dec!(5), dec!(10), ctx.tax("IVA10").unwrap())];
        assert!(Calculator::calculate(&ctx, &mut doc, &mut lines));
        assert_eq!(doc.net.amount(), dec!(1));
        assert_eq!(doc.total.amount(), dec!(1.10));
    }
}
