//! # Tax Grouping
//!
//! Groups priced lines by `(vat, surcharge)` and rounds each group once.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  line.total_price ──► × header discounts ──► group (vat, surcharge)     │
//! │                                                   │                     │
//! │  supplied lines ──────────────────────────────────┼──► total_supplied   │
//! │                                                   ▼                     │
//! │                         round(net), round(tax), round(surcharge)        │
//! │                                                   │                     │
//! │                                                   ▼                     │
//! │          Σ groups ──► net, total_tax, total_surcharge                   │
//! │          round(net × max withholding%) ──► total_withholding            │
//! │          net + supplied + tax + surcharge − withholding ──► total       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::calculator::context::CalculationContext;
use crate::money::Money;
use crate::types::{Document, DocumentLine, Operation, TaxRegime, TaxType, TradeSide};

/// Group key: `(vat rate, surcharge rate)`.
pub type GroupKey = (Decimal, Decimal);

/// One tax bucket of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxGroup {
    pub vat: Decimal,
    pub surcharge: Decimal,
    /// First tax code seen in the group, for the tax register.
    pub tax_code: Option<String>,
    pub net: Money,
    pub net_without_discount: Money,
    pub tax: Money,
    pub surcharge_amount: Money,
    /// Tax the buyer self-assesses (intra-community purchases). Posted but
    /// not charged.
    pub self_assessed: bool,
}

impl TaxGroup {
    fn new(key: GroupKey, self_assessed: bool) -> Self {
        TaxGroup {
            vat: key.0,
            surcharge: key.1,
            tax_code: None,
            net: Money::ZERO,
            net_without_discount: Money::ZERO,
            tax: Money::ZERO,
            surcharge_amount: Money::ZERO,
            self_assessed,
        }
    }
}

/// Aggregated, rounded result of a calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subtotals {
    pub groups: BTreeMap<GroupKey, TaxGroup>,
    pub net: Money,
    pub net_without_discount: Money,
    pub total_tax: Money,
    pub total_surcharge: Money,
    pub withholding_rate: Decimal,
    pub total_withholding: Money,
    pub total_supplied: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    pub total: Money,
}

impl Subtotals {
    /// Re-derives document totals from the (already rounded) groups.
    ///
    /// Modifiers that edit groups call this to keep totals consistent.
    pub fn recompute_totals(&mut self, ctx: &CalculationContext, side: TradeSide) {
        let precision = ctx.precision();
        self.net = self.groups.values().map(|g| g.net).sum();
        self.net_without_discount = self
            .groups
            .values()
            .map(|g| g.net_without_discount)
            .sum();
        self.total_tax = self
            .groups
            .values()
            .filter(|g| !g.self_assessed)
            .map(|g| g.tax)
            .sum();
        self.total_surcharge = self
            .groups
            .values()
            .filter(|g| !g.self_assessed)
            .map(|g| g.surcharge_amount)
            .sum();
        self.total_withholding = self.net.percent(self.withholding_rate).round(precision);
        self.total_profit = match side {
            TradeSide::Sale => self.net - self.total_cost,
            TradeSide::Purchase => Money::ZERO,
        };
        self.total = (self.net + self.total_supplied + self.total_tax + self.total_surcharge
            - self.total_withholding)
            .round(precision);
    }

    /// Groups that carry any tax, in key order.
    pub fn taxed_groups(&self) -> impl Iterator<Item = &TaxGroup> {
        self.groups
            .values()
            .filter(|g| !g.tax.is_zero() || !g.surcharge_amount.is_zero())
    }
}

/// Unrounded accumulator for one group.
#[derive(Default)]
struct RawGroup {
    tax_code: Option<String>,
    net: Money,
    net_without_discount: Money,
    tax: Money,
    surcharge: Money,
}

/// Groups calculated lines into [`Subtotals`].
///
/// Expects [`LineCalculator`](super::LineCalculator) to have run on every line.
pub fn group_lines(ctx: &CalculationContext, doc: &Document, lines: &[DocumentLine]) -> Subtotals {
    let precision = ctx.precision();
    let used_goods_sale = doc.side == TradeSide::Sale && doc.tax_regime == TaxRegime::UsedGoods;
    let rectifying = ctx.is_rectifying(doc);
    let self_assessed =
        doc.side == TradeSide::Purchase && doc.operation == Operation::IntraCommunity;

    let mut raw: BTreeMap<GroupKey, RawGroup> = BTreeMap::new();
    let mut supplied = Money::ZERO;
    let mut cost = Money::ZERO;
    let mut withholding_rate = Decimal::ZERO;

    for line in lines {
        let net = doc.apply_header_discounts(line.total_price);
        if line.supplied {
            supplied += net;
            continue;
        }

        cost += line.total_cost();
        withholding_rate = withholding_rate.max(line.withholding);
        let key = (line.vat, line.surcharge);
        let tax_type = ctx.tax_type(line.tax_code.as_deref());

        if used_goods_sale {
            let line_cost = line.total_cost();
            let margin = net - line_cost;
            if margin.is_positive() || rectifying {
                add_to_group(&mut raw, key, line, margin, line.total_price, tax_type);
                add_to_group(&mut raw, (Decimal::ZERO, Decimal::ZERO), line, line_cost, Money::ZERO, TaxType::Percentage);
            } else {
                add_to_group(&mut raw, (Decimal::ZERO, Decimal::ZERO), line, net, line.total_price, TaxType::Percentage);
            }
            continue;
        }

        add_to_group(&mut raw, key, line, net, line.total_price, tax_type);
    }

    let groups = raw
        .into_iter()
        .map(|(key, acc)| {
            let mut group = TaxGroup::new(key, self_assessed && !key.0.is_zero());
            group.tax_code = acc.tax_code;
            group.net = acc.net.round(precision);
            group.net_without_discount = acc.net_without_discount.round(precision);
            group.tax = acc.tax.round(precision);
            group.surcharge_amount = acc.surcharge.round(precision);
            (key, group)
        })
        .collect();

    let mut subtotals = Subtotals {
        groups,
        withholding_rate,
        total_supplied: supplied.round(precision),
        total_cost: cost.round(precision),
        ..Default::default()
    };
    subtotals.recompute_totals(ctx, doc.side);
    subtotals
}

fn add_to_group(
    raw: &mut BTreeMap<GroupKey, RawGroup>,
    key: GroupKey,
    line: &DocumentLine,
    net: Money,
    net_without_discount: Money,
    tax_type: TaxType,
) {
    let group = raw.entry(key).or_default();
    if group.tax_code.is_none() && !key.0.is_zero() {
        group.tax_code = line.tax_code.clone();
    }
    group.net += net;
    group.net_without_discount += net_without_discount;
    group.tax += match tax_type {
        TaxType::Percentage => net.percent(key.0),
        TaxType::FixedValue => Money::new(net.amount() * key.0),
    };
    group.surcharge += net.percent(key.1);
}
