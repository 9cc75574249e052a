//! Closing snapshots and period comparison.
//!
//! A snapshot is written once per line when its period closes, and becomes the
//! opening balance of the same item in the following period.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{ItemId, LineId, PeriodId};

use crate::item::StockCategory;
use crate::line::{LinePricing, StocktakeLine};
use crate::uom::DisplayUnits;
use crate::valuation::Totals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitabilityMetrics {
    pub cost_per_serving: Decimal,
    pub menu_price: Option<Decimal>,
    /// `(price − cost) / price × 100`.
    pub gross_profit_percent: Option<Decimal>,
    /// `cost / price × 100`.
    pub pour_cost_percent: Option<Decimal>,
}

impl ProfitabilityMetrics {
    pub fn from_pricing(pricing: &LinePricing) -> Self {
        let cost = pricing.valuation_cost;
        let price = pricing.menu_price.filter(|p| *p > Decimal::ZERO);
        Self {
            cost_per_serving: cost,
            menu_price: pricing.menu_price,
            gross_profit_percent: price
                .map(|p| ((p - cost) / p * Decimal::ONE_HUNDRED).round_dp(2)),
            pour_cost_percent: price.map(|p| (cost / p * Decimal::ONE_HUNDRED).round_dp(2)),
        }
    }
}

/// Frozen closing state of one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub period_id: PeriodId,
    pub item_id: ItemId,
    pub line_id: LineId,
    pub revision: u32,
    pub sku: String,
    pub item_name: String,
    pub category: StockCategory,
    pub closing_qty: Decimal,
    pub closing_units: DisplayUnits,
    pub closing_value: Decimal,
    pub valuation_cost: Decimal,
    pub expected_qty: Decimal,
    pub counted_qty: Option<Decimal>,
    pub variance_qty: Option<Decimal>,
    pub variance_value: Option<Decimal>,
    pub anomaly: bool,
    pub metrics: ProfitabilityMetrics,
    pub written_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn from_line(line: &StocktakeLine, revision: u32, at: DateTime<Utc>) -> Self {
        let closing_qty = line.closing_qty();
        Self {
            period_id: line.period_id,
            item_id: line.item_id,
            line_id: line.id,
            revision,
            sku: line.sku.clone(),
            item_name: line.item_name.clone(),
            category: line.category(),
            closing_qty,
            closing_units: line.pricing.uom.decompose(closing_qty),
            closing_value: line.closing_value(),
            valuation_cost: line.pricing.valuation_cost,
            expected_qty: line.figures.expected_qty,
            counted_qty: line.figures.counted_qty,
            variance_qty: line.figures.variance_qty,
            variance_value: line.figures.variance_value,
            anomaly: line.anomaly,
            metrics: ProfitabilityMetrics::from_pricing(&line.pricing),
            written_at: at,
        }
    }
}

/// Closing position of one item in two periods (`b − a`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDelta {
    pub item_id: ItemId,
    pub sku: String,
    pub item_name: String,
    pub closing_qty_a: Option<Decimal>,
    pub closing_qty_b: Option<Decimal>,
    pub qty_delta: Decimal,
    pub closing_value_a: Option<Decimal>,
    pub closing_value_b: Option<Decimal>,
    pub value_delta: Decimal,
    pub variance_value_delta: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub period_a: PeriodId,
    pub period_b: PeriodId,
    pub items: Vec<ItemDelta>,
    pub closing_value_a: Decimal,
    pub closing_value_b: Decimal,
    pub closing_value_delta: Decimal,
    /// Variance totals of `b` minus those of `a`, counted non-anomalous snapshots only.
    pub totals_delta: Totals,
}

fn snapshot_totals(snapshots: &[Snapshot]) -> Totals {
    let mut t = Totals::default();
    for s in snapshots.iter().filter(|s| !s.anomaly) {
        if let (Some(cq), Some(vv)) = (s.counted_qty, s.variance_value) {
            t.expected_qty += s.expected_qty;
            t.counted_qty += cq;
            t.variance_qty += cq - s.expected_qty;
            t.counted_value += s.closing_value;
            t.expected_value += s.closing_value - vv;
            t.variance_value += vv;
        }
    }
    t.variance_percent = crate::valuation::variance_percent(t.variance_value, t.expected_value);
    t
}

/// Per-item and aggregate deltas between two periods' snapshots.
///
/// Items present on one side only are compared against zero.
pub fn compare_snapshots(
    period_a: PeriodId,
    a: &[Snapshot],
    period_b: PeriodId,
    b: &[Snapshot],
) -> PeriodComparison {
    let mut rows: BTreeMap<ItemId, (Option<&Snapshot>, Option<&Snapshot>)> = BTreeMap::new();
    for s in a {
        rows.entry(s.item_id).or_default().0 = Some(s);
    }
    for s in b {
        rows.entry(s.item_id).or_default().1 = Some(s);
    }

    let items = rows
        .into_iter()
        .filter_map(|(item_id, (sa, sb))| {
            let named = sb.or(sa)?;
            let qty = |s: Option<&Snapshot>| s.map(|s| s.closing_qty);
            let value = |s: Option<&Snapshot>| s.map(|s| s.closing_value);
            let variance = |s: Option<&Snapshot>| {
                s.and_then(|s| s.variance_value).unwrap_or(Decimal::ZERO)
            };
            Some(ItemDelta {
                item_id,
                sku: named.sku.clone(),
                item_name: named.item_name.clone(),
                closing_qty_a: qty(sa),
                closing_qty_b: qty(sb),
                qty_delta: qty(sb).unwrap_or_default() - qty(sa).unwrap_or_default(),
                closing_value_a: value(sa),
                closing_value_b: value(sb),
                value_delta: value(sb).unwrap_or_default() - value(sa).unwrap_or_default(),
                variance_value_delta: variance(sb) - variance(sa),
            })
        })
        .collect();

    let closing_value_a: Decimal = a.iter().map(|s| s.closing_value).sum();
    let closing_value_b: Decimal = b.iter().map(|s| s.closing_value).sum();

    PeriodComparison {
        period_a,
        period_b,
        items,
        closing_value_a,
        closing_value_b,
        closing_value_delta: closing_value_b - closing_value_a,
        totals_delta: snapshot_totals(b).delta_from(&snapshot_totals(a)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::StockItem;
    use rust_decimal_macros::dec;

    fn item(name: &str, menu_price: Option<Decimal>) -> StockItem {
        StockItem {
            id: ItemId::new(),
            sku: name.to_uppercase(),
            name: name.to_string(),
            category: StockCategory::Spirit,
            container_size: Some(dec!(700)),
            serving_size: Some(dec!(35)),
            unit_cost: dec!(20),
            valuation_cost: Some(dec!(1.00)),
            menu_price,
        }
    }

    fn closed_line(item: &StockItem, period: PeriodId, opening: Decimal, full: Decimal) -> StocktakeLine {
        let mut line = StocktakeLine::open(period, item, opening, Utc::now()).unwrap();
        line.submit_count(full, dec!(0), LinePricing::from_item(item).unwrap(), Utc::now())
            .unwrap();
        line.recalculate(&[], Utc::now()).unwrap();
        line
    }

    #[test]
    fn metrics_need_a_positive_menu_price() {
        let priced = LinePricing::from_item(&item("gin", Some(dec!(4.00)))).unwrap();
        let m = ProfitabilityMetrics::from_pricing(&priced);
        assert_eq!(m.gross_profit_percent, Some(dec!(75)));
        assert_eq!(m.pour_cost_percent, Some(dec!(25)));

        let free = LinePricing::from_item(&item("gin", Some(dec!(0)))).unwrap();
        assert_eq!(ProfitabilityMetrics::from_pricing(&free).gross_profit_percent, None);
    }

    #[test]
    fn snapshot_closes_on_counted_quantity() {
        let gin = item("gin", None);
        let line = closed_line(&gin, PeriodId::new(), dec!(45), dec!(2));
        let snap = Snapshot::from_line(&line, 1, Utc::now());

        assert_eq!(snap.closing_qty, dec!(40));
        assert_eq!(snap.closing_units.full_units, dec!(2));
        assert_eq!(snap.closing_value, dec!(40.00));
        assert_eq!(snap.variance_qty, Some(dec!(-5)));
    }

    #[test]
    fn compare_reports_items_on_either_side() {
        let gin = item("gin", None);
        let rum = item("rum", None);
        let vodka = item("vodka", None);
        let (pa, pb) = (PeriodId::new(), PeriodId::new());

        let a = vec![
            Snapshot::from_line(&closed_line(&gin, pa, dec!(40), dec!(2)), 1, Utc::now()),
            Snapshot::from_line(&closed_line(&rum, pa, dec!(20), dec!(1)), 1, Utc::now()),
        ];
        let b = vec![
            Snapshot::from_line(&closed_line(&gin, pb, dec!(40), dec!(1)), 1, Utc::now()),
            Snapshot::from_line(&closed_line(&vodka, pb, dec!(60), dec!(3)), 1, Utc::now()),
        ];

        let cmp = compare_snapshots(pa, &a, pb, &b);

        assert_eq!(cmp.items.len(), 3);
        let gin_row = cmp.items.iter().find(|r| r.item_id == gin.id).unwrap();
        assert_eq!(gin_row.qty_delta, dec!(-20));
        assert_eq!(gin_row.variance_value_delta, dec!(-20));
        let rum_row = cmp.items.iter().find(|r| r.item_id == rum.id).unwrap();
        assert_eq!(rum_row.closing_qty_b, None);
        assert_eq!(rum_row.qty_delta, dec!(-20));
        assert_eq!(cmp.closing_value_a, dec!(60));
        assert_eq!(cmp.closing_value_b, dec!(80));
        assert_eq!(cmp.closing_value_delta, dec!(20));
        assert_eq!(cmp.totals_delta.variance_value, dec!(-20));
    }
}
