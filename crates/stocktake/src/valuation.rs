//! Category and period rollups.
//!
//! Aggregates are recomputed from the full set of lines every time, exactly like
//! line figures are recomputed from the full set of movements. Only counted,
//! non-anomalous lines contribute to the sums; the rest are reported as counts.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::item::StockCategory;
use crate::line::StocktakeLine;

/// `|variance_value| / expected_value × 100`, or 0 when nothing was expected.
pub fn variance_percent(variance_value: Decimal, expected_value: Decimal) -> Decimal {
    if expected_value.is_zero() {
        return Decimal::ZERO;
    }
    (variance_value.abs() / expected_value * Decimal::ONE_HUNDRED).round_dp(2)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub expected_qty: Decimal,
    pub counted_qty: Decimal,
    pub variance_qty: Decimal,
    pub expected_value: Decimal,
    pub counted_value: Decimal,
    pub variance_value: Decimal,
    pub variance_percent: Decimal,
}

impl Totals {
    fn add_line(&mut self, line: &StocktakeLine) {
        let f = &line.figures;
        if let (Some(cq), Some(cv)) = (f.counted_qty, f.counted_value) {
            self.expected_qty += f.expected_qty;
            self.counted_qty += cq;
            self.variance_qty += cq - f.expected_qty;
            self.expected_value += f.expected_value;
            self.counted_value += cv;
            self.variance_value += cv - f.expected_value;
        }
    }

    fn finish(mut self) -> Self {
        self.variance_percent = variance_percent(self.variance_value, self.expected_value);
        self
    }

    /// `self − other`, field by field (percent included).
    pub fn delta_from(&self, other: &Totals) -> Totals {
        Totals {
            expected_qty: self.expected_qty - other.expected_qty,
            counted_qty: self.counted_qty - other.counted_qty,
            variance_qty: self.variance_qty - other.variance_qty,
            expected_value: self.expected_value - other.expected_value,
            counted_value: self.counted_value - other.counted_value,
            variance_value: self.variance_value - other.variance_value,
            variance_percent: self.variance_percent - other.variance_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: StockCategory,
    pub line_count: usize,
    pub counted_lines: usize,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub line_count: usize,
    pub counted_lines: usize,
    pub uncounted_lines: usize,
    pub anomaly_lines: usize,
    pub opening_value: Decimal,
    pub totals: Totals,
}

/// Roll lines up per category (ordered by category) and for the whole period.
pub fn aggregate_lines(lines: &[StocktakeLine]) -> (Vec<CategoryAggregate>, PeriodAggregate) {
    let mut by_category: BTreeMap<StockCategory, (usize, usize, Totals)> = BTreeMap::new();
    let mut period = PeriodAggregate::default();
    let mut period_totals = Totals::default();

    for line in lines {
        let entry = by_category
            .entry(line.category())
            .or_insert_with(|| (0, 0, Totals::default()));
        entry.0 += 1;
        period.line_count += 1;
        period.opening_value += line.figures.opening_value;

        if line.anomaly {
            period.anomaly_lines += 1;
            continue;
        }
        if !line.is_counted() {
            period.uncounted_lines += 1;
            continue;
        }

        entry.1 += 1;
        entry.2.add_line(line);
        period.counted_lines += 1;
        period_totals.add_line(line);
    }

    period.totals = period_totals.finish();
    let categories = by_category
        .into_iter()
        .map(|(category, (line_count, counted_lines, totals))| CategoryAggregate {
            category,
            line_count,
            counted_lines,
            totals: totals.finish(),
        })
        .collect();

    (categories, period)
}
