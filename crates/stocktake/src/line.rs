//! Stocktake line and its calculator.
//!
//! Every derived figure on a line comes out of [`calculate`], which starts from
//! the opening quantity and the *complete* current movement set each time. There
//! is no incremental path: an edit or delete anywhere in the ledger gives the
//! same result as if the ledger had always looked like that.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{AggregateRoot, DomainError, DomainResult, ItemId, LineId, PeriodId};

use crate::item::{StockCategory, StockItem};
use crate::limits::{MAX_COST, ensure_line_quantity, overflow};
use crate::movement::{Movement, MovementType};
use crate::uom::{DisplayUnits, UomRule};

/// Physical count as entered by staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountInput {
    pub full_units: Decimal,
    pub partial_units: Decimal,
    pub counted_at: DateTime<Utc>,
}

/// Catalog data frozen onto a line: the UOM rule and per-serving cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePricing {
    pub uom: UomRule,
    pub valuation_cost: Decimal,
    pub menu_price: Option<Decimal>,
}

impl LinePricing {
    pub fn from_item(item: &StockItem) -> DomainResult<Self> {
        let uom = item.uom()?;
        let valuation_cost = item.cost_per_serving(&uom);
        if valuation_cost < Decimal::ZERO {
            return Err(DomainError::configuration(format!(
                "{}: valuation cost cannot be negative",
                item.sku
            )));
        }
        if valuation_cost > MAX_COST {
            return Err(DomainError::configuration(format!(
                "{}: valuation cost {valuation_cost} exceeds {MAX_COST}",
                item.sku
            )));
        }
        Ok(Self {
            uom,
            valuation_cost,
            menu_price: item.menu_price,
        })
    }

    /// Value of a quantity: normalised per the category, times cost, to the cent.
    pub fn value_of(&self, servings: Decimal) -> DomainResult<Decimal> {
        self.uom
            .normalize(servings)
            .checked_mul(self.valuation_cost)
            .map(|v| v.round_dp(2))
            .ok_or_else(|| overflow("line value"))
    }
}

/// Derived figures of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineFigures {
    pub opening_value: Decimal,
    pub purchases: Decimal,
    pub waste: Decimal,
    pub expected_qty: Decimal,
    pub expected_units: DisplayUnits,
    pub expected_value: Decimal,
    pub counted_qty: Option<Decimal>,
    pub counted_units: Option<DisplayUnits>,
    pub counted_value: Option<Decimal>,
    pub variance_qty: Option<Decimal>,
    pub variance_value: Option<Decimal>,
    /// Purchases at their delivery cost (override or line cost).
    pub purchases_value: Decimal,
    pub waste_value: Decimal,
}

/// Recompute a line's figures from scratch.
///
/// Every quantity the line holds must stay within [`MAX_LINE_QUANTITY`]; a
/// ledger that would push it further is rejected with a validation error.
///
/// [`MAX_LINE_QUANTITY`]: crate::limits::MAX_LINE_QUANTITY
pub fn calculate(
    opening_qty: Decimal,
    movements: &[Movement],
    count: Option<&CountInput>,
    pricing: &LinePricing,
) -> DomainResult<LineFigures> {
    ensure_line_quantity("opening quantity", opening_qty)?;

    let mut purchases = Decimal::ZERO;
    let mut waste = Decimal::ZERO;
    let mut purchases_value = Decimal::ZERO;

    for m in movements {
        match m.movement_type {
            MovementType::Purchase => {
                let cost = m.unit_cost.unwrap_or(pricing.valuation_cost);
                purchases = purchases
                    .checked_add(m.quantity)
                    .ok_or_else(|| overflow("purchases"))?;
                purchases_value = m
                    .quantity
                    .checked_mul(cost)
                    .and_then(|v| purchases_value.checked_add(v))
                    .ok_or_else(|| overflow("purchase spend"))?;
            }
            MovementType::Waste => {
                waste = waste.checked_add(m.quantity).ok_or_else(|| overflow("waste"))?;
            }
        }
    }
    ensure_line_quantity("purchases", purchases)?;
    ensure_line_quantity("waste", waste)?;

    let expected_qty = ensure_line_quantity("expected quantity", opening_qty + purchases - waste)?;
    let expected_value = pricing.value_of(expected_qty)?;

    let counted_qty = match count {
        Some(c) => Some(ensure_line_quantity(
            "counted quantity",
            pricing.uom.counted_servings(c.full_units, c.partial_units)?,
        )?),
        None => None,
    };
    let counted_value = counted_qty.map(|q| pricing.value_of(q)).transpose()?;

    Ok(LineFigures {
        opening_value: pricing.value_of(opening_qty)?,
        purchases,
        waste,
        expected_qty,
        expected_units: pricing.uom.decompose(expected_qty),
        expected_value,
        counted_qty,
        counted_units: counted_qty.map(|q| pricing.uom.decompose(q)),
        counted_value,
        variance_qty: counted_qty.map(|q| q - expected_qty),
        variance_value: counted_value.map(|v| v - expected_value),
        purchases_value: purchases_value.round_dp(2),
        waste_value: pricing.value_of(waste)?,
    })
}

/// One stock item within one period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StocktakeLine {
    pub id: LineId,
    pub period_id: PeriodId,
    pub item_id: ItemId,
    pub sku: String,
    pub item_name: String,
    pub opening_qty: Decimal,
    pub pricing: LinePricing,
    pub count: Option<CountInput>,
    pub figures: LineFigures,
    pub movement_count: usize,
    /// Closed by force without a count.
    pub anomaly: bool,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StocktakeLine {
    pub fn open(
        period_id: PeriodId,
        item: &StockItem,
        opening_qty: Decimal,
        at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let pricing = LinePricing::from_item(item)?;
        let figures = calculate(opening_qty, &[], None, &pricing)?;
        Ok(Self {
            id: LineId::new(),
            period_id,
            item_id: item.id,
            sku: item.sku.clone(),
            item_name: item.name.clone(),
            opening_qty,
            pricing,
            count: None,
            figures,
            movement_count: 0,
            anomaly: false,
            version: 1,
            updated_at: at,
        })
    }

    pub fn category(&self) -> StockCategory {
        self.pricing.uom.category
    }

    pub fn is_counted(&self) -> bool {
        self.count.is_some()
    }

    /// Replace all derived figures from the line's full movement set.
    ///
    /// On error the line keeps its previous figures.
    pub fn recalculate(&mut self, movements: &[Movement], at: DateTime<Utc>) -> DomainResult<()> {
        if let Some(stray) = movements.iter().find(|m| m.line_id != self.id) {
            return Err(DomainError::invariant(format!(
                "movement {} does not belong to line {}",
                stray.id, self.id
            )));
        }

        self.figures = calculate(self.opening_qty, movements, self.count.as_ref(), &self.pricing)?;
        self.movement_count = movements.len();
        self.version += 1;
        self.updated_at = at;
        Ok(())
    }

    /// Record a physical count, re-freezing catalog pricing as of now.
    ///
    /// Derived figures are left for the next [`recalculate`](Self::recalculate).
    pub fn submit_count(
        &mut self,
        full_units: Decimal,
        partial_units: Decimal,
        pricing: LinePricing,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if pricing.uom.category != self.category() {
            return Err(DomainError::category_mismatch(format!(
                "line {} was opened as {}, catalog now says {}",
                self.id,
                self.category(),
                pricing.uom.category
            )));
        }
        pricing.uom.validate_count(full_units, partial_units)?;

        self.pricing = pricing;
        self.count = Some(CountInput {
            full_units,
            partial_units,
            counted_at: at,
        });
        self.anomaly = false;
        Ok(())
    }

    /// Mark a line closed without a count. Cleared by the next count.
    pub fn flag_anomaly(&mut self) {
        self.anomaly = true;
    }

    /// Quantity carried into the next period: counted if available, else expected.
    pub fn closing_qty(&self) -> Decimal {
        self.figures.counted_qty.unwrap_or(self.figures.expected_qty)
    }

    pub fn closing_value(&self) -> Decimal {
        self.figures.counted_value.unwrap_or(self.figures.expected_value)
    }
}

impl AggregateRoot for StocktakeLine {
    type Id = LineId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
