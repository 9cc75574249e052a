use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{DomainResult, ItemId};

use crate::uom::{self, CountingMode, RoundingPolicy, UomRule};

/// Stock category. Closed set: each variant selects its own counting formula and
/// rounding policy through [`StockCategory::counting_mode`] and
/// [`StockCategory::rounding_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockCategory {
    /// Bottles sold by the bottle, bought by the case.
    BottledBeer,
    /// Kegs served by the pint.
    Draught,
    Spirit,
    Wine,
    /// Minerals/soft drinks bought and counted by the dozen.
    DozenMineral,
    Other,
}

impl StockCategory {
    pub const ALL: [StockCategory; 6] = [
        StockCategory::BottledBeer,
        StockCategory::Draught,
        StockCategory::Spirit,
        StockCategory::Wine,
        StockCategory::DozenMineral,
        StockCategory::Other,
    ];

    /// How a counted partial is expressed.
    pub fn counting_mode(self) -> CountingMode {
        match self {
            StockCategory::Draught | StockCategory::BottledBeer | StockCategory::DozenMineral => {
                CountingMode::PartialServings
            }
            StockCategory::Spirit | StockCategory::Wine | StockCategory::Other => {
                CountingMode::PartialContainers
            }
        }
    }

    pub fn rounding_policy(self) -> RoundingPolicy {
        match self {
            StockCategory::BottledBeer | StockCategory::DozenMineral => RoundingPolicy::WholeUnits,
            _ => RoundingPolicy::TwoDecimals,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StockCategory::BottledBeer => "bottled_beer",
            StockCategory::Draught => "draught",
            StockCategory::Spirit => "spirit",
            StockCategory::Wine => "wine",
            StockCategory::DozenMineral => "dozen_mineral",
            StockCategory::Other => "other",
        }
    }
}

impl core::fmt::Display for StockCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog entry, supplied by the external item catalog.
///
/// `container_size` and `serving_size` share a unit (bottles, pints, ml...).
/// `valuation_cost` is the cost of one serving; when the catalog leaves it out it
/// is derived from the container cost and the UOM factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    pub category: StockCategory,
    pub container_size: Option<Decimal>,
    pub serving_size: Option<Decimal>,
    /// Cost of one full container.
    pub unit_cost: Decimal,
    pub valuation_cost: Option<Decimal>,
    pub menu_price: Option<Decimal>,
}

impl StockItem {
    /// Resolve this item's UOM rule from its current catalog data.
    pub fn uom(&self) -> DomainResult<UomRule> {
        uom::resolve(self.category, self.container_size, self.serving_size)
    }

    /// Cost of one serving, falling back to `unit_cost / factor`.
    pub fn cost_per_serving(&self, rule: &UomRule) -> Decimal {
        match self.valuation_cost {
            Some(cost) => cost,
            None => (self.unit_cost / rule.factor).round_dp(4),
        }
    }
}
