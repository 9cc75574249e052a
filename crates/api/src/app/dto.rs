use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use cellarbook_core::ItemId;
use cellarbook_stocktake::{StockCategory, StockItem};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct AddLineRequest {
    pub item_id: ItemId,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCountRequest {
    pub full_units: Decimal,
    pub partial_units: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClosePeriodRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize)]
pub struct ReopenPeriodRequest {
    pub actor: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub a: String,
    pub b: String,
}

/// Catalog entry as written by the catalog owner. `balance` optionally resets
/// the live on-hand quantity (in servings).
#[derive(Debug, Deserialize)]
pub struct UpsertItemRequest {
    pub sku: String,
    pub name: String,
    pub category: StockCategory,
    pub container_size: Option<Decimal>,
    pub serving_size: Option<Decimal>,
    pub unit_cost: Decimal,
    pub valuation_cost: Option<Decimal>,
    pub menu_price: Option<Decimal>,
    pub balance: Option<Decimal>,
}

impl UpsertItemRequest {
    pub fn into_item(self, id: ItemId) -> (StockItem, Option<Decimal>) {
        let item = StockItem {
            id,
            sku: self.sku,
            name: self.name,
            category: self.category,
            container_size: self.container_size,
            serving_size: self.serving_size,
            unit_cost: self.unit_cost,
            valuation_cost: self.valuation_cost,
            menu_price: self.menu_price,
        };
        (item, self.balance)
    }
}

#[derive(Debug, Deserialize)]
pub struct CatalogMovementRequest {
    pub on: NaiveDate,
    pub quantity: Decimal,
}
