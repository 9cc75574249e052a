//! Item catalog seam.
//!
//! The catalog (items, pricing, live balances) is owned by another part of the
//! back office. The engine reads it through [`ItemCatalog`]; the in-memory
//! implementation doubles as the dev/test catalog.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::ItemId;
use cellarbook_stocktake::StockItem;

use crate::store::{StoreError, StoreResult};

/// Stock change recorded by the catalog outside any stocktake period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogMovement {
    pub item_id: ItemId,
    pub on: NaiveDate,
    /// Signed, in servings.
    pub quantity: Decimal,
}

pub trait ItemCatalog: Send + Sync {
    fn item(&self, id: ItemId) -> StoreResult<Option<StockItem>>;

    /// Every catalog item, ordered by SKU.
    fn items(&self) -> StoreResult<Vec<StockItem>>;

    /// Current on-hand quantity in servings.
    fn live_balance(&self, id: ItemId) -> StoreResult<Decimal>;

    /// Net quantity moved strictly after `after` and strictly before `before`.
    fn net_movement_between(
        &self,
        id: ItemId,
        after: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<Decimal>;
}

impl<C> ItemCatalog for Arc<C>
where
    C: ItemCatalog + ?Sized,
{
    fn item(&self, id: ItemId) -> StoreResult<Option<StockItem>> {
        (**self).item(id)
    }

    fn items(&self) -> StoreResult<Vec<StockItem>> {
        (**self).items()
    }

    fn live_balance(&self, id: ItemId) -> StoreResult<Decimal> {
        (**self).live_balance(id)
    }

    fn net_movement_between(
        &self,
        id: ItemId,
        after: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<Decimal> {
        (**self).net_movement_between(id, after, before)
    }
}

#[derive(Debug, Default)]
struct Inner {
    items: HashMap<ItemId, StockItem>,
    balances: HashMap<ItemId, Decimal>,
    movements: Vec<CatalogMovement>,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    inner: RwLock<Inner>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_item(&self, item: StockItem) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned("catalog"))?;
        inner.items.insert(item.id, item);
        Ok(())
    }

    pub fn set_balance(&self, id: ItemId, quantity: Decimal) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned("catalog"))?;
        inner.balances.insert(id, quantity);
        Ok(())
    }

    pub fn record_movement(&self, movement: CatalogMovement) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned("catalog"))?;
        *inner.balances.entry(movement.item_id).or_default() += movement.quantity;
        inner.movements.push(movement);
        Ok(())
    }
}

impl ItemCatalog for InMemoryCatalog {
    fn item(&self, id: ItemId) -> StoreResult<Option<StockItem>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned("catalog"))?;
        Ok(inner.items.get(&id).cloned())
    }

    fn items(&self) -> StoreResult<Vec<StockItem>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned("catalog"))?;
        let mut items: Vec<StockItem> = inner.items.values().cloned().collect();
        items.sort_by(|a, b| a.sku.cmp(&b.sku).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    fn live_balance(&self, id: ItemId) -> StoreResult<Decimal> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned("catalog"))?;
        Ok(inner.balances.get(&id).copied().unwrap_or_default())
    }

    fn net_movement_between(
        &self,
        id: ItemId,
        after: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<Decimal> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned("catalog"))?;
        Ok(inner
            .movements
            .iter()
            .filter(|m| m.item_id == id && m.on > after && m.on < before)
            .map(|m| m.quantity)
            .sum())
    }
}
