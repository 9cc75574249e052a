//! Persistence seam for periods, lines and movements.
//!
//! The engine only talks to [`StocktakeStore`]; [`InMemoryStocktakeStore`] backs
//! tests, dev and the single-process server. A durable backend implements the
//! same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use cellarbook_core::{LineId, MovementId, PeriodId};
use cellarbook_stocktake::{Movement, StockPeriod, StocktakeLine};

/// Storage operation error.
///
/// Infrastructure failures only. Domain rules never produce a `StoreError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),

    /// A write-once record already exists.
    #[error("duplicate write: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait StocktakeStore: Send + Sync {
    fn save_period(&self, period: StockPeriod) -> StoreResult<()>;

    fn period(&self, id: PeriodId) -> StoreResult<Option<StockPeriod>>;

    /// All periods, in creation order.
    fn periods(&self) -> StoreResult<Vec<StockPeriod>>;

    fn save_line(&self, line: StocktakeLine) -> StoreResult<()>;

    fn line(&self, id: LineId) -> StoreResult<Option<StocktakeLine>>;

    /// Lines of a period, in insertion order.
    fn lines_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<StocktakeLine>>;

    fn save_movement(&self, movement: Movement) -> StoreResult<()>;

    fn movement(&self, id: MovementId) -> StoreResult<Option<Movement>>;

    /// Movements of a line, in insertion order. Edits keep their position.
    fn movements_for_line(&self, line_id: LineId) -> StoreResult<Vec<Movement>>;

    fn delete_movement(&self, id: MovementId) -> StoreResult<Option<Movement>>;
}

impl<S> StocktakeStore for Arc<S>
where
    S: StocktakeStore + ?Sized,
{
    fn save_period(&self, period: StockPeriod) -> StoreResult<()> {
        (**self).save_period(period)
    }

    fn period(&self, id: PeriodId) -> StoreResult<Option<StockPeriod>> {
        (**self).period(id)
    }

    fn periods(&self) -> StoreResult<Vec<StockPeriod>> {
        (**self).periods()
    }

    fn save_line(&self, line: StocktakeLine) -> StoreResult<()> {
        (**self).save_line(line)
    }

    fn line(&self, id: LineId) -> StoreResult<Option<StocktakeLine>> {
        (**self).line(id)
    }

    fn lines_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<StocktakeLine>> {
        (**self).lines_for_period(period_id)
    }

    fn save_movement(&self, movement: Movement) -> StoreResult<()> {
        (**self).save_movement(movement)
    }

    fn movement(&self, id: MovementId) -> StoreResult<Option<Movement>> {
        (**self).movement(id)
    }

    fn movements_for_line(&self, line_id: LineId) -> StoreResult<Vec<Movement>> {
        (**self).movements_for_line(line_id)
    }

    fn delete_movement(&self, id: MovementId) -> StoreResult<Option<Movement>> {
        (**self).delete_movement(id)
    }
}

#[derive(Debug, Default)]
struct Tables {
    periods: HashMap<PeriodId, StockPeriod>,
    period_order: Vec<PeriodId>,
    lines: HashMap<LineId, StocktakeLine>,
    lines_by_period: HashMap<PeriodId, Vec<LineId>>,
    movements: HashMap<MovementId, Movement>,
    movements_by_line: HashMap<LineId, Vec<MovementId>>,
}

/// In-memory store. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStocktakeStore {
    tables: RwLock<Tables>,
}

impl InMemoryStocktakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables.read().map_err(|_| StoreError::Poisoned("stocktake tables"))
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables.write().map_err(|_| StoreError::Poisoned("stocktake tables"))
    }
}

impl StocktakeStore for InMemoryStocktakeStore {
    fn save_period(&self, period: StockPeriod) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.periods.contains_key(&period.id) {
            t.period_order.push(period.id);
        }
        t.periods.insert(period.id, period);
        Ok(())
    }

    fn period(&self, id: PeriodId) -> StoreResult<Option<StockPeriod>> {
        Ok(self.read()?.periods.get(&id).cloned())
    }

    fn periods(&self) -> StoreResult<Vec<StockPeriod>> {
        let t = self.read()?;
        Ok(t.period_order
            .iter()
            .filter_map(|id| t.periods.get(id).cloned())
            .collect())
    }

    fn save_line(&self, line: StocktakeLine) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.lines.contains_key(&line.id) {
            t.lines_by_period.entry(line.period_id).or_default().push(line.id);
        }
        t.lines.insert(line.id, line);
        Ok(())
    }

    fn line(&self, id: LineId) -> StoreResult<Option<StocktakeLine>> {
        Ok(self.read()?.lines.get(&id).cloned())
    }

    fn lines_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<StocktakeLine>> {
        let t = self.read()?;
        Ok(t.lines_by_period
            .get(&period_id)
            .map(|ids| ids.iter().filter_map(|id| t.lines.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    fn save_movement(&self, movement: Movement) -> StoreResult<()> {
        let mut t = self.write()?;
        if !t.movements.contains_key(&movement.id) {
            t.movements_by_line
                .entry(movement.line_id)
                .or_default()
                .push(movement.id);
        }
        t.movements.insert(movement.id, movement);
        Ok(())
    }

    fn movement(&self, id: MovementId) -> StoreResult<Option<Movement>> {
        Ok(self.read()?.movements.get(&id).cloned())
    }

    fn movements_for_line(&self, line_id: LineId) -> StoreResult<Vec<Movement>> {
        let t = self.read()?;
        Ok(t.movements_by_line
            .get(&line_id)
            .map(|ids| ids.iter().filter_map(|id| t.movements.get(id).cloned()).collect())
            .unwrap_or_default())
    }

    fn delete_movement(&self, id: MovementId) -> StoreResult<Option<Movement>> {
        let mut t = self.write()?;
        let removed = t.movements.remove(&id);
        if let Some(m) = &removed {
            if let Some(ids) = t.movements_by_line.get_mut(&m.line_id) {
                ids.retain(|existing| *existing != id);
            }
        }
        Ok(removed)
    }
}
