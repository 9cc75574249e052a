//! `StocktakeService`: the engine facade used by the API layer.
//!
//! Composes the store, snapshot store, catalog and bus behind one type. Every
//! method is synchronous; callers on an async runtime call it directly, the
//! same way the in-memory dispatcher is called from request handlers.

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use cellarbook_core::{ItemId, LineId, MovementId, PeriodId};
use cellarbook_events::{EventBus, InMemoryEventBus};
use cellarbook_stocktake::{
    Movement, MovementPatch, NewMovement, PeriodComparison, PeriodRequest, Snapshot, StockPeriod,
    StocktakeLine,
};

use crate::broadcaster::{ChangeBroadcaster, PeriodSubscription, StocktakeEnvelope};
use crate::catalog::ItemCatalog;
use crate::config::EngineConfig;
use crate::engine::Shared;
use crate::error::EngineResult;
use crate::ledger::{MovementLedger, RecordedMovement, UpdatedMovement};
use crate::locks::LockRegistry;
use crate::period_manager::{CloseOutcome, PeriodManager, PeriodView, PopulateOutcome};
use crate::snapshot_store::{InMemorySnapshotStore, SnapshotStore};
use crate::store::{InMemoryStocktakeStore, StocktakeStore};

pub type InMemoryBus = Arc<InMemoryEventBus<StocktakeEnvelope>>;

pub struct StocktakeService<B = InMemoryBus> {
    shared: Arc<Shared<B>>,
    ledger: MovementLedger<B>,
    periods: PeriodManager<B>,
}

impl StocktakeService<InMemoryBus> {
    /// Engine over in-memory stores and bus; only the catalog is supplied.
    pub fn in_memory(catalog: Arc<dyn ItemCatalog>, config: EngineConfig) -> Self {
        Self::new(
            Arc::new(InMemoryStocktakeStore::new()),
            Arc::new(InMemorySnapshotStore::new()),
            catalog,
            Arc::new(InMemoryEventBus::new()),
            config,
        )
    }
}

impl<B> StocktakeService<B>
where
    B: EventBus<StocktakeEnvelope>,
{
    pub fn new(
        store: Arc<dyn StocktakeStore>,
        snapshots: Arc<dyn SnapshotStore>,
        catalog: Arc<dyn ItemCatalog>,
        bus: B,
        config: EngineConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            store,
            snapshots,
            catalog,
            broadcaster: ChangeBroadcaster::new(bus),
            line_locks: LockRegistry::new(),
            period_locks: LockRegistry::new(),
            calendar: Mutex::new(()),
            config,
        });
        Self {
            ledger: MovementLedger::new(shared.clone()),
            periods: PeriodManager::new(shared.clone()),
            shared,
        }
    }

    pub fn ledger(&self) -> &MovementLedger<B> {
        &self.ledger
    }

    pub fn periods(&self) -> &PeriodManager<B> {
        &self.periods
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Viewer subscription for one existing period.
    pub fn subscribe_period(&self, period_id: PeriodId) -> EngineResult<PeriodSubscription> {
        self.shared.period(period_id)?;
        Ok(self.shared.broadcaster.subscribe_period(period_id))
    }

    pub fn create_period(&self, request: &PeriodRequest) -> EngineResult<StockPeriod> {
        self.periods.create_period(request)
    }

    pub fn list_periods(&self) -> EngineResult<Vec<StockPeriod>> {
        self.periods.list_periods()
    }

    pub fn populate_opening_stock(&self, period_id: PeriodId) -> EngineResult<PopulateOutcome> {
        self.periods.populate_opening_stock(period_id)
    }

    pub fn add_line(&self, period_id: PeriodId, item_id: ItemId) -> EngineResult<StocktakeLine> {
        self.periods.add_line(period_id, item_id)
    }

    pub fn record_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        input: NewMovement,
    ) -> EngineResult<RecordedMovement> {
        self.ledger.record_movement(period_id, line_id, input)
    }

    pub fn update_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        movement_id: MovementId,
        patch: MovementPatch,
    ) -> EngineResult<UpdatedMovement> {
        self.ledger
            .update_movement(period_id, line_id, movement_id, patch)
    }

    pub fn delete_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        movement_id: MovementId,
    ) -> EngineResult<StocktakeLine> {
        self.ledger.delete_movement(period_id, line_id, movement_id)
    }

    pub fn list_movements(&self, period_id: PeriodId, line_id: LineId) -> EngineResult<Vec<Movement>> {
        self.ledger.list_movements(period_id, line_id)
    }

    pub fn submit_count(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        full_units: Decimal,
        partial_units: Decimal,
    ) -> EngineResult<StocktakeLine> {
        self.periods
            .submit_count(period_id, line_id, full_units, partial_units)
    }

    pub fn close_period(&self, period_id: PeriodId, force: bool) -> EngineResult<CloseOutcome> {
        self.periods.close_period(period_id, force)
    }

    pub fn reopen_period(
        &self,
        period_id: PeriodId,
        actor: &str,
        reason: &str,
    ) -> EngineResult<StockPeriod> {
        self.periods.reopen_period(period_id, actor, reason)
    }

    pub fn get_period(&self, period_id: PeriodId) -> EngineResult<PeriodView> {
        self.periods.get_period(period_id)
    }

    pub fn get_snapshots_for_period(&self, period_id: PeriodId) -> EngineResult<Vec<Snapshot>> {
        self.periods.get_snapshots_for_period(period_id)
    }

    pub fn compare_periods(&self, a: PeriodId, b: PeriodId) -> EngineResult<PeriodComparison> {
        self.periods.compare_periods(a, b)
    }
}
