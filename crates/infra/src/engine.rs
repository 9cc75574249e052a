//! State shared by the Movement Ledger and the Period Manager.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use cellarbook_core::{LineId, PeriodId};
use cellarbook_events::EventBus;
use cellarbook_stocktake::{
    ChangeCause, LineRecalculated, PeriodAggregate, StockPeriod, StocktakeEvent, StocktakeLine,
    aggregate_lines,
};

use crate::broadcaster::{ChangeBroadcaster, StocktakeEnvelope};
use crate::catalog::ItemCatalog;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::locks::LockRegistry;
use crate::snapshot_store::SnapshotStore;
use crate::store::StocktakeStore;

pub(crate) struct Shared<B> {
    pub(crate) store: Arc<dyn StocktakeStore>,
    pub(crate) snapshots: Arc<dyn SnapshotStore>,
    pub(crate) catalog: Arc<dyn ItemCatalog>,
    pub(crate) broadcaster: ChangeBroadcaster<B>,
    pub(crate) line_locks: LockRegistry<LineId>,
    pub(crate) period_locks: LockRegistry<PeriodId>,
    /// Serialises period creation so overlap checks cannot interleave.
    pub(crate) calendar: Mutex<()>,
    pub(crate) config: EngineConfig,
}

impl<B> Shared<B>
where
    B: EventBus<StocktakeEnvelope>,
{
    pub(crate) fn period(&self, id: PeriodId) -> EngineResult<StockPeriod> {
        self.store
            .period(id)?
            .ok_or_else(|| EngineError::not_found(format!("period {id}")))
    }

    /// Load a period and fail with `LockedPeriod` unless it is Open.
    pub(crate) fn open_period(&self, id: PeriodId) -> EngineResult<StockPeriod> {
        let period = self.period(id)?;
        period.ensure_open()?;
        Ok(period)
    }

    /// Load a line, treating a line of another period as missing.
    pub(crate) fn line(&self, period_id: PeriodId, line_id: LineId) -> EngineResult<StocktakeLine> {
        match self.store.line(line_id)? {
            Some(line) if line.period_id == period_id => Ok(line),
            _ => Err(EngineError::not_found(format!(
                "line {line_id} in period {period_id}"
            ))),
        }
    }

    pub(crate) fn period_totals(&self, period_id: PeriodId) -> EngineResult<PeriodAggregate> {
        let lines = self.store.lines_for_period(period_id)?;
        Ok(aggregate_lines(&lines).1)
    }

    /// Persist an already recalculated line, then broadcast it together with
    /// the period's running totals.
    pub(crate) fn commit_line(
        &self,
        line: StocktakeLine,
        previous_variance: Option<Decimal>,
        cause: ChangeCause,
        at: DateTime<Utc>,
    ) -> EngineResult<StocktakeLine> {
        self.store.save_line(line.clone())?;
        tracing::debug!(
            "line {} recalculated (v{}): expected {} counted {:?}",
            line.id,
            line.version,
            line.figures.expected_qty,
            line.figures.counted_qty
        );

        let period_totals = self.period_totals(line.period_id)?;
        let variance_value_delta = line.figures.variance_value.unwrap_or_default()
            - previous_variance.unwrap_or_default();
        self.broadcaster
            .publish(StocktakeEvent::LineRecalculated(LineRecalculated {
                line: line.clone(),
                cause,
                period_totals,
                variance_value_delta,
                occurred_at: at,
            }));
        Ok(line)
    }
}
