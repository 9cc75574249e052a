//! Period Manager: period lifecycle, opening stock, counts and close.
//!
//! Populate, add-line, close and reopen hold the period's lock. Close first
//! moves the period to `Closing`, so a line mutation that gets its line lock
//! afterwards sees a locked period instead of queueing behind the close. Close
//! then visits each line under that line's lock for the final recomputation.

use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{ItemId, LineId, PeriodId};
use cellarbook_events::EventBus;
use cellarbook_stocktake::{
    CategoryAggregate, ChangeCause, LinePricing, PeriodAggregate, PeriodComparison,
    PeriodRequest, Snapshot, StockPeriod, StocktakeEvent, StocktakeLine, aggregate_lines,
    compare_snapshots,
};

use crate::broadcaster::StocktakeEnvelope;
use crate::engine::Shared;
use crate::error::{EngineError, EngineResult};
use crate::locks::acquire;
use crate::snapshot_store::ClosedPeriod;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulateOutcome {
    pub period_id: PeriodId,
    pub lines_created: usize,
    pub total_opening_value: Decimal,
    pub previous_period_id: Option<PeriodId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutcome {
    pub period: StockPeriod,
    pub category_totals: Vec<CategoryAggregate>,
    pub period_totals: PeriodAggregate,
    pub snapshots_written: usize,
    /// Lines closed by force without a count.
    pub anomalies: Vec<LineId>,
}

/// A period with its lines and live aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodView {
    pub period: StockPeriod,
    pub label: String,
    pub lines: Vec<StocktakeLine>,
    pub category_totals: Vec<CategoryAggregate>,
    pub period_totals: PeriodAggregate,
}

pub struct PeriodManager<B> {
    shared: Arc<Shared<B>>,
}

impl<B> PeriodManager<B>
where
    B: EventBus<StocktakeEnvelope>,
{
    pub(crate) fn new(shared: Arc<Shared<B>>) -> Self {
        Self { shared }
    }

    pub fn create_period(&self, request: &PeriodRequest) -> EngineResult<StockPeriod> {
        let (period_type, range) = request.resolve()?;
        let _calendar = self
            .shared
            .calendar
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(clash) = self
            .shared
            .store
            .periods()?
            .into_iter()
            .find(|p| p.range.overlaps(&range))
        {
            return Err(EngineError::Validation(format!(
                "{}..{} overlaps period {}",
                range.start,
                range.end,
                clash.label()
            )));
        }

        let period = StockPeriod::create(period_type, range, Utc::now());
        self.shared.store.save_period(period.clone())?;
        tracing::info!("created period {} ({})", period.label(), period.id);
        Ok(period)
    }

    pub fn populate_opening_stock(&self, period_id: PeriodId) -> EngineResult<PopulateOutcome> {
        let handle = self.shared.period_locks.handle(period_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut period = self.shared.open_period(period_id)?;
        if !self.shared.store.lines_for_period(period_id)?.is_empty() {
            return Err(EngineError::AlreadyPopulated(period_id));
        }

        let predecessor = self
            .shared
            .store
            .periods()?
            .into_iter()
            .filter(|p| p.id != period_id && p.range.end < period.range.start)
            .max_by_key(|p| p.range.end);
        if let Some(prev) = &predecessor {
            if !prev.is_closed() {
                return Err(EngineError::PreviousPeriodNotClosed(prev.id));
            }
        }

        let lines = match self
            .shared
            .snapshots
            .get_latest_closed_before(period.range.start)?
        {
            Some(source) => self.lines_from_snapshots(&period, source, now)?,
            None => self.lines_from_catalog(&period, now)?,
        };

        for line in &lines {
            self.shared.store.save_line(line.clone())?;
        }
        period.link_previous(predecessor.map(|p| p.id));
        self.shared.store.save_period(period.clone())?;

        let (_, period_totals) = aggregate_lines(&lines);
        let outcome = PopulateOutcome {
            period_id,
            lines_created: lines.len(),
            total_opening_value: period_totals.opening_value,
            previous_period_id: period.previous_period_id,
        };
        tracing::info!(
            "populated period {} with {} line(s), opening value {}",
            period.label(),
            outcome.lines_created,
            outcome.total_opening_value
        );

        self.shared.broadcaster.publish(StocktakeEvent::PeriodPopulated {
            period,
            lines_created: outcome.lines_created,
            period_totals,
            occurred_at: now,
        });
        Ok(outcome)
    }

    /// Carry closing quantities forward, adjusted by catalog movements dated in
    /// the gap between the two periods.
    fn lines_from_snapshots(
        &self,
        period: &StockPeriod,
        source: ClosedPeriod,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<StocktakeLine>> {
        let mut lines = Vec::new();
        for snapshot in self.shared.snapshots.get_snapshots_for_period(source.period_id)? {
            let Some(item) = self.shared.catalog.item(snapshot.item_id)? else {
                tracing::warn!(
                    "item {} ({}) left the catalog; not carried into {}",
                    snapshot.item_id,
                    snapshot.sku,
                    period.label()
                );
                continue;
            };
            let gap = self.shared.catalog.net_movement_between(
                item.id,
                source.end,
                period.range.start,
            )?;
            lines.push(StocktakeLine::open(
                period.id,
                &item,
                snapshot.closing_qty + gap,
                now,
            )?);
        }
        Ok(lines)
    }

    /// First period: every catalog item opens at its live balance.
    fn lines_from_catalog(
        &self,
        period: &StockPeriod,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<StocktakeLine>> {
        let catalog = &self.shared.catalog;
        catalog
            .items()?
            .into_iter()
            .map(|item| -> EngineResult<StocktakeLine> {
                let opening = catalog.live_balance(item.id)?;
                Ok(StocktakeLine::open(period.id, &item, opening, now)?)
            })
            .collect()
    }

    /// Add one catalog item to an open period with zero opening stock.
    pub fn add_line(&self, period_id: PeriodId, item_id: ItemId) -> EngineResult<StocktakeLine> {
        let handle = self.shared.period_locks.handle(period_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        self.shared.open_period(period_id)?;
        let item = self
            .shared
            .catalog
            .item(item_id)?
            .ok_or_else(|| EngineError::not_found(format!("catalog item {item_id}")))?;
        if self
            .shared
            .store
            .lines_for_period(period_id)?
            .iter()
            .any(|l| l.item_id == item_id)
        {
            return Err(EngineError::Conflict(format!(
                "{} already has a line in this period",
                item.sku
            )));
        }

        let line = StocktakeLine::open(period_id, &item, Decimal::ZERO, now)?;
        tracing::info!("added {} to period {}", item.sku, period_id);
        self.shared.commit_line(line, None, ChangeCause::LineAdded, now)
    }

    /// Record a physical count. Catalog pricing is re-read as of now.
    pub fn submit_count(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        full_units: Decimal,
        partial_units: Decimal,
    ) -> EngineResult<StocktakeLine> {
        let handle = self.shared.line_locks.handle(line_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        self.shared.open_period(period_id)?;
        let mut line = self.shared.line(period_id, line_id)?;
        let previous_variance = line.figures.variance_value;

        let item = self
            .shared
            .catalog
            .item(line.item_id)?
            .ok_or_else(|| EngineError::not_found(format!("catalog item {}", line.item_id)))?;
        let pricing = LinePricing::from_item(&item)?;
        line.submit_count(full_units, partial_units, pricing, now)?;
        let movements = self.shared.store.movements_for_line(line_id)?;
        line.recalculate(&movements, now)?;

        self.shared
            .commit_line(line, previous_variance, ChangeCause::CountSubmitted, now)
    }

    pub fn close_period(&self, period_id: PeriodId, force: bool) -> EngineResult<CloseOutcome> {
        if force && !self.shared.config.allow_force_close {
            return Err(EngineError::Validation(
                "forced close is disabled by configuration".to_string(),
            ));
        }

        let handle = self.shared.period_locks.handle(period_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut period = self.shared.period(period_id)?;
        period.begin_close()?;
        self.shared.store.save_period(period.clone())?;

        match self.finish_close(period.clone(), force, now) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                period.abort_close()?;
                self.shared.store.save_period(period)?;
                tracing::info!("close of period {} aborted: {}", period_id, err);
                Err(err)
            }
        }
    }

    fn finish_close(
        &self,
        mut period: StockPeriod,
        force: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<CloseOutcome> {
        let mut lines = Vec::new();
        let mut uncounted = Vec::new();
        for stored in self.shared.store.lines_for_period(period.id)? {
            let handle = self.shared.line_locks.handle(stored.id);
            let _guard = acquire(&handle);

            let mut line = self.shared.line(period.id, stored.id)?;
            let movements = self.shared.store.movements_for_line(line.id)?;
            line.recalculate(&movements, now)?;
            if !line.is_counted() {
                uncounted.push(line.id);
            }
            lines.push(line);
        }

        if !uncounted.is_empty() {
            if !force {
                return Err(EngineError::UncountedLines {
                    line_ids: uncounted,
                });
            }
            tracing::warn!(
                "force-closing period {} with {} uncounted line(s)",
                period.label(),
                uncounted.len()
            );
            for line in lines.iter_mut().filter(|l| !l.is_counted()) {
                line.flag_anomaly();
            }
        }

        for line in &lines {
            self.shared.store.save_line(line.clone())?;
            self.shared
                .snapshots
                .write_snapshot(Snapshot::from_line(line, period.revision, now))?;
        }

        let (category_totals, period_totals) = aggregate_lines(&lines);
        period.finish_close(now)?;
        self.shared.store.save_period(period.clone())?;
        self.shared.snapshots.mark_closed(ClosedPeriod {
            period_id: period.id,
            end: period.range.end,
            revision: period.revision,
        })?;

        let anomalies: Vec<LineId> = lines.iter().filter(|l| l.anomaly).map(|l| l.id).collect();
        tracing::info!(
            "closed period {} (revision {}): {} snapshot(s), variance value {}",
            period.label(),
            period.revision,
            lines.len(),
            period_totals.totals.variance_value
        );

        self.shared.broadcaster.publish(StocktakeEvent::PeriodClosed {
            period: period.clone(),
            category_totals: category_totals.clone(),
            period_totals: period_totals.clone(),
            anomalies: anomalies.clone(),
            occurred_at: now,
        });

        Ok(CloseOutcome {
            period,
            category_totals,
            period_totals,
            snapshots_written: lines.len(),
            anomalies,
        })
    }

    /// Audited Closed → Open. The next close writes a new snapshot revision.
    pub fn reopen_period(
        &self,
        period_id: PeriodId,
        actor: &str,
        reason: &str,
    ) -> EngineResult<StockPeriod> {
        let handle = self.shared.period_locks.handle(period_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        let mut period = self.shared.period(period_id)?;
        let record = period.reopen(actor, reason, now)?;
        self.shared.store.save_period(period.clone())?;
        self.shared.snapshots.unmark_closed(period_id)?;

        tracing::warn!(
            "period {} reopened by {}: {} (revision {} superseded)",
            period.label(),
            record.actor,
            record.reason,
            record.superseded_revision
        );

        self.shared.broadcaster.publish(StocktakeEvent::PeriodReopened {
            period: period.clone(),
            actor: record.actor,
            reason: record.reason,
            occurred_at: now,
        });
        Ok(period)
    }

    /// Per-item and aggregate deltas between two periods' snapshots (`b − a`).
    pub fn compare_periods(&self, a: PeriodId, b: PeriodId) -> EngineResult<PeriodComparison> {
        let snapshots_a = self.get_snapshots_for_period(a)?;
        let snapshots_b = self.get_snapshots_for_period(b)?;
        for (id, snapshots) in [(a, &snapshots_a), (b, &snapshots_b)] {
            if snapshots.is_empty() {
                return Err(EngineError::Validation(format!(
                    "period {id} has no snapshots; close it before comparing"
                )));
            }
        }
        Ok(compare_snapshots(a, &snapshots_a, b, &snapshots_b))
    }

    pub fn get_snapshots_for_period(&self, period_id: PeriodId) -> EngineResult<Vec<Snapshot>> {
        self.shared.period(period_id)?;
        Ok(self.shared.snapshots.get_snapshots_for_period(period_id)?)
    }

    pub fn get_period(&self, period_id: PeriodId) -> EngineResult<PeriodView> {
        let period = self.shared.period(period_id)?;
        let lines = self.shared.store.lines_for_period(period_id)?;
        let (category_totals, period_totals) = aggregate_lines(&lines);
        Ok(PeriodView {
            label: period.label(),
            period,
            lines,
            category_totals,
            period_totals,
        })
    }

    pub fn list_periods(&self) -> EngineResult<Vec<StockPeriod>> {
        let mut periods = self.shared.store.periods()?;
        periods.sort_by_key(|p| p.range.start);
        Ok(periods)
    }
}
