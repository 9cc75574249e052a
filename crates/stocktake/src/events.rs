//! Broadcast payloads for period viewers.
//!
//! Each event carries complete state (the whole line, the whole period rollup),
//! never a diff, so a viewer can apply any of them in isolation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{LineId, MovementId, PeriodId};
use cellarbook_events::Event;

use crate::line::StocktakeLine;
use crate::period::StockPeriod;
use crate::valuation::{CategoryAggregate, PeriodAggregate};

/// What triggered a line recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeCause {
    LineAdded,
    MovementRecorded { movement_id: MovementId },
    MovementUpdated { movement_id: MovementId },
    MovementDeleted { movement_id: MovementId },
    CountSubmitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRecalculated {
    pub line: StocktakeLine,
    pub cause: ChangeCause,
    /// Running period totals after this change.
    pub period_totals: PeriodAggregate,
    /// Change in the line's variance value caused by this mutation.
    pub variance_value_delta: Decimal,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StocktakeEvent {
    LineRecalculated(LineRecalculated),
    PeriodPopulated {
        period: StockPeriod,
        lines_created: usize,
        period_totals: PeriodAggregate,
        occurred_at: DateTime<Utc>,
    },
    PeriodClosed {
        period: StockPeriod,
        category_totals: Vec<CategoryAggregate>,
        period_totals: PeriodAggregate,
        anomalies: Vec<LineId>,
        occurred_at: DateTime<Utc>,
    },
    PeriodReopened {
        period: StockPeriod,
        actor: String,
        reason: String,
        occurred_at: DateTime<Utc>,
    },
}

impl StocktakeEvent {
    pub fn period_id(&self) -> PeriodId {
        match self {
            StocktakeEvent::LineRecalculated(e) => e.line.period_id,
            StocktakeEvent::PeriodPopulated { period, .. }
            | StocktakeEvent::PeriodClosed { period, .. }
            | StocktakeEvent::PeriodReopened { period, .. } => period.id,
        }
    }
}

impl Event for StocktakeEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StocktakeEvent::LineRecalculated(_) => "stocktake.line.recalculated",
            StocktakeEvent::PeriodPopulated { .. } => "stocktake.period.populated",
            StocktakeEvent::PeriodClosed { .. } => "stocktake.period.closed",
            StocktakeEvent::PeriodReopened { .. } => "stocktake.period.reopened",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StocktakeEvent::LineRecalculated(e) => e.occurred_at,
            StocktakeEvent::PeriodPopulated { occurred_at, .. }
            | StocktakeEvent::PeriodClosed { occurred_at, .. }
            | StocktakeEvent::PeriodReopened { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{StockCategory, StockItem};
    use crate::period::PeriodRequest;
    use cellarbook_core::ItemId;
    use rust_decimal_macros::dec;

    #[test]
    fn serialized_events_are_tagged_by_type() {
        let (kind, range) = PeriodRequest::Month { year: 2026, month: 3 }.resolve().unwrap();
        let period = StockPeriod::create(kind, range, Utc::now());
        let item = StockItem {
            id: ItemId::new(),
            sku: "COLA-24".to_string(),
            name: "Cola".to_string(),
            category: StockCategory::DozenMineral,
            container_size: Some(dec!(12)),
            serving_size: Some(dec!(1)),
            unit_cost: dec!(6),
            valuation_cost: None,
            menu_price: Some(dec!(2.5)),
        };
        let line = StocktakeLine::open(period.id, &item, dec!(24), Utc::now()).unwrap();
        let event = StocktakeEvent::LineRecalculated(LineRecalculated {
            line,
            cause: ChangeCause::CountSubmitted,
            period_totals: PeriodAggregate::default(),
            variance_value_delta: Decimal::ZERO,
            occurred_at: Utc::now(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "line_recalculated");
        assert_eq!(json["cause"]["kind"], "count_submitted");
        assert_eq!(event.period_id(), period.id);
        assert_eq!(event.event_type(), "stocktake.line.recalculated");
    }
}
