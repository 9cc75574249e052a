//! Stocktake domain module.
//!
//! This crate contains the business rules for counting and valuing bar/cellar
//! stock across accounting periods, implemented purely as deterministic domain
//! logic (no IO, no HTTP, no storage):
//!
//! - [`uom`]: category → conversion factor, counting mode and rounding policy
//! - [`movement`]: purchase/waste ledger entries and their audited edits
//! - [`limits`]: bounds on entered quantities and costs
//! - [`line`]: the per-item line and its from-scratch calculator
//! - [`period`]: period lifecycle (Open → Closing → Closed, audited reopen)
//! - [`valuation`]: category and period aggregates
//! - [`snapshot`]: frozen closing records and period comparison
//! - [`events`]: broadcast payloads

pub mod events;
pub mod item;
pub mod limits;
pub mod line;
pub mod movement;
pub mod period;
pub mod snapshot;
pub mod uom;
pub mod valuation;

pub use events::{ChangeCause, LineRecalculated, StocktakeEvent};
pub use item::{StockCategory, StockItem};
pub use limits::{MAX_COST, MAX_LINE_QUANTITY, MAX_QUANTITY, MAX_SIZE};
pub use line::{CountInput, LineFigures, LinePricing, StocktakeLine, calculate};
pub use movement::{Movement, MovementPatch, MovementType, MovementValues, NewMovement};
pub use period::{DateRange, PeriodRequest, PeriodState, PeriodType, ReopenRecord, StockPeriod};
pub use snapshot::{ItemDelta, PeriodComparison, ProfitabilityMetrics, Snapshot, compare_snapshots};
pub use uom::{CountingMode, DisplayUnits, RoundingPolicy, UomRule};
pub use valuation::{CategoryAggregate, PeriodAggregate, Totals, aggregate_lines, variance_percent};
