//! Movement Ledger.
//!
//! Every mutation runs under the line's lock:
//!
//! ```text
//! lock line → period Open? → validate → recompute from the full movement set
//!           → persist movement, persist line → broadcast
//! ```
//!
//! The recomputation happens before anything is written, so a rejected
//! movement or count leaves the store untouched.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use cellarbook_core::{LineId, MovementId, PeriodId};
use cellarbook_events::EventBus;
use cellarbook_stocktake::{
    ChangeCause, Movement, MovementPatch, MovementValues, NewMovement, StocktakeLine,
};

use crate::broadcaster::StocktakeEnvelope;
use crate::engine::Shared;
use crate::error::{EngineError, EngineResult};
use crate::locks::acquire;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMovement {
    pub movement: Movement,
    pub line: StocktakeLine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedMovement {
    pub movement: Movement,
    /// Replaced values, for the audit trail.
    pub old_values: MovementValues,
    pub line: StocktakeLine,
}

pub struct MovementLedger<B> {
    shared: Arc<Shared<B>>,
}

impl<B> MovementLedger<B>
where
    B: EventBus<StocktakeEnvelope>,
{
    pub(crate) fn new(shared: Arc<Shared<B>>) -> Self {
        Self { shared }
    }

    /// A movement by id, provided it is booked on `line_id`.
    fn movement_on_line(&self, line_id: LineId, movement_id: MovementId) -> EngineResult<Movement> {
        self.shared
            .store
            .movement(movement_id)?
            .filter(|m| m.line_id == line_id)
            .ok_or_else(|| EngineError::not_found(format!("movement {movement_id} on line {line_id}")))
    }

    pub fn record_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        input: NewMovement,
    ) -> EngineResult<RecordedMovement> {
        let handle = self.shared.line_locks.handle(line_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        self.shared.open_period(period_id)?;
        let mut line = self.shared.line(period_id, line_id)?;
        let previous_variance = line.figures.variance_value;

        let movement = Movement::record(line_id, input, now)?;
        let mut movements = self.shared.store.movements_for_line(line_id)?;
        movements.push(movement.clone());
        line.recalculate(&movements, now)?;

        self.shared.store.save_movement(movement.clone())?;
        let line = self.shared.commit_line(
            line,
            previous_variance,
            ChangeCause::MovementRecorded {
                movement_id: movement.id,
            },
            now,
        )?;

        tracing::info!(
            "recorded {:?} of {} on line {}",
            movement.movement_type,
            movement.quantity,
            line_id
        );
        Ok(RecordedMovement { movement, line })
    }

    pub fn update_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        movement_id: MovementId,
        patch: MovementPatch,
    ) -> EngineResult<UpdatedMovement> {
        let handle = self.shared.line_locks.handle(line_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        self.shared.open_period(period_id)?;
        let mut line = self.shared.line(period_id, line_id)?;
        let previous_variance = line.figures.variance_value;

        let mut movement = self.movement_on_line(line_id, movement_id)?;
        let old_values = movement.apply_patch(patch, now)?;
        let movements: Vec<Movement> = self
            .shared
            .store
            .movements_for_line(line_id)?
            .into_iter()
            .map(|m| if m.id == movement_id { movement.clone() } else { m })
            .collect();
        line.recalculate(&movements, now)?;

        self.shared.store.save_movement(movement.clone())?;
        let line = self.shared.commit_line(
            line,
            previous_variance,
            ChangeCause::MovementUpdated { movement_id },
            now,
        )?;

        tracing::info!(
            "updated movement {} on line {} (was {:?} of {})",
            movement_id,
            line_id,
            old_values.movement_type,
            old_values.quantity
        );
        Ok(UpdatedMovement {
            movement,
            old_values,
            line,
        })
    }

    pub fn delete_movement(
        &self,
        period_id: PeriodId,
        line_id: LineId,
        movement_id: MovementId,
    ) -> EngineResult<StocktakeLine> {
        let handle = self.shared.line_locks.handle(line_id);
        let _guard = acquire(&handle);
        let now = Utc::now();

        self.shared.open_period(period_id)?;
        let mut line = self.shared.line(period_id, line_id)?;
        let previous_variance = line.figures.variance_value;

        self.movement_on_line(line_id, movement_id)?;
        let mut movements = self.shared.store.movements_for_line(line_id)?;
        movements.retain(|m| m.id != movement_id);
        line.recalculate(&movements, now)?;

        self.shared.store.delete_movement(movement_id)?;
        let line = self.shared.commit_line(
            line,
            previous_variance,
            ChangeCause::MovementDeleted { movement_id },
            now,
        )?;

        tracing::info!("deleted movement {} from line {}", movement_id, line_id);
        Ok(line)
    }

    /// Movements of a line in insertion order. Readable in any period state.
    pub fn list_movements(
        &self,
        period_id: PeriodId,
        line_id: LineId,
    ) -> EngineResult<Vec<Movement>> {
        self.shared.line(period_id, line_id)?;
        Ok(self.shared.store.movements_for_line(line_id)?)
    }
}
