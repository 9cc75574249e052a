//! Purchase/waste ledger entries.
//!
//! Movements are facts about stock arriving or leaving outside of sales. They
//! belong to exactly one line; the line's figures are always recomputed from
//! the full set of movements that currently exist.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cellarbook_core::{DomainError, DomainResult, LineId, MovementId};

use crate::limits::{MAX_COST, MAX_QUANTITY, ensure_at_most};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Purchase,
    Waste,
}

/// Input for a new movement (not yet validated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// Partial update for an existing movement. `None` leaves the field as is.
///
/// `clear_unit_cost` drops a delivery cost override so the movement falls back
/// to the line's valuation cost; it cannot be combined with a new `unit_cost`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPatch {
    pub movement_type: Option<MovementType>,
    pub quantity: Option<Decimal>,
    pub unit_cost: Option<Decimal>,
    #[serde(default)]
    pub clear_unit_cost: bool,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

impl MovementPatch {
    pub fn is_empty(&self) -> bool {
        self.movement_type.is_none()
            && self.quantity.is_none()
            && self.unit_cost.is_none()
            && !self.clear_unit_cost
            && self.reference.is_none()
            && self.notes.is_none()
    }
}

/// The editable fields of a movement, as they were before an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementValues {
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// A recorded purchase or waste entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub line_id: LineId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    /// Per-serving cost for this delivery when it differs from the line's.
    pub unit_cost: Option<Decimal>,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn validate_quantity(quantity: Decimal) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    ensure_at_most("quantity", quantity, MAX_QUANTITY)
}

fn validate_unit_cost(unit_cost: Option<Decimal>) -> DomainResult<()> {
    match unit_cost {
        Some(c) if c < Decimal::ZERO => Err(DomainError::validation("unit cost cannot be negative")),
        Some(c) => ensure_at_most("unit cost", c, MAX_COST),
        None => Ok(()),
    }
}

fn clean(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

impl Movement {
    pub fn record(
        line_id: LineId,
        input: NewMovement,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_quantity(input.quantity)?;
        validate_unit_cost(input.unit_cost)?;

        Ok(Self {
            id: MovementId::new(),
            line_id,
            movement_type: input.movement_type,
            quantity: input.quantity,
            unit_cost: input.unit_cost,
            reference: clean(input.reference),
            notes: clean(input.notes),
            occurred_at,
            updated_at: None,
        })
    }

    pub fn values(&self) -> MovementValues {
        MovementValues {
            movement_type: self.movement_type,
            quantity: self.quantity,
            unit_cost: self.unit_cost,
            reference: self.reference.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Apply a partial update; returns the values that were replaced.
    ///
    /// Validation happens before anything changes, so a rejected patch leaves the
    /// movement untouched.
    pub fn apply_patch(
        &mut self,
        patch: MovementPatch,
        at: DateTime<Utc>,
    ) -> DomainResult<MovementValues> {
        if patch.is_empty() {
            return Err(DomainError::validation("update contains no fields"));
        }
        if let Some(q) = patch.quantity {
            validate_quantity(q)?;
        }
        validate_unit_cost(patch.unit_cost)?;
        if patch.clear_unit_cost && patch.unit_cost.is_some() {
            return Err(DomainError::validation(
                "unit cost cannot be both set and cleared in one update",
            ));
        }

        let old = self.values();
        if let Some(t) = patch.movement_type {
            self.movement_type = t;
        }
        if let Some(q) = patch.quantity {
            self.quantity = q;
        }
        if patch.clear_unit_cost {
            self.unit_cost = None;
        } else if patch.unit_cost.is_some() {
            self.unit_cost = patch.unit_cost;
        }
        if patch.reference.is_some() {
            self.reference = clean(patch.reference);
        }
        if patch.notes.is_some() {
            self.notes = clean(patch.notes);
        }
        self.updated_at = Some(at);
        Ok(old)
    }

    /// Signed effect on expected stock.
    pub fn signed_quantity(&self) -> Decimal {
        match self.movement_type {
            MovementType::Purchase => self.quantity,
            MovementType::Waste => -self.quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn purchase(quantity: Decimal) -> NewMovement {
        NewMovement {
            movement_type: MovementType::Purchase,
            quantity,
            unit_cost: None,
            reference: Some("  INV-001 ".to_string()),
            notes: Some("   ".to_string()),
        }
    }

    #[test]
    fn record_rejects_non_positive_quantities() {
        let line = LineId::new();
        for q in [dec!(0), dec!(-1.5)] {
            let err = Movement::record(line, purchase(q), Utc::now()).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
    }

    #[test]
    fn record_rejects_quantities_and_costs_above_the_bounds() {
        let line = LineId::new();
        let huge = "70000000000000000000000000000".parse::<Decimal>().unwrap();
        for q in [huge, MAX_QUANTITY + dec!(0.01)] {
            let err = Movement::record(line, purchase(q), Utc::now()).unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)));
        }
        assert!(Movement::record(line, purchase(MAX_QUANTITY), Utc::now()).is_ok());

        let mut costly = purchase(dec!(1));
        costly.unit_cost = Some(MAX_COST + dec!(1));
        let err = Movement::record(line, costly, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn patch_rejects_an_oversized_quantity() {
        let mut m = Movement::record(LineId::new(), purchase(dec!(6)), Utc::now()).unwrap();
        let before = m.clone();
        let err = m
            .apply_patch(
                MovementPatch {
                    quantity: Some(MAX_QUANTITY * dec!(10)),
                    ..MovementPatch::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn clearing_the_unit_cost_removes_the_override() {
        let mut input = purchase(dec!(6));
        input.unit_cost = Some(dec!(2.50));
        let mut m = Movement::record(LineId::new(), input, Utc::now()).unwrap();

        let old = m
            .apply_patch(
                MovementPatch {
                    clear_unit_cost: true,
                    ..MovementPatch::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(old.unit_cost, Some(dec!(2.50)));
        assert_eq!(m.unit_cost, None);
        assert_eq!(m.quantity, dec!(6));
    }

    #[test]
    fn setting_and_clearing_the_unit_cost_together_is_rejected() {
        let mut input = purchase(dec!(6));
        input.unit_cost = Some(dec!(2.50));
        let mut m = Movement::record(LineId::new(), input, Utc::now()).unwrap();
        let before = m.clone();

        let err = m
            .apply_patch(
                MovementPatch {
                    unit_cost: Some(dec!(3)),
                    clear_unit_cost: true,
                    ..MovementPatch::default()
                },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn clear_flag_defaults_to_false_when_absent_from_json() {
        let patch: MovementPatch = serde_json::from_str(r#"{"quantity":"2"}"#).unwrap();
        assert!(!patch.clear_unit_cost);
        assert_eq!(patch.quantity, Some(dec!(2)));
    }

    #[test]
    fn record_trims_text_fields() {
        let m = Movement::record(LineId::new(), purchase(dec!(6)), Utc::now()).unwrap();
        assert_eq!(m.reference.as_deref(), Some("INV-001"));
        assert_eq!(m.notes, None);
    }

    #[test]
    fn patch_returns_old_values_and_applies_new_ones() {
        let mut m = Movement::record(LineId::new(), purchase(dec!(6)), Utc::now()).unwrap();
        let old = m
            .apply_patch(
                MovementPatch {
                    movement_type: Some(MovementType::Waste),
                    quantity: Some(dec!(2)),
                    ..MovementPatch::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(old.movement_type, MovementType::Purchase);
        assert_eq!(old.quantity, dec!(6));
        assert_eq!(m.signed_quantity(), dec!(-2));
        assert!(m.updated_at.is_some());
    }

    #[test]
    fn rejected_patch_leaves_movement_untouched() {
        let mut m = Movement::record(LineId::new(), purchase(dec!(6)), Utc::now()).unwrap();
        let before = m.clone();
        let err = m
            .apply_patch(
                MovementPatch {
                    movement_type: Some(MovementType::Waste),
                    quantity: Some(dec!(0)),
                    ..MovementPatch::default()
                },
                Utc::now(),
            )
            .unwrap_err();

        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(m, before);
    }

    #[test]
    fn empty_patch_is_rejected() {
        let mut m = Movement::record(LineId::new(), purchase(dec!(1)), Utc::now()).unwrap();
        assert!(m.apply_patch(MovementPatch::default(), Utc::now()).is_err());
    }
}
