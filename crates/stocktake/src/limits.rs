//! Upper bounds on entered quantities and costs.
//!
//! Line arithmetic is a handful of sums and products of these inputs. Keeping
//! each input bounded keeps every figure far inside `Decimal`'s range, and the
//! calculator still checks each step so an out-of-range line is an error, not
//! a panic.

use rust_decimal::Decimal;

use cellarbook_core::{DomainError, DomainResult};

/// Largest quantity a single movement or count field may carry (10^9).
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Largest per-serving or per-container cost (10^6).
pub const MAX_COST: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest servings-per-container factor, and largest container or serving size (10^6).
pub const MAX_SIZE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Largest magnitude of any quantity a line holds: opening, expected or counted (10^15).
pub const MAX_LINE_QUANTITY: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

pub(crate) fn ensure_at_most(what: &str, value: Decimal, max: Decimal) -> DomainResult<()> {
    if value > max {
        return Err(DomainError::validation(format!("{what} {value} exceeds the maximum of {max}")));
    }
    Ok(())
}

pub(crate) fn ensure_line_quantity(what: &str, value: Decimal) -> DomainResult<Decimal> {
    if value.abs() > MAX_LINE_QUANTITY {
        return Err(DomainError::validation(format!(
            "{what} {value} is outside the supported range of ±{MAX_LINE_QUANTITY}"
        )));
    }
    Ok(value)
}

pub(crate) fn overflow(what: &str) -> DomainError {
    DomainError::validation(format!("{what} is too large to calculate"))
}
