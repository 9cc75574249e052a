//! Engine error taxonomy.

use thiserror::Error;

use cellarbook_core::{DomainError, LineId, PeriodId};

use crate::store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Error returned by every engine operation.
///
/// None of these are retried inside the engine. `Persistence` and `Internal` are
/// the only variants not caused by the caller's input or the period's state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("category mismatch: {0}")]
    CategoryMismatch(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("period locked: {0}")]
    LockedPeriod(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Lifecycle transition not allowed from the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("period {0} already has lines")]
    AlreadyPopulated(PeriodId),

    #[error("previous period {0} is not closed")]
    PreviousPeriodNotClosed(PeriodId),

    #[error("{} line(s) have no count", .line_ids.len())]
    UncountedLines { line_ids: Vec<LineId> },

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Stable machine-readable code, used as the `error` field of API responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration_error",
            EngineError::CategoryMismatch(_) => "category_mismatch",
            EngineError::Validation(_) => "validation_error",
            EngineError::LockedPeriod(_) => "locked_period",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::AlreadyPopulated(_) => "already_populated",
            EngineError::PreviousPeriodNotClosed(_) => "previous_period_not_closed",
            EngineError::UncountedLines { .. } => "uncounted_lines",
            EngineError::Persistence(_) => "persistence_error",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                EngineError::Validation(msg)
            }
            DomainError::Configuration(msg) => EngineError::Configuration(msg),
            DomainError::CategoryMismatch(msg) => EngineError::CategoryMismatch(msg),
            DomainError::Locked(msg) => EngineError::LockedPeriod(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::NotFound => EngineError::NotFound("resource".to_string()),
            DomainError::InvariantViolation(msg) => EngineError::Internal(msg),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        EngineError::Persistence(value.to_string())
    }
}
