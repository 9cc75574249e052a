//! Aggregate root trait for the stocktake domain models.

/// Aggregate root marker + minimal interface.
///
/// Periods and lines are aggregate roots: every state change that viewers can
/// observe bumps `version()`, so a consumer holding two broadcasts of the same
/// root can keep the newer one and drop the other.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    fn version(&self) -> u64;
}
