//! Closing snapshots, write-once per (period, item, revision).
//!
//! The store also tracks which periods are currently closed, so population can
//! find the latest closed period without scanning every period's lines.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use cellarbook_core::{ItemId, PeriodId};
use cellarbook_stocktake::Snapshot;

use crate::store::{StoreError, StoreResult};

/// A period whose snapshots are current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedPeriod {
    pub period_id: PeriodId,
    pub end: NaiveDate,
    pub revision: u32,
}

pub trait SnapshotStore: Send + Sync {
    /// Persist one snapshot. A second write for the same key is rejected.
    fn write_snapshot(&self, snapshot: Snapshot) -> StoreResult<()>;

    /// Latest revision of every item's snapshot, ordered by item.
    fn get_snapshots_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<Snapshot>>;

    /// Most recent closed period ending before `start` that has snapshots.
    fn get_latest_closed_before(&self, start: NaiveDate) -> StoreResult<Option<ClosedPeriod>>;

    fn mark_closed(&self, closed: ClosedPeriod) -> StoreResult<()>;

    /// Called on reopen; the snapshots themselves stay.
    fn unmark_closed(&self, period_id: PeriodId) -> StoreResult<()>;
}

impl<S> SnapshotStore for Arc<S>
where
    S: SnapshotStore + ?Sized,
{
    fn write_snapshot(&self, snapshot: Snapshot) -> StoreResult<()> {
        (**self).write_snapshot(snapshot)
    }

    fn get_snapshots_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<Snapshot>> {
        (**self).get_snapshots_for_period(period_id)
    }

    fn get_latest_closed_before(&self, start: NaiveDate) -> StoreResult<Option<ClosedPeriod>> {
        (**self).get_latest_closed_before(start)
    }

    fn mark_closed(&self, closed: ClosedPeriod) -> StoreResult<()> {
        (**self).mark_closed(closed)
    }

    fn unmark_closed(&self, period_id: PeriodId) -> StoreResult<()> {
        (**self).unmark_closed(period_id)
    }
}

#[derive(Debug, Default)]
struct Inner {
    // period → item → revision → snapshot
    snapshots: HashMap<PeriodId, BTreeMap<ItemId, BTreeMap<u32, Snapshot>>>,
    closed: HashMap<PeriodId, ClosedPeriod>,
}

#[derive(Debug, Default)]
pub struct InMemorySnapshotStore {
    inner: RwLock<Inner>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn write_snapshot(&self, snapshot: Snapshot) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Poisoned("snapshots"))?;
        let revisions = inner
            .snapshots
            .entry(snapshot.period_id)
            .or_default()
            .entry(snapshot.item_id)
            .or_default();
        if revisions.contains_key(&snapshot.revision) {
            return Err(StoreError::Duplicate(format!(
                "snapshot for item {} in period {} (revision {})",
                snapshot.item_id, snapshot.period_id, snapshot.revision
            )));
        }
        revisions.insert(snapshot.revision, snapshot);
        Ok(())
    }

    fn get_snapshots_for_period(&self, period_id: PeriodId) -> StoreResult<Vec<Snapshot>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Poisoned("snapshots"))?;
        let Some(by_item) = inner.snapshots.get(&period_id) else {
            return Ok(Vec::new());
        };
        Ok(by_item
            .values()
            .filter_map(|revisions| revisions.values().next_back().cloned())
            .collect())
    }

    fn get_latest_closed_before(&self, start: NaiveDate) -> StoreResult<Option<ClosedPeriod>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| StoreError::Poisoned("snapshots"))?;
        Ok(inner
            .closed
            .values()
            .filter(|c| c.end < start)
            .filter(|c| inner.snapshots.contains_key(&c.period_id))
            .max_by_key(|c| c.end)
            .copied())
    }

    fn mark_closed(&self, closed: ClosedPeriod) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Poisoned("snapshots"))?;
        inner.closed.insert(closed.period_id, closed);
        Ok(())
    }

    fn unmark_closed(&self, period_id: PeriodId) -> StoreResult<()> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StoreError::Poisoned("snapshots"))?;
        inner.closed.remove(&period_id);
        Ok(())
    }
}
