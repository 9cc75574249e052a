//! Stock period lifecycle.
//!
//! ```text
//!   Open ──begin_close──▶ Closing ──finish_close──▶ Closed
//!    ▲                       │                         │
//!    └──────abort_close──────┘                         │
//!    └───────────────reopen (audited)──────────────────┘
//! ```
//!
//! Only `Open` accepts line mutations. `Closing` exists so that mutations racing
//! a close are refused instead of queued behind it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use cellarbook_core::{AggregateRoot, DomainError, DomainResult, PeriodId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodState {
    Open,
    Closing,
    Closed,
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if end < start {
            return Err(DomainError::validation(format!(
                "period end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn month(year: i32, month: u32) -> DomainResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| DomainError::validation(format!("invalid month {year}-{month}")))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let end = next
            .and_then(|d| d.pred_opt())
            .ok_or_else(|| DomainError::validation(format!("invalid month {year}-{month}")))?;
        Self::new(start, end)
    }

    pub fn quarter(year: i32, quarter: u32) -> DomainResult<Self> {
        if !(1..=4).contains(&quarter) {
            return Err(DomainError::validation(format!("invalid quarter {quarter}")));
        }
        let first = Self::month(year, (quarter - 1) * 3 + 1)?;
        let last = Self::month(year, quarter * 3)?;
        Self::new(first.start, last.end)
    }

    pub fn year(year: i32) -> DomainResult<Self> {
        let first = Self::month(year, 1)?;
        let last = Self::month(year, 12)?;
        Self::new(first.start, last.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// How a caller asks for a new period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PeriodRequest {
    Month { year: i32, month: u32 },
    Quarter { year: i32, quarter: u32 },
    Year { year: i32 },
    Range {
        period_type: PeriodType,
        start: NaiveDate,
        end: NaiveDate,
    },
}

impl PeriodRequest {
    pub fn resolve(&self) -> DomainResult<(PeriodType, DateRange)> {
        match *self {
            PeriodRequest::Month { year, month } => {
                Ok((PeriodType::Monthly, DateRange::month(year, month)?))
            }
            PeriodRequest::Quarter { year, quarter } => {
                Ok((PeriodType::Quarterly, DateRange::quarter(year, quarter)?))
            }
            PeriodRequest::Year { year } => Ok((PeriodType::Yearly, DateRange::year(year)?)),
            PeriodRequest::Range {
                period_type,
                start,
                end,
            } => Ok((period_type, DateRange::new(start, end)?)),
        }
    }
}

/// Audit entry written when a closed period is reopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenRecord {
    pub actor: String,
    pub reason: String,
    pub reopened_at: DateTime<Utc>,
    /// Snapshot revision that was current when the period was reopened.
    pub superseded_revision: u32,
}

/// Aggregate root: StockPeriod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPeriod {
    pub id: PeriodId,
    pub period_type: PeriodType,
    pub range: DateRange,
    pub state: PeriodState,
    /// Predecessor resolved at population time.
    pub previous_period_id: Option<PeriodId>,
    /// Snapshot revision the next close writes. Bumped by every reopen.
    pub revision: u32,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub reopen_log: Vec<ReopenRecord>,
    version: u64,
}

impl StockPeriod {
    pub fn create(period_type: PeriodType, range: DateRange, at: DateTime<Utc>) -> Self {
        Self {
            id: PeriodId::new(),
            period_type,
            range,
            state: PeriodState::Open,
            previous_period_id: None,
            revision: 1,
            created_at: at,
            closed_at: None,
            reopen_log: Vec::new(),
            version: 1,
        }
    }

    /// Human label, e.g. `2026-10`, `2026-Q4`, `2026`, `2026-10-05..2026-10-11`.
    pub fn label(&self) -> String {
        let start = self.range.start;
        match self.period_type {
            PeriodType::Monthly => format!("{}-{:02}", start.year(), start.month()),
            PeriodType::Quarterly => format!("{}-Q{}", start.year(), (start.month() - 1) / 3 + 1),
            PeriodType::Yearly => format!("{}", start.year()),
            PeriodType::Weekly | PeriodType::Custom => {
                format!("{}..{}", self.range.start, self.range.end)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == PeriodState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == PeriodState::Closed
    }

    pub fn ensure_open(&self) -> DomainResult<()> {
        match self.state {
            PeriodState::Open => Ok(()),
            PeriodState::Closing => Err(DomainError::locked(format!(
                "period {} is closing",
                self.label()
            ))),
            PeriodState::Closed => Err(DomainError::locked(format!(
                "period {} is closed",
                self.label()
            ))),
        }
    }

    pub fn link_previous(&mut self, previous: Option<PeriodId>) {
        self.previous_period_id = previous;
        self.version += 1;
    }

    pub fn begin_close(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.state = PeriodState::Closing;
        self.version += 1;
        Ok(())
    }

    pub fn abort_close(&mut self) -> DomainResult<()> {
        if self.state != PeriodState::Closing {
            return Err(DomainError::conflict("period is not closing"));
        }
        self.state = PeriodState::Open;
        self.version += 1;
        Ok(())
    }

    pub fn finish_close(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.state != PeriodState::Closing {
            return Err(DomainError::conflict("period is not closing"));
        }
        self.state = PeriodState::Closed;
        self.closed_at = Some(at);
        self.version += 1;
        Ok(())
    }

    /// Audited override: Closed → Open. The next close writes a new snapshot revision.
    pub fn reopen(
        &mut self,
        actor: impl Into<String>,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<ReopenRecord> {
        if self.state != PeriodState::Closed {
            return Err(DomainError::conflict(format!(
                "only closed periods can be reopened ({} is {:?})",
                self.label(),
                self.state
            )));
        }
        let actor = actor.into();
        let reason = reason.into();
        if actor.trim().is_empty() || reason.trim().is_empty() {
            return Err(DomainError::validation("reopen requires an actor and a reason"));
        }

        let record = ReopenRecord {
            actor,
            reason,
            reopened_at: at,
            superseded_revision: self.revision,
        };
        self.reopen_log.push(record.clone());
        self.revision += 1;
        self.state = PeriodState::Open;
        self.closed_at = None;
        self.version += 1;

        Ok(record)
    }
}

impl AggregateRoot for StockPeriod {
    type Id = PeriodId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn october() -> StockPeriod {
        let (kind, range) = PeriodRequest::Month {
            year: 2026,
            month: 10,
        }
        .resolve()
        .unwrap();
        StockPeriod::create(kind, range, Utc::now())
    }

    #[test]
    fn month_request_spans_the_calendar_month() {
        let p = october();
        assert_eq!(p.range.start, date(2026, 10, 1));
        assert_eq!(p.range.end, date(2026, 10, 31));
        assert_eq!(p.label(), "2026-10");

        let feb = DateRange::month(2028, 2).unwrap();
        assert_eq!(feb.end, date(2028, 2, 29));
        let dec = DateRange::month(2026, 12).unwrap();
        assert_eq!(dec.end, date(2026, 12, 31));
    }

    #[test]
    fn quarter_and_year_ranges() {
        let q = DateRange::quarter(2026, 4).unwrap();
        assert_eq!((q.start, q.end), (date(2026, 10, 1), date(2026, 12, 31)));
        assert!(DateRange::quarter(2026, 5).is_err());

        let y = DateRange::year(2026).unwrap();
        assert_eq!((y.start, y.end), (date(2026, 1, 1), date(2026, 12, 31)));
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert!(DateRange::new(date(2026, 2, 1), date(2026, 1, 1)).is_err());
        assert!(DateRange::month(2026, 13).is_err());
    }

    #[test]
    fn overlap_detection_is_inclusive() {
        let a = DateRange::new(date(2026, 1, 1), date(2026, 1, 31)).unwrap();
        let b = DateRange::new(date(2026, 1, 31), date(2026, 2, 6)).unwrap();
        let c = DateRange::new(date(2026, 2, 1), date(2026, 2, 6)).unwrap();
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn closing_period_refuses_mutations() {
        let mut p = october();
        p.begin_close().unwrap();
        assert!(matches!(p.ensure_open(), Err(DomainError::Locked(_))));

        p.finish_close(Utc::now()).unwrap();
        assert!(p.is_closed());
        assert!(matches!(p.ensure_open(), Err(DomainError::Locked(_))));
        assert!(p.begin_close().is_err());
    }

    #[test]
    fn abort_close_returns_to_open() {
        let mut p = october();
        p.begin_close().unwrap();
        p.abort_close().unwrap();
        assert!(p.is_open());
    }

    #[test]
    fn reopen_is_audited_and_bumps_revision() {
        let mut p = october();
        assert!(p.reopen("manager", "typo", Utc::now()).is_err());

        p.begin_close().unwrap();
        p.finish_close(Utc::now()).unwrap();
        let v = p.version();

        assert!(p.reopen("manager", "  ", Utc::now()).is_err());
        let record = p.reopen("manager", "late delivery note", Utc::now()).unwrap();

        assert_eq!(record.superseded_revision, 1);
        assert_eq!(p.revision, 2);
        assert!(p.is_open());
        assert!(p.closed_at.is_none());
        assert!(p.version() > v);
    }
}
