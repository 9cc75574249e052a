//! Change Broadcaster: pushes recomputed state to period viewers.
//!
//! Publishing happens after the mutation is persisted and never fails the
//! mutation. Viewers subscribe per period via [`ChangeBroadcaster::subscribe_period`].

use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use uuid::Uuid;

use cellarbook_core::{AggregateRoot, PeriodId};
use cellarbook_events::{Event, EventBus, EventEnvelope, Subscription};
use cellarbook_stocktake::StocktakeEvent;

pub type StocktakeEnvelope = EventEnvelope<StocktakeEvent>;

pub const LINE_AGGREGATE: &str = "stocktake.line";
pub const PERIOD_AGGREGATE: &str = "stocktake.period";

fn envelope(event: StocktakeEvent) -> StocktakeEnvelope {
    let period_id = event.period_id();
    let (aggregate_id, aggregate_type, version): (Uuid, &str, u64) = match &event {
        StocktakeEvent::LineRecalculated(e) => {
            (Uuid::from(e.line.id), LINE_AGGREGATE, e.line.version())
        }
        StocktakeEvent::PeriodPopulated { period, .. }
        | StocktakeEvent::PeriodClosed { period, .. }
        | StocktakeEvent::PeriodReopened { period, .. } => {
            (Uuid::from(period.id), PERIOD_AGGREGATE, period.version())
        }
    };
    EventEnvelope::new(
        Uuid::now_v7(),
        period_id,
        aggregate_id,
        aggregate_type,
        version,
        event,
    )
}

#[derive(Debug)]
pub struct ChangeBroadcaster<B> {
    bus: B,
}

impl<B> ChangeBroadcaster<B>
where
    B: EventBus<StocktakeEnvelope>,
{
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Fire-and-forget publish. Failures are logged and swallowed.
    pub fn publish(&self, event: StocktakeEvent) {
        let event_type = event.event_type();
        let env = envelope(event);
        let period_id = env.period_id();
        match self.bus.publish(env) {
            Ok(()) => tracing::debug!(%period_id, event_type, "change broadcast"),
            Err(err) => {
                tracing::warn!("failed to broadcast {event_type} for period {period_id}: {err:?}")
            }
        }
    }

    pub fn subscribe_period(&self, period_id: PeriodId) -> PeriodSubscription {
        PeriodSubscription {
            period_id,
            inner: self.bus.subscribe(),
        }
    }
}

/// Subscription that only yields envelopes for one period.
#[derive(Debug)]
pub struct PeriodSubscription {
    period_id: PeriodId,
    inner: Subscription<StocktakeEnvelope>,
}

impl PeriodSubscription {
    pub fn period_id(&self) -> PeriodId {
        self.period_id
    }

    /// Wait up to `timeout` for the next envelope of this period.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<StocktakeEnvelope, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let env = self.inner.recv_timeout(remaining)?;
            if env.period_id() == self.period_id {
                return Ok(env);
            }
        }
    }

    /// Everything already queued for this period, without blocking.
    pub fn drain(&self) -> Vec<StocktakeEnvelope> {
        self.inner
            .drain()
            .into_iter()
            .filter(|env| env.period_id() == self.period_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use cellarbook_events::{InMemoryEventBus, Subscription};
    use cellarbook_stocktake::{PeriodRequest, StockPeriod};
    use chrono::Utc;

    fn period() -> StockPeriod {
        let (kind, range) = PeriodRequest::Year { year: 2026 }.resolve().unwrap();
        StockPeriod::create(kind, range, Utc::now())
    }

    fn reopened(period: StockPeriod) -> StocktakeEvent {
        StocktakeEvent::PeriodReopened {
            period,
            actor: "gm".to_string(),
            reason: "recount".to_string(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn subscribers_only_see_their_period() {
        let bus = Arc::new(InMemoryEventBus::<StocktakeEnvelope>::new());
        let broadcaster = ChangeBroadcaster::new(bus);
        let (mine, other) = (period(), period());
        let sub = broadcaster.subscribe_period(mine.id);

        broadcaster.publish(reopened(other));
        broadcaster.publish(reopened(mine.clone()));

        let env = sub.recv_timeout(Duration::from_millis(200)).unwrap();
        assert_eq!(env.period_id(), mine.id);
        assert_eq!(env.aggregate_type(), PERIOD_AGGREGATE);
        assert!(sub.drain().is_empty());
    }

    struct BrokenBus;

    impl EventBus<StocktakeEnvelope> for BrokenBus {
        type Error = &'static str;

        fn publish(&self, _message: StocktakeEnvelope) -> Result<(), Self::Error> {
            Err("transport down")
        }

        fn subscribe(&self) -> Subscription<StocktakeEnvelope> {
            let (_tx, rx) = std::sync::mpsc::channel();
            Subscription::new(rx)
        }
    }

    #[test]
    fn publish_failures_are_swallowed() {
        let broadcaster = ChangeBroadcaster::new(BrokenBus);
        broadcaster.publish(reopened(period()));
    }
}
