use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cellarbook_core::PeriodId;

/// Envelope for a broadcast event, containing period + aggregate metadata.
///
/// Notes:
/// - Viewers subscribe per period; `period_id` is the routing key.
/// - `aggregate_version` is the version of the line/period the payload describes.
///   Delivery is at-least-once and unordered across publishers, so a consumer
///   keeps the payload with the highest version per `aggregate_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    period_id: PeriodId,

    aggregate_id: Uuid,
    aggregate_type: String,

    aggregate_version: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        period_id: PeriodId,
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        aggregate_version: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            period_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            aggregate_version,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn period_id(&self) -> PeriodId {
        self.period_id
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_version(&self) -> u64 {
        self.aggregate_version
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
