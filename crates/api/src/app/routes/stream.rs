//! Viewer stream: every change to one period, as Server-Sent Events.
//!
//! Each SSE message carries a full `StocktakeEnvelope`. Viewers keep the
//! payload with the highest `aggregate_version` per `aggregate_id`.

use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use axum::{
    extract::{Extension, Path},
    response::{
        IntoResponse,
        sse::{Event as SseEvent, KeepAlive, Sse},
    },
};
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::wrappers::UnboundedReceiverStream;

use cellarbook_core::PeriodId;
use cellarbook_events::Event;

use crate::app::errors;
use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// GET /periods/:id/stream
pub async fn period_stream(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Subscribe before responding so nothing published after the 200 is missed.
    let subscription = match services.engine.subscribe_period(period_id) {
        Ok(s) => s,
        Err(e) => return errors::engine_error_to_response(e),
    };
    let heartbeat_every = services.sse_heartbeat;

    let (tx, rx) = unbounded_channel::<Result<SseEvent, std::convert::Infallible>>();

    tokio::task::spawn_blocking(move || {
        tracing::debug!("viewer attached to period {}", period_id);
        let mut last_sent = Instant::now();

        loop {
            match subscription.recv_timeout(POLL_INTERVAL) {
                Ok(envelope) => {
                    let event_type = envelope.payload().event_type();
                    let data = match serde_json::to_string(&envelope) {
                        Ok(s) => s,
                        Err(e) => {
                            tracing::warn!("failed to encode {} for viewer: {}", event_type, e);
                            continue;
                        }
                    };

                    let sse_event = SseEvent::default()
                        .event(event_type)
                        .id(envelope.event_id().to_string())
                        .data(data);
                    if tx.send(Ok(sse_event)).is_err() {
                        break;
                    }
                    last_sent = Instant::now();
                }
                Err(RecvTimeoutError::Timeout) => {
                    if tx.is_closed() {
                        break;
                    }
                    if last_sent.elapsed() >= heartbeat_every {
                        let heartbeat = SseEvent::default().event("heartbeat").data("{}");
                        if tx.send(Ok(heartbeat)).is_err() {
                            break;
                        }
                        last_sent = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        tracing::debug!("viewer detached from period {}", period_id);
    });

    Sse::new(UnboundedReceiverStream::new(rx))
        .keep_alive(KeepAlive::new().interval(heartbeat_every))
        .into_response()
}
