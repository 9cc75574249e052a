use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use serde::Serialize;

use cellarbook_core::{LineId, MovementId, PeriodId};
use cellarbook_infra::EngineResult;
use cellarbook_stocktake::{MovementPatch, NewMovement, PeriodRequest};

use crate::app::routes::common::parse_id;
use crate::app::routes::stream;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_period).get(list_periods))
        .route("/compare", get(compare_periods))
        .route("/:id", get(get_period))
        .route("/:id/populate", post(populate_opening_stock))
        .route("/:id/lines", post(add_line))
        .route(
            "/:id/lines/:line_id/movements",
            post(record_movement).get(list_movements),
        )
        .route(
            "/:id/lines/:line_id/movements/:movement_id",
            patch(update_movement).delete(delete_movement),
        )
        .route("/:id/lines/:line_id/count", put(submit_count))
        .route("/:id/close", post(close_period))
        .route("/:id/reopen", post(reopen_period))
        .route("/:id/snapshots", get(get_snapshots))
        .route("/:id/stream", get(stream::period_stream))
}

fn respond<T: Serialize>(status: StatusCode, result: EngineResult<T>) -> axum::response::Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

fn line_path(period: &str, line: &str) -> Result<(PeriodId, LineId), axum::response::Response> {
    Ok((parse_id(period, "period id")?, parse_id(line, "line id")?))
}

pub async fn create_period(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<PeriodRequest>,
) -> axum::response::Response {
    respond(StatusCode::CREATED, services.engine.create_period(&body))
}

pub async fn list_periods(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    respond(StatusCode::OK, services.engine.list_periods())
}

pub async fn get_period(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.engine.get_period(period_id))
}

pub async fn populate_opening_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.engine.populate_opening_stock(period_id))
}

pub async fn add_line(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::AddLineRequest>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::CREATED, services.engine.add_line(period_id, body.item_id))
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<NewMovement>,
) -> axum::response::Response {
    let (period_id, line_id) = match line_path(&id, &line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::CREATED,
        services.engine.record_movement(period_id, line_id, body),
    )
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (period_id, line_id) = match line_path(&id, &line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.engine.list_movements(period_id, line_id))
}

pub async fn update_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_id, movement_id)): Path<(String, String, String)>,
    Json(body): Json<MovementPatch>,
) -> axum::response::Response {
    let (period_id, line_id) = match line_path(&id, &line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let movement_id: MovementId = match parse_id(&movement_id, "movement id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .engine
            .update_movement(period_id, line_id, movement_id, body),
    )
}

pub async fn delete_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_id, movement_id)): Path<(String, String, String)>,
) -> axum::response::Response {
    let (period_id, line_id) = match line_path(&id, &line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let movement_id: MovementId = match parse_id(&movement_id, "movement id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .engine
            .delete_movement(period_id, line_id, movement_id),
    )
}

pub async fn submit_count(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, line_id)): Path<(String, String)>,
    Json(body): Json<dto::SubmitCountRequest>,
) -> axum::response::Response {
    let (period_id, line_id) = match line_path(&id, &line_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .engine
            .submit_count(period_id, line_id, body.full_units, body.partial_units),
    )
}

/// POST /periods/:id/close
///
/// Body is optional; `{"force": true}` closes over uncounted lines and flags them.
pub async fn close_period(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Option<Json<dto::ClosePeriodRequest>>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let force = body.map(|Json(b)| b.force).unwrap_or_default();
    respond(StatusCode::OK, services.engine.close_period(period_id, force))
}

pub async fn reopen_period(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReopenPeriodRequest>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(
        StatusCode::OK,
        services
            .engine
            .reopen_period(period_id, &body.actor, &body.reason),
    )
}

pub async fn get_snapshots(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let period_id: PeriodId = match parse_id(&id, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.engine.get_snapshots_for_period(period_id))
}

/// GET /periods/compare?a=..&b=..
pub async fn compare_periods(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::CompareQuery>,
) -> axum::response::Response {
    let a: PeriodId = match parse_id(&query.a, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let b: PeriodId = match parse_id(&query.b, "period id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    respond(StatusCode::OK, services.engine.compare_periods(a, b))
}
