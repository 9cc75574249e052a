use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use cellarbook_infra::{EngineError, StoreError};

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    let status = match &err {
        EngineError::Validation(_) | EngineError::Configuration(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::LockedPeriod(_)
        | EngineError::Conflict(_)
        | EngineError::AlreadyPopulated(_)
        | EngineError::PreviousPeriodNotClosed(_) => StatusCode::CONFLICT,
        EngineError::UncountedLines { .. } | EngineError::CategoryMismatch(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineError::Persistence(_) | EngineError::Internal(_) => {
            tracing::error!("request failed: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    match err {
        EngineError::UncountedLines { ref line_ids } => (
            status,
            axum::Json(json!({
                "error": err.code(),
                "message": err.to_string(),
                "line_ids": line_ids,
            })),
        )
            .into_response(),
        _ => json_error(status, err.code(), err.to_string()),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    engine_error_to_response(EngineError::from(err))
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
