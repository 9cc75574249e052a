//! Catalog dev seam: lets operators and tests seed items, balances and
//! out-of-period stock changes into the in-process catalog.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};

use cellarbook_core::ItemId;
use cellarbook_infra::{CatalogMovement, ItemCatalog};
use cellarbook_stocktake::MAX_LINE_QUANTITY;
use rust_decimal::Decimal;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

fn out_of_range(field: &str, quantity: Decimal) -> Option<axum::response::Response> {
    (quantity.abs() > MAX_LINE_QUANTITY).then(|| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{field} {quantity} is outside the supported range of ±{MAX_LINE_QUANTITY}"),
        )
    })
}

pub fn router() -> Router {
    Router::new()
        .route("/items/:id", put(upsert_item))
        .route("/items/:id/movements", post(record_catalog_movement))
}

pub async fn upsert_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpsertItemRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match parse_id(&id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Some(resp) = body.balance.and_then(|b| out_of_range("balance", b)) {
        return resp;
    }

    let (item, balance) = body.into_item(item_id);
    if let Err(e) = services.catalog.upsert_item(item.clone()) {
        return errors::store_error_to_response(e);
    }
    if let Some(quantity) = balance {
        if let Err(e) = services.catalog.set_balance(item_id, quantity) {
            return errors::store_error_to_response(e);
        }
    }

    tracing::info!("catalog item {} ({}) upserted", item.sku, item_id);
    (StatusCode::OK, Json(item)).into_response()
}

pub async fn record_catalog_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CatalogMovementRequest>,
) -> axum::response::Response {
    let item_id: ItemId = match parse_id(&id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Some(resp) = out_of_range("quantity", body.quantity) {
        return resp;
    }

    match services.catalog.item(item_id) {
        Ok(Some(_)) => {}
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "catalog item not found");
        }
        Err(e) => return errors::store_error_to_response(e),
    }

    let movement = CatalogMovement {
        item_id,
        on: body.on,
        quantity: body.quantity,
    };
    match services.catalog.record_movement(movement) {
        Ok(()) => (StatusCode::CREATED, Json(movement)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
