use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{errors::ApiError, services::devices::RecordInboundInput, AppState};
use axum::{
    extract::{Json, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Creates the router for the serialized-inventory ledger.
pub fn devices_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(record_inbound))
        .route("/", get(list_transactions))
        .route("/search", post(search_device))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    search_term: String,
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    device_srno: Option<String>,
}

/// Record a device arriving into stock
async fn record_inbound(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RecordInboundInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let row = state
        .services
        .devices
        .record_inbound(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(row))
}

/// Reconstruct a device's status by serial number or SKU
async fn search_device(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lookup = state
        .services
        .devices
        .lookup(&payload.search_term)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(lookup))
}

/// List ledger transactions, newest first
async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state
        .services
        .devices
        .list_transactions(query.device_srno.as_deref())
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}
