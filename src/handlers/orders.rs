use crate::handlers::common::{created_response, map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::fulfillment::SerialAssignment,
    services::orders::{DirectPurchaseInput, OfflineOrderInput, OrderFilters, PlaceOrderInput},
    ApiResponse, AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for order placement, reads, and fulfillment
/// transitions.
pub fn orders_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_orders))
        .route("/checkout", post(checkout))
        .route("/direct", post(direct_purchase))
        .route("/offline", post(create_offline_order))
        .route("/:id", get(get_order))
        .route("/:id/approve", post(approve_order))
        .route("/:id/reject", post(reject_order))
        .route("/:id/fulfill", post(fulfill_order))
        .route("/:id/ship", post(ship_order))
        .route("/:id/deliver", post(deliver_order))
        .route("/:id/pickup", post(request_pickup))
        .route("/:id/serials", post(save_serials))
        .route("/:id/track", get(track_order))
}

#[derive(Debug, Deserialize)]
struct CheckoutRequest {
    customer_id: Uuid,
    #[serde(flatten)]
    input: PlaceOrderInput,
}

#[derive(Debug, Deserialize)]
struct DirectPurchaseRequest {
    customer_id: Uuid,
    #[serde(flatten)]
    input: DirectPurchaseInput,
}

#[derive(Debug, Default, Deserialize)]
struct TransitionRequest {
    actor: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SerialsRequest {
    serials: Vec<SerialAssignment>,
}

fn actor_or_admin(actor: Option<String>) -> String {
    actor.unwrap_or_else(|| "admin".to_string())
}

fn transition_payload(payload: Option<Json<TransitionRequest>>) -> TransitionRequest {
    payload.map(|Json(p)| p).unwrap_or_default()
}

/// Check out the customer's cart
async fn checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload.input)?;

    let order = state
        .services
        .orders
        .place_order(payload.customer_id, payload.input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// "Buy now" without a cart
async fn direct_purchase(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<DirectPurchaseRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload.input)?;

    let order = state
        .services
        .orders
        .direct_purchase(payload.customer_id, payload.input)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// Admin-recorded in-store sale
async fn create_offline_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<OfflineOrderInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let order = state
        .services
        .orders
        .create_offline_order(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

/// List orders, newest first; rejected orders only when asked for
async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<OrderFilters>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_orders(filters)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Get one order with items, details, and history
async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn approve_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .approve(id, &actor_or_admin(payload.actor))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .reject(id, &actor_or_admin(payload.actor), payload.reason)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn fulfill_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .fulfill(id, &actor_or_admin(payload.actor))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn ship_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .ship(id, &actor_or_admin(payload.actor))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

async fn deliver_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .deliver(id, &actor_or_admin(payload.actor))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Book a carrier pickup and store the waybill
async fn request_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Option<Json<TransitionRequest>>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let payload = transition_payload(payload);
    let order = state
        .services
        .fulfillment
        .request_pickup(id, &actor_or_admin(payload.actor))
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Stamp serial numbers onto the order's detail rows
async fn save_serials(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SerialsRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let count = payload.serials.len();
    state
        .services
        .fulfillment
        .save_serial_numbers(id, payload.serials)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(ApiResponse::success_with_message(
        count,
        "serial numbers saved",
    )))
}

/// Sync delivery status from the carrier
async fn track_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let result = state
        .services
        .fulfillment
        .track_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(result))
}
