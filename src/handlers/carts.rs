use crate::handlers::common::{
    map_service_error, no_content_response, success_response, validate_input,
};
use crate::{errors::ApiError, services::cart::AddItemInput, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints. The cart is addressed by the
/// customer id; authentication is resolved by middleware upstream of this
/// core.
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:customer_id", get(get_cart))
        .route("/:customer_id", delete(clear_cart))
        .route("/:customer_id/items", post(add_item))
        .route("/:customer_id/items/:item_id", put(update_item))
        .route("/:customer_id/items/:item_id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
struct UpdateQuantityRequest {
    #[validate(range(min = 1, max = 1000))]
    quantity: i32,
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    quantity: Option<i32>,
}

/// Get cart with items
async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .get_cart(customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Add a selection to the cart, creating the cart on first use
async fn add_item(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
    Json(payload): Json<AddItemInput>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .add_item(customer_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Set a line's quantity
async fn update_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .cart
        .update_item_quantity(customer_id, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove units from a line, or the whole line when no quantity is given
async fn remove_item(
    State(state): State<Arc<AppState>>,
    Path((customer_id, item_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<RemoveQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .cart
        .remove_item(customer_id, item_id, query.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Drop every line in the cart
async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .cart
        .clear(customer_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
