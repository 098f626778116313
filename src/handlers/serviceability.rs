use crate::handlers::common::{map_service_error, success_response};
use crate::{errors::ApiError, AppState};
use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use std::sync::Arc;

pub fn serviceability_routes() -> Router<Arc<AppState>> {
    Router::new().route("/:pincode", get(check_pincode))
}

/// Ask the carrier whether it delivers to a pincode
async fn check_pincode(
    State(state): State<Arc<AppState>>,
    Path(pincode): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    if pincode.trim().is_empty() {
        return Err(ApiError::BadRequest("Pincode is required".to_string()));
    }

    let verdict = state
        .services
        .carrier
        .check_pincode(&pincode)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(verdict))
}
