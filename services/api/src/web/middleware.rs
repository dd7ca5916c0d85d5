//! services/api/src/web/middleware.rs
//!
//! Request identity middleware for the user-scoped routes.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Middleware that reads the caller's id from the `x-user-id` header.
///
/// The user's profile row is created on first sight, and the id is inserted into
/// request extensions for handlers to use. A missing or malformed header is a 400.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, (StatusCode, String)> {
    // 1. Extract the header
    let user_id_str = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                "x-user-id header is required".to_string(),
            )
        })?;

    // 2. Parse it
    let user_id = Uuid::parse_str(user_id_str.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )
    })?;

    // 3. Make sure the user exists
    state.profiles.ensure_user(user_id).await.map_err(|e| {
        error!("Failed to ensure user {}: {:?}", user_id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load user".to_string(),
        )
    })?;

    // 4. Insert user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
