//! services/api/src/web/profile.rs
//!
//! Handlers for reading and updating the caller's energy profile.

use crate::web::state::{port_error_response, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use ecoplot_core::domain::ProfileUpdate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Read the caller's energy profile.
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's profile"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profile = app_state
        .profiles
        .get_profile(user_id)
        .await
        .map_err(|e| port_error_response("Failed to load profile", e))?;
    Ok(Json(profile))
}

/// Update the caller's energy profile.
///
/// Only the listed profile fields are accepted; a body with any other key is
/// rejected with 422 and nothing is changed.
#[utoipa::path(
    put,
    path = "/profile",
    request_body(content_type = "application/json", description = "Profile fields to change."),
    responses(
        (status = 200, description = "The updated profile"),
        (status = 422, description = "Unknown or mistyped field"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(update): Json<ProfileUpdate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if let Some(Some(priority)) = update.environmental_priority {
        if !(1..=10).contains(&priority) {
            return Err((
                StatusCode::BAD_REQUEST,
                "environmental_priority must be between 1 and 10".to_string(),
            ));
        }
    }

    let profile = app_state
        .profiles
        .update_profile(user_id, update)
        .await
        .map_err(|e| port_error_response("Failed to update profile", e))?;
    info!("Profile updated for user {}", user_id);
    Ok(Json(profile))
}
