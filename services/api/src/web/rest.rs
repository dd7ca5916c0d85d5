//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the recommendation endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::{port_error_response, AppState};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use ecoplot_core::domain::{
    DeviceId, DeviceSummary, RecommendationHistoryEntry, RecommendationResult,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        get_recommendations_handler,
        get_device_recommendations_handler,
        get_history_handler,
        crate::web::profile::get_profile_handler,
        crate::web::profile::update_profile_handler,
        crate::web::devices::list_devices_handler,
        crate::web::devices::create_device_handler,
        crate::web::devices::get_device_handler,
        crate::web::devices::update_device_handler,
        crate::web::devices::delete_device_handler,
        crate::web::devices::list_device_types_handler,
        crate::web::devices::list_brands_handler,
    ),
    components(
        schemas(
            RecommendationsResponse,
            DeviceRecommendationsResponse,
            HistoryResponse,
            UserSummary,
        )
    ),
    tags(
        (name = "EcoPlot API", description = "Energy profile, device catalog and AI recommendation endpoints.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub has_solar: bool,
    pub has_ev: bool,
    pub has_battery: bool,
}

/// The payload returned by a full recommendation run.
///
/// `success` reflects the request itself; whether the model produced usable
/// recommendations is `recommendations.success`.
#[derive(Serialize, ToSchema)]
pub struct RecommendationsResponse {
    pub success: bool,
    pub user: UserSummary,
    pub devices_count: usize,
    #[schema(value_type = Object)]
    pub recommendations: RecommendationResult,
    pub history_id: Option<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct DeviceRecommendationsResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub device: DeviceSummary,
    #[schema(value_type = Object)]
    pub recommendations: RecommendationResult,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub history: Vec<RecommendationHistoryEntry>,
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Number of entries to return (default 10, at most 50).
    pub limit: Option<i64>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Generate recommendations covering all of the caller's devices.
///
/// Successful runs are stored in the caller's recommendation history.
#[utoipa::path(
    get,
    path = "/recommendations",
    responses(
        (status = 200, description = "Run completed; see recommendations.success", body = RecommendationsResponse),
        (status = 400, description = "No devices, or missing x-user-id header"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_recommendations_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    info!("Generating recommendations for user {}", user_id);
    let report = app_state
        .pipeline
        .generate_for_user(user_id)
        .await
        .map_err(|e| port_error_response("Failed to generate recommendations", e))?;

    Ok(Json(RecommendationsResponse {
        success: true,
        user: UserSummary {
            id: report.user_id,
            has_solar: report.has_solar,
            has_ev: report.has_ev,
            has_battery: report.has_battery,
        },
        devices_count: report.devices_count,
        recommendations: report.recommendations,
        history_id: report.history_id,
    }))
}

/// Generate recommendations for one of the caller's devices.
#[utoipa::path(
    get,
    path = "/recommendations/device/{device_id}",
    responses(
        (status = 200, description = "Run completed; see recommendations.success", body = DeviceRecommendationsResponse),
        (status = 404, description = "Device not found or not owned by user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("device_id" = i64, Path, description = "The device to analyse."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_device_recommendations_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(device_id): Path<DeviceId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = app_state
        .pipeline
        .generate_for_device(user_id, device_id)
        .await
        .map_err(|e| port_error_response("Failed to generate device recommendations", e))?;
    let device = report.device.ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to generate device recommendations".to_string(),
        )
    })?;

    Ok(Json(DeviceRecommendationsResponse {
        success: true,
        device,
        recommendations: report.recommendations,
    }))
}

/// List the caller's most recent recommendation runs, newest first.
#[utoipa::path(
    get,
    path = "/recommendations/history",
    responses(
        (status = 200, description = "History entries", body = HistoryResponse),
        (status = 500, description = "Internal server error")
    ),
    params(
        HistoryQuery,
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let history = app_state
        .pipeline
        .history(user_id, query.limit)
        .await
        .map_err(|e| port_error_response("Failed to fetch recommendation history", e))?;

    Ok(Json(HistoryResponse {
        success: true,
        history,
    }))
}
