//! services/api/src/web/devices.rs
//!
//! Handlers for the caller's device catalog and the shared type/brand lists.

use crate::web::state::{port_error_response, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use ecoplot_core::domain::{DeviceId, DeviceUpdate, NewDevice};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// List the caller's devices.
#[utoipa::path(
    get,
    path = "/devices",
    responses(
        (status = 200, description = "The caller's devices"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_devices_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let devices = app_state
        .devices
        .list_devices(user_id)
        .await
        .map_err(|e| port_error_response("Failed to list devices", e))?;
    Ok(Json(devices))
}

/// Add a device to the caller's catalog.
#[utoipa::path(
    post,
    path = "/devices",
    request_body(content_type = "application/json", description = "The device to add."),
    responses(
        (status = 201, description = "Device created"),
        (status = 400, description = "Invalid device attributes"),
        (status = 422, description = "Unknown or mistyped field"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn create_device_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(device): Json<NewDevice>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_device_fields(DeviceFields {
        name: Some(device.name.as_str()),
        power_consumption_watts: Some(device.power_consumption_watts),
        standby_power_watts: device.standby_power_watts,
        usage_flexibility: device.usage_flexibility,
        priority_level: device.priority_level,
    })
    .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let created = app_state
        .devices
        .create_device(user_id, device)
        .await
        .map_err(|e| port_error_response("Failed to create device", e))?;
    info!("Device {} created for user {}", created.id, user_id);
    Ok((StatusCode::CREATED, Json(created)))
}

/// Read one of the caller's devices.
#[utoipa::path(
    get,
    path = "/devices/{device_id}",
    responses(
        (status = 200, description = "The device"),
        (status = 404, description = "Device not found or not owned by user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("device_id" = i64, Path, description = "The device to read."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn get_device_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(device_id): Path<DeviceId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let device = app_state
        .devices
        .get_device(user_id, device_id)
        .await
        .map_err(|e| port_error_response("Failed to load device", e))?;
    Ok(Json(device))
}

/// Change one of the caller's devices.
///
/// Only the listed device fields are accepted; `null` clears an optional one.
#[utoipa::path(
    put,
    path = "/devices/{device_id}",
    request_body(content_type = "application/json", description = "Device fields to change."),
    responses(
        (status = 200, description = "The updated device"),
        (status = 400, description = "Invalid device attributes"),
        (status = 404, description = "Device not found or not owned by user"),
        (status = 422, description = "Unknown or mistyped field"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("device_id" = i64, Path, description = "The device to change."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_device_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(device_id): Path<DeviceId>,
    Json(update): Json<DeviceUpdate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_device_fields(DeviceFields {
        name: update.name.as_deref(),
        power_consumption_watts: update.power_consumption_watts,
        standby_power_watts: update.standby_power_watts.flatten(),
        usage_flexibility: update.usage_flexibility.flatten(),
        priority_level: update.priority_level.flatten(),
    })
    .map_err(|msg| (StatusCode::BAD_REQUEST, msg))?;

    let device = app_state
        .devices
        .update_device(user_id, device_id, update)
        .await
        .map_err(|e| port_error_response("Failed to update device", e))?;
    info!("Device {} updated for user {}", device_id, user_id);
    Ok(Json(device))
}

/// Remove one of the caller's devices.
#[utoipa::path(
    delete,
    path = "/devices/{device_id}",
    responses(
        (status = 204, description = "Device deleted"),
        (status = 404, description = "Device not found or not owned by user"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("device_id" = i64, Path, description = "The device to delete."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_device_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(device_id): Path<DeviceId>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .devices
        .delete_device(user_id, device_id)
        .await
        .map_err(|e| port_error_response("Failed to delete device", e))?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all device types.
#[utoipa::path(
    get,
    path = "/device-types",
    responses(
        (status = 200, description = "All device types"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_device_types_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let types = app_state
        .devices
        .list_device_types()
        .await
        .map_err(|e| port_error_response("Failed to list device types", e))?;
    Ok(Json(types))
}

/// List the brands available for a device type.
#[utoipa::path(
    get,
    path = "/device-types/{type_id}/brands",
    responses(
        (status = 200, description = "Brands for the type"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("type_id" = i32, Path, description = "The device type.")
    )
)]
pub async fn list_brands_handler(
    State(app_state): State<Arc<AppState>>,
    Path(type_id): Path<i32>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let brands = app_state
        .devices
        .list_brands_for_type(type_id)
        .await
        .map_err(|e| port_error_response("Failed to list brands", e))?;
    Ok(Json(brands))
}

/// The range-checked attributes shared by device creation and update.
struct DeviceFields<'a> {
    name: Option<&'a str>,
    power_consumption_watts: Option<f64>,
    standby_power_watts: Option<f64>,
    usage_flexibility: Option<i32>,
    priority_level: Option<i32>,
}

fn check_device_fields(fields: DeviceFields<'_>) -> Result<(), String> {
    if fields.name.is_some_and(|name| name.trim().is_empty()) {
        return Err("name must not be empty".to_string());
    }
    let watts = [
        ("power_consumption_watts", fields.power_consumption_watts),
        ("standby_power_watts", fields.standby_power_watts),
    ];
    for (field, value) in watts {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                return Err(format!("{} must be a non-negative number", field));
            }
        }
    }
    if let Some(flexibility) = fields.usage_flexibility {
        if !(0..=10).contains(&flexibility) {
            return Err("usage_flexibility must be between 0 and 10".to_string());
        }
    }
    if let Some(priority) = fields.priority_level {
        if !(1..=10).contains(&priority) {
            return Err("priority_level must be between 1 and 10".to_string());
        }
    }
    Ok(())
}
