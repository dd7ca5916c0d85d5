pub mod devices;
pub mod middleware;
pub mod profile;
pub mod rest;
pub mod state;

pub use middleware::require_user;
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;

/// Builds the API router. CORS and Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Catalog routes (no user required)
    let catalog_routes = Router::new()
        .route("/device-types", get(devices::list_device_types_handler))
        .route(
            "/device-types/{type_id}/brands",
            get(devices::list_brands_handler),
        );

    // User-scoped routes
    let user_routes = Router::new()
        .route(
            "/profile",
            get(profile::get_profile_handler).put(profile::update_profile_handler),
        )
        .route(
            "/devices",
            get(devices::list_devices_handler).post(devices::create_device_handler),
        )
        .route(
            "/devices/{device_id}",
            get(devices::get_device_handler)
                .put(devices::update_device_handler)
                .delete(devices::delete_device_handler),
        )
        .route("/recommendations", get(rest::get_recommendations_handler))
        .route(
            "/recommendations/device/{device_id}",
            get(rest::get_device_recommendations_handler),
        )
        .route("/recommendations/history", get(rest::get_history_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_user,
        ));

    Router::new()
        .merge(catalog_routes)
        .merge(user_routes)
        .with_state(app_state)
}
