//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use axum::http::StatusCode;
use ecoplot_core::ports::{DeviceCatalog, PortError, ProfileStore};
use ecoplot_core::RecommendationPipeline;
use std::sync::Arc;
use tracing::error;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub devices: Arc<dyn DeviceCatalog>,
    pub pipeline: Arc<RecommendationPipeline>,
}

/// Maps a port error onto the status code and message returned to the client.
pub fn port_error_response(context: &str, e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Unexpected(msg) => {
            error!("{}: {}", context, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, context.to_string())
        }
    }
}
