//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiRecommendationAdapter},
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::Router;
use ecoplot_core::RecommendationPipeline;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Recommendation Client ---
    // A missing key is reported per request, so the rest of the API stays usable.
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; recommendation requests will fail until it is.");
    }
    let recommendation_client = Arc::new(OpenAiRecommendationAdapter::new(
        config.gemini_api_key.as_deref(),
        &config.recommendation_api_base,
        config.recommendation_model.clone(),
        config.recommendation_timeout,
    ));

    // --- 4. Build the Shared AppState ---
    let pipeline = RecommendationPipeline::new(
        db_adapter.clone(),
        db_adapter.clone(),
        db_adapter.clone(),
        recommendation_client,
    )
    .with_history_limit(config.history_limit);

    let app_state = Arc::new(AppState {
        profiles: db_adapter.clone(),
        devices: db_adapter,
        pipeline: Arc::new(pipeline),
    });

    // --- 5. Create the Web Router ---
    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(web::middleware::USER_ID_HEADER),
        ]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
