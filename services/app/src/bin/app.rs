//! services/app/src/bin/app.rs

use app_lib::{
    adapters::{MintarHttpAdapter, SecureFileStore},
    config::Config,
    error::ApiError,
    web::{rest::ApiDoc, router, state::AppState},
};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
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
    info!("Configuration loaded. Starting companion service...");

    // --- 2. Open Device Storage ---
    info!("Opening storage at {}", config.storage_dir.display());
    let storage = Arc::new(SecureFileStore::open(&config.storage_dir).await?);

    // --- 3. Initialize the Remote API Adapter ---
    let mintar = Arc::new(MintarHttpAdapter::new(
        config.api_base_url.clone(),
        config.request_timeout,
    )?);
    info!("Remote API at {}", config.api_base_url);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(
        storage,
        mintar.clone(),
        mintar,
        config.clone(),
    ));

    match app_state.sessions.is_logged_in().await {
        Ok(true) => info!("Restored stored login"),
        Ok(false) => info!("No stored login; saving is disabled until login"),
        Err(e) => return Err(e.into()),
    }

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:8081"))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(router(app_state).layer(cors))
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
